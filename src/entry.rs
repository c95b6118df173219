//! Per-image record owned by the image list.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::{ImageDecoder, ImageReader};
use tracing::debug;

use crate::error::LoadError;

/// Metadata probed on demand. Either fully present or absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub width: u32,
    pub height: u32,
    pub pixels: u64,
    pub has_alpha: bool,
    pub format: String,
    pub size: u64,
    pub mtime: SystemTime,
}

impl FileInfo {
    /// Stat the file and read the image header; the pixel data is not decoded.
    pub fn probe(path: &Path) -> Result<Self, LoadError> {
        let meta = fs::metadata(path)?;
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format().ok_or(LoadError::Unsupported)?;
        let decoder = reader.into_decoder()?;
        let (width, height) = decoder.dimensions();
        Ok(Self {
            width,
            height,
            pixels: u64::from(width) * u64::from(height),
            has_alpha: decoder.color_type().has_alpha(),
            format: format
                .extensions_str()
                .first()
                .copied()
                .unwrap_or("unknown")
                .to_string(),
            size: meta.len(),
            mtime: meta.modified()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    path: PathBuf,
    name: String,
    caption: Option<String>,
    info: Option<FileInfo>,
}

impl FileEntry {
    /// Returns `None` for an empty path.
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return None;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Some(Self {
            path,
            name,
            caption: None,
            info: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Basename shown to the user.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory component, empty for a bare filename.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn info(&self) -> Option<&FileInfo> {
        self.info.as_ref()
    }

    /// Probe the info block unless it is already cached.
    pub fn load_info(&mut self) -> Result<&FileInfo, LoadError> {
        let info = match self.info.take() {
            Some(info) => info,
            None => {
                let info = FileInfo::probe(&self.path)?;
                debug!(
                    path = %self.path.display(),
                    width = info.width,
                    height = info.height,
                    format = %info.format,
                    "info loaded"
                );
                info
            }
        };
        Ok(self.info.insert(info))
    }

    pub fn set_info(&mut self, info: FileInfo) {
        self.info = Some(info);
    }

    /// Drop cached info and caption so the next access re-reads the file.
    pub fn invalidate(&mut self) {
        self.info = None;
        self.caption = None;
    }

    /// Where the caption for this entry lives: `<dir>/<caption_dir>/<stem>.txt`.
    pub fn caption_file(&self, caption_dir: &Path) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone());
        self.dir().join(caption_dir).join(format!("{stem}.txt"))
    }

    /// Caption text, read from disk on first access.
    pub fn caption(&mut self, caption_dir: &Path) -> Option<&str> {
        if self.caption.is_none() {
            let file = self.caption_file(caption_dir);
            match fs::read_to_string(&file) {
                Ok(text) => self.caption = Some(text.trim_end().to_string()),
                Err(err) => {
                    debug!(path = %file.display(), "no caption: {err}");
                    return None;
                }
            }
        }
        self.caption.as_deref()
    }

    /// Replace the caption and write it back next to the image.
    pub fn set_caption(&mut self, caption_dir: &Path, text: &str) -> std::io::Result<()> {
        let file = self.caption_file(caption_dir);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file, format!("{text}\n"))?;
        self.caption = Some(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_path() {
        assert!(FileEntry::new("").is_none());
    }

    #[test]
    fn name_is_basename() {
        let e = FileEntry::new("/photos/2024/a.jpg").unwrap();
        assert_eq!(e.name(), "a.jpg");
        assert_eq!(e.dir(), Path::new("/photos/2024"));
        let bare = FileEntry::new("b.png").unwrap();
        assert_eq!(bare.dir(), Path::new(""));
    }

    #[test]
    fn caption_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("cat.jpg");
        let mut e = FileEntry::new(&img).unwrap();
        assert_eq!(e.caption(Path::new(".tc")), None);
        e.set_caption(Path::new(".tc"), "a cat").unwrap();
        assert_eq!(
            e.caption_file(Path::new(".tc")),
            dir.path().join(".tc").join("cat.txt")
        );
        let mut fresh = FileEntry::new(&img).unwrap();
        assert_eq!(fresh.caption(Path::new(".tc")), Some("a cat"));
    }

    #[test]
    fn info_of_missing_file_is_not_found() {
        let mut e = FileEntry::new("/definitely/not/here.png").unwrap();
        assert!(matches!(e.load_info(), Err(LoadError::NotFound)));
        assert!(e.info().is_none());
    }
}
