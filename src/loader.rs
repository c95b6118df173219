//! Image loading seam used by navigation.
//!
//! [`DecodingLoader`] sniffs magic bytes, decodes with the `image` crate and
//! falls back to an optional external converter for formats it does not
//! understand.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use image::{ImageReader, RgbaImage};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::LoadError;

const MAGIC_LEN: u64 = 32;
const CONVERTER_POLL: Duration = Duration::from_millis(10);

/// A decoded image ready for display.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    pub path: PathBuf,
    pub pixels: RgbaImage,
}

impl ImageHandle {
    pub fn new(path: impl Into<PathBuf>, pixels: RgbaImage) -> Self {
        Self {
            path: path.into(),
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

pub trait ImageLoader {
    fn load(&mut self, path: &Path) -> Result<ImageHandle, LoadError>;
}

/// External command that turns an arbitrary file into a PNG.
///
/// `{input}` and `{output}` in the arguments are replaced with the source
/// path and a temporary output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converter {
    pub command: Vec<String>,
    pub timeout: Duration,
}

impl Converter {
    /// Run the converter, killing it once `timeout` elapses. The returned
    /// temp file is deleted when dropped.
    pub fn convert(&self, input: &Path) -> Result<TempPath, LoadError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| LoadError::ExternalTool("empty converter command".into()))?;
        let output = tempfile::Builder::new()
            .prefix("feh_")
            .suffix(".png")
            .tempfile()
            .map_err(|e| LoadError::ExternalTool(format!("temp file: {e}")))?
            .into_temp_path();
        let input_str = input.to_string_lossy();
        let output_str = output.to_string_lossy();
        let args: Vec<String> = args
            .iter()
            .map(|a| {
                a.replace("{input}", &input_str)
                    .replace("{output}", &output_str)
            })
            .collect();

        debug!(program, ?args, timeout = ?self.timeout, "running converter");
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LoadError::ExternalTool(format!("{program}: {e}")))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(output),
                Ok(Some(status)) => {
                    return Err(LoadError::ExternalTool(format!(
                        "{program} exited with {status}"
                    )));
                }
                Ok(None) if Instant::now() >= deadline => {
                    warn!(program, path = %input.display(), "converter timed out; killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(LoadError::ExternalTool(format!(
                        "{program} timed out after {}",
                        humantime::format_duration(self.timeout)
                    )));
                }
                Ok(None) => thread::sleep(CONVERTER_POLL),
                Err(e) => return Err(LoadError::ExternalTool(e.to_string())),
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodingLoader {
    converter: Option<Converter>,
}

impl DecodingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_converter(converter: Option<Converter>) -> Self {
        Self { converter }
    }
}

impl ImageLoader for DecodingLoader {
    fn load(&mut self, path: &Path) -> Result<ImageHandle, LoadError> {
        let decoded = sniff(path).and_then(|()| decode_rgba8(path));
        let pixels = match (decoded, &self.converter) {
            (Ok(pixels), _) => pixels,
            (Err(LoadError::MagicMismatch | LoadError::Unsupported), Some(converter)) => {
                debug!(path = %path.display(), "not decodable natively; trying converter");
                let converted = converter.convert(path)?;
                decode_rgba8(&converted)?
            }
            (Err(err), _) => return Err(err),
        };
        debug!(path = %path.display(), width = pixels.width(), height = pixels.height(), "loaded");
        Ok(ImageHandle::new(path, pixels))
    }
}

/// Check the leading bytes against known image signatures.
fn sniff(path: &Path) -> Result<(), LoadError> {
    let mut head = Vec::with_capacity(MAGIC_LEN as usize);
    File::open(path)?.take(MAGIC_LEN).read_to_end(&mut head)?;
    image::guess_format(&head)
        .map(|_| ())
        .map_err(|_| LoadError::MagicMismatch)
}

fn decode_rgba8(path: &Path) -> Result<RgbaImage, LoadError> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(img.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_png(path: &Path, w: u32, h: u32) {
        RgbaImage::new(w, h).save(path).unwrap();
    }

    #[test]
    fn decodes_png_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        write_png(&path, 3, 2);
        let handle = DecodingLoader::new().load(&path).unwrap();
        assert_eq!((handle.width(), handle.height()), (3, 2));
        assert_eq!(handle.path, path);
    }

    #[test]
    fn garbage_is_a_magic_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();
        let err = DecodingLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, LoadError::MagicMismatch), "{err:?}");
    }

    #[test]
    fn truncated_image_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        write_png(&good, 8, 8);
        let bytes = fs::read(&good).unwrap();
        let bad = dir.path().join("bad.png");
        fs::write(&bad, &bytes[..40]).unwrap();
        let err = DecodingLoader::new().load(&bad).unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)), "{err:?}");
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = DecodingLoader::new()
            .load(Path::new("/no/such/file.png"))
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound));
    }

    #[cfg(unix)]
    #[test]
    fn converter_output_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.png");
        write_png(&real, 5, 4);
        let odd = dir.path().join("picture.xyz");
        fs::write(&odd, b"proprietary").unwrap();
        let converter = Converter {
            command: vec![
                "sh".into(),
                "-c".into(),
                format!("cp '{}' '{{output}}'", real.display()),
            ],
            timeout: Duration::from_secs(10),
        };
        let handle = DecodingLoader::with_converter(Some(converter))
            .load(&odd)
            .unwrap();
        assert_eq!((handle.width(), handle.height()), (5, 4));
        assert_eq!(handle.path, odd);
    }

    #[cfg(unix)]
    #[test]
    fn converter_is_killed_on_timeout() {
        let converter = Converter {
            command: vec!["sleep".into(), "5".into()],
            timeout: Duration::from_millis(100),
        };
        let started = Instant::now();
        let err = converter.convert(Path::new("/dev/null")).unwrap_err();
        assert!(matches!(err, LoadError::ExternalTool(ref msg) if msg.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn failing_converter_reports_external_tool() {
        let converter = Converter {
            command: vec!["false".into()],
            timeout: Duration::from_secs(5),
        };
        let err = converter.convert(Path::new("/dev/null")).unwrap_err();
        assert_eq!(err.label(), "external-tool");
    }
}
