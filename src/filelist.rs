//! Building the initial list and persisting it.
//!
//! Sources are files, directories (walked with `walkdir`) and `-`, which
//! captures stdin into a temp file once. Filelists are plain text, one path
//! per line.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tempfile::TempPath;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::entry::FileEntry;
use crate::error::{Error, LoadError};
use crate::list::ImageList;
use crate::loader::ImageLoader;

const STDIN_NAME: &str = "-";
const STDIN_DEVICE: &str = "/dev/stdin";

/// Where the list comes from and how directories are walked.
#[derive(Debug, Default)]
pub struct Discovery {
    pub sources: Vec<PathBuf>,
    pub filelists: Vec<PathBuf>,
    pub recursive: bool,
    pub follow_links: bool,
    stdin_capture: Option<TempPath>,
}

impl Discovery {
    pub fn new(sources: Vec<PathBuf>, filelists: Vec<PathBuf>) -> Self {
        Self {
            sources,
            filelists,
            ..Self::default()
        }
    }

    /// True when one of the sources is `-` (image data on stdin).
    pub fn reads_stdin(&self) -> bool {
        self.sources.iter().any(|s| s.as_os_str() == STDIN_NAME)
    }

    /// Build a fresh list from every filelist, then every source, in order.
    ///
    /// Unreadable sources are reported and skipped. Stdin is captured the
    /// first time it is needed and the same capture is reused afterwards.
    pub fn discover(&mut self) -> Result<ImageList, Error> {
        let mut list = ImageList::new();
        for filelist in &self.filelists {
            for path in read_filelist(filelist)? {
                push(&mut list, path);
            }
        }
        let sources = self.sources.clone();
        for source in &sources {
            if source.as_os_str() == STDIN_NAME {
                let captured = self.stdin_path()?;
                push(&mut list, captured);
            } else {
                self.add_source(&mut list, source);
            }
        }
        info!(
            entries = list.len(),
            sources = self.sources.len(),
            filelists = self.filelists.len(),
            "discovery complete"
        );
        Ok(list)
    }

    fn stdin_path(&mut self) -> Result<PathBuf, Error> {
        if let Some(captured) = &self.stdin_capture {
            return Ok(captured.to_path_buf());
        }
        let captured = capture(io::stdin().lock())?;
        let path = captured.to_path_buf();
        debug!(path = %path.display(), "stdin captured");
        self.stdin_capture = Some(captured);
        Ok(path)
    }

    fn add_source(&self, list: &mut ImageList, source: &Path) {
        let meta = match fs::metadata(source) {
            Ok(meta) => meta,
            Err(err) => {
                warn!(path = %source.display(), "couldn't open, skipping: {err}");
                return;
            }
        };
        if !meta.is_dir() {
            push(list, source.to_path_buf());
            return;
        }
        let mut walker = WalkDir::new(source)
            .follow_links(self.follow_links)
            .sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }
        for entry in walker.into_iter().filter_entry(|e| !should_skip_dir(e)) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    push(list, entry.into_path());
                }
                Ok(_) => {}
                Err(err) => warn!(root = %source.display(), "walk error: {err}"),
            }
        }
    }
}

fn push(list: &mut ImageList, path: PathBuf) {
    if let Some(entry) = FileEntry::new(path) {
        list.add_end(entry);
    }
}

fn should_skip_dir(entry: &DirEntry) -> bool {
    // Never skip the root; tempfile roots can be dot-dirs.
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|n| n.starts_with('.'))
}

/// Copy `reader` into a temp file that lives as long as the returned handle.
pub fn capture<R: Read>(mut reader: R) -> io::Result<TempPath> {
    let mut file = tempfile::Builder::new().prefix("feh_stdin_").tempfile()?;
    io::copy(&mut reader, &mut file)?;
    file.flush()?;
    Ok(file.into_temp_path())
}

/// One path per line; blank lines are ignored.
pub fn parse_filelist<R: BufRead>(reader: R) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if !line.is_empty() {
            out.push(PathBuf::from(line));
        }
    }
    Ok(out)
}

/// Read a filelist. A missing file is an empty list, since the file is
/// created when the list is written back.
pub fn read_filelist(path: &Path) -> Result<Vec<PathBuf>, Error> {
    if path.as_os_str() == STDIN_NAME || path == Path::new(STDIN_DEVICE) {
        return Ok(parse_filelist(io::stdin().lock())?);
    }
    match File::open(path) {
        Ok(file) => {
            let paths = parse_filelist(BufReader::new(file))?;
            debug!(path = %path.display(), entries = paths.len(), "filelist read");
            Ok(paths)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "filelist does not exist yet");
            Ok(Vec::new())
        }
        Err(err) => Err(err.into()),
    }
}

/// Write every path in list order, exactly as stored.
pub fn write_filelist(list: &ImageList, path: &Path) -> Result<(), Error> {
    if path.as_os_str() == STDIN_NAME || path == Path::new(STDIN_DEVICE) {
        return Err(Error::StdinFilelist);
    }
    let mut out = BufWriter::new(File::create(path)?);
    for (_, entry) in list.iter() {
        out.write_all(entry.path().as_os_str().as_encoded_bytes())?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    debug!(path = %path.display(), entries = list.len(), "filelist written");
    Ok(())
}

/// `base` if free, otherwise the first free `base_NNN`.
pub fn unique_filename(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }
    let mut n = 1u32;
    loop {
        let mut name = base.as_os_str().to_owned();
        name.push(format!("_{n:03}"));
        let candidate = PathBuf::from(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Write the list to a fresh file derived from `base`; returns its path.
pub fn save_filelist(list: &ImageList, base: &Path) -> Result<PathBuf, Error> {
    let path = unique_filename(base);
    write_filelist(list, &path)?;
    info!(path = %path.display(), entries = list.len(), "filelist saved");
    Ok(path)
}

/// Probe every entry's info block, removing entries that cannot be probed.
///
/// With `verbose`, one status mark per entry goes to stderr: `.` for
/// success, otherwise the failure's mark.
pub fn preload_info(list: &mut ImageList, verbose: bool) -> Vec<(PathBuf, LoadError)> {
    let mut failures = Vec::new();
    for id in list.ids() {
        let result = match list.get_mut(id) {
            Some(entry) => entry.load_info().map(|_| ()),
            None => continue,
        };
        match result {
            Ok(()) => progress(verbose, '.'),
            Err(err) => {
                progress(verbose, err.mark());
                if let Some(entry) = list.remove(id) {
                    debug!(path = %entry.path().display(), kind = err.label(), "dropped during preload");
                    failures.push((entry.path().to_path_buf(), err));
                }
            }
        }
    }
    if verbose {
        eprintln!();
    }
    if !failures.is_empty() {
        info!(removed = failures.len(), remaining = list.len(), "preload finished");
    }
    failures
}

fn progress(verbose: bool, mark: char) {
    if verbose {
        eprint!("{mark}");
        let _ = io::stderr().flush();
    }
}

/// Split the list into loadable and unloadable paths by fully decoding each.
pub fn partition_loadable<L: ImageLoader>(
    list: &ImageList,
    loader: &mut L,
) -> (Vec<PathBuf>, Vec<(PathBuf, LoadError)>) {
    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for (_, entry) in list.iter() {
        match loader.load(entry.path()) {
            Ok(_) => ok.push(entry.path().to_path_buf()),
            Err(err) => failed.push((entry.path().to_path_buf(), err)),
        }
    }
    (ok, failed)
}

/// Tabular listing of entries with their info blocks; entries without info
/// show dashes.
pub fn format_list(list: &ImageList) -> String {
    let mut out = String::from("NUM\tFORMAT\tWIDTH\tHEIGHT\tPIXELS\tSIZE\tALPHA\tMODIFIED\tFILENAME\n");
    for (num, (_, entry)) in list.iter().enumerate() {
        let _ = match entry.info() {
            Some(info) => writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                num + 1,
                info.format,
                info.width,
                info.height,
                human_count(info.pixels),
                human_count(info.size),
                if info.has_alpha { "X" } else { "-" },
                DateTime::<Local>::from(info.mtime).format("%Y-%m-%d %H:%M"),
                entry.path().display()
            ),
            None => writeln!(
                out,
                "{}\t-\t-\t-\t-\t-\t-\t-\t{}",
                num + 1,
                entry.path().display()
            ),
        };
    }
    out
}

fn human_count(n: u64) -> String {
    match n {
        0..1_000 => n.to_string(),
        1_000..1_000_000 => format!("{}k", n / 1_000),
        _ => format!("{:.1}M", n as f64 / 1_000_000.0),
    }
}
