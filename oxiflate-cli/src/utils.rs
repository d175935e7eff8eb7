//! Utility functions for the CLI.

use filetime::FileTime;
use memmap2::Mmap;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Input bytes: a memory-mapped file, or data read from stdin.
pub enum InputData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for InputData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => map,
            Self::Owned(data) => data,
        }
    }
}

/// Read `path`, or all of stdin when `None`.
pub fn read_input(path: Option<&Path>) -> io::Result<InputData> {
    let Some(path) = path else {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data)?;
        return Ok(InputData::Owned(data));
    };

    let file = File::open(path)?;
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    // Zero-length mappings are rejected on some platforms.
    if metadata.len() == 0 {
        return Ok(InputData::Owned(Vec::new()));
    }

    // SAFETY: read-only mapping; the file must not be truncated while mapped.
    let map = unsafe { Mmap::map(&file)? };
    Ok(InputData::Mapped(map))
}

/// Write `data` to `path`, or to stdout when `None`.
///
/// Existing files are only replaced with `force`.
pub fn write_output(path: Option<&Path>, data: &[u8], force: bool) -> io::Result<()> {
    let Some(path) = path else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(data)?;
        return stdout.flush();
    };

    let mut file = if force {
        File::create(path)?
    } else {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => io::Error::new(
                    e.kind(),
                    format!("{} already exists; use -f to overwrite", path.display()),
                ),
                _ => e,
            })?
    };
    file.write_all(data)?;
    file.sync_all()
}

/// Modification time of `path` in whole seconds since the epoch, clamped to
/// the range a gzip header can hold.
pub fn mtime_secs(path: &Path) -> io::Result<u32> {
    let mtime = FileTime::from_last_modification_time(&fs::metadata(path)?);
    Ok(mtime.unix_seconds().clamp(0, u32::MAX as i64) as u32)
}

/// Give `to` the modification time of `from`.
pub fn copy_mtime(from: &Path, to: &Path) -> io::Result<()> {
    let mtime = FileTime::from_last_modification_time(&fs::metadata(from)?);
    filetime::set_file_mtime(to, mtime)
}

/// Set the modification time of `path` from a Unix timestamp.
pub fn set_mtime_secs(path: &Path, secs: u32) -> io::Result<()> {
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs as i64, 0))
}

/// `path` with `suffix` appended to its file name.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// `path` with `suffix` removed, if its file name ends with it.
pub fn strip_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(suffix).filter(|s| !s.is_empty())?;
    Some(path.with_file_name(stem))
}

/// Human-readable input name.
pub fn display_name(path: Option<&Path>) -> String {
    path.map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string())
}

/// Per-file result, printed with `--verbose` and serialized with `--json`.
#[derive(Debug, Serialize)]
pub struct FileStats {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub operation: &'static str,
    pub format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Space saved by compression, in percent.
    pub savings: f64,
}

impl FileStats {
    pub fn new(
        operation: &'static str,
        format: &'static str,
        input: Option<&Path>,
        output: Option<&Path>,
        compressed_size: usize,
        uncompressed_size: usize,
    ) -> Self {
        let savings = if uncompressed_size > 0 {
            (1.0 - compressed_size as f64 / uncompressed_size as f64) * 100.0
        } else {
            0.0
        };
        Self {
            input: display_name(input),
            output: output.map(|p| p.display().to_string()),
            operation,
            format,
            level: None,
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            savings,
        }
    }

    /// gzip-style one-line report on stderr.
    pub fn print_verbose(&self) {
        let action = match (&self.output, self.operation) {
            (_, "test") => "OK".to_string(),
            (Some(out), _) => format!("replaced with {}", out),
            (None, _) => "written to stdout".to_string(),
        };
        eprintln!("{}:\t{:5.1}% -- {}", self.input, self.savings, action);
    }
}

/// Pretty-print all results as a JSON array.
pub fn print_json(stats: &[FileStats], to_stderr: bool) -> Result<(), serde_json::Error> {
    let json_output = serde_json::to_string_pretty(stats)?;
    if to_stderr {
        eprintln!("{}", json_output);
    } else {
        println!("{}", json_output);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_handling() {
        let path = Path::new("dir/notes.txt");
        let gz = with_suffix(path, ".gz");
        assert_eq!(gz, Path::new("dir/notes.txt.gz"));
        assert_eq!(strip_suffix(&gz, ".gz").as_deref(), Some(path));
        assert_eq!(strip_suffix(path, ".gz"), None);
        assert_eq!(strip_suffix(Path::new(".gz"), ".gz"), None);
    }

    #[test]
    fn test_stats_savings() {
        let stats = FileStats::new("compress", "gzip", None, None, 25, 100);
        assert!((stats.savings - 75.0).abs() < 1e-9);
        assert_eq!(stats.input, "<stdin>");

        let empty = FileStats::new("compress", "gzip", None, None, 20, 0);
        assert_eq!(empty.savings, 0.0);
    }

    #[test]
    fn test_stats_json_shape() {
        let mut stats = FileStats::new(
            "compress",
            "zlib",
            Some(Path::new("a.txt")),
            Some(Path::new("a.txt.zz")),
            10,
            40,
        );
        stats.level = Some(9);
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["output"], "a.txt.zz");
        assert_eq!(value["level"], 9);
        assert_eq!(value["uncompressed_size"], 40);

        let test = FileStats::new("test", "gzip", Some(Path::new("a.gz")), None, 10, 40);
        let value = serde_json::to_value(&test).unwrap();
        assert!(value.get("output").is_none());
        assert!(value.get("level").is_none());
    }
}
