// LogWatch - platform/fs.rs
//
// Filesystem helpers shared by the scanner and the watcher.
//
// Every function returns `io::Result` (or an empty collection for directory
// listings); deciding whether a failure is fatal is left to the caller, which
// for per-file operations always means "skip and retry next cycle".

use crate::util::constants::NEWLINE_SCAN_CHUNK_SIZE;
use glob::{MatchOptions, Pattern};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Current size and modification time (seconds since the Unix epoch) of a
/// file.
///
/// A modification time the platform cannot report is returned as `0.0`.
pub fn file_signature(path: &Path) -> io::Result<(u64, f64)> {
    let meta = std::fs::metadata(path)?;
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok((meta.len(), mtime))
}

/// Read everything from byte `offset` to the current end of the file.
pub fn read_from(path: &Path, offset: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Count `\n` bytes in the first `offset` bytes of the file.
///
/// Reads in fixed-size chunks so large offsets never allocate the whole
/// prefix. Stops early if the file is shorter than `offset`.
pub fn count_newlines_before(path: &Path, offset: u64) -> io::Result<u64> {
    let mut reader = File::open(path)?.take(offset);
    let mut buf = vec![0u8; NEWLINE_SCAN_CHUNK_SIZE];
    let mut count = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        count += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
    }
    Ok(count)
}

/// Return up to `max_lines` non-blank lines from the start of the file,
/// reading at most `max_bytes` bytes.
///
/// Invalid UTF-8 is replaced rather than treated as an error.
pub fn sample_non_empty_lines(
    path: &Path,
    max_lines: usize,
    max_bytes: u64,
) -> io::Result<Vec<String>> {
    let mut bytes = Vec::new();
    File::open(path)?.take(max_bytes).read_to_end(&mut bytes)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(max_lines)
        .map(str::to_string)
        .collect())
}

/// List the regular files directly inside `dir` whose name matches `pattern`.
///
/// Dot-prefixed names match like any other, so `*.log` includes `.worker.log`.
/// An unreadable or missing directory yields an empty list.
pub fn list_matching_files(dir: &Path, pattern: &Pattern) -> Vec<PathBuf> {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "Cannot list directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| pattern.matches_with(name, options))
        })
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}
