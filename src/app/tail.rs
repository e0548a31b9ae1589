// LogWatch - app/tail.rs
//
// Per-file tail state: byte cursor, cumulative match count and a bounded ring
// of recently matched lines, plus the pattern -> files index.
//
// Architecture:
//   - `TailState` is plain data owned by the watcher behind a mutex; it never
//     spawns threads or sends messages. Callers receive `MatchEvent`s as
//     return values and deliver them after releasing the lock.
//   - Three read paths share one line evaluator:
//       `check`                   incremental tail from the saved offset
//       `reindex_from_position`   catch-up rebuild after restart
//       `reindex_full`            unconditional rebuild with events
//
// Error handling: a file that cannot be stat'ed or read is skipped for this
// cycle and left untouched, so the next cycle retries it.
//
// Encoding: new bytes are decoded as lossy UTF-8. Lines are split on `\n`
// (a trailing `\r` is dropped); an unterminated final line is evaluated as-is.

use crate::core::model::{DatetimeRange, FileState, MatchEvent, MatchedLine};
use crate::core::pattern::PatternSet;
use crate::core::timestamp::parse_timestamp;
use crate::platform::fs;
use crate::util::constants::{DEBUG_MAX_LINE_PREVIEW, MAX_MATCHED_LINES_PER_FILE};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// Match rules
// =============================================================================

/// Active pattern set and datetime window, swapped as a unit by the watcher.
#[derive(Debug, Clone)]
pub struct MatchRules {
    pub patterns: Arc<PatternSet>,
    pub range: DatetimeRange,
}

impl MatchRules {
    pub fn new(patterns: PatternSet, range: DatetimeRange) -> Self {
        Self {
            patterns: Arc::new(patterns),
            range,
        }
    }

    /// Evaluate one line: `Some((count, matched_patterns, timestamp))` if at
    /// least one pattern matches and the line's timestamp is in range.
    fn evaluate(&self, line: &str) -> Option<(usize, Vec<String>, Option<NaiveDateTime>)> {
        let (count, matched) = self.patterns.count_matches(line);
        if count == 0 {
            return None;
        }
        let timestamp = parse_timestamp(line);
        self.range
            .contains(timestamp)
            .then_some((count, matched, timestamp))
    }
}

impl Default for MatchRules {
    fn default() -> Self {
        Self::new(PatternSet::default_set(), DatetimeRange::default())
    }
}

// =============================================================================
// Per-file records
// =============================================================================

/// Read position of a file: everything before `offset` has been evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileCursor {
    pub offset: u64,
    /// Modification time observed when `offset` was recorded.
    pub mtime: f64,
}

#[derive(Debug, Default)]
struct FileRecord {
    /// `None` until the file is first observed or restored.
    cursor: Option<FileCursor>,
    match_count: u64,
    matched: VecDeque<MatchedLine>,
}

/// Tail bookkeeping for every file the watcher has touched.
#[derive(Debug, Default)]
pub struct TailState {
    files: HashMap<PathBuf, FileRecord>,
    /// Raw pattern string -> files with at least one buffered match for it.
    pattern_files: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl TailState {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Read paths
    // -------------------------------------------------------------------------

    /// Incremental check of `path`, returning one event per new qualifying
    /// line.
    ///
    /// First sight records the current end of file without reading it. A file
    /// that shrank below the saved offset is treated as rotated: reading
    /// restarts at 0 and the matched-line ring is cleared, but the cumulative
    /// count is kept (only the reindex paths recompute it).
    pub fn check(&mut self, path: &Path, rules: &MatchRules) -> Vec<MatchEvent> {
        let (size, mtime) = match fs::file_signature(path) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "Check: cannot stat");
                return Vec::new();
            }
        };

        let record = self.files.entry(path.to_path_buf()).or_default();
        let Some(cursor) = record.cursor else {
            tracing::debug!(file = %path.display(), offset = size, "Check: baseline recorded");
            record.cursor = Some(FileCursor {
                offset: size,
                mtime,
            });
            return Vec::new();
        };

        if size == cursor.offset && mtime == cursor.mtime {
            return Vec::new();
        }

        let mut offset = cursor.offset;
        if size < offset {
            tracing::info!(
                file = %path.display(),
                old_offset = offset,
                new_size = size,
                "File truncated or rotated; reading from start"
            );
            offset = 0;
            record.matched.clear();
            record.cursor = Some(FileCursor { offset: 0, mtime });
        }

        if size == offset {
            record.cursor = Some(FileCursor { offset, mtime });
            return Vec::new();
        }

        let first_line = match fs::count_newlines_before(path, offset) {
            Ok(n) => n + 1,
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "Check: cannot count lines");
                1
            }
        };

        let bytes = match fs::read_from(path, offset) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "Check: read failed");
                return Vec::new();
            }
        };

        record.cursor = Some(FileCursor {
            offset: offset + bytes.len() as u64,
            mtime,
        });

        let text = String::from_utf8_lossy(&bytes);
        let (added, events) = apply_lines(
            record,
            &mut self.pattern_files,
            path,
            &text,
            first_line,
            rules,
            true,
        );
        record.match_count += added;

        if !events.is_empty() {
            tracing::debug!(
                file = %path.display(),
                new_matches = events.len(),
                bytes = bytes.len(),
                "Check: new matches"
            );
        }
        events
    }

    /// Rebuild the ring and count of `path` from a full read, used to catch
    /// up after a restart or a rules change.
    ///
    /// If the file shrank below the saved offset, or its mtime differs from a
    /// non-zero saved mtime, the count is reset before the read so a failed
    /// read leaves zero rather than a stale total. No events are produced.
    pub fn reindex_from_position(&mut self, path: &Path, rules: &MatchRules) {
        let Ok((size, mtime)) = fs::file_signature(path) else {
            return;
        };

        let record = self.files.entry(path.to_path_buf()).or_default();
        let saved = record.cursor.unwrap_or(FileCursor {
            offset: 0,
            mtime: 0.0,
        });
        if size < saved.offset || (saved.mtime > 0.0 && mtime != saved.mtime) {
            tracing::debug!(file = %path.display(), "Reindex: file changed since last run");
            record.match_count = 0;
        }

        self.rebuild(path, rules, false);
    }

    /// Unconditionally rebuild `path` from byte 0, returning an event for
    /// every qualifying line.
    pub fn reindex_full(&mut self, path: &Path, rules: &MatchRules) -> Vec<MatchEvent> {
        self.rebuild(path, rules, true)
    }

    fn rebuild(&mut self, path: &Path, rules: &MatchRules, emit: bool) -> Vec<MatchEvent> {
        let Ok((_, mtime)) = fs::file_signature(path) else {
            return Vec::new();
        };

        let record = self.files.entry(path.to_path_buf()).or_default();
        record.matched.clear();
        forget_file(&mut self.pattern_files, path);

        let bytes = match fs::read_from(path, 0) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "Reindex: read failed");
                return Vec::new();
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        let (total, events) = apply_lines(
            record,
            &mut self.pattern_files,
            path,
            &text,
            1,
            rules,
            emit,
        );
        record.match_count = total;
        record.cursor = Some(FileCursor {
            offset: bytes.len() as u64,
            mtime,
        });

        tracing::debug!(
            file = %path.display(),
            matches = total,
            buffered = record.matched.len(),
            "Reindexed file"
        );
        events
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn match_count(&self, path: &Path) -> u64 {
        self.files.get(path).map_or(0, |r| r.match_count)
    }

    pub fn total_match_count(&self) -> u64 {
        self.files.values().map(|r| r.match_count).sum()
    }

    /// Copy of the buffered matched lines of `path`, oldest first.
    pub fn matched_lines(&self, path: &Path) -> Vec<MatchedLine> {
        self.files
            .get(path)
            .map(|r| r.matched.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sorted files with at least one buffered match for `pattern`.
    pub fn files_for_pattern(&self, pattern: &str) -> Vec<PathBuf> {
        self.pattern_files
            .get(pattern)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cursor(&self, path: &Path) -> Option<FileCursor> {
        self.files.get(path).and_then(|r| r.cursor)
    }

    // -------------------------------------------------------------------------
    // Mutators
    // -------------------------------------------------------------------------

    /// Zero every count and empty every ring. Cursors are kept so tailing
    /// continues from the current position.
    pub fn reset_all(&mut self) {
        for record in self.files.values_mut() {
            record.match_count = 0;
            record.matched.clear();
        }
        self.pattern_files.clear();
    }

    /// Zero the count and empty the ring of one file.
    pub fn reset_file(&mut self, path: &Path) {
        if let Some(record) = self.files.get_mut(path) {
            record.match_count = 0;
            record.matched.clear();
        }
        forget_file(&mut self.pattern_files, path);
    }

    /// Drop all per-file state, cursors included.
    pub fn clear(&mut self) {
        self.files.clear();
        self.pattern_files.clear();
    }

    /// Snapshot of cursor and count for every known file.
    pub fn export_state(&self) -> BTreeMap<PathBuf, FileState> {
        self.files
            .iter()
            .map(|(path, record)| {
                let cursor = record.cursor.unwrap_or(FileCursor {
                    offset: 0,
                    mtime: 0.0,
                });
                (
                    path.clone(),
                    FileState {
                        position: cursor.offset,
                        mtime: cursor.mtime,
                        error_count: record.match_count,
                    },
                )
            })
            .collect()
    }

    /// Load cursors and counts saved by `export_state`. Buffered lines are not
    /// persisted; a reindex rebuilds them.
    pub fn restore_state(&mut self, state: &BTreeMap<PathBuf, FileState>) {
        for (path, saved) in state {
            let record = self.files.entry(path.clone()).or_default();
            record.cursor = Some(FileCursor {
                offset: saved.position,
                mtime: saved.mtime,
            });
            record.match_count = saved.error_count;
        }
        tracing::debug!(files = state.len(), "File state restored");
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Evaluate every line of `text` (numbered from `first_line`), buffering
/// qualifying lines. Returns the summed pattern-match count and, when `emit`
/// is set, one event per qualifying line.
fn apply_lines(
    record: &mut FileRecord,
    pattern_files: &mut BTreeMap<String, BTreeSet<PathBuf>>,
    path: &Path,
    text: &str,
    first_line: u64,
    rules: &MatchRules,
    emit: bool,
) -> (u64, Vec<MatchEvent>) {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut total = 0u64;
    let mut events = Vec::new();

    for (line_number, line) in (first_line..).zip(text.lines()) {
        let Some((count, matched_patterns, timestamp)) = rules.evaluate(line) else {
            continue;
        };
        total += count as u64;
        let trimmed = line.trim();

        tracing::trace!(
            file = %file_name,
            line_number,
            text = %preview(trimmed),
            "Matched line"
        );

        for pattern in &matched_patterns {
            pattern_files
                .entry(pattern.clone())
                .or_default()
                .insert(path.to_path_buf());
        }

        if emit {
            events.push(MatchEvent {
                file_name: file_name.clone(),
                file_path: path.to_path_buf(),
                line_number,
                text: trimmed.to_string(),
                matched_patterns: matched_patterns.clone(),
            });
        }

        if record.matched.len() >= MAX_MATCHED_LINES_PER_FILE {
            record.matched.pop_front();
        }
        record.matched.push_back(MatchedLine {
            line_number,
            text: trimmed.to_string(),
            timestamp,
            matched_patterns,
        });
    }

    (total, events)
}

/// Remove `path` from every pattern's file set, dropping emptied entries.
fn forget_file(pattern_files: &mut BTreeMap<String, BTreeSet<PathBuf>>, path: &Path) {
    pattern_files.retain(|_, files| {
        files.remove(path);
        !files.is_empty()
    });
}

/// Truncate a line for debug output.
fn preview(text: &str) -> String {
    if text.chars().count() <= DEBUG_MAX_LINE_PREVIEW {
        text.to_string()
    } else {
        let mut s: String = text.chars().take(DEBUG_MAX_LINE_PREVIEW).collect();
        s.push_str("...");
        s
    }
}

// =============================================================================
// Unit tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    fn rules(patterns: &[&str]) -> MatchRules {
        MatchRules::new(
            PatternSet::from_strings(patterns).unwrap(),
            DatetimeRange::default(),
        )
    }

    #[test]
    fn test_first_check_records_baseline_without_backfill() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "ERROR old\n").unwrap();

        let mut state = TailState::new();
        let rules = rules(&["error"]);
        assert!(state.check(&path, &rules).is_empty());
        assert_eq!(state.cursor(&path).unwrap().offset, 10);
        assert_eq!(state.match_count(&path), 0);
    }

    #[test]
    fn test_appended_lines_are_reported_with_line_numbers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "INFO one\nINFO two\n").unwrap();

        let mut state = TailState::new();
        let rules = rules(&["error"]);
        state.check(&path, &rules);

        append(&path, "INFO three\n  ERROR four  \n");
        let events = state.check(&path, &rules);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_number, 4);
        assert_eq!(events[0].text, "ERROR four");
        assert_eq!(events[0].file_name, "app.log");
        assert_eq!(events[0].matched_patterns, vec!["error"]);
        assert_eq!(state.match_count(&path), 1);
        assert_eq!(state.files_for_pattern("error"), vec![path.clone()]);
    }

    #[test]
    fn test_second_check_without_change_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let mut state = TailState::new();
        let rules = rules(&["error"]);
        state.check(&path, &rules);
        append(&path, "ERROR a\n");
        assert_eq!(state.check(&path, &rules).len(), 1);

        let cursor = state.cursor(&path);
        assert!(state.check(&path, &rules).is_empty());
        assert_eq!(state.cursor(&path), cursor);
        assert_eq!(state.match_count(&path), 1);
    }

    #[test]
    fn test_rotation_clears_ring_but_keeps_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let mut state = TailState::new();
        let rules = rules(&["error"]);
        state.check(&path, &rules);
        append(&path, &"ERROR before rotation padding padding\n".repeat(10));
        assert_eq!(state.check(&path, &rules).len(), 10);
        let before = state.cursor(&path).unwrap().offset;

        std::fs::write(&path, "ERROR after\n").unwrap();
        let events = state.check(&path, &rules);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_number, 1);

        let after = state.cursor(&path).unwrap().offset;
        assert!(after < before);
        let lines = state.matched_lines(&path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "ERROR after");
        // The cumulative count survives rotation; only reindex recomputes it.
        assert_eq!(state.match_count(&path), 11);
    }

    #[test]
    fn test_count_adds_every_matching_pattern() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let mut state = TailState::new();
        let rules = rules(&["error", "failed"]);
        state.check(&path, &rules);
        append(&path, "ERROR Failed to connect\n");
        let events = state.check(&path, &rules);
        assert_eq!(events.len(), 1);
        assert_eq!(state.match_count(&path), 2);
    }

    #[test]
    fn test_datetime_filter_applies_to_matches() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(
            &path,
            "2024-01-09 23:59:59 ERROR early\n\
             2024-01-10 00:00:00 ERROR start\n\
             ERROR no timestamp\n\
             2024-01-20 00:00:00 ERROR end\n\
             2024-01-21 00:00:00 ERROR late\n",
        )
        .unwrap();

        let day = |d| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        let rules = MatchRules::new(
            PatternSet::from_strings(&["error"]).unwrap(),
            DatetimeRange::new(Some(day(10)), Some(day(20))),
        );

        let mut state = TailState::new();
        let events = state.reindex_full(&path, &rules);
        let numbers: Vec<u64> = events.iter().map(|e| e.line_number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);
        assert_eq!(state.match_count(&path), 3);
    }

    #[test]
    fn test_ring_keeps_most_recent_fifty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let content: String = (0..60).map(|i| format!("error {i}\n")).collect();
        std::fs::write(&path, content).unwrap();

        let mut state = TailState::new();
        state.reindex_full(&path, &rules(&["error"]));
        let lines = state.matched_lines(&path);
        assert_eq!(lines.len(), MAX_MATCHED_LINES_PER_FILE);
        assert_eq!(lines.first().unwrap().text, "error 10");
        assert_eq!(lines.last().unwrap().text, "error 59");
        assert_eq!(state.match_count(&path), 60);
    }

    #[test]
    fn test_reindex_from_position_rebuilds_and_emits_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "ERROR a\nINFO b\nERROR c\n").unwrap();

        let mut state = TailState::new();
        let mut saved = BTreeMap::new();
        saved.insert(
            path.clone(),
            FileState {
                position: 8,
                mtime: 1.0,
                error_count: 99,
            },
        );
        state.restore_state(&saved);
        assert_eq!(state.match_count(&path), 99);

        state.reindex_from_position(&path, &rules(&["error"]));
        assert_eq!(state.match_count(&path), 2);
        assert_eq!(state.matched_lines(&path).len(), 2);
        assert_eq!(state.cursor(&path).unwrap().offset, 23);
    }

    #[test]
    fn test_restored_cursor_resumes_tailing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "ERROR old\nERROR new\n").unwrap();

        let mut state = TailState::new();
        let mut saved = BTreeMap::new();
        saved.insert(
            path.clone(),
            FileState {
                position: 10,
                mtime: 0.0,
                error_count: 1,
            },
        );
        state.restore_state(&saved);

        let events = state.check(&path, &rules(&["error"]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_number, 2);
        assert_eq!(state.match_count(&path), 2);
    }

    #[test]
    fn test_reset_file_and_reset_all() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        std::fs::write(&a, "ERROR a\n").unwrap();
        std::fs::write(&b, "ERROR b\n").unwrap();

        let mut state = TailState::new();
        let rules = rules(&["error"]);
        state.reindex_full(&a, &rules);
        state.reindex_full(&b, &rules);
        assert_eq!(state.total_match_count(), 2);
        assert_eq!(state.files_for_pattern("error"), vec![a.clone(), b.clone()]);

        state.reset_file(&a);
        assert_eq!(state.match_count(&a), 0);
        assert!(state.matched_lines(&a).is_empty());
        assert_eq!(state.files_for_pattern("error"), vec![b.clone()]);

        state.reset_all();
        assert_eq!(state.total_match_count(), 0);
        assert!(state.files_for_pattern("error").is_empty());
        assert!(state.cursor(&b).is_some(), "cursors survive a reset");
    }

    #[test]
    fn test_export_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "ERROR a\n").unwrap();

        let mut state = TailState::new();
        state.reindex_full(&path, &rules(&["error"]));
        let exported = state.export_state();
        let entry = exported.get(&path).unwrap();
        assert_eq!(entry.position, 8);
        assert_eq!(entry.error_count, 1);
        assert!(entry.mtime > 0.0);
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.log");
        let mut state = TailState::new();
        let rules = rules(&["error"]);
        assert!(state.check(&path, &rules).is_empty());
        assert!(state.reindex_full(&path, &rules).is_empty());
        assert!(state.cursor(&path).is_none());
    }

    #[test]
    fn test_preview_truncates_long_lines() {
        let long = "x".repeat(DEBUG_MAX_LINE_PREVIEW + 10);
        let p = preview(&long);
        assert_eq!(p.chars().count(), DEBUG_MAX_LINE_PREVIEW + 3);
        assert_eq!(preview("short"), "short");
    }
}
