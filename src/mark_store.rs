//! # Per-Year Mark Persistence
//!
//! Marks live in one plain text file per calendar year, `<data_dir>/<year>.txt`,
//! one record per line:
//!
//! ```text
//! 3,15,1
//! 3,16,2
//! ```
//!
//! Fields are `month,day,shape`. Older files only carry `month,day`; those
//! records load with the default shape ([`ShapeKind::Circle`]). Files are always
//! written back in the three-field form, sorted by date.
//!
//! ## Loading is best-effort
//! - A missing file is an empty year. The empty file is written immediately so
//!   a read always leaves a valid file behind.
//! - Lines with the wrong field count, non-numeric fields, unknown shape codes,
//!   dates that do not exist in that year or bytes that are not UTF-8 are
//!   skipped with a warning. One damaged line never costs the rest of the year.
//!
//! ## Writes are atomic
//! The new content goes to a sibling `.tmp` file which is then renamed over the
//! old one, so a crash mid-write never leaves a truncated year behind.

use crate::{MonthDay, Marks, ShapeKind};
use log::{debug, info, warn};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

/// Errors raised at the mark store boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Month or day outside the calendar for that year
    #[error("invalid date {year}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    /// Mark file could not be read or written
    #[error("mark file IO: {0}")]
    Io(#[from] io::Error),
}

/// A persisted line that could not be understood.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("malformed record on line {line}: {reason}")]
pub struct MalformedRecord {
    pub line: usize,
    pub reason: &'static str,
}

/// Loads, saves and toggles the marks of one year at a time.
///
/// The store caches the most recently loaded year. Loading another year
/// replaces the cache wholesale.
#[derive(Debug)]
pub struct MarkStore {
    dir: PathBuf,
    year: Option<i32>,
    marks: Marks,
}

impl MarkStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            year: None,
            marks: Marks::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the mark file for `year`
    pub fn path_for(&self, year: i32) -> PathBuf {
        self.dir.join(format!("{year}.txt"))
    }

    /// Year currently held in the cache, if any
    pub fn year(&self) -> Option<i32> {
        self.year
    }

    /// Marks of the cached year
    pub fn marks(&self) -> &Marks {
        &self.marks
    }

    /// Load `year` from disk, replacing whatever was cached.
    ///
    /// A missing file yields an empty mapping and is created on the spot.
    pub fn load(&mut self, year: i32) -> Result<&Marks, StoreError> {
        let path = self.path_for(year);
        let marks = match fs::read(&path) {
            Ok(bytes) => {
                let marks = parse_marks(&bytes, year);
                debug!("Loaded {} marks from {}", marks.len(), path.display());
                marks
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No mark file for {}, creating {}", year, path.display());
                let empty = Marks::new();
                self.save(year, &empty)?;
                empty
            }
            Err(e) => return Err(e.into()),
        };

        self.year = Some(year);
        self.marks = marks;
        Ok(&self.marks)
    }

    /// Persist `marks` as the full content of `year`'s file.
    ///
    /// Does not touch the cache; callers that want the cache updated go
    /// through [`MarkStore::toggle`] or [`MarkStore::load`].
    pub fn save(&self, year: i32, marks: &Marks) -> Result<(), StoreError> {
        if let Some(bad) = marks.keys().find(|cell| !cell.is_valid_in(year)) {
            return Err(StoreError::InvalidDate {
                year,
                month: bad.month,
                day: bad.day,
            });
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(year);
        let tmp = path.with_extension("txt.tmp");
        fs::write(&tmp, format_marks(marks))?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Shape-aware toggle of one day.
    ///
    /// If the day already holds `shape` the mark is removed, otherwise the day is
    /// set to `shape` (replacing any other shape). The file is written before the
    /// cache changes; if the write fails the cache is left as it was.
    pub fn toggle(
        &mut self,
        year: i32,
        month: u32,
        day: u32,
        shape: ShapeKind,
    ) -> Result<&Marks, StoreError> {
        let cell = MonthDay::new(year, month, day).ok_or(StoreError::InvalidDate {
            year,
            month,
            day,
        })?;

        if self.year != Some(year) {
            self.load(year)?;
        }

        let mut next = self.marks.clone();
        if next.get(&cell) == Some(&shape) {
            next.remove(&cell);
            debug!("Cleared {} mark on {}", shape, cell);
        } else {
            next.insert(cell, shape);
            debug!("Set {} mark on {}", shape, cell);
        }

        self.save(year, &next)?;
        self.marks = next;
        Ok(&self.marks)
    }
}

/// Parse a whole mark file, skipping anything malformed.
///
/// Lines are decoded one at a time so stray non-UTF-8 bytes only cost the
/// line they sit on.
pub fn parse_marks<T: AsRef<[u8]> + ?Sized>(content: &T, year: i32) -> Marks {
    let mut marks = Marks::new();
    for (index, raw) in content.as_ref().split(|b| *b == b'\n').enumerate() {
        let line_no = index + 1;
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(_) => {
                let e = MalformedRecord {
                    line: line_no,
                    reason: "not valid UTF-8",
                };
                warn!("Skipping {}: {:?}", e, String::from_utf8_lossy(raw));
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match parse_record(line, line_no, year) {
            Ok((cell, shape)) => {
                marks.insert(cell, shape);
            }
            Err(e) => warn!("Skipping {}: {:?}", e, line),
        }
    }
    marks
}

/// Parse one `month,day[,shape]` record.
pub fn parse_record(
    line: &str,
    line_no: usize,
    year: i32,
) -> Result<(MonthDay, ShapeKind), MalformedRecord> {
    let malformed = |reason| MalformedRecord {
        line: line_no,
        reason,
    };

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 2 && fields.len() != 3 {
        return Err(malformed("expected 2 or 3 fields"));
    }

    let month: u32 = fields[0].parse().map_err(|_| malformed("month is not an integer"))?;
    let day: u32 = fields[1].parse().map_err(|_| malformed("day is not an integer"))?;
    let shape = match fields.get(2) {
        Some(code) => {
            let code: u8 = code.parse().map_err(|_| malformed("shape is not an integer"))?;
            ShapeKind::from_code(code).ok_or(malformed("unknown shape code"))?
        }
        None => ShapeKind::default(),
    };

    let cell = MonthDay::new(year, month, day).ok_or(malformed("date outside the year"))?;
    Ok((cell, shape))
}

/// Render marks in the three-field on-disk form, sorted by date.
pub fn format_marks(marks: &Marks) -> String {
    let mut out = String::with_capacity(marks.len() * 8);
    for (cell, shape) in marks {
        // Writing to a String cannot fail
        let _ = writeln!(out, "{},{},{}", cell.month, cell.day, shape.code());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, MarkStore) {
        let dir = TempDir::new().unwrap();
        let store = MarkStore::new(dir.path().join("CalendarDatabase"));
        (dir, store)
    }

    fn md(month: u32, day: u32) -> MonthDay {
        MonthDay { month, day }
    }

    #[test]
    fn test_missing_file_creates_empty_resource() {
        let (_dir, mut store) = store();
        let path = store.path_for(2024);
        assert!(!path.exists());

        let marks = store.load(2024).unwrap();
        assert!(marks.is_empty());
        assert!(path.exists(), "load should leave a valid file behind");
        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (_dir, mut store) = store();
        let mut marks = Marks::new();
        marks.insert(md(1, 1), ShapeKind::Circle);
        marks.insert(md(2, 29), ShapeKind::Triangle);
        marks.insert(md(12, 31), ShapeKind::Square);

        store.save(2024, &marks).unwrap();
        assert_eq!(store.load(2024).unwrap(), &marks);
    }

    #[test]
    fn test_two_field_records_get_default_shape() {
        let marks = parse_marks("3,15\n", 2024);
        assert_eq!(marks.get(&md(3, 15)), Some(&ShapeKind::Circle));
        assert_eq!(marks.len(), 1);
    }

    #[test]
    fn test_writer_emits_three_fields_sorted() {
        let (_dir, mut store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.path_for(2024), "5,2\n3,15,3\n").unwrap();

        store.load(2024).unwrap();
        store.toggle(2024, 1, 10, ShapeKind::Square).unwrap();

        let written = fs::read_to_string(store.path_for(2024)).unwrap();
        assert_eq!(written, "1,10,2\n3,15,3\n5,2,1\n");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "1,2,3,4\nabc,1\n2,x\n4,5,9\n2,30,1\n\n6,7,2\n";
        let marks = parse_marks(text, 2024);
        assert_eq!(marks.len(), 1);
        assert_eq!(marks.get(&md(6, 7)), Some(&ShapeKind::Square));
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let (_dir, mut store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.path_for(2024), b"3,15,1\n\xff\xfe,1\n4,1,2\r\n").unwrap();

        let marks = store.load(2024).unwrap();
        assert_eq!(marks.len(), 2);
        assert_eq!(marks.get(&md(3, 15)), Some(&ShapeKind::Circle));
        assert_eq!(marks.get(&md(4, 1)), Some(&ShapeKind::Square));

        // The year stays markable; the damaged line is dropped on the next write
        let marks = store.toggle(2024, 5, 5, ShapeKind::Triangle).unwrap();
        assert_eq!(marks.len(), 3);
        assert_eq!(
            fs::read_to_string(store.path_for(2024)).unwrap(),
            "3,15,1\n4,1,2\n5,5,3\n"
        );
    }

    #[test]
    fn test_parse_record_reports_reason() {
        let err = parse_record("1", 7, 2024).unwrap_err();
        assert_eq!(err.line, 7);
        assert_eq!(err.reason, "expected 2 or 3 fields");
    }

    #[test]
    fn test_toggle_is_shape_aware() {
        let (_dir, mut store) = store();
        store.load(2024).unwrap();

        let marks = store.toggle(2024, 3, 15, ShapeKind::Circle).unwrap();
        assert_eq!(marks.get(&md(3, 15)), Some(&ShapeKind::Circle));

        // A different shape replaces rather than clears
        let marks = store.toggle(2024, 3, 15, ShapeKind::Square).unwrap();
        assert_eq!(marks.get(&md(3, 15)), Some(&ShapeKind::Square));

        // Same shape clears
        let marks = store.toggle(2024, 3, 15, ShapeKind::Square).unwrap();
        assert!(marks.is_empty());
        assert_eq!(fs::read_to_string(store.path_for(2024)).unwrap(), "");
    }

    #[test]
    fn test_toggle_twice_restores_original() {
        let (_dir, mut store) = store();
        store.load(2023).unwrap();
        store.toggle(2023, 7, 4, ShapeKind::Triangle).unwrap();
        let before = store.marks().clone();

        store.toggle(2023, 8, 1, ShapeKind::Circle).unwrap();
        store.toggle(2023, 8, 1, ShapeKind::Circle).unwrap();
        assert_eq!(store.marks(), &before);
    }

    #[test]
    fn test_toggle_rejects_invalid_dates() {
        let (_dir, mut store) = store();
        for (month, day) in [(0, 1), (13, 1), (2, 30), (4, 31), (1, 0)] {
            let err = store.toggle(2024, month, day, ShapeKind::Circle).unwrap_err();
            assert!(matches!(err, StoreError::InvalidDate { .. }), "{month}/{day}");
        }
        // Feb 29 only exists in leap years
        assert!(store.toggle(2023, 2, 29, ShapeKind::Circle).is_err());
        assert!(store.toggle(2024, 2, 29, ShapeKind::Circle).is_ok());
    }

    #[test]
    fn test_save_rejects_invalid_entries() {
        let (_dir, store) = store();
        let mut marks = Marks::new();
        marks.insert(md(2, 29), ShapeKind::Circle);
        assert!(matches!(
            store.save(2023, &marks),
            Err(StoreError::InvalidDate { month: 2, day: 29, .. })
        ));
        assert!(!store.path_for(2023).exists());
    }

    #[test]
    fn test_load_replaces_cache() {
        let (_dir, mut store) = store();
        store.load(2024).unwrap();
        store.toggle(2024, 1, 1, ShapeKind::Circle).unwrap();

        store.load(2025).unwrap();
        assert_eq!(store.year(), Some(2025));
        assert!(store.marks().is_empty());

        store.load(2024).unwrap();
        assert_eq!(store.marks().len(), 1);
    }

    #[test]
    fn test_failed_write_leaves_cache_untouched() {
        let dir = TempDir::new().unwrap();
        // A regular file where the data directory should be makes every write fail
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let mut store = MarkStore::new(&blocker);

        assert!(matches!(
            store.toggle(2024, 1, 1, ShapeKind::Circle),
            Err(StoreError::Io(_))
        ));
        assert!(store.marks().is_empty());
    }
}
