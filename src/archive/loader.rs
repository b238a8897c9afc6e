//! Sample loading and persistence
//!
//! Two sources feed a merge:
//! - the destination payload file (`.rra`): `n_samples` raw little-endian
//!   elements in slot order, no header
//! - the import file (`.csv`): `timestamp,value` rows exported from the old
//!   device, filtered by the operator's cutoff

use crate::archive::cutoff::Cutoff;
use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::types::Sample;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Parse errors kept per import before summarising the rest
const MAX_REPORTED_ERRORS: usize = 100;

/// Rows of an import file that survived the cutoff, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSeries<T> {
    pub timestamps: Vec<i64>,
    pub values: Vec<Option<T>>,
    /// Data rows seen
    pub rows_read: usize,
    /// Rows dropped because they are newer than the cutoff
    pub rows_excluded: usize,
    /// Rows that could not be parsed
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

impl<T> ImportSeries<T> {
    /// Series built directly from parallel arrays
    pub fn from_parts(timestamps: Vec<i64>, values: Vec<Option<T>>) -> Self {
        let rows_read = timestamps.len();
        Self {
            timestamps,
            values,
            rows_read,
            rows_excluded: 0,
            rows_failed: 0,
            errors: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Read a payload file holding `n_samples` elements.
///
/// A file too small for `n_samples` elements is a `CapacityMismatch`,
/// detected before any sample memory is allocated.
pub fn read_archive_values<T: Sample>(
    path: impl AsRef<Path>,
    n_samples: usize,
) -> ArchiveResult<Vec<Option<T>>> {
    let file = File::open(path.as_ref())?;
    let available = file.metadata()?.len();
    let fits = n_samples
        .checked_mul(T::WIDTH)
        .and_then(|needed| u64::try_from(needed).ok())
        .map(|needed| needed <= available)
        .unwrap_or(false);
    if !fits {
        return Err(ArchiveError::CapacityMismatch {
            expected: n_samples,
            found: usize::try_from(available / T::WIDTH as u64).unwrap_or(usize::MAX),
        });
    }
    read_values_from(BufReader::new(file), n_samples)
}

/// Read `n_samples` elements from any byte source.
///
/// A source shorter than `n_samples * T::WIDTH` bytes fails with an
/// `UnexpectedEof` I/O error; bytes beyond that are ignored.
pub fn read_values_from<T: Sample, R: Read>(
    reader: R,
    n_samples: usize,
) -> ArchiveResult<Vec<Option<T>>> {
    let needed = n_samples
        .checked_mul(T::WIDTH)
        .ok_or(ArchiveError::InvalidLength {
            field: "sample count",
            length: i64::try_from(n_samples).unwrap_or(i64::MAX),
        })?;

    // Grows with the data actually read
    let mut raw = Vec::new();
    reader.take(needed as u64).read_to_end(&mut raw)?;
    if raw.len() < needed {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("payload holds {} of {} bytes", raw.len(), needed),
        )
        .into());
    }

    Ok(raw
        .chunks_exact(T::WIDTH)
        .filter_map(T::from_le_slice)
        .map(T::decode)
        .collect())
}

/// Encode slot values into payload bytes
pub fn encode_values<T: Sample>(values: &[Option<T>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::WIDTH);
    for value in values {
        T::encode(*value).write_le(&mut out);
    }
    out
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replace a payload file with `values`.
///
/// The bytes go to a sibling staging file first and are renamed over the
/// destination only after they reached the disk.
pub fn write_archive_values<T: Sample>(
    path: impl AsRef<Path>,
    values: &[Option<T>],
) -> ArchiveResult<()> {
    let path = path.as_ref();
    let staging = staging_path(path);

    let result = write_staging(&staging, &encode_values(values))
        .and_then(|()| std::fs::rename(&staging, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&staging);
        return Err(e.into());
    }
    Ok(())
}

fn write_staging(staging: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(staging)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

/// Load an import file, keeping rows the cutoff admits
pub fn load_import<T: Sample>(
    path: impl AsRef<Path>,
    cutoff: Cutoff,
) -> ArchiveResult<ImportSeries<T>> {
    let file = File::open(path.as_ref())?;
    parse_import(BufReader::new(file), cutoff)
}

/// Load import rows from a string (useful for testing)
pub fn import_str<T: Sample>(data: &str, cutoff: Cutoff) -> ArchiveResult<ImportSeries<T>> {
    parse_import(data.as_bytes(), cutoff)
}

/// Parse `timestamp,value` rows from any reader
pub fn parse_import<T: Sample, R: Read>(
    reader: R,
    cutoff: Cutoff,
) -> ArchiveResult<ImportSeries<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut series = ImportSeries::from_parts(Vec::new(), Vec::new());

    for (line_num, result) in reader.records().enumerate() {
        let line = line_num + 1;

        let record = match result {
            Ok(r) => r,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                series.errors.push(format!("Line {}: {}", line, e));
                series.rows_failed += 1;
                continue;
            }
        };

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        series.rows_read += 1;

        let timestamp = match record.get(0).and_then(|s| s.parse::<i64>().ok()) {
            Some(ts) => ts,
            None => {
                series
                    .errors
                    .push(format!("Line {}: invalid timestamp {:?}", line, record.get(0)));
                series.rows_failed += 1;
                continue;
            }
        };

        let value = match record.get(1).and_then(T::parse_field) {
            Some(v) => v,
            None => {
                series
                    .errors
                    .push(format!("Line {}: invalid value {:?}", line, record.get(1)));
                series.rows_failed += 1;
                continue;
            }
        };

        if !cutoff.admits(timestamp) {
            series.rows_excluded += 1;
            continue;
        }

        series.timestamps.push(timestamp);
        series.values.push(T::decode(value));
    }

    // Truncate errors if too many
    if series.errors.len() > MAX_REPORTED_ERRORS {
        let total = series.errors.len();
        series.errors.truncate(MAX_REPORTED_ERRORS);
        series
            .errors
            .push(format!("... and {} more errors", total - MAX_REPORTED_ERRORS));
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device gone"))
        }
    }

    #[test]
    fn test_cutoff_filter() {
        let data = "100,1\n200,2\n300,3\n";
        let series: ImportSeries<i32> = import_str(data, Cutoff::at(250)).unwrap();

        assert_eq!(series.timestamps, vec![100, 200]);
        assert_eq!(series.values, vec![Some(1), Some(2)]);
        assert_eq!(series.rows_read, 3);
        assert_eq!(series.rows_excluded, 1);
        assert_eq!(series.rows_failed, 0);
    }

    #[test]
    fn test_file_order_is_kept() {
        let data = "300, 3.5\n100, 1.25\n200, 2.0\n";
        let series: ImportSeries<f64> = import_str(data, Cutoff::unbounded()).unwrap();

        assert_eq!(series.timestamps, vec![300, 100, 200]);
        assert_eq!(series.values, vec![Some(3.5), Some(1.25), Some(2.0)]);
    }

    #[test]
    fn test_bad_rows_are_counted() {
        let data = "100,1\nabc,2\n300\n\n400,x\n500,5\n";
        let series: ImportSeries<i32> = import_str(data, Cutoff::unbounded()).unwrap();

        assert_eq!(series.timestamps, vec![100, 500]);
        assert_eq!(series.rows_failed, 3);
        assert_eq!(series.errors.len(), 3);
        assert!(series.errors[0].starts_with("Line 2"));
    }

    #[test]
    fn test_sentinel_rows_stay_unfilled() {
        let data = "100,2147483647\n200,7\n";
        let series: ImportSeries<i32> = import_str(data, Cutoff::unbounded()).unwrap();
        assert_eq!(series.values, vec![None, Some(7)]);
    }

    #[test]
    fn test_missing_import_is_io_error() {
        let dir = tempdir().unwrap();
        let result = load_import::<i32>(dir.path().join("missing.csv"), Cutoff::unbounded());
        assert!(matches!(result, Err(ArchiveError::Io(_))));
    }

    #[test]
    fn test_payload_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("device-5min.rra");

        let values = vec![Some(1.5), None, Some(-3.25), Some(0.0)];
        write_archive_values(&path, &values).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32);
        assert!(!staging_path(&path).exists());

        let loaded: Vec<Option<f64>> = read_archive_values(&path, 4).unwrap();
        assert_eq!(loaded, values);
    }

    #[test]
    fn test_integer_payload_layout() {
        let bytes = encode_values(&[Some(1i32), None]);
        assert_eq!(bytes, vec![1, 0, 0, 0, 0xff, 0xff, 0xff, 0x7f]);

        let loaded: Vec<Option<i32>> = read_values_from(&bytes[..], 2).unwrap();
        assert_eq!(loaded, vec![Some(1), None]);
    }

    #[test]
    fn test_short_payload_fails() {
        let bytes = encode_values(&[Some(1i32), Some(2)]);
        let result = read_values_from::<i32, _>(&bytes[..], 3);
        assert!(matches!(result, Err(ArchiveError::Io(_))));

        let dir = tempdir().unwrap();
        let result = read_archive_values::<i32>(dir.path().join("absent.rra"), 3);
        assert!(matches!(result, Err(ArchiveError::Io(_))));
    }

    #[test]
    fn test_payload_smaller_than_capacity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("device-5min.rra");
        write_archive_values(&path, &[Some(1i32), Some(2), Some(3), Some(4)]).unwrap();

        let result = read_archive_values::<i32>(&path, i32::MAX as usize);
        assert!(matches!(
            result,
            Err(ArchiveError::CapacityMismatch {
                expected: 2147483647,
                found: 4
            })
        ));

        let result = read_values_from::<f64, _>(&[0u8; 16][..], usize::MAX);
        assert!(matches!(result, Err(ArchiveError::InvalidLength { .. })));
    }

    #[test]
    fn test_failed_persist_leaves_no_staging_file() {
        let dir = tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file
        let path = dir.path().join("device-5min.rra");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();

        assert!(write_archive_values(&path, &[Some(1i32)]).is_err());
        assert!(!staging_path(&path).exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn test_import_read_failure_is_fatal() {
        let result = parse_import::<i32, _>(FailingReader, Cutoff::unbounded());
        assert!(matches!(result, Err(ArchiveError::Csv(_))));
    }
}
