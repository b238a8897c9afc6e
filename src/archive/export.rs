//! CSV rendering of a buffer
//!
//! Produces the `timestamp, value` files the import loader reads. Rows are
//! written in slot order, so a rendered buffer is a rotated-sorted series.
//! Unfilled slots are skipped.

use crate::archive::error::ArchiveResult;
use crate::archive::types::Sample;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Render filled slots as CSV lines
pub fn render_csv<T: Sample>(timeline: &[i64], values: &[Option<T>]) -> String {
    let mut out = String::new();
    for (ts, value) in timeline.iter().zip(values) {
        if let Some(v) = value {
            let _ = writeln!(out, "{}, {}", ts, v.render());
        }
    }
    out
}

/// Write the CSV rendering to `path`, returning the number of rows
pub fn write_csv<T: Sample>(
    path: impl AsRef<Path>,
    timeline: &[i64],
    values: &[Option<T>],
) -> ArchiveResult<usize> {
    let rendered = render_csv(timeline, values);
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_all(rendered.as_bytes())?;
    writer.flush()?;
    Ok(rendered.lines().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::cutoff::Cutoff;
    use crate::archive::loader::{import_str, ImportSeries};

    #[test]
    fn test_integer_rendering_skips_unfilled() {
        let csv = render_csv(&[100, 200, 300], &[Some(5i32), None, Some(-2)]);
        assert_eq!(csv, "100, 5\n300, -2\n");
    }

    #[test]
    fn test_real_rendering_uses_three_decimals() {
        let csv = render_csv(&[100, 200], &[Some(1.0f64), Some(2.34567)]);
        assert_eq!(csv, "100, 1.000\n200, 2.346\n");
    }

    #[test]
    fn test_rendering_is_importable() {
        let timeline = [9_700, 10_000, 8_800, 9_100, 9_400];
        let values = [Some(5), Some(6), None, Some(3), Some(4)];

        let series: ImportSeries<i32> =
            import_str(&render_csv(&timeline, &values), Cutoff::unbounded()).unwrap();
        assert_eq!(series.timestamps, vec![9_700, 10_000, 9_100, 9_400]);
        assert_eq!(series.values, vec![Some(5), Some(6), Some(3), Some(4)]);
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gas_quantity_days.csv");
        let rows = write_csv(&path, &[1, 2, 3], &[Some(1.5f64), None, Some(2.0)]).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1, 1.500\n3, 2.000\n");
    }
}
