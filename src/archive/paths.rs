//! File naming for archives and their CSV renderings

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::types::Device;
use std::path::{Path, PathBuf};

/// Display-name prefix of thermostat-class devices
pub const THERMOSTAT_PREFIX: &str = "thermstat";

/// Extension of metadata files
pub const METADATA_EXTENSION: &str = "dat";

/// `<dir>/<name>_<variable>_<interval>.csv`, or `<dir>/<name>_<interval>.csv`
/// for thermostat-class devices
pub fn csv_path(dir: &Path, device: &Device, index: usize) -> ArchiveResult<PathBuf> {
    let buffer = device.buffer_at(index)?;
    let name = device
        .name
        .as_deref()
        .ok_or_else(|| ArchiveError::UnnamedDevice(device.id.clone()))?;

    let file_name = if name.starts_with(THERMOSTAT_PREFIX) {
        format!("{}_{}.csv", name, buffer.interval)
    } else {
        format!("{}_{}_{}.csv", name, device.variable, buffer.interval)
    };
    Ok(dir.join(file_name))
}

/// `<dir>/<id>-<interval>.rra`
pub fn archive_path(dir: &Path, device: &Device, index: usize) -> ArchiveResult<PathBuf> {
    let buffer = device.buffer_at(index)?;
    Ok(dir.join(format!("{}-{}.rra", device.id, buffer.interval)))
}

/// `<dir>/<id>.dat`
pub fn metadata_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}.{}", id, METADATA_EXTENSION))
}

/// Whether `path` looks like a metadata file
pub fn is_metadata_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == METADATA_EXTENSION)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::types::{Buffer, SampleKind};

    fn device(name: Option<&str>) -> Device {
        let mut device = Device::new("eneco-001-1:ab", "quantity", "svc", SampleKind::Integer)
            .buffer(Buffer::new(SampleKind::Integer, "5min", 10, 0, 1000, 300))
            .buffer(Buffer::new(SampleKind::Integer, "hours", 10, 0, 3600, 3600));
        device.name = name.map(str::to_string);
        device
    }

    #[test]
    fn test_csv_path() {
        let dir = Path::new("/tmp/exports");
        let path = csv_path(dir, &device(Some("elec_quantity_nt")), 1).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/tmp/exports/elec_quantity_nt_quantity_hours.csv")
        );
    }

    #[test]
    fn test_thermostat_csv_path_omits_variable() {
        let dir = Path::new("/tmp/exports");
        let path = csv_path(dir, &device(Some("thermstat_setpoint")), 0).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/exports/thermstat_setpoint_5min.csv"));
    }

    #[test]
    fn test_archive_path() {
        let dir = Path::new("/qmf/var/hcb_rrd");
        let path = archive_path(dir, &device(None), 0).unwrap();
        assert_eq!(path, PathBuf::from("/qmf/var/hcb_rrd/eneco-001-1:ab-5min.rra"));
        assert_eq!(
            metadata_path(dir, "eneco-001-1:ab"),
            PathBuf::from("/qmf/var/hcb_rrd/eneco-001-1:ab.dat")
        );
        assert!(is_metadata_file(&metadata_path(dir, "x")));
        assert!(!is_metadata_file(Path::new("x-5min.rra")));
    }

    #[test]
    fn test_index_out_of_range() {
        let dir = Path::new("/tmp");
        let dev = device(Some("gas"));
        assert!(matches!(
            csv_path(dir, &dev, 2),
            Err(ArchiveError::IndexOutOfRange { index: 2, count: 2 })
        ));
        assert!(matches!(
            archive_path(dir, &dev, 5),
            Err(ArchiveError::IndexOutOfRange { index: 5, count: 2 })
        ));
    }

    #[test]
    fn test_unnamed_device() {
        assert!(matches!(
            csv_path(Path::new("/tmp"), &device(None), 0),
            Err(ArchiveError::UnnamedDevice(_))
        ));
    }
}
