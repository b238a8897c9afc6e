//! Transfer Engine
//!
//! Orchestrates the archive components over a directory of devices:
//! - Inject path: .dat → Device → per Buffer: timeline + .rra + .csv → merge → .rra
//! - Export path: .dat → Device → per Buffer: timeline + .rra → .csv
//!
//! Failures are isolated: a device whose metadata cannot be decoded is
//! skipped, a buffer whose files are missing or inconsistent is reported
//! and the next buffer is processed.

use crate::archive::{
    archive_path, csv_path, is_metadata_file, load_import, merge, read_archive_values,
    read_metadata, write_archive_values, write_csv, ArchiveResult, Cutoff, DecodedMetadata,
    Device, Sample, SampleKind,
};
use crate::names::DeviceNames;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Configuration for a transfer run
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Directory with the destination `.dat` and `.rra` files
    pub archive_dir: PathBuf,
    /// Directory with the CSV files to import
    pub import_dir: PathBuf,
    /// Newest timestamp admitted from imports
    pub cutoff: Cutoff,
    /// Compute merges without persisting them
    pub dry_run: bool,
}

impl TransferConfig {
    pub fn new(archive_dir: impl Into<PathBuf>, import_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            import_dir: import_dir.into(),
            cutoff: Cutoff::unbounded(),
            dry_run: false,
        }
    }

    /// Builder method: set the cutoff
    pub fn cutoff(mut self, cutoff: Cutoff) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Builder method: enable or disable dry runs
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What happened to one buffer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BufferOutcome {
    /// Import merged; `replaced` slots took an imported value
    Merged { replaced: usize, imported: usize },
    /// Buffer rendered as CSV
    Exported { rows: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferReport {
    pub index: usize,
    pub interval: String,
    pub outcome: BufferOutcome,
}

/// Result of processing one metadata file
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub source: PathBuf,
    pub id: Option<String>,
    pub name: Option<String>,
    /// Why the whole device was left alone
    pub skipped: Option<String>,
    /// Dropped trailing buffer record, if the metadata was partially corrupt
    pub corruption: Option<String>,
    pub buffers: Vec<BufferReport>,
}

impl DeviceReport {
    fn skipped(source: &Path, device: Option<&Device>, reason: impl Into<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            id: device.map(|d| d.id.clone()),
            name: device.and_then(|d| d.name.clone()),
            skipped: Some(reason.into()),
            corruption: None,
            buffers: Vec::new(),
        }
    }

    pub fn failed_buffers(&self) -> usize {
        self.buffers
            .iter()
            .filter(|b| matches!(b.outcome, BufferOutcome::Failed { .. }))
            .count()
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferReport {
    pub devices: Vec<DeviceReport>,
}

impl TransferReport {
    /// Devices whose buffers were processed
    pub fn processed_devices(&self) -> usize {
        self.devices.iter().filter(|d| d.skipped.is_none()).count()
    }

    pub fn skipped_devices(&self) -> usize {
        self.devices.len() - self.processed_devices()
    }

    pub fn failed_buffers(&self) -> usize {
        self.devices.iter().map(DeviceReport::failed_buffers).sum()
    }

    /// Slots that took an imported value
    pub fn replaced_slots(&self) -> usize {
        self.buffers()
            .map(|b| match b.outcome {
                BufferOutcome::Merged { replaced, .. } => replaced,
                _ => 0,
            })
            .sum()
    }

    fn buffers(&self) -> impl Iterator<Item = &BufferReport> {
        self.devices.iter().flat_map(|d| d.buffers.iter())
    }
}

impl std::fmt::Display for TransferReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for device in &self.devices {
            let label = device.id.as_deref().unwrap_or("?");
            if let Some(reason) = &device.skipped {
                writeln!(f, "{}: skipped ({})", label, reason)?;
                continue;
            }
            writeln!(
                f,
                "{} ({})",
                label,
                device.name.as_deref().unwrap_or("unnamed")
            )?;
            for buffer in &device.buffers {
                match &buffer.outcome {
                    BufferOutcome::Merged { replaced, imported } => writeln!(
                        f,
                        "  {}: {} of {} imported rows merged",
                        buffer.interval, replaced, imported
                    )?,
                    BufferOutcome::Exported { rows } => {
                        writeln!(f, "  {}: {} rows exported", buffer.interval, rows)?
                    }
                    BufferOutcome::Failed { reason } => {
                        writeln!(f, "  {}: failed: {}", buffer.interval, reason)?
                    }
                }
            }
        }
        write!(
            f,
            "{} devices processed, {} skipped, {} buffers failed, {} slots replaced",
            self.processed_devices(),
            self.skipped_devices(),
            self.failed_buffers(),
            self.replaced_slots()
        )
    }
}

#[derive(Clone, Copy)]
enum Mode<'a> {
    Inject,
    Export(&'a Path),
}

/// The batch orchestrator
pub struct TransferEngine {
    config: TransferConfig,
    names: DeviceNames,
}

impl TransferEngine {
    pub fn new(config: TransferConfig, names: DeviceNames) -> Self {
        Self { config, names }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Merge every import file into its destination buffer
    pub fn inject(&self) -> ArchiveResult<TransferReport> {
        tracing::info!(
            "Injecting {:?} into {:?} (cutoff {}, dry run: {})",
            self.config.import_dir,
            self.config.archive_dir,
            self.config.cutoff,
            self.config.dry_run
        );
        self.run(Mode::Inject)
    }

    /// Render every buffer as an importable CSV file in `out_dir`
    pub fn export(&self, out_dir: &Path) -> ArchiveResult<TransferReport> {
        std::fs::create_dir_all(out_dir)?;
        tracing::info!("Exporting {:?} to {:?}", self.config.archive_dir, out_dir);
        self.run(Mode::Export(out_dir))
    }

    /// Decode one metadata file and resolve its display name
    pub fn inspect(&self, path: &Path) -> ArchiveResult<DecodedMetadata> {
        let mut decoded = read_metadata(path)?;
        decoded.device.name = self.names.resolve(&decoded.device.id).map(str::to_string);
        Ok(decoded)
    }

    /// Metadata files of the archive directory, sorted by name
    pub fn metadata_files(&self) -> ArchiveResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.config.archive_dir)? {
            let path = entry?.path();
            if path.is_file() && is_metadata_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn run(&self, mode: Mode<'_>) -> ArchiveResult<TransferReport> {
        let mut report = TransferReport::default();
        for path in self.metadata_files()? {
            report.devices.push(self.process_device(&path, mode));
        }

        tracing::info!(
            "Processed {} devices ({} skipped, {} buffers failed)",
            report.processed_devices(),
            report.skipped_devices(),
            report.failed_buffers()
        );
        Ok(report)
    }

    fn process_device(&self, path: &Path, mode: Mode<'_>) -> DeviceReport {
        let decoded = match self.inspect(path) {
            Ok(d) => d,
            Err(e) => {
                let reason = if e.is_recoverable() {
                    format!("unreadable: {}", e)
                } else {
                    format!("corrupt metadata: {}", e)
                };
                tracing::warn!("Skipping {:?}, {}", path, reason);
                return DeviceReport::skipped(path, None, reason);
            }
        };
        let device = decoded.device;

        if device.is_placeholder() {
            tracing::debug!("Skipping placeholder archive {:?}", path);
            return DeviceReport::skipped(path, Some(&device), "placeholder");
        }
        if device.name.is_none() {
            tracing::warn!("No display name for device {}, skipping", device.id);
            return DeviceReport::skipped(path, Some(&device), "no display name");
        }

        let corruption = decoded.corruption.map(|e| {
            tracing::debug!("{:?}: {}, continuing with earlier buffers", path, e);
            e.to_string()
        });

        tracing::info!("Processing {}", device);

        let buffers = (0..device.buffer_count())
            .map(|index| {
                let interval = device.buffers[index].interval.clone();
                let result = match device.kind {
                    SampleKind::Integer => self.process_buffer::<i32>(&device, index, mode),
                    SampleKind::Real => self.process_buffer::<f64>(&device, index, mode),
                };
                let outcome = result.unwrap_or_else(|e| {
                    tracing::warn!("{} {}: {}", device.id, interval, e);
                    BufferOutcome::Failed {
                        reason: e.to_string(),
                    }
                });
                BufferReport {
                    index,
                    interval,
                    outcome,
                }
            })
            .collect();

        DeviceReport {
            source: path.to_path_buf(),
            id: Some(device.id.clone()),
            name: device.name.clone(),
            skipped: None,
            corruption,
            buffers,
        }
    }

    fn process_buffer<T: Sample>(
        &self,
        device: &Device,
        index: usize,
        mode: Mode<'_>,
    ) -> ArchiveResult<BufferOutcome> {
        let buffer = device.buffer_at(index)?;
        let rra = archive_path(&self.config.archive_dir, device, index)?;
        let destination = read_archive_values::<T>(&rra, buffer.n_samples)?;
        let timeline = buffer.timeline();

        match mode {
            Mode::Inject => {
                let csv = csv_path(&self.config.import_dir, device, index)?;
                let import = load_import::<T>(&csv, self.config.cutoff)?;
                if import.rows_failed > 0 {
                    tracing::warn!(
                        "{:?}: {} unparsable rows ({})",
                        csv,
                        import.rows_failed,
                        import.errors.join("; ")
                    );
                }

                let outcome = merge(buffer, &timeline, &destination, &import)?;
                if !self.config.dry_run {
                    write_archive_values(&rra, &outcome.values)?;
                }
                tracing::info!(
                    "  {}: {} of {} rows merged into {:?}",
                    buffer.interval,
                    outcome.replaced,
                    import.len(),
                    rra
                );

                Ok(BufferOutcome::Merged {
                    replaced: outcome.replaced,
                    imported: import.len(),
                })
            }
            Mode::Export(out_dir) => {
                let csv = csv_path(out_dir, device, index)?;
                let rows = write_csv(&csv, &timeline, &destination)?;
                tracing::info!("  {}: {} rows written to {:?}", buffer.interval, rows, csv);
                Ok(BufferOutcome::Exported { rows })
            }
        }
    }
}
