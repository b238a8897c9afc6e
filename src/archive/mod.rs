//! Round-robin archive layer
//!
//! This module provides the archive handling the transfer is built on:
//!
//! - **types**: Core data structures (Device, Buffer, Sample)
//! - **metadata**: Binary `.dat` codec
//! - **timeline**: Slot timestamps of a circular buffer
//! - **loader**: Payload and import file loading, payload persistence
//! - **merge**: Pivoted search and temporal merge
//! - **paths**: File naming
//! - **cutoff**: Operator cutoff date
//! - **export**: CSV rendering of a buffer
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Merge Path:
//!   .dat → Device + Buffers → per Buffer:
//!     timeline ─┐
//!     .rra ─────┼→ merge → .rra
//!     .csv ─────┘ (cutoff)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use rrd_transfer::archive::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let decoded = read_metadata("/qmf/var/hcb_rrd/device.dat")?;
//!     let device = decoded.device;
//!     let buffer = device.buffer_at(0)?;
//!
//!     let timeline = buffer.timeline();
//!     let destination: Vec<Option<i32>> =
//!         read_archive_values("/qmf/var/hcb_rrd/device-5min.rra", buffer.n_samples)?;
//!     let import = load_import("/tmp/exports/gas_quantity_5min.csv", Cutoff::from_date_str("2019-03-09")?)?;
//!
//!     let outcome = merge(buffer, &timeline, &destination, &import)?;
//!     write_archive_values("/qmf/var/hcb_rrd/device-5min.rra", &outcome.values)?;
//!     Ok(())
//! }
//! ```

pub mod cutoff;
pub mod error;
pub mod export;
pub mod loader;
pub mod merge;
pub mod metadata;
pub mod paths;
pub mod timeline;
pub mod types;

// Re-export commonly used types
pub use cutoff::Cutoff;
pub use error::{ArchiveError, ArchiveResult};
pub use export::{render_csv, write_csv};
pub use loader::{
    encode_values, import_str, load_import, parse_import, read_archive_values, read_values_from,
    write_archive_values, ImportSeries,
};
pub use merge::{merge, search_rotated, MergeOutcome};
pub use metadata::{
    decode_from, decode_metadata, encode_metadata, read_metadata, write_metadata,
    DecodedMetadata, MAGIC, MAX_SAMPLES,
};
pub use paths::{archive_path, csv_path, is_metadata_file, metadata_path};
pub use timeline::{chronological_slots, reconstruct};
pub use types::{Buffer, BufferHeader, Device, Sample, SampleKind, MAX_BUFFERS, PLACEHOLDER_ID};
