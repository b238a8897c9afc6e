//! # rrd-transfer
//!
//! Carries logged sensor history from a retired device into the round-robin
//! archives of its replacement.
//!
//! ## Features
//!
//! - **Metadata codec**: binary `.dat` files describing a device and its buffers
//! - **Timeline reconstruction**: absolute timestamps for every circular slot
//! - **Temporal merge**: imported samples land on the slot with the same timestamp
//! - **Export**: archives rendered as CSV files the importer reads back
//!
//! ## Modules
//!
//! - [`archive`]: Archive formats, timeline and merge
//! - [`names`]: Device display names from the logger configuration
//! - [`transfer`]: Batch orchestration over an archive directory
//! - [`config`]: File and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rrd_transfer::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let names = DeviceNames::from_xml_path("/HCBv2/config/config_hcb_rrd.xml".as_ref())?;
//!     let config = TransferConfig::new("/qmf/var/hcb_rrd", "/tmp/exports")
//!         .cutoff(Cutoff::from_date_str("2019-03-09")?);
//!
//!     let report = TransferEngine::new(config, names).inject()?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod names;
pub mod transfer;

// Re-export top-level types for convenience
pub use archive::{ArchiveError, ArchiveResult, Buffer, Cutoff, Device, SampleKind};

pub use config::{Config, ConfigError, LoggingConfig, TransferSettings};

pub use names::DeviceNames;

pub use transfer::{
    BufferOutcome, BufferReport, DeviceReport, TransferConfig, TransferEngine, TransferReport,
};
