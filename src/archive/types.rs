//! Core data types for round-robin archives
//!
//! This module defines the fundamental types used throughout the archive layer:
//! - `Device`: identity of one logged quantity, owner of its buffers
//! - `Buffer`: one circular, fixed-capacity store at a single granularity
//! - `SampleKind` and `Sample`: the two payload element types

use serde::Serialize;

/// Device id used by archives that were never provisioned
pub const PLACEHOLDER_ID: &str = "placeholder";

/// Maximum number of buffers one metadata file describes
pub const MAX_BUFFERS: usize = 4;

/// Sample type tag that selects integer payloads
pub const INTEGER_TAG: &str = "integer";

/// Sample type tag written for real payloads
pub const REAL_TAG: &str = "double";

/// Element type shared by every buffer of a device
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// Signed 32-bit integers, 4 bytes per slot
    Integer,
    /// 64-bit floats, 8 bytes per slot
    Real,
}

impl SampleKind {
    /// Interpret a sample type tag: `"integer"` or anything else
    pub fn from_tag(tag: &str) -> Self {
        if tag == INTEGER_TAG {
            SampleKind::Integer
        } else {
            SampleKind::Real
        }
    }

    /// Bytes per slot in the payload file
    pub fn width(&self) -> usize {
        match self {
            SampleKind::Integer => i32::WIDTH,
            SampleKind::Real => f64::WIDTH,
        }
    }
}

impl std::fmt::Display for SampleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleKind::Integer => write!(f, "integer"),
            SampleKind::Real => write!(f, "real"),
        }
    }
}

/// A payload element.
///
/// In memory an unfilled slot is `None`. The on-disk sentinel only appears
/// in [`Sample::decode`] and [`Sample::encode`].
pub trait Sample: Copy + PartialEq + std::fmt::Debug {
    /// Bytes per element
    const WIDTH: usize;
    /// Kind this element type belongs to
    const KIND: SampleKind;

    /// Read one little-endian element, `None` if `bytes` has the wrong size
    fn from_le_slice(bytes: &[u8]) -> Option<Self>;

    /// Append the little-endian encoding
    fn write_le(self, out: &mut Vec<u8>);

    /// Raw value marking an unfilled slot
    fn sentinel() -> Self;

    /// Whether a raw value marks an unfilled slot
    fn is_sentinel(self) -> bool;

    /// Parse a CSV value field
    fn parse_field(field: &str) -> Option<Self>;

    /// Render for CSV output
    fn render(self) -> String;

    /// Raw value to slot value
    fn decode(raw: Self) -> Option<Self> {
        if raw.is_sentinel() {
            None
        } else {
            Some(raw)
        }
    }

    /// Slot value to raw value
    fn encode(value: Option<Self>) -> Self {
        value.unwrap_or_else(Self::sentinel)
    }
}

impl Sample for i32 {
    const WIDTH: usize = 4;
    const KIND: SampleKind = SampleKind::Integer;

    fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(i32::from_le_bytes)
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn sentinel() -> Self {
        0x7fff_ffff
    }

    fn is_sentinel(self) -> bool {
        self == 0x7fff_ffff
    }

    fn parse_field(field: &str) -> Option<Self> {
        field.trim().parse().ok()
    }

    fn render(self) -> String {
        self.to_string()
    }
}

impl Sample for f64 {
    const WIDTH: usize = 8;
    const KIND: SampleKind = SampleKind::Real;

    fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(f64::from_le_bytes)
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn sentinel() -> Self {
        f64::NAN
    }

    fn is_sentinel(self) -> bool {
        self.is_nan()
    }

    fn parse_field(field: &str) -> Option<Self> {
        field.trim().parse().ok()
    }

    fn render(self) -> String {
        format!("{:.3}", self)
    }
}

/// Kind-specific leading fields of a buffer record.
///
/// Neither variant is interpreted; both are kept so a record re-encodes
/// byte for byte.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BufferHeader {
    Integer { reserved: [i32; 3] },
    Real { value: f64, divider: f64 },
}

impl BufferHeader {
    /// Zeroed header for the given kind
    pub fn empty(kind: SampleKind) -> Self {
        match kind {
            SampleKind::Integer => BufferHeader::Integer { reserved: [0; 3] },
            SampleKind::Real => BufferHeader::Real {
                value: 0.0,
                divider: 0.0,
            },
        }
    }

    pub fn kind(&self) -> SampleKind {
        match self {
            BufferHeader::Integer { .. } => SampleKind::Integer,
            BufferHeader::Real { .. } => SampleKind::Real,
        }
    }
}

/// One retention granularity of a device (e.g. 5min, hours, days, months)
///
/// Slot `file_offset` holds the newest sample, stamped `timestamp_1`.
/// Walking backwards from it, timestamps drop by `timestamp_1 - timestamp_0`
/// per slot and wrap from slot 0 to slot `n_samples - 1`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Buffer {
    pub header: BufferHeader,
    pub timestamp_0: i32,
    pub timestamp_1: i32,
    pub min_samples_per_bin: i32,
    pub bin_length: String,
    pub file_offset: usize,
    pub n_samples: usize,
    pub reserved: i32,
    /// Granularity name, used in file names
    pub interval: String,
    /// Aggregation function name, carried but never evaluated
    pub consolidator: String,
}

impl Buffer {
    /// Create a buffer whose newest slot is `file_offset`, stamped `newest`
    pub fn new(
        kind: SampleKind,
        interval: impl Into<String>,
        n_samples: usize,
        file_offset: usize,
        newest: i32,
        step: i32,
    ) -> Self {
        Self {
            header: BufferHeader::empty(kind),
            timestamp_0: newest - step,
            timestamp_1: newest,
            min_samples_per_bin: 1,
            bin_length: String::new(),
            file_offset,
            n_samples,
            reserved: 0,
            interval: interval.into(),
            consolidator: "average".to_string(),
        }
    }

    /// Builder method: set the consolidator name
    pub fn consolidator(mut self, consolidator: impl Into<String>) -> Self {
        self.consolidator = consolidator.into();
        self
    }

    /// Seconds between two chronologically adjacent slots
    pub fn step(&self) -> i64 {
        i64::from(self.timestamp_1) - i64::from(self.timestamp_0)
    }

    /// Slot holding the newest sample
    pub fn newest_slot(&self) -> usize {
        self.file_offset
    }

    /// Slot holding the oldest sample
    pub fn oldest_slot(&self) -> usize {
        if self.n_samples == 0 {
            0
        } else {
            (self.file_offset + 1) % self.n_samples
        }
    }

    /// `(oldest, newest)` timestamps covered by the buffer
    pub fn window(&self) -> Option<(i64, i64)> {
        if self.n_samples == 0 {
            return None;
        }
        let newest = i64::from(self.timestamp_1);
        let oldest = newest - self.step() * (self.n_samples as i64 - 1);
        Some((oldest, newest))
    }

    /// Absolute timestamp of every slot
    pub fn timeline(&self) -> Vec<i64> {
        crate::archive::timeline::reconstruct(self)
    }

    /// Bytes the payload file occupies
    pub fn payload_len(&self) -> usize {
        self.n_samples * self.header.kind().width()
    }
}

/// A logged quantity and its buffers, as described by one metadata file
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Device {
    /// Unique device id, also the stem of every archive file name
    pub id: String,
    /// Display name from the logger configuration, resolved separately
    pub name: Option<String>,
    pub variable: String,
    pub service: String,
    /// Raw sample type tag as stored in the metadata file
    pub sample_type: String,
    pub kind: SampleKind,
    pub buffers: Vec<Buffer>,
}

impl Device {
    /// Create a device without buffers
    pub fn new(
        id: impl Into<String>,
        variable: impl Into<String>,
        service: impl Into<String>,
        kind: SampleKind,
    ) -> Self {
        let sample_type = match kind {
            SampleKind::Integer => INTEGER_TAG,
            SampleKind::Real => REAL_TAG,
        };
        Self {
            id: id.into(),
            name: None,
            variable: variable.into(),
            service: service.into(),
            sample_type: sample_type.to_string(),
            kind,
            buffers: Vec::with_capacity(MAX_BUFFERS),
        }
    }

    /// Builder method: add a buffer
    pub fn buffer(mut self, buffer: Buffer) -> Self {
        self.buffers.push(buffer);
        self
    }

    /// Builder method: set the display name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Archive never provisioned by the source system
    pub fn is_placeholder(&self) -> bool {
        self.id == PLACEHOLDER_ID
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Buffer by index, failing outside `0..buffer_count`
    pub fn buffer_at(&self, index: usize) -> crate::archive::ArchiveResult<&Buffer> {
        self.buffers
            .get(index)
            .ok_or(crate::archive::ArchiveError::IndexOutOfRange {
                index,
                count: self.buffers.len(),
            })
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) var={} svc={} kind={} buffers={}",
            self.id,
            self.name.as_deref().unwrap_or("unnamed"),
            self.variable,
            self.service,
            self.kind,
            self.buffers.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(SampleKind::from_tag("integer"), SampleKind::Integer);
        assert_eq!(SampleKind::from_tag("double"), SampleKind::Real);
        assert_eq!(SampleKind::from_tag(""), SampleKind::Real);
        assert_eq!(SampleKind::Integer.width(), 4);
        assert_eq!(SampleKind::Real.width(), 8);
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(i32::decode(0x7fffffff), None);
        assert_eq!(i32::decode(42), Some(42));
        assert_eq!(i32::encode(None), 0x7fffffff);

        assert_eq!(f64::decode(f64::NAN), None);
        assert_eq!(f64::decode(1.5), Some(1.5));
        assert!(f64::encode(None).is_nan());
    }

    #[test]
    fn test_render() {
        assert_eq!(12i32.render(), "12");
        assert_eq!(1.23456f64.render(), "1.235");
        assert_eq!(f64::parse_field(" 2.5"), Some(2.5));
        assert_eq!(i32::parse_field("x"), None);
    }

    #[test]
    fn test_buffer_window() {
        let buffer = Buffer::new(SampleKind::Integer, "5min", 4, 3, 400, 100);
        assert_eq!(buffer.step(), 100);
        assert_eq!(buffer.oldest_slot(), 0);
        assert_eq!(buffer.window(), Some((100, 400)));
        assert_eq!(buffer.payload_len(), 16);

        let empty = Buffer::new(SampleKind::Real, "days", 0, 0, 400, 100);
        assert_eq!(empty.window(), None);
    }

    #[test]
    fn test_buffer_at() {
        let device = Device::new("abc", "quantity", "svc", SampleKind::Integer)
            .buffer(Buffer::new(SampleKind::Integer, "hours", 2, 0, 3600, 3600));
        assert!(device.buffer_at(0).is_ok());
        assert!(matches!(
            device.buffer_at(1),
            Err(crate::archive::ArchiveError::IndexOutOfRange { index: 1, count: 1 })
        ));
    }
}
