//! Archive metadata (`.dat`) codec
//!
//! Every device keeps one metadata file next to its payload files. It names
//! the device and describes up to four circular buffers.
//!
//! Layout (all integers little-endian i32, strings are an i32 length followed
//! by that many raw bytes, no terminator):
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ magic: [u8; 17] = "hcb_rrd_09082011A"   │
//! │ device id: string                       │
//! │ variable: string                        │
//! │ service: string                         │
//! │ sample type: string ("integer" | ...)   │
//! ├─────────────────────────────────────────┤
//! │ BUFFER (0..=4 times, absent when the    │
//! │ device id is "placeholder")             │
//! │   integer: reserved: [i32; 3]           │
//! │   real:    value: f64, divider: f64     │
//! │   timestamp_0: i32                      │
//! │   timestamp_1: i32                      │
//! │   min_samples_per_bin: i32              │
//! │   bin_length: string                    │
//! │   file_offset: i32                      │
//! │   n_samples: i32                        │
//! │   reserved: i32                         │
//! │   interval: string                      │
//! │   consolidator: string                  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Files rewritten by the device firmware sometimes end in a partial buffer
//! record. Decoding keeps the complete buffers and reports the partial one
//! in [`DecodedMetadata::corruption`].

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::types::{Buffer, BufferHeader, Device, SampleKind, MAX_BUFFERS, PLACEHOLDER_ID};
use std::io::Read;
use std::path::Path;

/// Magic token opening every metadata file
pub const MAGIC: &[u8; 17] = b"hcb_rrd_09082011A";

/// Upper bound for any length-prefixed string
const MAX_STRING_LEN: usize = 4096;

/// Upper bound for the slot count of one buffer
pub const MAX_SAMPLES: usize = 1 << 24;

/// Result of decoding one metadata file
#[derive(Debug)]
pub struct DecodedMetadata {
    pub device: Device,
    /// Partial trailing buffer record that was dropped, if any
    pub corruption: Option<ArchiveError>,
}

impl DecodedMetadata {
    pub fn is_clean(&self) -> bool {
        self.corruption.is_none()
    }
}

/// Bounds-checked reader over the raw metadata bytes
struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, needed: usize, field: &'static str) -> ArchiveResult<&'a [u8]> {
        let available = self.remaining();
        if needed > available {
            return Err(ArchiveError::Truncated {
                field,
                needed,
                available,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn i32(&mut self, field: &'static str) -> ArchiveResult<i32> {
        let bytes = self.take(4, field)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn f64(&mut self, field: &'static str) -> ArchiveResult<f64> {
        let bytes = self.take(8, field)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    /// Non-negative count field
    fn count(&mut self, field: &'static str) -> ArchiveResult<usize> {
        let value = self.i32(field)?;
        usize::try_from(value).map_err(|_| ArchiveError::InvalidLength {
            field,
            length: i64::from(value),
        })
    }

    fn string(&mut self, field: &'static str) -> ArchiveResult<String> {
        let len = self.count(field)?;
        if len > MAX_STRING_LEN {
            return Err(ArchiveError::InvalidLength {
                field,
                length: len as i64,
            });
        }
        let bytes = self.take(len, field)?;
        let text = String::from_utf8_lossy(bytes);
        Ok(text.trim_end_matches('\0').to_string())
    }
}

/// Read and decode a metadata file
pub fn read_metadata(path: impl AsRef<Path>) -> ArchiveResult<DecodedMetadata> {
    let bytes = std::fs::read(path.as_ref())?;
    decode_metadata(&bytes)
}

/// Decode metadata from any byte source
pub fn decode_from<R: Read>(mut reader: R) -> ArchiveResult<DecodedMetadata> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode_metadata(&bytes)
}

/// Decode metadata bytes into a device and its buffers
pub fn decode_metadata(bytes: &[u8]) -> ArchiveResult<DecodedMetadata> {
    let mut reader = FieldReader::new(bytes);

    let magic = reader.take(MAGIC.len(), "magic").map_err(|_| ArchiveError::BadMagic {
        found: String::from_utf8_lossy(bytes).into_owned(),
    })?;
    if magic != MAGIC {
        return Err(ArchiveError::BadMagic {
            found: String::from_utf8_lossy(magic).into_owned(),
        });
    }

    let id = reader.string("device id")?;
    let variable = reader.string("variable")?;
    let service = reader.string("service")?;
    let sample_type = reader.string("sample type")?;
    let kind = SampleKind::from_tag(&sample_type);

    let mut device = Device {
        id,
        name: None,
        variable,
        service,
        sample_type,
        kind,
        buffers: Vec::with_capacity(MAX_BUFFERS),
    };

    if device.id == PLACEHOLDER_ID {
        tracing::debug!("Metadata describes an unprovisioned archive");
        return Ok(DecodedMetadata {
            device,
            corruption: None,
        });
    }

    let mut corruption = None;

    while device.buffers.len() < MAX_BUFFERS && reader.remaining() > 0 {
        let index = device.buffers.len();
        match read_buffer(&mut reader, kind) {
            Ok(buffer) => device.buffers.push(buffer),
            Err(e) => {
                tracing::warn!(
                    "Metadata for {} is partly corrupted, keeping {} buffers: {}",
                    device.id,
                    index,
                    e
                );
                corruption = Some(ArchiveError::CorruptRecord {
                    index,
                    reason: e.to_string(),
                });
                break;
            }
        }
    }

    if corruption.is_none() && reader.remaining() > 0 {
        tracing::debug!(
            "Ignoring {} bytes after buffer {} of {}",
            reader.remaining(),
            MAX_BUFFERS,
            device.id
        );
    }

    Ok(DecodedMetadata { device, corruption })
}

fn read_buffer(reader: &mut FieldReader<'_>, kind: SampleKind) -> ArchiveResult<Buffer> {
    let header = match kind {
        SampleKind::Integer => BufferHeader::Integer {
            reserved: [
                reader.i32("reserved")?,
                reader.i32("reserved")?,
                reader.i32("reserved")?,
            ],
        },
        SampleKind::Real => BufferHeader::Real {
            value: reader.f64("value")?,
            divider: reader.f64("divider")?,
        },
    };

    let timestamp_0 = reader.i32("timestamp_0")?;
    let timestamp_1 = reader.i32("timestamp_1")?;
    let min_samples_per_bin = reader.i32("min samples per bin")?;
    let bin_length = reader.string("bin length")?;
    let file_offset = reader.count("file offset")?;
    let n_samples = reader.count("sample count")?;
    let reserved = reader.i32("reserved")?;
    let interval = reader.string("interval")?;
    let consolidator = reader.string("consolidator")?;

    if n_samples > MAX_SAMPLES {
        return Err(ArchiveError::InvalidLength {
            field: "sample count",
            length: n_samples as i64,
        });
    }
    if timestamp_1 <= timestamp_0 {
        return Err(ArchiveError::InvalidLength {
            field: "interval",
            length: i64::from(timestamp_1) - i64::from(timestamp_0),
        });
    }
    if n_samples > 0 && file_offset >= n_samples {
        return Err(ArchiveError::IndexOutOfRange {
            index: file_offset,
            count: n_samples,
        });
    }

    Ok(Buffer {
        header,
        timestamp_0,
        timestamp_1,
        min_samples_per_bin,
        bin_length,
        file_offset,
        n_samples,
        reserved,
        interval,
        consolidator,
    })
}

fn put_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_count(out: &mut Vec<u8>, value: usize) {
    put_i32(out, i32::try_from(value).unwrap_or(i32::MAX));
}

fn put_string(out: &mut Vec<u8>, value: &str) {
    put_count(out, value.len());
    out.extend_from_slice(value.as_bytes());
}

/// Encode a device in the metadata layout
pub fn encode_metadata(device: &Device) -> Vec<u8> {
    let mut out = Vec::with_capacity(128 + device.buffers.len() * 64);

    out.extend_from_slice(MAGIC);
    put_string(&mut out, &device.id);
    put_string(&mut out, &device.variable);
    put_string(&mut out, &device.service);
    put_string(&mut out, &device.sample_type);

    for buffer in &device.buffers {
        match buffer.header {
            BufferHeader::Integer { reserved } => {
                for value in reserved {
                    put_i32(&mut out, value);
                }
            }
            BufferHeader::Real { value, divider } => {
                out.extend_from_slice(&value.to_le_bytes());
                out.extend_from_slice(&divider.to_le_bytes());
            }
        }
        put_i32(&mut out, buffer.timestamp_0);
        put_i32(&mut out, buffer.timestamp_1);
        put_i32(&mut out, buffer.min_samples_per_bin);
        put_string(&mut out, &buffer.bin_length);
        put_count(&mut out, buffer.file_offset);
        put_count(&mut out, buffer.n_samples);
        put_i32(&mut out, buffer.reserved);
        put_string(&mut out, &buffer.interval);
        put_string(&mut out, &buffer.consolidator);
    }

    out
}

/// Encode a device and write it to `path`
pub fn write_metadata(path: impl AsRef<Path>, device: &Device) -> ArchiveResult<()> {
    std::fs::write(path.as_ref(), encode_metadata(device))?;
    Ok(())
}
