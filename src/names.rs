//! Device display names
//!
//! Metadata files only carry a device id. The human-readable name used in
//! CSV file names comes from the logger configuration XML, where each
//! `<rrdLogger>` element pairs a `<uuid>` with a `<name>`:
//!
//! ```xml
//! <Config>
//!   <rrdLogger>
//!     <uuid>eneco-001-123456:abcdef</uuid>
//!     <name>elec_quantity_nt</name>
//!     ...
//!   </rrdLogger>
//! </Config>
//! ```

use crate::archive::{ArchiveError, ArchiveResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;

/// Device id to display name lookup
#[derive(Debug, Clone, Default)]
pub struct DeviceNames {
    names: HashMap<String, String>,
}

#[derive(Clone, Copy)]
enum Field {
    Uuid,
    Name,
}

impl DeviceNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a logger configuration file
    pub fn from_xml_path(path: &Path) -> ArchiveResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_xml_str(&content).map_err(|reason| ArchiveError::NameLookup {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse logger configuration XML
    pub fn from_xml_str(xml: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut names = Self::new();
        let mut depth = 0usize;
        // depth of the open <rrdLogger>, if any
        let mut logger_depth: Option<usize> = None;
        let mut field: Option<Field> = None;
        let mut uuid: Option<String> = None;
        let mut name: Option<String> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    depth += 1;
                    field = None;
                    match (e.name().as_ref(), logger_depth) {
                        (b"rrdLogger", None) => {
                            logger_depth = Some(depth);
                            uuid = None;
                            name = None;
                        }
                        (b"uuid", Some(d)) if depth == d + 1 => field = Some(Field::Uuid),
                        (b"name", Some(d)) if depth == d + 1 => field = Some(Field::Name),
                        _ => {}
                    }
                }
                Ok(Event::Text(t)) => {
                    if let Some(f) = field {
                        let text = t.unescape().map_err(|e| e.to_string())?.into_owned();
                        match f {
                            Field::Uuid => uuid = Some(text),
                            Field::Name => name = Some(text),
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    field = None;
                    if logger_depth == Some(depth) {
                        logger_depth = None;
                        match (uuid.take(), name.take()) {
                            (Some(id), Some(display)) => names.insert(id, display),
                            (Some(id), None) => {
                                tracing::debug!("Logger {} has no name", id);
                            }
                            _ => {}
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(format!(
                        "at position {}: {}",
                        reader.buffer_position(),
                        e
                    ))
                }
                _ => {}
            }
        }

        Ok(names)
    }

    /// Register a name
    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(id.into(), name.into());
    }

    /// Display name for a device id
    pub fn resolve(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DeviceNames {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut names = Self::new();
        for (id, name) in iter {
            names.insert(id, name);
        }
        names
    }
}
