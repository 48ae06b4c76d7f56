//! Address resolution
//!
//! Turns a `container/key/segments` string into backend coordinates. Runs
//! before any network call, so a malformed address never costs a retry.

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Backend-scoped coordinates of an item or prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Top-level namespace (the bucket)
    pub container: String,
    /// Remaining segments joined with `/`; empty means the container root
    pub key: String,
}

impl Address {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }

    /// Returns true if the address names only a container
    pub fn is_root(&self) -> bool {
        self.key.is_empty()
    }

    /// Name the item after its source when the address has no key.
    ///
    /// `bucket` with hint `/tmp/report.csv` becomes `bucket/report.csv`.
    /// Addresses that already carry a key are returned unchanged.
    pub fn with_default_key(self, source_hint: &str) -> Result<Self> {
        if !self.is_root() {
            return Ok(self);
        }

        let name = Path::new(source_hint)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::InvalidPath(format!(
                    "cannot derive a key for {} from source '{source_hint}'",
                    self.container
                ))
            })?;

        Ok(Self {
            key: name.to_string(),
            container: self.container,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.container)
        } else {
            write!(f, "{}/{}", self.container, self.key)
        }
    }
}

/// Resolve a slash-delimited path into an [`Address`]
///
/// The first segment is the container and must be non-empty. Everything after
/// the first `/` is kept verbatim as the key, so `"a/b/"` has key `"b/"`.
pub fn resolve(path: &str) -> Result<Address> {
    let mut segments = path.split('/');

    let container = match segments.next() {
        Some(c) if !c.is_empty() => c,
        _ => return Err(Error::InvalidPath(format!("illegal path: '{path}'"))),
    };

    let key = segments.collect::<Vec<_>>().join("/");

    Ok(Address::new(container, key))
}
