//! streams: named byte streams of the compound container.
//!
//! The record engine never touches the container format itself; it reads and
//! writes whole streams by name ("PowerPoint Document", "Current User",
//! "Pictures") through `StreamStore`.
//!
//! - MemoryStreams: in-memory map (tests, conversions).
//! - DirStreams:    one file per stream in a directory, atomic replace under
//!                  an advisory lock.

use std::collections::BTreeMap;

use crate::error::{PptError, Result};

pub mod lock;
mod dir;

pub use dir::DirStreams;
pub use lock::{acquire_lock, try_acquire_lock, LockGuard, LockMode};

pub trait StreamStore {
    /// Contents of `name`, or None when the stream does not exist.
    fn read_stream(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace `name`.
    fn write_stream(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    fn remove_stream(&mut self, name: &str) -> Result<()>;

    fn stream_names(&self) -> Result<Vec<String>>;

    /// Like `read_stream`, but a missing stream is an error.
    fn require_stream(&self, name: &str) -> Result<Vec<u8>> {
        self.read_stream(name)?
            .ok_or_else(|| PptError::MissingStream(name.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStreams {
    streams: BTreeMap<String, Vec<u8>>,
}

impl MemoryStreams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Direct access for tests that corrupt a stream on purpose.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<u8>> {
        self.streams.get_mut(name)
    }
}

impl StreamStore for MemoryStreams {
    fn read_stream(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.streams.get(name).cloned())
    }

    fn write_stream(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.streams.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove_stream(&mut self, name: &str) -> Result<()> {
        self.streams.remove(name);
        Ok(())
    }

    fn stream_names(&self) -> Result<Vec<String>> {
        Ok(self.streams.keys().cloned().collect())
    }
}
