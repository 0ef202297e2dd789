//! pptstore: record engine of the legacy binary PowerPoint format.
//!
//! Parses the "PowerPoint Document" stream into a tree of typed records,
//! resolves persist ids through the revision chain, and writes the tree back
//! with every position-dependent reference rewritten. Optional per-record
//! encryption and the auxiliary "Pictures" stream are handled alongside.

// Base modules
pub mod consts;
pub mod error;
pub mod config;

// Record tree: header, registry, codec, typed atoms
pub mod record;

// Revision chain and persist-pointer index
pub mod persist;

// Per-record / per-picture encryption
pub mod crypto;

// Two-pass position-dependent writer
pub mod writer;

// Pictures stream and blip store reconciliation
pub mod pictures;

// Named stream storage
pub mod streams;

// Document handle
pub mod slideshow;

pub use config::{ConfigBuilder, PptConfig};
pub use error::{PptError, Result};
pub use record::{
    decode_record, BlipStoreEntry, CurrentUserAtom, DocumentEncryptionAtom, PersistPtrHolder,
    PositionDependent, Record, RecordBody, RecordCodec, RecordHeader, RecordRegistry, UserEditAtom,
};
pub use persist::{EditChain, PersistIndex};
pub use crypto::{EncryptionProvider, EncryptionSession, KeyMaterial, StandardProvider};
pub use writer::{normalize_records, serialize, SerializeOutcome};
pub use pictures::{match_pictures, MatchReport, PictureData, PictureType};
pub use streams::{DirStreams, MemoryStreams, StreamStore};
pub use slideshow::SlideShowFile;
