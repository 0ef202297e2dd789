//! pictures: the auxiliary "Pictures" stream and its reconciliation with
//! the blip store descriptors of the record tree.
//!
//! - types.rs:   PictureType (native ids, default instances).
//! - data.rs:    PictureData (one blob, image extraction, new-blob builder).
//! - stream.rs:  read/write of the flat stream with per-entry encryption.
//! - matcher.rs: three-pass blob <-> descriptor matching.

pub mod types;
pub mod data;
pub mod stream;
pub mod matcher;

pub use types::PictureType;
pub use data::{content_uid, PictureData};
pub use stream::{read_pictures, write_pictures};
pub use matcher::{find_bstore, find_bstore_mut, match_pictures, refresh_bstore_instance, MatchReport};
