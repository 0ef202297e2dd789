//! persist: revision chain and persist-pointer resolution.
//!
//! - chain.rs: UserEditAtom walk with cycle repair (raw bytes or decoded records).
//! - index.rs: persist id -> most recent top-level record.

pub mod chain;
pub mod index;

pub use chain::{ChainRepair, ChainSource, EditChain, RawSource, RecordSource, Revision};
pub use index::PersistIndex;
