//! persist/index: logical persist id -> most recent top-level record.
//!
//! Built from the decoded top-level record list and the current-edit offset.
//! Entries are indices into that list, never owned records: the list is the
//! single owner and the index is rebuilt after every save.

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::error::Result;
use crate::record::Record;

use super::chain::EditChain;

#[derive(Debug, Clone, Default)]
pub struct PersistIndex {
    chain: EditChain,
    /// persist id -> position in the top-level list
    by_id: BTreeMap<u32, usize>,
    /// persist id -> offset in the document stream
    offsets: BTreeMap<u32, u32>,
}

impl PersistIndex {
    pub fn build(records: &[Record], current_edit: u32, repair: bool) -> Result<Self> {
        let chain = EditChain::from_records(records, current_edit, repair)?;
        Ok(Self::from_chain(records, chain))
    }

    pub fn from_chain(records: &[Record], chain: EditChain) -> Self {
        let by_offset: HashMap<u32, usize> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.last_on_disk_offset().map(|o| (o, i)))
            .collect();

        let offsets = chain.resolve_offsets();
        let mut by_id = BTreeMap::new();
        for (&id, &off) in &offsets {
            match by_offset.get(&off) {
                Some(&i) => {
                    by_id.insert(id, i);
                }
                None => warn!(
                    "persist id {} points at offset {} where no record was loaded",
                    id, off
                ),
            }
        }
        Self {
            chain,
            by_id,
            offsets,
        }
    }

    pub fn chain(&self) -> &EditChain {
        &self.chain
    }

    /// Most recent record for `persist_id`.
    pub fn resolve<'r>(&self, records: &'r [Record], persist_id: u32) -> Option<&'r Record> {
        self.by_id.get(&persist_id).and_then(|&i| records.get(i))
    }

    pub fn record_index(&self, persist_id: u32) -> Option<usize> {
        self.by_id.get(&persist_id).copied()
    }

    pub fn offset(&self, persist_id: u32) -> Option<u32> {
        self.offsets.get(&persist_id).copied()
    }

    /// persist id -> offset, ascending by id.
    pub fn offsets(&self) -> &BTreeMap<u32, u32> {
        &self.offsets
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_id.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
