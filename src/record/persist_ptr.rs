//! record/persist_ptr: PersistPtrHolder: persist id -> byte offset table.
//!
//! Payload is a run of directory entries:
//!   [info u32: bits 0..20 = first persist id, bits 20..32 = count][offset u32; count]
//!
//! The raw table bytes are kept as read so an untouched holder writes back
//! byte-identical. Moved offsets are patched in place; adding or removing
//! ids regenerates the table in normalized form (ids ascending, consecutive
//! ids merged into one entry).

use std::collections::{BTreeMap, HashMap};

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::consts::{PERSIST_COUNT_MAX, PERSIST_COUNT_SHIFT, PERSIST_ID_MASK, RT_PERSIST_PTR_INCREMENTAL};
use crate::error::{PptError, Result};

use super::{PositionDependent, Record, RecordBody, RecordHeader, TypedAtom};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistPtrHolder {
    ptr_data: Vec<u8>,
    locations: BTreeMap<u32, u32>,
}

impl PersistPtrHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// persist id -> offset, ascending by id.
    pub fn slide_locations(&self) -> &BTreeMap<u32, u32> {
        &self.locations
    }

    pub fn known_ids(&self) -> Vec<u32> {
        self.locations.keys().copied().collect()
    }

    pub fn location(&self, persist_id: u32) -> Option<u32> {
        self.locations.get(&persist_id).copied()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Register a new persist object. An id already present is an error.
    pub fn add_slide_lookup(&mut self, persist_id: u32, offset: u32) -> Result<()> {
        if persist_id > PERSIST_ID_MASK {
            return Err(PptError::corrupt(format!(
                "persist id {} does not fit in 20 bits",
                persist_id
            )));
        }
        if self.locations.contains_key(&persist_id) {
            return Err(PptError::corrupt(format!(
                "a record with persist id {} already exists",
                persist_id
            )));
        }
        self.locations.insert(persist_id, offset);
        self.normalize();
        Ok(())
    }

    /// Insert or overwrite an entry.
    pub fn set_location(&mut self, persist_id: u32, offset: u32) {
        self.locations.insert(persist_id, offset);
        self.normalize();
    }

    pub fn remove(&mut self, persist_id: u32) -> Option<u32> {
        let old = self.locations.remove(&persist_id);
        if old.is_some() {
            self.normalize();
        }
        old
    }

    /// Replace the whole table.
    pub fn replace_all(&mut self, locations: BTreeMap<u32, u32>) {
        self.locations = locations;
        self.normalize();
    }

    pub fn clear(&mut self) {
        self.locations.clear();
        self.normalize();
    }

    /// Rebuild the raw table from the map.
    pub fn normalize(&mut self) {
        let mut out: Vec<u8> = Vec::with_capacity(self.locations.len() * 8);
        let mut last_entry: Option<usize> = None;
        let mut last_id: Option<u32> = None;
        for (&id, &offset) in &self.locations {
            let extend = match (last_entry, last_id) {
                (Some(pos), Some(prev)) if prev + 1 == id => {
                    let info = LittleEndian::read_u32(&out[pos..pos + 4]);
                    let cnt = info >> PERSIST_COUNT_SHIFT;
                    if cnt < PERSIST_COUNT_MAX {
                        let info = (info & PERSIST_ID_MASK) | ((cnt + 1) << PERSIST_COUNT_SHIFT);
                        LittleEndian::write_u32(&mut out[pos..pos + 4], info);
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            };
            if !extend {
                last_entry = Some(out.len());
                let info = (id & PERSIST_ID_MASK) | (1 << PERSIST_COUNT_SHIFT);
                out.extend_from_slice(&info.to_le_bytes());
            }
            out.extend_from_slice(&offset.to_le_bytes());
            last_id = Some(id);
        }
        self.ptr_data = out;
    }
}

impl TypedAtom for PersistPtrHolder {
    fn decode(header: &RecordHeader, p: &[u8]) -> Result<Self> {
        let mut locations = BTreeMap::new();
        let mut pos = 0usize;
        while pos + 4 <= p.len() {
            let info = LittleEndian::read_u32(&p[pos..pos + 4]);
            pos += 4;
            let first = info & PERSIST_ID_MASK;
            let count = info >> PERSIST_COUNT_SHIFT;
            for i in 0..count {
                if pos + 4 > p.len() {
                    warn!(
                        "persist directory (type {}) truncated inside entry for id {}",
                        header.rec_type,
                        first + i
                    );
                    break;
                }
                let off = LittleEndian::read_u32(&p[pos..pos + 4]);
                pos += 4;
                // Within one holder the later entry wins.
                if let Some(prev) = locations.insert(first + i, off) {
                    debug!(
                        "persist id {} listed twice in one holder ({} then {})",
                        first + i,
                        prev,
                        off
                    );
                }
            }
        }
        Ok(Self {
            ptr_data: p.to_vec(),
            locations,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.ptr_data);
    }

    fn payload_len(&self) -> usize {
        self.ptr_data.len()
    }
}

impl PersistPtrHolder {
    /// Rewrite every offset slot of the raw table through `old_to_new`,
    /// keeping its entry layout.
    fn patch_offsets(&mut self, old_to_new: &HashMap<u32, u32>) {
        let p = &mut self.ptr_data;
        let mut pos = 0usize;
        while pos + 4 <= p.len() {
            let count = (LittleEndian::read_u32(&p[pos..pos + 4]) >> PERSIST_COUNT_SHIFT) as usize;
            pos += 4;
            for _ in 0..count {
                if pos + 4 > p.len() {
                    return;
                }
                let off = LittleEndian::read_u32(&p[pos..pos + 4]);
                if let Some(&new) = old_to_new.get(&off) {
                    LittleEndian::write_u32(&mut p[pos..pos + 4], new);
                }
                pos += 4;
            }
        }
    }
}

impl PositionDependent for PersistPtrHolder {
    /// Offsets without a new location are left alone (logged), mirroring a
    /// holder that references records no longer in the tree.
    fn update_other_record_references(&mut self, old_to_new: &HashMap<u32, u32>) -> Result<()> {
        let mut moved = false;
        for (id, pos) in self.locations.iter_mut() {
            match old_to_new.get(pos) {
                Some(&new) => {
                    moved |= new != *pos;
                    *pos = new;
                }
                None => warn!(
                    "couldn't find the new location of persist id {} that used to be at {}; not updating it",
                    id, pos
                ),
            }
        }
        if moved {
            self.patch_offsets(old_to_new);
        }
        Ok(())
    }
}

impl From<PersistPtrHolder> for Record {
    fn from(p: PersistPtrHolder) -> Self {
        Record::from_parts(
            RecordHeader::new(0, 0, RT_PERSIST_PTR_INCREMENTAL, 0),
            RecordBody::PersistPtr(p),
        )
    }
}
