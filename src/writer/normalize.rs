//! writer/normalize: collapse the revision history into one save state.
//!
//! Walks the top-level list in stream order. Holders are merged so the later
//! definition of an id wins; records at superseded offsets, older holders and
//! older edit atoms are dropped. The surviving edit atom no longer links back.

use std::collections::{BTreeMap, HashSet};

use log::info;

use crate::error::{PptError, Result};
use crate::record::Record;

use super::relayout;

/// Returns true when the list was changed.
pub fn normalize_records(records: &mut Vec<Record>) -> Result<bool> {
    relayout(records)?;

    let mut uea: Option<usize> = None;
    let mut pph: Option<usize> = None;
    let mut holders = 0usize;
    let mut locations: BTreeMap<u32, u32> = BTreeMap::new();
    let mut obsolete: HashSet<u32> = HashSet::new();

    for (i, rec) in records.iter().enumerate() {
        if rec.as_user_edit().is_some() {
            uea = Some(i);
        } else if let Some(holder) = rec.as_persist_ptr() {
            holders += 1;
            pph = Some(i);
            for (&id, &off) in holder.slide_locations() {
                if let Some(old) = locations.insert(id, off) {
                    if old != off {
                        obsolete.insert(old);
                    }
                }
            }
        }
    }

    let (uea, pph) = match (uea, pph) {
        (Some(u), Some(p)) => (u, p),
        _ => {
            return Err(PptError::corrupt(
                "UserEditAtom and PersistPtrHolder must both exist to normalize",
            ))
        }
    };
    let pph_offset = records[pph].last_on_disk_offset();
    let linked = records[uea]
        .as_user_edit()
        .map(|u| Some(u.persist_pointers_offset) == pph_offset)
        .unwrap_or(false);
    if !linked {
        return Err(PptError::corrupt(
            "the last UserEditAtom does not point at the last PersistPtrHolder",
        ));
    }

    if holders == 1 && obsolete.is_empty() {
        return Ok(false);
    }

    if let Some(u) = records[uea].as_user_edit_mut() {
        u.last_user_edit_atom_offset = 0;
    }
    if let Some(holder) = records[pph].as_persist_ptr_mut() {
        holder.replace_all(locations.clone());
    }

    let before = records.len();
    let mut idx = 0usize;
    records.retain(|r| {
        let i = idx;
        idx += 1;
        if i == uea || i == pph {
            return true;
        }
        if r.as_user_edit().is_some() || r.as_persist_ptr().is_some() {
            return false;
        }
        !r.last_on_disk_offset()
            .map(|o| obsolete.contains(&o))
            .unwrap_or(false)
    });

    info!(
        "normalized records: {} -> {} top-level records, {} persist ids",
        before,
        records.len(),
        locations.len()
    );
    Ok(true)
}
