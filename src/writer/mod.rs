//! writer: position-dependent serialization of the top-level record list.
//!
//! Two discrete passes:
//! 1) measure: every record gets its new offset (the real encoder runs into a
//!    CountingWriter), old -> new offsets are collected, the last
//!    PersistPtrHolder and UserEditAtom are remembered.
//! 2) emit: persist ids are recovered from the holder's old locations pushed
//!    through the offset map (falling back to the id a record was loaded
//!    with), offset-bearing records are rewritten, then each record is
//!    encoded through the encryption session keyed by its persist id (0 when
//!    it has none).
//!
//! Rewriting offsets never changes a record's size, so the measured layout
//! holds for the emit pass.

use std::collections::HashMap;
use std::io::Write;

use log::debug;

use crate::crypto::EncryptionSession;
use crate::error::{PptError, Result};
use crate::record::{CountingWriter, PositionDependent, Record};

mod normalize;

pub use normalize::normalize_records;

/// Result of one full save of the document stream.
#[derive(Debug, Clone, Default)]
pub struct SerializeOutcome {
    pub bytes: Vec<u8>,
    /// previous offset -> new offset, for records that had one
    pub offset_map: HashMap<u32, u32>,
    /// new position of the active UserEditAtom (goes to the Current User stream)
    pub current_edit_offset: u32,
}

/// Pass 1 on its own.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub offset_map: HashMap<u32, u32>,
    pub total_len: usize,
    pub last_persist_ptr: Option<usize>,
    pub last_user_edit: Option<usize>,
}

/// Assign fresh offsets to every top-level record without writing anything.
pub fn dry_run(records: &mut [Record]) -> Result<Layout> {
    let mut layout = Layout::default();
    let mut pos: u64 = 0;
    for (i, rec) in records.iter_mut().enumerate() {
        if rec.is_persist_ptr_holder() {
            layout.last_persist_ptr = Some(i);
        }
        if rec.as_user_edit().is_some() {
            layout.last_user_edit = Some(i);
        }
        let new = u32::try_from(pos).map_err(|_| PptError::DocumentTooLarge {
            len: pos as usize,
            limit: u32::MAX as usize,
        })?;
        if let Some(old) = rec.last_on_disk_offset() {
            layout.offset_map.insert(old, new);
        }
        rec.set_last_on_disk_offset(Some(new));
        rec.refresh_length();

        let mut cw = CountingWriter::new();
        rec.write_to(&mut cw)?;
        pos += cw.count();
    }
    layout.total_len = pos as usize;
    Ok(layout)
}

/// Pass 1 plus the reference rewrite, without emitting bytes. Afterwards
/// every stored offset agrees with the records' new positions.
pub fn relayout(records: &mut [Record]) -> Result<Layout> {
    let layout = dry_run(records)?;
    for rec in records.iter_mut() {
        rec.update_other_record_references(&layout.offset_map)?;
    }
    Ok(layout)
}

/// Serialize the top-level records, rewriting every offset reference.
pub fn serialize(records: &mut [Record], session: &EncryptionSession) -> Result<SerializeOutcome> {
    let layout = dry_run(records)?;
    let (pph_idx, uea_idx) = match (layout.last_persist_ptr, layout.last_user_edit) {
        (Some(p), Some(u)) => (p, u),
        _ => {
            return Err(PptError::corrupt(
                "document has no UserEditAtom or PersistPtrHolder among its top-level records",
            ))
        }
    };

    // new offset -> persist id, from the holder's pre-save locations.
    let mut persist_ids: HashMap<u32, u32> = HashMap::new();
    if let Some(pph) = records[pph_idx].as_persist_ptr() {
        for (&id, old) in pph.slide_locations() {
            match layout.offset_map.get(old) {
                Some(&new) => {
                    persist_ids.insert(new, id);
                }
                None => debug!(
                    "persist id {} at old offset {} has no record in this save",
                    id, old
                ),
            }
        }
    }

    for rec in records.iter_mut() {
        rec.update_other_record_references(&layout.offset_map)?;
    }

    let mut out: Vec<u8> = Vec::with_capacity(layout.total_len);
    for rec in records.iter_mut() {
        let at = out.len() as u32;
        // Objects only an older holder names keep the id they were loaded with.
        let pid = persist_ids.get(&at).copied().or_else(|| rec.persist_id());
        if pid.is_some() {
            rec.set_persist_id(pid);
        }
        let mut sink = session.encrypt_record(&mut out, pid.unwrap_or(0), rec.rec_type())?;
        rec.write_to(&mut sink)?;
        sink.flush()?;
    }
    if out.len() != layout.total_len {
        return Err(PptError::corrupt(format!(
            "serialized {} bytes but measured {}",
            out.len(),
            layout.total_len
        )));
    }

    let current_edit_offset = records[uea_idx].last_on_disk_offset().unwrap_or(0);
    Ok(SerializeOutcome {
        bytes: out,
        offset_map: layout.offset_map,
        current_edit_offset,
    })
}
