use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::*;
use crate::error::{PptError, Result};

use super::{PositionDependent, RecordHeader, TypedAtom};

/// Revision marker. Each save appends one; they form a backward linked list
/// through `last_user_edit_atom_offset` (0 terminates).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEditAtom {
    pub last_viewed_slide_id: i32,
    pub version: u32,
    /// Offset of the previous UserEditAtom, 0 for the first revision.
    pub last_user_edit_atom_offset: u32,
    /// Offset of the PersistPtrHolder valid at this revision.
    pub persist_pointers_offset: u32,
    pub doc_persist_id_ref: u32,
    pub max_persist_written: u32,
    pub last_view_type: u16,
    pub unused: u16,
    /// Persist id of the DocumentEncryptionAtom, present only in 32-byte atoms.
    pub encrypt_session_persist_id_ref: Option<u32>,
    /// Bytes beyond the known layout, kept for round-trip.
    pub trailing: Vec<u8>,
}

impl UserEditAtom {
    pub fn new(doc_persist_id_ref: u32, max_persist_written: u32) -> Self {
        Self {
            last_viewed_slide_id: 0,
            version: UEA_DEFAULT_VERSION,
            last_user_edit_atom_offset: 0,
            persist_pointers_offset: 0,
            doc_persist_id_ref,
            max_persist_written,
            last_view_type: LAST_VIEW_NONE,
            unused: 0,
            encrypt_session_persist_id_ref: None,
            trailing: Vec::new(),
        }
    }

    /// Header of a freshly built atom (length is recomputed on write).
    pub fn header() -> RecordHeader {
        RecordHeader::new(0, 0, RT_USER_EDIT_ATOM, USER_EDIT_ATOM_LEN)
    }

    /// Shape check used by the edit-chain repair: ver/inst 0, type 4085 and
    /// one of the two legal lengths.
    pub fn is_valid_header(h: &RecordHeader) -> bool {
        h.ver_inst() == 0
            && h.rec_type == RT_USER_EDIT_ATOM
            && (h.length == USER_EDIT_ATOM_LEN || h.length == USER_EDIT_ATOM_LEN_ENCRYPTED)
    }
}

impl TypedAtom for UserEditAtom {
    fn decode(_header: &RecordHeader, p: &[u8]) -> Result<Self> {
        if p.len() < USER_EDIT_ATOM_LEN as usize {
            return Err(PptError::corrupt(format!(
                "UserEditAtom payload too short: {} bytes",
                p.len()
            )));
        }
        let (encrypt_ref, rest) = if p.len() >= USER_EDIT_ATOM_LEN_ENCRYPTED as usize {
            (
                Some(LittleEndian::read_u32(&p[UEA_OFF_ENCRYPT_REF..UEA_OFF_ENCRYPT_REF + 4])),
                USER_EDIT_ATOM_LEN_ENCRYPTED as usize,
            )
        } else {
            (None, USER_EDIT_ATOM_LEN as usize)
        };
        Ok(Self {
            last_viewed_slide_id: LittleEndian::read_i32(&p[UEA_OFF_LAST_VIEWED_SLIDE..UEA_OFF_LAST_VIEWED_SLIDE + 4]),
            version: LittleEndian::read_u32(&p[UEA_OFF_VERSION..UEA_OFF_VERSION + 4]),
            last_user_edit_atom_offset: LittleEndian::read_u32(&p[UEA_OFF_LAST_EDIT..UEA_OFF_LAST_EDIT + 4]),
            persist_pointers_offset: LittleEndian::read_u32(&p[UEA_OFF_PERSIST_PTRS..UEA_OFF_PERSIST_PTRS + 4]),
            doc_persist_id_ref: LittleEndian::read_u32(&p[UEA_OFF_DOC_PERSIST_REF..UEA_OFF_DOC_PERSIST_REF + 4]),
            max_persist_written: LittleEndian::read_u32(&p[UEA_OFF_MAX_PERSIST..UEA_OFF_MAX_PERSIST + 4]),
            last_view_type: LittleEndian::read_u16(&p[UEA_OFF_LAST_VIEW_TYPE..UEA_OFF_LAST_VIEW_TYPE + 2]),
            unused: LittleEndian::read_u16(&p[UEA_OFF_UNUSED..UEA_OFF_UNUSED + 2]),
            encrypt_session_persist_id_ref: encrypt_ref,
            trailing: p[rest..].to_vec(),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let mut b = [0u8; USER_EDIT_ATOM_LEN_ENCRYPTED as usize];
        LittleEndian::write_i32(&mut b[UEA_OFF_LAST_VIEWED_SLIDE..UEA_OFF_LAST_VIEWED_SLIDE + 4], self.last_viewed_slide_id);
        LittleEndian::write_u32(&mut b[UEA_OFF_VERSION..UEA_OFF_VERSION + 4], self.version);
        LittleEndian::write_u32(&mut b[UEA_OFF_LAST_EDIT..UEA_OFF_LAST_EDIT + 4], self.last_user_edit_atom_offset);
        LittleEndian::write_u32(&mut b[UEA_OFF_PERSIST_PTRS..UEA_OFF_PERSIST_PTRS + 4], self.persist_pointers_offset);
        LittleEndian::write_u32(&mut b[UEA_OFF_DOC_PERSIST_REF..UEA_OFF_DOC_PERSIST_REF + 4], self.doc_persist_id_ref);
        LittleEndian::write_u32(&mut b[UEA_OFF_MAX_PERSIST..UEA_OFF_MAX_PERSIST + 4], self.max_persist_written);
        LittleEndian::write_u16(&mut b[UEA_OFF_LAST_VIEW_TYPE..UEA_OFF_LAST_VIEW_TYPE + 2], self.last_view_type);
        LittleEndian::write_u16(&mut b[UEA_OFF_UNUSED..UEA_OFF_UNUSED + 2], self.unused);
        match self.encrypt_session_persist_id_ref {
            Some(r) => {
                LittleEndian::write_u32(&mut b[UEA_OFF_ENCRYPT_REF..UEA_OFF_ENCRYPT_REF + 4], r);
                out.extend_from_slice(&b);
            }
            None => out.extend_from_slice(&b[..USER_EDIT_ATOM_LEN as usize]),
        }
        out.extend_from_slice(&self.trailing);
    }

    fn payload_len(&self) -> usize {
        let base = if self.encrypt_session_persist_id_ref.is_some() {
            USER_EDIT_ATOM_LEN_ENCRYPTED
        } else {
            USER_EDIT_ATOM_LEN
        };
        base as usize + self.trailing.len()
    }
}

impl PositionDependent for UserEditAtom {
    fn update_other_record_references(&mut self, old_to_new: &HashMap<u32, u32>) -> Result<()> {
        if self.last_user_edit_atom_offset != 0 {
            let new = old_to_new.get(&self.last_user_edit_atom_offset).ok_or_else(|| {
                PptError::corrupt(format!(
                    "couldn't find the new location of the UserEditAtom that used to be at {}",
                    self.last_user_edit_atom_offset
                ))
            })?;
            self.last_user_edit_atom_offset = *new;
        }
        let new = old_to_new.get(&self.persist_pointers_offset).ok_or_else(|| {
            PptError::corrupt(format!(
                "couldn't find the new location of the PersistPtr that used to be at {}",
                self.persist_pointers_offset
            ))
        })?;
        self.persist_pointers_offset = *new;
        Ok(())
    }
}
