//! record/registry: type code -> decoder dispatch.
//!
//! Populated once with the standard PowerPoint and escher types. Codes that
//! are not registered decode as opaque atoms, so unknown data survives a
//! round-trip untouched.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::consts::*;
use crate::error::Result;

use super::{
    BlipStoreEntry, DocumentEncryptionAtom, PersistPtrHolder, RecordBody, RecordHeader,
    TypedAtom, UserEditAtom,
};

/// Decoder for a typed atom payload.
pub type AtomDecoder = fn(&RecordHeader, &[u8]) -> Result<RecordBody>;

#[derive(Clone, Copy)]
pub enum RecordKind {
    /// Payload is a sequence of child records.
    Container,
    /// Payload is decoded by a type-specific function.
    Atom(AtomDecoder),
}

impl fmt::Debug for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Container => f.write_str("Container"),
            RecordKind::Atom(_) => f.write_str("Atom(<decoder>)"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecordRegistry {
    kinds: HashMap<u16, RecordKind>,
}

const STANDARD_CONTAINERS: &[u16] = &[
    RT_DOCUMENT,
    RT_SLIDE,
    RT_NOTES,
    RT_ENVIRONMENT,
    RT_MAIN_MASTER,
    RT_SLIDE_SHOW_SLIDE_INFO,
    RT_EX_OBJ_LIST,
    RT_PP_DRAWING_GROUP,
    RT_PP_DRAWING,
    RT_LIST,
    RT_FONT_COLLECTION,
    RT_SOUND_COLLECTION,
    RT_SOUND,
    RT_HANDOUT,
    RT_EX_EMBED,
    RT_EX_HYPERLINK,
    RT_HEADERS_FOOTERS,
    RT_SLIDE_LIST_WITH_TEXT,
    RT_INTERACTIVE_INFO,
    RT_PROG_TAGS,
    RT_PROG_BINARY_TAG,
    RT_BINARY_TAG_DATA,
    ESCHER_DGG_CONTAINER,
    ESCHER_BSTORE_CONTAINER,
    ESCHER_DG_CONTAINER,
    ESCHER_SPGR_CONTAINER,
    ESCHER_SP_CONTAINER,
    ESCHER_SOLVER_CONTAINER,
];

fn decode_user_edit(h: &RecordHeader, payload: &[u8]) -> Result<RecordBody> {
    Ok(RecordBody::UserEdit(UserEditAtom::decode(h, payload)?))
}

fn decode_persist_ptr(h: &RecordHeader, payload: &[u8]) -> Result<RecordBody> {
    Ok(RecordBody::PersistPtr(PersistPtrHolder::decode(h, payload)?))
}

fn decode_encryption(h: &RecordHeader, payload: &[u8]) -> Result<RecordBody> {
    Ok(RecordBody::Encryption(DocumentEncryptionAtom::decode(h, payload)?))
}

fn decode_blip_entry(h: &RecordHeader, payload: &[u8]) -> Result<RecordBody> {
    Ok(RecordBody::BlipEntry(BlipStoreEntry::decode(h, payload)?))
}

impl RecordRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_standard_types() -> Self {
        let mut reg = Self::empty();
        for &code in STANDARD_CONTAINERS {
            reg.register(code, RecordKind::Container);
        }
        reg.register(RT_USER_EDIT_ATOM, RecordKind::Atom(decode_user_edit));
        reg.register(RT_PERSIST_PTR_FULL, RecordKind::Atom(decode_persist_ptr));
        reg.register(RT_PERSIST_PTR_INCREMENTAL, RecordKind::Atom(decode_persist_ptr));
        reg.register(RT_DOCUMENT_ENCRYPTION_ATOM, RecordKind::Atom(decode_encryption));
        reg.register(ESCHER_BSE, RecordKind::Atom(decode_blip_entry));
        reg
    }

    /// Process-wide standard registry, built on first use.
    pub fn standard() -> &'static RecordRegistry {
        static STD: OnceLock<RecordRegistry> = OnceLock::new();
        STD.get_or_init(RecordRegistry::with_standard_types)
    }

    /// Register (or replace) the decoder for a type code.
    pub fn register(&mut self, rec_type: u16, kind: RecordKind) -> Option<RecordKind> {
        self.kinds.insert(rec_type, kind)
    }

    #[inline]
    pub fn kind(&self, rec_type: u16) -> Option<RecordKind> {
        self.kinds.get(&rec_type).copied()
    }

    pub fn is_container(&self, rec_type: u16) -> bool {
        matches!(self.kind(rec_type), Some(RecordKind::Container))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
