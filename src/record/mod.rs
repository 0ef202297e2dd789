//! record: the polymorphic record tree.
//!
//! Layout of the module:
//! - header.rs        : 8-byte header (ver/instance, type, length).
//! - registry.rs      : type code -> decoder dispatch (containers, typed atoms).
//! - codec.rs         : decode from a byte buffer / encode to a writer.
//! - user_edit.rs     : UserEditAtom (revision marker).
//! - persist_ptr.rs   : PersistPtrHolder (persist id -> offset table).
//! - encryption_atom.rs: DocumentEncryptionAtom (key verifier material).
//! - blip_entry.rs    : escher BSE (picture descriptor).
//! - current_user.rs  : the "Current User" stream atom (bootstrap of the edit chain).
//!
//! A Record owns its children top-down. Nothing points back at its parent:
//! "which container holds X" is answered by a path lookup (`find_path`).

use std::collections::HashMap;
use std::io::{self, Write};

use crate::consts::{HDR_VER_CONTAINER, RECORD_HEADER_SIZE, RT_PERSIST_PTR_FULL, RT_PERSIST_PTR_INCREMENTAL};
use crate::error::Result;

pub mod header;
pub mod registry;
pub mod codec;
pub mod user_edit;
pub mod persist_ptr;
pub mod encryption_atom;
pub mod blip_entry;
pub mod current_user;

pub use header::RecordHeader;
pub use registry::{AtomDecoder, RecordKind, RecordRegistry};
pub use codec::{decode_record, CountingWriter, RecordCodec};
pub use user_edit::UserEditAtom;
pub use persist_ptr::PersistPtrHolder;
pub use encryption_atom::DocumentEncryptionAtom;
pub use blip_entry::BlipStoreEntry;
pub use current_user::CurrentUserAtom;

/// Fixed-format atom with a typed in-memory representation.
pub trait TypedAtom: Sized {
    fn decode(header: &RecordHeader, payload: &[u8]) -> Result<Self>;
    fn encode(&self, out: &mut Vec<u8>);
    fn payload_len(&self) -> usize;
}

/// Records that store byte offsets of other top-level records.
///
/// Called once per save with the old -> new offset map of every record that
/// had a previous on-disk position.
pub trait PositionDependent {
    fn update_other_record_references(&mut self, old_to_new: &HashMap<u32, u32>) -> Result<()>;
}

/// Logical identity of a record referenced from the persist-pointer tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PersistInfo {
    pub persist_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordBody {
    /// Opaque payload (also the fallback for unregistered type codes).
    Atom(Vec<u8>),
    /// Ordered children; order is positional.
    Container(Vec<Record>),
    UserEdit(UserEditAtom),
    PersistPtr(PersistPtrHolder),
    Encryption(DocumentEncryptionAtom),
    BlipEntry(BlipStoreEntry),
}

#[derive(Debug, Clone)]
pub struct Record {
    header: RecordHeader,
    body: RecordBody,
    persist: Option<PersistInfo>,
    last_on_disk_offset: Option<u32>,
}

/// Structural equality: type, ver, instance and body. The stored header length,
/// persist identity and on-disk offset are bookkeeping and ignored.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.header.rec_type == other.header.rec_type
            && self.header.ver == other.header.ver
            && self.header.instance == other.header.instance
            && self.body == other.body
    }
}

impl Eq for Record {}

impl Record {
    pub fn from_parts(header: RecordHeader, body: RecordBody) -> Self {
        let mut r = Self {
            header,
            body,
            persist: None,
            last_on_disk_offset: None,
        };
        r.header.length = r.payload_len() as u32;
        r
    }

    /// New opaque atom (ver 0).
    pub fn atom(rec_type: u16, instance: u16, payload: Vec<u8>) -> Self {
        Self::from_parts(
            RecordHeader::new(0, instance, rec_type, 0),
            RecordBody::Atom(payload),
        )
    }

    /// New container (ver 0xF).
    pub fn container(rec_type: u16, instance: u16, children: Vec<Record>) -> Self {
        Self::from_parts(
            RecordHeader::new(HDR_VER_CONTAINER, instance, rec_type, 0),
            RecordBody::Container(children),
        )
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    #[inline]
    pub fn rec_type(&self) -> u16 {
        self.header.rec_type
    }

    #[inline]
    pub fn instance(&self) -> u16 {
        self.header.instance
    }

    #[inline]
    pub fn ver(&self) -> u8 {
        self.header.ver
    }

    pub fn set_instance(&mut self, instance: u16) {
        self.header.instance = instance & 0x0FFF;
    }

    pub fn body(&self) -> &RecordBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut RecordBody {
        &mut self.body
    }

    pub fn is_container(&self) -> bool {
        matches!(self.body, RecordBody::Container(_))
    }

    pub fn is_persist_ptr_holder(&self) -> bool {
        matches!(self.header.rec_type, RT_PERSIST_PTR_FULL | RT_PERSIST_PTR_INCREMENTAL)
            && matches!(self.body, RecordBody::PersistPtr(_))
    }

    // ---------- position / persist bookkeeping ----------

    /// Offset this record had in the last stream it was read from or written to.
    pub fn last_on_disk_offset(&self) -> Option<u32> {
        self.last_on_disk_offset
    }

    pub fn set_last_on_disk_offset(&mut self, off: Option<u32>) {
        self.last_on_disk_offset = off;
    }

    pub fn persist_id(&self) -> Option<u32> {
        self.persist.map(|p| p.persist_id)
    }

    pub fn set_persist_id(&mut self, id: Option<u32>) {
        self.persist = id.map(|persist_id| PersistInfo { persist_id });
    }

    // ---------- body accessors ----------

    pub fn atom_data(&self) -> Option<&[u8]> {
        match &self.body {
            RecordBody::Atom(b) => Some(b),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Record] {
        match &self.body {
            RecordBody::Container(c) => c,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Record>> {
        match &mut self.body {
            RecordBody::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_user_edit(&self) -> Option<&UserEditAtom> {
        match &self.body {
            RecordBody::UserEdit(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_user_edit_mut(&mut self) -> Option<&mut UserEditAtom> {
        match &mut self.body {
            RecordBody::UserEdit(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_persist_ptr(&self) -> Option<&PersistPtrHolder> {
        match &self.body {
            RecordBody::PersistPtr(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_persist_ptr_mut(&mut self) -> Option<&mut PersistPtrHolder> {
        match &mut self.body {
            RecordBody::PersistPtr(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_encryption_atom(&self) -> Option<&DocumentEncryptionAtom> {
        match &self.body {
            RecordBody::Encryption(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_blip_entry(&self) -> Option<&BlipStoreEntry> {
        match &self.body {
            RecordBody::BlipEntry(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_blip_entry_mut(&mut self) -> Option<&mut BlipStoreEntry> {
        match &mut self.body {
            RecordBody::BlipEntry(b) => Some(b),
            _ => None,
        }
    }

    // ---------- tree lookups ----------

    pub fn find_child(&self, rec_type: u16) -> Option<&Record> {
        self.children().iter().find(|c| c.rec_type() == rec_type)
    }

    pub fn find_child_mut(&mut self, rec_type: u16) -> Option<&mut Record> {
        self.children_mut()?
            .iter_mut()
            .find(|c| c.rec_type() == rec_type)
    }

    /// Depth-first (pre-order) search below this record. The returned path
    /// indexes children level by level; an empty path is `self`.
    pub fn find_path<F>(&self, pred: F) -> Option<Vec<usize>>
    where
        F: Fn(&Record) -> bool,
    {
        fn walk<F: Fn(&Record) -> bool>(r: &Record, pred: &F, path: &mut Vec<usize>) -> bool {
            if pred(r) {
                return true;
            }
            for (i, c) in r.children().iter().enumerate() {
                path.push(i);
                if walk(c, pred, path) {
                    return true;
                }
                path.pop();
            }
            false
        }
        let mut path = Vec::new();
        if walk(self, &pred, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    pub fn at_path(&self, path: &[usize]) -> Option<&Record> {
        let mut cur = self;
        for &i in path {
            cur = cur.children().get(i)?;
        }
        Some(cur)
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Record> {
        let mut cur = self;
        for &i in path {
            cur = cur.children_mut()?.get_mut(i)?;
        }
        Some(cur)
    }

    /// Number of records in this subtree, self included.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(Record::subtree_len).sum::<usize>()
    }

    // ---------- encoding ----------

    /// Payload length as it would be written now.
    pub fn payload_len(&self) -> usize {
        match &self.body {
            RecordBody::Atom(b) => b.len(),
            RecordBody::Container(c) => c.iter().map(Record::encoded_len).sum(),
            RecordBody::UserEdit(u) => u.payload_len(),
            RecordBody::PersistPtr(p) => p.payload_len(),
            RecordBody::Encryption(e) => e.payload_len(),
            RecordBody::BlipEntry(b) => b.payload_len(),
        }
    }

    #[inline]
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.payload_len()
    }

    /// Sync the stored header length with the current body (recursively).
    pub fn refresh_length(&mut self) {
        if let RecordBody::Container(c) = &mut self.body {
            for child in c.iter_mut() {
                child.refresh_length();
            }
        }
        self.header.length = self.payload_len() as u32;
    }

    /// Header with the length the record would be written with.
    pub fn current_header(&self) -> RecordHeader {
        self.header.with_length(self.payload_len() as u32)
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.current_header().to_bytes())?;
        match &self.body {
            RecordBody::Atom(b) => w.write_all(b),
            RecordBody::Container(c) => {
                for child in c {
                    child.write_to(w)?;
                }
                Ok(())
            }
            RecordBody::UserEdit(u) => write_typed(u, w),
            RecordBody::PersistPtr(p) => write_typed(p, w),
            RecordBody::Encryption(e) => write_typed(e, w),
            RecordBody::BlipEntry(b) => write_typed(b, w),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        // Vec<u8> never fails as an io::Write sink.
        let _ = self.write_to(&mut out);
        out
    }
}

fn write_typed<T: TypedAtom, W: Write + ?Sized>(t: &T, w: &mut W) -> io::Result<()> {
    let mut buf = Vec::with_capacity(t.payload_len());
    t.encode(&mut buf);
    w.write_all(&buf)
}

impl PositionDependent for Record {
    fn update_other_record_references(&mut self, old_to_new: &HashMap<u32, u32>) -> Result<()> {
        match &mut self.body {
            RecordBody::UserEdit(u) => u.update_other_record_references(old_to_new),
            RecordBody::PersistPtr(p) => p.update_other_record_references(old_to_new),
            _ => Ok(()),
        }
    }
}

impl From<UserEditAtom> for Record {
    fn from(u: UserEditAtom) -> Self {
        Record::from_parts(UserEditAtom::header(), RecordBody::UserEdit(u))
    }
}

impl From<DocumentEncryptionAtom> for Record {
    fn from(e: DocumentEncryptionAtom) -> Self {
        Record::from_parts(DocumentEncryptionAtom::header(), RecordBody::Encryption(e))
    }
}

impl From<BlipStoreEntry> for Record {
    fn from(b: BlipStoreEntry) -> Self {
        let h = b.header();
        Record::from_parts(h, RecordBody::BlipEntry(b))
    }
}
