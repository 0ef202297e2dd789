//! slideshow: open document handle over the three streams.
//!
//! SlideShowFile owns:
//! - the top-level record list (stream order),
//! - the Current User atom (entry into the revision chain),
//! - the persist index (id -> position in the list),
//! - the encryption session (from the configured password),
//! - the picture blobs, each linked to its blip store descriptor.
//!
//! Layout:
//! - open.rs: load pipeline (current user, chain walk, decrypt, decode, pictures).
//! - save.rs: pictures, then the document stream, then Current User.
//! - edit.rs: appends, persist objects, normalize, password, pictures.

use crate::config::PptConfig;
use crate::consts::*;
use crate::crypto::EncryptionSession;
use crate::error::{PptError, Result};
use crate::persist::PersistIndex;
use crate::pictures::{find_bstore, MatchReport, PictureData};
use crate::record::{CurrentUserAtom, PersistPtrHolder, Record, RecordBody, RecordHeader, UserEditAtom};
use crate::writer;

mod open;
mod save;
mod edit;

/// DocumentAtom of a new document: 10in x 7.5in slides in master units.
const NEW_SLIDE_SIZE: (i32, i32) = (5760, 4320);

pub struct SlideShowFile {
    cfg: PptConfig,
    records: Vec<Record>,
    current_user: CurrentUserAtom,
    index: PersistIndex,
    session: EncryptionSession,
    pictures: Vec<PictureData>,
    match_report: MatchReport,
}

impl std::fmt::Debug for SlideShowFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlideShowFile")
            .field("records", &self.records.len())
            .field("persist_ids", &self.index.len())
            .field("pictures", &self.pictures.len())
            .field("encrypted", &self.session.is_encrypted())
            .field("current_edit", &self.current_user.current_edit_offset)
            .finish()
    }
}

impl SlideShowFile {
    /// Minimal valid document: Document container (with its DocumentAtom),
    /// one PersistPtrHolder and one UserEditAtom.
    pub fn create(cfg: PptConfig) -> Result<Self> {
        let document = Record::container(
            RT_DOCUMENT,
            0,
            vec![Record::from_parts(
                RecordHeader::new(1, 0, RT_DOCUMENT_ATOM, 0),
                RecordBody::Atom(new_document_atom()),
            )],
        );
        let mut records = vec![
            document,
            Record::from(PersistPtrHolder::new()),
            Record::from(UserEditAtom::new(1, 1)),
        ];

        writer::dry_run(&mut records)?;
        let doc_off = records[0].last_on_disk_offset().unwrap_or(0);
        let pph_off = records[1].last_on_disk_offset().unwrap_or(0);
        records[0].set_persist_id(Some(1));
        if let Some(pph) = records[1].as_persist_ptr_mut() {
            pph.add_slide_lookup(1, doc_off)?;
        }
        if let Some(uea) = records[2].as_user_edit_mut() {
            uea.persist_pointers_offset = pph_off;
        }

        let mut ss = Self {
            cfg,
            records,
            current_user: CurrentUserAtom::default(),
            index: PersistIndex::default(),
            session: EncryptionSession::plaintext(),
            pictures: Vec::new(),
            match_report: MatchReport::default(),
        };
        ss.relayout()?;
        Ok(ss)
    }

    pub fn config(&self) -> &PptConfig {
        &self.cfg
    }

    /// Top-level records in stream order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn current_user(&self) -> &CurrentUserAtom {
        &self.current_user
    }

    pub fn persist_index(&self) -> &PersistIndex {
        &self.index
    }

    pub fn is_encrypted(&self) -> bool {
        self.session.is_encrypted()
    }

    pub fn pictures(&self) -> &[PictureData] {
        &self.pictures
    }

    /// Outcome of the picture/descriptor matching done at open.
    pub fn match_report(&self) -> MatchReport {
        self.match_report
    }

    /// Most recent record for `persist_id`.
    pub fn resolve(&self, persist_id: u32) -> Option<&Record> {
        self.index.resolve(&self.records, persist_id)
    }

    /// The active UserEditAtom (last one in the list).
    pub fn user_edit(&self) -> Option<&UserEditAtom> {
        self.records.iter().rev().find_map(Record::as_user_edit)
    }

    fn user_edit_index(&self) -> Option<usize> {
        self.records.iter().rposition(|r| r.as_user_edit().is_some())
    }

    fn persist_ptr_index(&self) -> Option<usize> {
        self.records.iter().rposition(Record::is_persist_ptr_holder)
    }

    /// The record named by UserEditAtom.docPersistIdRef.
    pub fn document_record(&self) -> Option<&Record> {
        let idx = self.document_index()?;
        self.records.get(idx)
    }

    pub fn document_record_mut(&mut self) -> Option<&mut Record> {
        let idx = self.document_index()?;
        self.records.get_mut(idx)
    }

    fn document_index(&self) -> Option<usize> {
        let doc_ref = self.user_edit()?.doc_persist_id_ref;
        self.index.record_index(doc_ref)
    }

    /// Blip store of the document record, if it has one.
    pub fn blip_store(&self) -> Option<&Record> {
        find_bstore(self.document_record()?)
    }

    /// Assign fresh offsets, rewrite every stored reference to match, then
    /// rebuild the persist index.
    fn relayout(&mut self) -> Result<()> {
        writer::relayout(&mut self.records)?;
        self.current_user.current_edit_offset = self
            .user_edit_index()
            .and_then(|i| self.records[i].last_on_disk_offset())
            .ok_or_else(|| PptError::corrupt("document has no UserEditAtom"))?;
        self.reindex()
    }

    fn reindex(&mut self) -> Result<()> {
        self.index = PersistIndex::build(
            &self.records,
            self.current_user.current_edit_offset,
            self.cfg.repair_edit_chain,
        )?;
        Ok(())
    }
}

fn new_document_atom() -> Vec<u8> {
    let mut b = Vec::with_capacity(40);
    // slideSize, notesSize
    b.extend_from_slice(&NEW_SLIDE_SIZE.0.to_le_bytes());
    b.extend_from_slice(&NEW_SLIDE_SIZE.1.to_le_bytes());
    b.extend_from_slice(&NEW_SLIDE_SIZE.1.to_le_bytes());
    b.extend_from_slice(&NEW_SLIDE_SIZE.0.to_le_bytes());
    // serverZoom 1/2
    b.extend_from_slice(&1i32.to_le_bytes());
    b.extend_from_slice(&2i32.to_le_bytes());
    // notesMasterPersistIdRef, handoutMasterPersistIdRef
    b.extend_from_slice(&0u32.to_le_bytes());
    b.extend_from_slice(&0u32.to_le_bytes());
    // firstSlideNumber, slideSizeType
    b.extend_from_slice(&1u16.to_le_bytes());
    b.extend_from_slice(&0u16.to_le_bytes());
    // fSaveWithFonts, fOmitTitlePlace, fRightToLeft, fShowComments
    b.extend_from_slice(&[0, 0, 0, 1]);
    b
}
