use log::info;

use crate::consts::*;
use crate::crypto::EncryptionSession;
use crate::error::{PptError, Result};
use crate::pictures::{find_bstore_mut, refresh_bstore_instance, PictureData, PictureType};
use crate::record::{BlipStoreEntry, Record, RecordBody};
use crate::writer;

use super::SlideShowFile;

impl SlideShowFile {
    /// Insert `rec` just before the last PersistPtrHolder. Returns its
    /// position in the top-level list.
    pub fn append_root_level_record(&mut self, mut rec: Record) -> Result<usize> {
        let at = self.persist_ptr_index().ok_or_else(|| {
            PptError::corrupt("cannot append a record: no PersistPtrHolder in the document")
        })?;
        rec.set_last_on_disk_offset(None);
        self.records.insert(at, rec);
        self.reindex()?;
        Ok(at)
    }

    /// Append `rec` and register it as a new persist object.
    /// Returns the assigned persist id (maxPersistWritten + 1).
    pub fn add_persistent_record(&mut self, rec: Record) -> Result<u32> {
        let at = self.append_root_level_record(rec)?;
        writer::relayout(&mut self.records)?;

        let uea_idx = self
            .user_edit_index()
            .ok_or_else(|| PptError::corrupt("document has no UserEditAtom"))?;
        let pph_idx = self
            .persist_ptr_index()
            .ok_or_else(|| PptError::corrupt("document has no PersistPtrHolder"))?;

        let offset = self.records[at]
            .last_on_disk_offset()
            .ok_or_else(|| PptError::corrupt("new record was not given an offset"))?;

        let persist_id = match self.records[uea_idx].as_user_edit_mut() {
            Some(uea) => {
                let id = uea.max_persist_written + 1;
                uea.last_view_type = LAST_VIEW_SLIDE_VIEW;
                uea.max_persist_written = id;
                id
            }
            None => return Err(PptError::corrupt("document has no UserEditAtom")),
        };
        if let Some(pph) = self.records[pph_idx].as_persist_ptr_mut() {
            pph.add_slide_lookup(persist_id, offset)?;
        }
        self.records[at].set_persist_id(Some(persist_id));
        info!("new persist object {} ended up at {}", persist_id, offset);

        // The holder grew; everything after it moved.
        self.relayout()?;
        Ok(persist_id)
    }

    /// Collapse the revision history to a single save state.
    pub fn normalize_records(&mut self) -> Result<bool> {
        let changed = writer::normalize_records(&mut self.records)?;
        self.relayout()?;
        Ok(changed)
    }

    /// Set, replace (Some) or remove (None) the document password. Takes
    /// effect on the next write.
    pub fn set_password(&mut self, password: Option<&str>) -> Result<()> {
        match password {
            Some(pw) => self.add_encryption(pw),
            None => self.remove_encryption(),
        }
    }

    fn encryption_persist_id(&self) -> Option<u32> {
        self.user_edit()?.encrypt_session_persist_id_ref
    }

    fn add_encryption(&mut self, password: &str) -> Result<()> {
        let (session, atom) = EncryptionSession::create(password)?;

        let existing = self
            .encryption_persist_id()
            .and_then(|id| self.index.record_index(id))
            .filter(|&i| self.records[i].as_encryption_atom().is_some());

        match existing {
            Some(i) => {
                *self.records[i].body_mut() = RecordBody::Encryption(atom);
            }
            None => {
                let id = self.add_persistent_record(Record::from(atom))?;
                if let Some(uea) = self
                    .user_edit_index()
                    .and_then(|i| self.records[i].as_user_edit_mut())
                {
                    uea.encrypt_session_persist_id_ref = Some(id);
                }
                self.relayout()?;
            }
        }
        self.session = session;
        self.current_user.encrypted = true;
        info!("document password set");
        Ok(())
    }

    fn remove_encryption(&mut self) -> Result<()> {
        let id = match self.encryption_persist_id() {
            Some(id) => id,
            None => {
                self.session = EncryptionSession::plaintext();
                self.current_user.encrypted = false;
                return Ok(());
            }
        };

        // Every copy of the descriptor, current and stale.
        let before = self.records.len();
        self.records
            .retain(|r| !(r.as_encryption_atom().is_some() && r.persist_id() == Some(id)));
        let dropped = before - self.records.len();
        for rec in self.records.iter_mut() {
            if let Some(pph) = rec.as_persist_ptr_mut() {
                pph.remove(id);
            }
        }
        let remaining_max = self
            .records
            .iter()
            .filter_map(Record::as_persist_ptr)
            .flat_map(|p| p.known_ids())
            .max()
            .unwrap_or(0);
        if let Some(uea) = self
            .user_edit_index()
            .and_then(|i| self.records[i].as_user_edit_mut())
        {
            uea.encrypt_session_persist_id_ref = None;
            if uea.max_persist_written == id {
                uea.max_persist_written = remaining_max;
            }
        }

        self.session = EncryptionSession::plaintext();
        self.current_user.encrypted = false;
        self.relayout()?;
        info!(
            "document password removed ({} descriptor record(s) dropped)",
            dropped
        );
        Ok(())
    }

    /// Add a picture: a new blob plus its blip store descriptor. A picture
    /// with the same content already present is reused. Returns the 1-based
    /// blip index used by shapes to reference it.
    pub fn add_picture(&mut self, ptype: PictureType, image: &[u8]) -> Result<usize> {
        if image.len() > self.cfg.max_record_bytes {
            return Err(PptError::RecordTooLarge {
                offset: 0,
                len: image.len(),
                limit: self.cfg.max_record_bytes,
            });
        }
        let mut pict = PictureData::new(ptype, image)?;
        let uid = pict.uid();

        let doc_idx = self
            .document_index()
            .ok_or_else(|| PptError::corrupt("document record could not be resolved"))?;
        let bstore = find_bstore_mut(&mut self.records[doc_idx], true)
            .ok_or_else(|| PptError::corrupt("document record is not a container"))?;
        let children = bstore
            .children_mut()
            .ok_or_else(|| PptError::corrupt("blip store is not a container"))?;

        if let Some(i) = children
            .iter()
            .position(|c| c.as_blip_entry().map(|b| b.uid == uid).unwrap_or(false))
        {
            if self.pictures.iter().any(|p| p.descriptor == Some(i)) {
                return Ok(i + 1);
            }
        }

        let bse = BlipStoreEntry::new(ptype.native_id(), uid, pict.stream_len() as u32, 0);
        children.push(Record::from(bse));
        let idx = children.len() - 1;
        refresh_bstore_instance(bstore);

        pict.descriptor = Some(idx);
        self.pictures.push(pict);
        Ok(idx + 1)
    }
}
