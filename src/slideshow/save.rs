use log::{debug, info};

use crate::consts::*;
use crate::error::{PptError, Result};
use crate::pictures::{find_bstore_mut, write_pictures};
use crate::streams::StreamStore;
use crate::writer::{self, SerializeOutcome};

use super::SlideShowFile;

impl SlideShowFile {
    /// Write all three streams.
    ///
    /// Pictures go first: their new positions and sizes land in the blip
    /// store descriptors, which are part of the document stream written next.
    /// Current User is written last with the new edit offset.
    pub fn write<S: StreamStore + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        self.write_picture_stream(store)?;

        let outcome = self.serialize()?;
        store.write_stream(STREAM_DOCUMENT, &outcome.bytes)?;

        self.current_user.current_edit_offset = outcome.current_edit_offset;
        self.current_user.encrypted = self.session.is_encrypted();
        store.write_stream(STREAM_CURRENT_USER, &self.current_user.to_bytes())?;

        self.reindex()?;
        info!(
            "saved document: {} bytes, {} top-level records, {} picture(s), current edit at {}",
            outcome.bytes.len(),
            self.records.len(),
            self.pictures.len(),
            outcome.current_edit_offset
        );
        Ok(())
    }

    /// Serialize the document stream only (records get their new offsets).
    pub fn serialize(&mut self) -> Result<SerializeOutcome> {
        let outcome = writer::serialize(&mut self.records, &self.session)?;
        if outcome.bytes.len() > self.cfg.max_document_bytes {
            return Err(PptError::DocumentTooLarge {
                len: outcome.bytes.len(),
                limit: self.cfg.max_document_bytes,
            });
        }
        Ok(outcome)
    }

    fn write_picture_stream<S: StreamStore + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        if self.pictures.is_empty() {
            return store.remove_stream(STREAM_PICTURES);
        }
        let bytes = write_pictures(&mut self.pictures, &self.session)?;

        if let Some(i) = self.document_index() {
            if let Some(bstore) = find_bstore_mut(&mut self.records[i], false) {
                let mut children = bstore.children_mut();
                for pict in &self.pictures {
                    let (Some(d), Some(off)) = (pict.descriptor, pict.offset) else {
                        continue;
                    };
                    if let Some(bse) = children
                        .as_deref_mut()
                        .and_then(|c| c.get_mut(d))
                        .and_then(|r| r.as_blip_entry_mut())
                    {
                        bse.offset = off;
                        bse.size = pict.stream_len() as u32;
                    }
                }
            }
        }
        debug!("picture stream: {} bytes", bytes.len());
        store.write_stream(STREAM_PICTURES, &bytes)
    }
}
