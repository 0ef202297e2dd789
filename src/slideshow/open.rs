use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::config::PptConfig;
use crate::consts::*;
use crate::crypto::EncryptionSession;
use crate::error::{PptError, Result};
use crate::persist::{EditChain, PersistIndex};
use crate::pictures::{find_bstore_mut, match_pictures, read_pictures, MatchReport};
use crate::record::{CurrentUserAtom, Record, RecordCodec};
use crate::streams::StreamStore;

use super::SlideShowFile;

/// What gets decoded at one offset of the document stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Bookkeeping,
    Persist(u32),
}

impl SlideShowFile {
    /// Load a document from its streams.
    ///
    /// 1) Current User -> current edit offset (old format detected here).
    /// 2) Revision chain over the raw document bytes (with repair).
    /// 3) Encryption descriptor -> session (configured or default password).
    /// 4) Every bookkeeping and persist offset: decrypt in place, decode.
    /// 5) Persist index, then the picture stream matched against the blip store.
    pub fn open<S: StreamStore + ?Sized>(store: &S, cfg: PptConfig) -> Result<Self> {
        let cu_bytes = match store.read_stream(STREAM_CURRENT_USER)? {
            Some(b) => b,
            None if store.read_stream(STREAM_PP40)?.is_some() => {
                return Err(PptError::OldFormat(
                    "PowerPoint 4.0 documents are not supported".to_string(),
                ))
            }
            None => return Err(PptError::MissingStream(STREAM_CURRENT_USER.to_string())),
        };
        let current_user = CurrentUserAtom::parse(&cu_bytes)?;

        let mut doc = store.require_stream(STREAM_DOCUMENT)?;
        if doc.len() > cfg.max_document_bytes {
            return Err(PptError::DocumentTooLarge {
                len: doc.len(),
                limit: cfg.max_document_bytes,
            });
        }

        let codec = RecordCodec::from_config(&cfg);
        let chain = EditChain::read(
            &doc,
            current_user.current_edit_offset,
            codec,
            cfg.repair_edit_chain,
        )?;
        for r in chain.repairs() {
            info!(
                "edit chain repaired: atom at {} now links to {} (was {})",
                r.edit_offset, r.repaired, r.broken
            );
        }

        let session = open_session(&doc, &chain, &current_user, codec, &cfg)?;

        let mut slots: BTreeMap<u32, Slot> = chain
            .persist_offsets()
            .into_iter()
            .map(|(off, id)| (off, Slot::Persist(id)))
            .collect();
        for off in chain.bookkeeping_offsets() {
            slots.insert(off, Slot::Bookkeeping);
        }

        let mut records: Vec<Record> = Vec::with_capacity(slots.len());
        for (&off, &slot) in &slots {
            if let Slot::Persist(id) = slot {
                session.decrypt_record(&mut doc, id, off as usize)?;
            }
            let (mut rec, _) = codec.decode(&doc, off as usize)?;
            if let Slot::Persist(id) = slot {
                rec.set_persist_id(Some(id));
            }
            records.push(rec);
        }

        // Carry chain repairs into the decoded atoms.
        for r in chain.repairs() {
            if let Some(uea) = records
                .iter_mut()
                .find(|rec| rec.last_on_disk_offset() == Some(r.edit_offset))
                .and_then(Record::as_user_edit_mut)
            {
                uea.last_user_edit_atom_offset = r.repaired;
            }
        }

        let index = PersistIndex::from_chain(&records, chain);
        debug!(
            "loaded {} top-level records, {} persist ids",
            records.len(),
            index.len()
        );

        let mut ss = SlideShowFile {
            cfg,
            records,
            current_user,
            index,
            session,
            pictures: Vec::new(),
            match_report: MatchReport::default(),
        };
        ss.load_pictures(store)?;
        Ok(ss)
    }

    fn load_pictures<S: StreamStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        let mut stream = match store.read_stream(STREAM_PICTURES)? {
            Some(b) => b,
            None => return Ok(()),
        };
        self.pictures = read_pictures(&mut stream, &self.session, self.cfg.max_record_bytes)?;
        if self.pictures.is_empty() {
            return Ok(());
        }

        let doc = match self.document_index() {
            Some(i) => &mut self.records[i],
            None => {
                warn!(
                    "{} picture(s) found but the document record could not be resolved",
                    self.pictures.len()
                );
                return Ok(());
            }
        };
        let bstore = match find_bstore_mut(doc, true) {
            Some(b) => b,
            None => {
                warn!("document record is not a container; pictures left unmatched");
                return Ok(());
            }
        };
        let report = match_pictures(&mut self.pictures, bstore);
        debug!("picture matching: {:?}", report);
        self.match_report = report;
        Ok(())
    }
}

fn open_session(
    doc: &[u8],
    chain: &EditChain,
    current_user: &CurrentUserAtom,
    codec: RecordCodec<'_>,
    cfg: &PptConfig,
) -> Result<EncryptionSession> {
    let descriptor_offset = chain
        .encryption_persist_id()
        .and_then(|id| chain.resolve_offsets().get(&id).copied());

    let off = match descriptor_offset {
        Some(off) => off,
        None if current_user.encrypted => {
            return Err(PptError::encrypted(
                "Current User marks the document encrypted but no encryption descriptor is reachable",
            ))
        }
        None => return Ok(EncryptionSession::plaintext()),
    };

    let (rec, _) = codec.decode(doc, off as usize)?;
    let atom = rec.as_encryption_atom().ok_or_else(|| {
        PptError::encrypted(format!(
            "expected the encryption descriptor at offset {}, found record type {}",
            off,
            rec.rec_type()
        ))
    })?;
    if !current_user.encrypted {
        warn!("encryption descriptor present but Current User carries the plain header token");
    }
    EncryptionSession::open(atom, cfg.password.as_deref())
}
