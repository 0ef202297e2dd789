//! persist/chain: walk of the UserEditAtom revision list.
//!
//! Starts at the current-edit offset and follows `last_user_edit_atom_offset`
//! back to 0. Every step loads the revision's PersistPtrHolder. The walk runs
//! either over the raw document bytes (load, before anything is decrypted) or
//! over an already-decoded list of top-level records.
//!
//! Cycle repair: when the next edit offset has already been visited, the true
//! atom is assumed to sit EDIT_CHAIN_REPAIR_DISTANCE bytes before the smallest
//! bookkeeping offset seen so far. The guess is accepted only if a UserEditAtom
//! header is found there; otherwise the document is corrupt.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, warn};

use crate::consts::EDIT_CHAIN_REPAIR_DISTANCE;
use crate::error::{PptError, Result};
use crate::record::{PersistPtrHolder, Record, RecordCodec, RecordHeader, UserEditAtom};

/// Where the chain walk gets its atoms from.
pub trait ChainSource {
    fn user_edit(&self, offset: u32) -> Result<UserEditAtom>;
    fn persist_ptr(&self, offset: u32) -> Result<PersistPtrHolder>;
    /// Plaintext header at `offset`, if there is one.
    fn header_at(&self, offset: u32) -> Option<RecordHeader>;
}

/// Raw "PowerPoint Document" bytes. Bookkeeping atoms are never encrypted,
/// so this works before the encryption session exists.
pub struct RawSource<'a> {
    doc: &'a [u8],
    codec: RecordCodec<'a>,
}

impl<'a> RawSource<'a> {
    pub fn new(doc: &'a [u8], codec: RecordCodec<'a>) -> Self {
        Self { doc, codec }
    }

    fn decode(&self, offset: u32, what: &str) -> Result<Record> {
        self.codec
            .decode(self.doc, offset as usize)
            .map(|(r, _)| r)
            .map_err(|e| match e {
                PptError::Corrupt(msg) => {
                    PptError::corrupt(format!("{} at offset {}: {}", what, offset, msg))
                }
                other => other,
            })
    }
}

impl<'a> ChainSource for RawSource<'a> {
    fn user_edit(&self, offset: u32) -> Result<UserEditAtom> {
        let rec = self.decode(offset, "UserEditAtom")?;
        rec.as_user_edit().cloned().ok_or_else(|| {
            PptError::corrupt(format!(
                "expected a UserEditAtom at offset {}, found record type {}",
                offset,
                rec.rec_type()
            ))
        })
    }

    fn persist_ptr(&self, offset: u32) -> Result<PersistPtrHolder> {
        let rec = self.decode(offset, "PersistPtrHolder")?;
        rec.as_persist_ptr().cloned().ok_or_else(|| {
            PptError::corrupt(format!(
                "expected a PersistPtrHolder at offset {}, found record type {}",
                offset,
                rec.rec_type()
            ))
        })
    }

    fn header_at(&self, offset: u32) -> Option<RecordHeader> {
        RecordHeader::read(self.doc, offset as usize).ok()
    }
}

/// Decoded top-level records, looked up by `last_on_disk_offset`.
pub struct RecordSource<'a> {
    records: &'a [Record],
    by_offset: HashMap<u32, usize>,
}

impl<'a> RecordSource<'a> {
    pub fn new(records: &'a [Record]) -> Self {
        let by_offset = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.last_on_disk_offset().map(|o| (o, i)))
            .collect();
        Self { records, by_offset }
    }

    fn at(&self, offset: u32) -> Option<&'a Record> {
        self.by_offset.get(&offset).map(|&i| &self.records[i])
    }
}

impl<'a> ChainSource for RecordSource<'a> {
    fn user_edit(&self, offset: u32) -> Result<UserEditAtom> {
        self.at(offset)
            .and_then(Record::as_user_edit)
            .cloned()
            .ok_or_else(|| {
                PptError::corrupt(format!("no UserEditAtom at offset {}", offset))
            })
    }

    fn persist_ptr(&self, offset: u32) -> Result<PersistPtrHolder> {
        self.at(offset)
            .and_then(Record::as_persist_ptr)
            .cloned()
            .ok_or_else(|| {
                PptError::corrupt(format!("no PersistPtrHolder at offset {}", offset))
            })
    }

    fn header_at(&self, offset: u32) -> Option<RecordHeader> {
        self.at(offset).map(Record::current_header)
    }
}

/// One save state.
#[derive(Debug, Clone)]
pub struct Revision {
    pub edit_offset: u32,
    pub persist_offset: u32,
    pub edit: UserEditAtom,
    pub holder: PersistPtrHolder,
}

/// A repaired back link: the atom at `edit_offset` now points at `repaired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainRepair {
    pub edit_offset: u32,
    pub broken: u32,
    pub repaired: u32,
}

/// Revisions newest first.
#[derive(Debug, Clone, Default)]
pub struct EditChain {
    revisions: Vec<Revision>,
    repairs: Vec<ChainRepair>,
}

impl EditChain {
    /// Walk the chain over raw document bytes.
    pub fn read(doc: &[u8], current_edit: u32, codec: RecordCodec<'_>, repair: bool) -> Result<Self> {
        Self::walk(&RawSource::new(doc, codec), current_edit, repair)
    }

    /// Walk the chain over decoded top-level records.
    pub fn from_records(records: &[Record], current_edit: u32, repair: bool) -> Result<Self> {
        Self::walk(&RecordSource::new(records), current_edit, repair)
    }

    pub fn walk<S: ChainSource + ?Sized>(src: &S, current_edit: u32, repair: bool) -> Result<Self> {
        let mut chain = EditChain::default();
        // Offsets of every UserEditAtom, PersistPtrHolder and persist object
        // seen so far.
        let mut known: BTreeSet<u32> = BTreeSet::new();
        let mut usr_offset = current_edit;

        if usr_offset == 0 {
            return Err(PptError::corrupt(
                "current edit offset is 0; the document has no UserEditAtom",
            ));
        }

        while usr_offset != 0 {
            let mut edit = src.user_edit(usr_offset)?;
            known.insert(usr_offset);
            let persist_offset = edit.persist_pointers_offset;
            let holder = src.persist_ptr(persist_offset)?;
            known.insert(persist_offset);
            known.extend(holder.slide_locations().values().copied());

            let mut next = edit.last_user_edit_atom_offset;
            if next > 0 && known.contains(&next) {
                if !repair {
                    return Err(PptError::corrupt(format!(
                        "UserEditAtom at {} links back to already visited offset {}",
                        usr_offset, next
                    )));
                }
                let fixed = repair_target(src, &known, usr_offset, next)?;
                warn!(
                    "repairing invalid UserEditAtom link at {}: {} -> {}",
                    usr_offset, next, fixed
                );
                chain.repairs.push(ChainRepair {
                    edit_offset: usr_offset,
                    broken: next,
                    repaired: fixed,
                });
                edit.last_user_edit_atom_offset = fixed;
                next = fixed;
            }

            debug!(
                "revision at {}: persist holder at {} with {} entries",
                usr_offset,
                persist_offset,
                holder.len()
            );
            chain.revisions.push(Revision {
                edit_offset: usr_offset,
                persist_offset,
                edit,
                holder,
            });
            usr_offset = next;
        }
        Ok(chain)
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    /// The revision named by the current-edit offset.
    pub fn newest(&self) -> Option<&Revision> {
        self.revisions.first()
    }

    pub fn repairs(&self) -> &[ChainRepair] {
        &self.repairs
    }

    /// persist id -> offset of its most recent definition.
    ///
    /// Newest revision first; an id already set is never overwritten by an
    /// older holder. Inside one holder the later table entry has already won.
    pub fn resolve_offsets(&self) -> BTreeMap<u32, u32> {
        let mut out = BTreeMap::new();
        for rev in &self.revisions {
            for (&id, &off) in rev.holder.slide_locations() {
                out.entry(id).or_insert(off);
            }
        }
        out
    }

    /// Every offset referenced by any holder in the chain -> its persist id.
    /// Stale copies of a persist object are included.
    pub fn persist_offsets(&self) -> BTreeMap<u32, u32> {
        let mut out = BTreeMap::new();
        for rev in &self.revisions {
            for (&id, &off) in rev.holder.slide_locations() {
                let kept = *out.entry(off).or_insert(id);
                if kept != id {
                    debug!(
                        "offset {} is listed under persist ids {} and {}; keeping {}",
                        off, kept, id, kept
                    );
                }
            }
        }
        out
    }

    /// Offsets of all UserEditAtoms and PersistPtrHolders in the chain.
    pub fn bookkeeping_offsets(&self) -> BTreeSet<u32> {
        self.revisions
            .iter()
            .flat_map(|r| [r.edit_offset, r.persist_offset])
            .collect()
    }

    /// Persist id of the encryption descriptor named by the newest revision.
    pub fn encryption_persist_id(&self) -> Option<u32> {
        self.newest()
            .and_then(|r| r.edit.encrypt_session_persist_id_ref)
    }
}

fn repair_target<S: ChainSource + ?Sized>(
    src: &S,
    known: &BTreeSet<u32>,
    at: u32,
    broken: u32,
) -> Result<u32> {
    let smallest = known.iter().next().copied().unwrap_or(0);
    let fail = || {
        PptError::corrupt(format!(
            "document contains an invalid UserEditAtom link at {} (points back to {})",
            at, broken
        ))
    };
    // 0 terminates the chain, so no link can name an atom there.
    let candidate = smallest
        .checked_sub(EDIT_CHAIN_REPAIR_DISTANCE)
        .filter(|c| *c > 0 && !known.contains(c))
        .ok_or_else(fail)?;
    match src.header_at(candidate) {
        Some(h) if UserEditAtom::is_valid_header(&h) => Ok(candidate),
        _ => Err(fail()),
    }
}

