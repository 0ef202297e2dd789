//! pictures/matcher: pair blobs with their blip store descriptors.
//!
//! Three greedy passes, most confident first:
//! 1) offset: a descriptor whose foDelay equals the blob's position. Several
//!    descriptors on one offset are told apart by uid.
//! 2) uid: any remaining descriptor with the blob's uid. Its offset was stale
//!    and is corrected to the blob's position.
//! 3) synthesis: a new descriptor is appended to the blip store.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use serde::Serialize;

use crate::consts::*;
use crate::record::{BlipStoreEntry, Record};

use super::PictureData;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub by_offset: usize,
    pub by_uid: usize,
    pub synthesized: usize,
    pub unmatched_descriptors: usize,
}

/// Document -> PPDrawingGroup -> DggContainer -> BStoreContainer.
/// With `create`, missing containers are added.
pub fn find_bstore_mut(doc: &mut Record, create: bool) -> Option<&mut Record> {
    fn child_mut(parent: &mut Record, rec_type: u16, create: bool) -> Option<&mut Record> {
        if parent.find_child(rec_type).is_none() {
            if !create {
                return None;
            }
            parent
                .children_mut()?
                .push(Record::container(rec_type, 0, Vec::new()));
        }
        parent.find_child_mut(rec_type)
    }

    let group = child_mut(doc, RT_PP_DRAWING_GROUP, create)?;
    let dgg = child_mut(group, ESCHER_DGG_CONTAINER, create)?;
    child_mut(dgg, ESCHER_BSTORE_CONTAINER, create)
}

pub fn find_bstore(doc: &Record) -> Option<&Record> {
    doc.find_child(RT_PP_DRAWING_GROUP)?
        .find_child(ESCHER_DGG_CONTAINER)?
        .find_child(ESCHER_BSTORE_CONTAINER)
}

/// Store instance = number of entries.
pub fn refresh_bstore_instance(bstore: &mut Record) {
    let n = bstore
        .children()
        .iter()
        .filter(|c| c.as_blip_entry().is_some())
        .count();
    bstore.set_instance(n as u16);
}

/// Match `pictures` against the BSE children of `bstore`, setting each
/// picture's descriptor index.
pub fn match_pictures(pictures: &mut [PictureData], bstore: &mut Record) -> MatchReport {
    let mut report = MatchReport::default();
    let Some(children) = bstore.children_mut() else {
        return report;
    };

    let mut free: BTreeSet<usize> = children
        .iter()
        .enumerate()
        .filter(|(_, c)| c.as_blip_entry().is_some())
        .map(|(i, _)| i)
        .collect();

    let mut by_offset: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for &i in &free {
        if let Some(bse) = children[i].as_blip_entry() {
            by_offset.entry(bse.offset).or_default().push(i);
        }
    }

    let mut order: Vec<usize> = (0..pictures.len()).collect();
    order.sort_by_key(|&p| pictures[p].offset.unwrap_or(u32::MAX));

    // Pass 1: exact offset.
    for &p in &order {
        let Some(off) = pictures[p].offset else { continue };
        let Some(candidates) = by_offset.get(&off) else { continue };
        let live: Vec<usize> = candidates.iter().copied().filter(|i| free.contains(i)).collect();
        let chosen = match live.len() {
            0 => None,
            1 => Some(live[0]),
            _ => {
                let uid = pictures[p].uid();
                live.into_iter()
                    .find(|&i| children[i].as_blip_entry().map(|b| b.uid == uid).unwrap_or(false))
            }
        };
        if let Some(i) = chosen {
            free.remove(&i);
            pictures[p].descriptor = Some(i);
            report.by_offset += 1;
        }
    }

    // Pass 2: uid only, correcting the stored offset.
    for &p in &order {
        if pictures[p].descriptor.is_some() {
            continue;
        }
        let uid = pictures[p].uid();
        let hit = free
            .iter()
            .copied()
            .find(|&i| children[i].as_blip_entry().map(|b| b.uid == uid).unwrap_or(false));
        if let Some(i) = hit {
            free.remove(&i);
            if let (Some(bse), Some(off)) = (children[i].as_blip_entry_mut(), pictures[p].offset) {
                if bse.offset != off {
                    info!(
                        "blip store entry {} had stale offset {}, corrected to {}",
                        i, bse.offset, off
                    );
                    bse.offset = off;
                }
            }
            pictures[p].descriptor = Some(i);
            report.by_uid += 1;
        }
    }

    // Pass 3: synthesize descriptors for orphan blobs.
    for &p in &order {
        if pictures[p].descriptor.is_some() {
            continue;
        }
        let Some(ptype) = pictures[p].picture_type() else { continue };
        let bse = BlipStoreEntry::new(
            ptype.native_id(),
            pictures[p].uid(),
            pictures[p].stream_len() as u32,
            pictures[p].offset.unwrap_or(0),
        );
        debug!(
            "no descriptor for picture at {:?}; adding one",
            pictures[p].offset
        );
        children.push(Record::from(bse));
        pictures[p].descriptor = Some(children.len() - 1);
        report.synthesized += 1;
    }

    report.unmatched_descriptors = free.len();
    if !free.is_empty() {
        debug!("{} blip store entries have no blob in the picture stream", free.len());
    }
    refresh_bstore_instance(bstore);
    report
}
