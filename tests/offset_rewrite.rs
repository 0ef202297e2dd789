use anyhow::Result;

use pptstore::consts::*;
use pptstore::{
    serialize, ConfigBuilder, EncryptionSession, MemoryStreams, PptConfig, Record, RecordBody,
    RecordCodec, SlideShowFile, StreamStore,
};

fn cfg() -> PptConfig {
    ConfigBuilder::from_default().build()
}

fn slide(tag: &[u8]) -> Record {
    Record::container(RT_SLIDE, 0, vec![Record::atom(RT_SLIDE_ATOM, 0, tag.to_vec())])
}

fn stream(store: &MemoryStreams, name: &str) -> Result<Vec<u8>> {
    Ok(store.require_stream(name)?)
}

/// Fresh document with two slides, written once.
fn saved_deck() -> Result<(MemoryStreams, u32, u32)> {
    let mut ss = SlideShowFile::create(cfg())?;
    let a = ss.add_persistent_record(slide(b"alpha"))?;
    let b = ss.add_persistent_record(slide(b"beta"))?;
    let mut store = MemoryStreams::new();
    ss.write(&mut store)?;
    Ok((store, a, b))
}

#[test]
fn create_assigns_ids_and_consistent_offsets() -> Result<()> {
    let mut ss = SlideShowFile::create(cfg())?;
    assert_eq!(ss.user_edit().map(|u| u.max_persist_written), Some(1));
    assert_eq!(ss.persist_index().offset(1), Some(0));

    let id = ss.add_persistent_record(slide(b"one"))?;
    assert_eq!(id, 2);
    let uea = ss.user_edit().expect("user edit");
    assert_eq!(uea.max_persist_written, 2);
    assert_eq!(uea.last_view_type, LAST_VIEW_SLIDE_VIEW);

    // In-memory offsets already agree with what the writer will produce.
    let off = ss.persist_index().offset(2).expect("offset of id 2");
    assert_eq!(ss.resolve(2).and_then(Record::last_on_disk_offset), Some(off));
    let before = ss.current_user().current_edit_offset;
    let out = ss.serialize()?;
    assert_eq!(out.current_edit_offset, before);
    assert!(out.offset_map.iter().all(|(old, new)| old == new));

    let id2 = ss.add_persistent_record(slide(b"two"))?;
    assert_eq!(id2, 3);
    Ok(())
}

#[test]
fn written_document_reopens_with_same_content() -> Result<()> {
    let (store, a, b) = saved_deck()?;
    let ss = SlideShowFile::open(&store, cfg())?;

    let alpha = ss.resolve(a).expect("alpha");
    assert_eq!(alpha.children()[0].atom_data(), Some(&b"alpha"[..]));
    let beta = ss.resolve(b).expect("beta");
    assert_eq!(beta.children()[0].atom_data(), Some(&b"beta"[..]));
    assert_eq!(ss.document_record().map(Record::rec_type), Some(RT_DOCUMENT));
    assert_eq!(ss.records().len(), 5);
    Ok(())
}

#[test]
fn resave_without_changes_is_byte_identical() -> Result<()> {
    let (store, _, _) = saved_deck()?;
    let doc1 = stream(&store, STREAM_DOCUMENT)?;
    let cu1 = stream(&store, STREAM_CURRENT_USER)?;

    let mut ss = SlideShowFile::open(&store, cfg())?;
    let mut store2 = MemoryStreams::new();
    ss.write(&mut store2)?;

    assert_eq!(stream(&store2, STREAM_DOCUMENT)?, doc1);
    assert_eq!(stream(&store2, STREAM_CURRENT_USER)?, cu1);
    Ok(())
}

#[test]
fn inserting_bytes_in_front_shifts_every_reference() -> Result<()> {
    let (store, _, _) = saved_deck()?;
    let doc = stream(&store, STREAM_DOCUMENT)?;
    let codec = RecordCodec::standard();
    let mut records = codec.decode_all(&doc)?;

    let old_holder: Vec<(u32, u32)> = records
        .iter()
        .rev()
        .find_map(Record::as_persist_ptr)
        .map(|p| p.slide_locations().iter().map(|(&k, &v)| (k, v)).collect())
        .expect("holder");
    let old_edit = records
        .iter()
        .rev()
        .find(|r| r.as_user_edit().is_some())
        .and_then(Record::last_on_disk_offset)
        .expect("edit offset");

    let pad = Record::atom(0x7777, 0, vec![0xAB; 20]);
    let shift = pad.encoded_len() as u32;
    records.insert(0, pad);

    let out = serialize(&mut records, &EncryptionSession::plaintext())?;
    assert_eq!(out.bytes.len(), doc.len() + shift as usize);
    assert_eq!(out.current_edit_offset, old_edit + shift);
    for (old, new) in &out.offset_map {
        assert_eq!(*new, old + shift);
    }

    // Re-read the new bytes and check every stored offset.
    let back = codec.decode_all(&out.bytes)?;
    let holder = back.iter().rev().find_map(Record::as_persist_ptr).expect("holder");
    for (id, old) in old_holder {
        let new = holder.location(id).expect("id kept");
        assert_eq!(new, old + shift);
        let (rec, _) = codec.decode(&out.bytes, new as usize)?;
        assert!(rec.rec_type() == RT_DOCUMENT || rec.rec_type() == RT_SLIDE);
    }
    let (edit_rec, _) = codec.decode(&out.bytes, out.current_edit_offset as usize)?;
    let edit = edit_rec.as_user_edit().expect("user edit at current edit offset");
    let holder_off = back
        .iter()
        .rev()
        .find(|r| r.is_persist_ptr_holder())
        .and_then(Record::last_on_disk_offset);
    assert_eq!(Some(edit.persist_pointers_offset), holder_off);
    Ok(())
}

#[test]
fn growing_one_record_shifts_only_what_follows() -> Result<()> {
    let (store, _, _) = saved_deck()?;
    let doc = stream(&store, STREAM_DOCUMENT)?;
    let codec = RecordCodec::standard();
    let mut records = codec.decode_all(&doc)?;
    let before: Vec<u32> = records
        .iter()
        .map(|r| r.last_on_disk_offset().unwrap_or_default())
        .collect();

    // [document, alpha, beta, holder, edit]: grow alpha by N bytes.
    const N: usize = 37;
    let atom = &mut records[1].children_mut().expect("slide container")[0];
    let mut payload = atom.atom_data().map(<[u8]>::to_vec).unwrap_or_default();
    payload.extend(std::iter::repeat(0x5A).take(N));
    *atom.body_mut() = RecordBody::Atom(payload);

    let out = serialize(&mut records, &EncryptionSession::plaintext())?;
    let after: Vec<u32> = records
        .iter()
        .map(|r| r.last_on_disk_offset().unwrap_or_default())
        .collect();
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1], before[1]);
    for i in 2..records.len() {
        assert_eq!(after[i], before[i] + N as u32, "record {i}");
    }

    let back = codec.decode_all(&out.bytes)?;
    let holder = back.iter().rev().find_map(Record::as_persist_ptr).expect("holder");
    let locations: Vec<u32> = holder.slide_locations().values().copied().collect();
    assert_eq!(locations, vec![after[0], after[1], after[2]]);
    Ok(())
}

/// doc (1) and slide (2) with a holder table written as two entries, id 2 first.
fn split_holder_stream() -> Result<(Vec<u8>, u32, u32, u32)> {
    use pptstore::{RecordHeader, UserEditAtom};

    let mut buf = Vec::new();
    let document = Record::container(RT_DOCUMENT, 0, vec![Record::atom(RT_DOCUMENT_ATOM, 0, vec![0; 40])]);
    let d = buf.len() as u32;
    buf.extend_from_slice(&document.to_bytes());
    let s = buf.len() as u32;
    buf.extend_from_slice(&slide(b"split").to_bytes());

    let mut table = Vec::new();
    for (id, off) in [(2u32, s), (1, d)] {
        table.extend_from_slice(&(id | (1 << 20)).to_le_bytes());
        table.extend_from_slice(&off.to_le_bytes());
    }
    let h = buf.len() as u32;
    buf.extend_from_slice(&RecordHeader::new(0, 0, RT_PERSIST_PTR_INCREMENTAL, table.len() as u32).to_bytes());
    buf.extend_from_slice(&table);

    let mut e = UserEditAtom::new(1, 2);
    e.persist_pointers_offset = h;
    let edit = buf.len() as u32;
    buf.extend_from_slice(&Record::from(e).to_bytes());
    Ok((buf, d, s, edit))
}

#[test]
fn unnormalized_holder_table_survives_resave_and_shifts() -> Result<()> {
    let (doc, d, s, edit) = split_holder_stream()?;
    let mut store = MemoryStreams::new();
    store.write_stream(STREAM_DOCUMENT, &doc)?;
    let cu = pptstore::CurrentUserAtom {
        current_edit_offset: edit,
        ..Default::default()
    };
    store.write_stream(STREAM_CURRENT_USER, &cu.to_bytes())?;

    let mut ss = SlideShowFile::open(&store, cfg())?;
    let mut out = MemoryStreams::new();
    ss.write(&mut out)?;
    assert_eq!(stream(&out, STREAM_DOCUMENT)?, doc);

    // Moving everything keeps the two-entry layout and patches both offsets.
    let codec = RecordCodec::standard();
    let mut records = codec.decode_all(&doc)?;
    let pad = Record::atom(0x7777, 0, vec![0; 4]);
    let shift = pad.encoded_len() as u32;
    records.insert(0, pad);
    let moved = serialize(&mut records, &EncryptionSession::plaintext())?;
    assert_eq!(moved.bytes.len(), doc.len() + shift as usize);

    let back = codec.decode_all(&moved.bytes)?;
    let holder = back.iter().find_map(Record::as_persist_ptr).expect("holder");
    assert_eq!(holder.location(1), Some(d + shift));
    assert_eq!(holder.location(2), Some(s + shift));
    Ok(())
}

#[test]
fn append_inserts_before_the_holder() -> Result<()> {
    let mut ss = SlideShowFile::create(cfg())?;
    let at = ss.append_root_level_record(Record::atom(0x7777, 0, vec![1, 2, 3]))?;
    assert_eq!(at, 1);
    assert!(ss.records()[at + 1].is_persist_ptr_holder());

    let mut store = MemoryStreams::new();
    ss.write(&mut store)?;
    let back = SlideShowFile::open(&store, cfg())?;
    // Not persisted: nothing in the holder points at it, so it is not loaded.
    assert!(back.records().iter().all(|r| r.rec_type() != 0x7777));
    Ok(())
}

#[test]
fn normalize_is_a_noop_for_a_single_save_state() -> Result<()> {
    let (store, a, _) = saved_deck()?;

    // Appending reuses the one holder; still a single save state afterwards.
    let mut ss = SlideShowFile::open(&store, cfg())?;
    let c = ss.add_persistent_record(slide(b"gamma"))?;
    let mut store2 = MemoryStreams::new();
    ss.write(&mut store2)?;

    let mut ss2 = SlideShowFile::open(&store2, cfg())?;
    assert_eq!(ss2.resolve(c).and_then(|r| r.children()[0].atom_data()), Some(&b"gamma"[..]));
    assert!(!ss2.normalize_records()?);
    assert!(ss2.resolve(a).is_some());
    Ok(())
}

#[test]
fn normalize_drops_stale_copies_from_older_revisions() -> Result<()> {
    let (doc, current) = two_revision_stream()?;
    let mut store = MemoryStreams::new();
    store.write_stream(STREAM_DOCUMENT, &doc)?;
    let cu = pptstore::CurrentUserAtom {
        current_edit_offset: current,
        ..Default::default()
    };
    store.write_stream(STREAM_CURRENT_USER, &cu.to_bytes())?;

    let mut ss = SlideShowFile::open(&store, cfg())?;
    // doc, slide v1, holder 1, edit 1, slide v2, holder 2, edit 2
    assert_eq!(ss.records().len(), 7);
    assert_eq!(ss.persist_index().chain().revisions().len(), 2);

    assert!(ss.normalize_records()?);
    assert_eq!(ss.records().len(), 4);
    assert_eq!(ss.persist_index().chain().revisions().len(), 1);
    assert_eq!(ss.user_edit().map(|u| u.last_user_edit_atom_offset), Some(0));
    assert_eq!(
        ss.resolve(2).and_then(|r| r.children()[0].atom_data()),
        Some(&b"v2"[..])
    );

    let mut out = MemoryStreams::new();
    ss.write(&mut out)?;
    let back = SlideShowFile::open(&out, cfg())?;
    assert_eq!(back.records().len(), 4);
    assert_eq!(
        back.resolve(2).and_then(|r| r.children()[0].atom_data()),
        Some(&b"v2"[..])
    );
    assert!(back.resolve(1).is_some());
    Ok(())
}

/// doc (1) and slide (2) in rev 1, a newer slide (2) in rev 2.
fn two_revision_stream() -> Result<(Vec<u8>, u32)> {
    use pptstore::{PersistPtrHolder, UserEditAtom};

    let mut buf = Vec::new();
    let push = |rec: &Record, buf: &mut Vec<u8>| {
        let off = buf.len() as u32;
        buf.extend_from_slice(&rec.to_bytes());
        off
    };
    let document = Record::container(RT_DOCUMENT, 0, vec![Record::atom(RT_DOCUMENT_ATOM, 0, vec![0; 40])]);
    let d = push(&document, &mut buf);
    let s1 = push(&slide(b"v1"), &mut buf);
    let mut h = PersistPtrHolder::new();
    h.add_slide_lookup(1, d)?;
    h.add_slide_lookup(2, s1)?;
    let h1 = push(&Record::from(h), &mut buf);
    let mut e = UserEditAtom::new(1, 2);
    e.persist_pointers_offset = h1;
    let e1 = push(&Record::from(e), &mut buf);

    let s2 = push(&slide(b"v2"), &mut buf);
    let mut h = PersistPtrHolder::new();
    h.add_slide_lookup(2, s2)?;
    let h2 = push(&Record::from(h), &mut buf);
    let mut e = UserEditAtom::new(1, 2);
    e.last_user_edit_atom_offset = e1;
    e.persist_pointers_offset = h2;
    let e2 = push(&Record::from(e), &mut buf);
    Ok((buf, e2))
}
