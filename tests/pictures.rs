use anyhow::Result;

use pptstore::consts::*;
use pptstore::pictures::find_bstore_mut;
use pptstore::{
    BlipStoreEntry, ConfigBuilder, MemoryStreams, PictureData, PictureType, PptConfig, Record,
    SlideShowFile, StreamStore,
};

fn cfg() -> PptConfig {
    ConfigBuilder::from_default().build()
}

fn png_bytes(seed: u8, len: usize) -> Vec<u8> {
    let mut v = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    v.extend((0..len).map(|i| seed.wrapping_add(i as u8)));
    v
}

fn blip_count(ss: &SlideShowFile) -> usize {
    ss.blip_store()
        .map(|b| b.children().iter().filter(|c| c.as_blip_entry().is_some()).count())
        .unwrap_or(0)
}

/// Document with a PNG and an EMF picture, written once.
fn deck_with_two_pictures() -> Result<(MemoryStreams, Vec<u8>, Vec<u8>)> {
    let png = png_bytes(1, 300);
    let emf: Vec<u8> = (0..2000u32).map(|i| (i % 7) as u8).collect();

    let mut ss = SlideShowFile::create(cfg())?;
    assert_eq!(ss.add_picture(PictureType::Png, &png)?, 1);
    assert_eq!(ss.add_picture(PictureType::Emf, &emf)?, 2);

    let mut store = MemoryStreams::new();
    ss.write(&mut store)?;
    Ok((store, png, emf))
}

#[test]
fn written_pictures_match_by_offset() -> Result<()> {
    let (store, png, emf) = deck_with_two_pictures()?;
    let ss = SlideShowFile::open(&store, cfg())?;

    assert_eq!(ss.pictures().len(), 2);
    let report = ss.match_report();
    assert_eq!(report.by_offset, 2);
    assert_eq!(report.by_uid, 0);
    assert_eq!(report.synthesized, 0);

    let limit = ss.config().max_record_bytes;
    let p0 = &ss.pictures()[0];
    assert_eq!(p0.offset(), Some(0));
    assert_eq!(p0.picture_type(), Some(PictureType::Png));
    assert_eq!(p0.descriptor(), Some(0));
    assert_eq!(p0.image_bytes(limit)?, png);

    let p1 = &ss.pictures()[1];
    assert_eq!(p1.offset(), Some(p0.stream_len() as u32));
    assert_eq!(p1.picture_type(), Some(PictureType::Emf));
    assert_eq!(p1.image_bytes(limit)?, emf);

    // Descriptor sizes follow the blobs.
    let bstore = ss.blip_store().expect("blip store");
    assert_eq!(bstore.instance(), 2);
    let bse = bstore.children()[1].as_blip_entry().expect("bse");
    assert_eq!(bse.size as usize, p1.stream_len());
    assert_eq!(bse.offset, p1.offset().unwrap_or_default());
    assert_eq!(bse.uid, p1.uid());
    Ok(())
}

#[test]
fn stale_descriptor_offsets_are_corrected_by_uid() -> Result<()> {
    let (mut store, png, _) = deck_with_two_pictures()?;

    // 12 bytes of an unknown blip type in front: every blob moves.
    let mut shifted = Vec::new();
    shifted.extend_from_slice(&pptstore::RecordHeader::new(0, 0, 0xF019, 4).to_bytes());
    shifted.extend_from_slice(&[0, 0, 0, 0]);
    shifted.extend_from_slice(&store.require_stream(STREAM_PICTURES)?);
    store.write_stream(STREAM_PICTURES, &shifted)?;

    let mut ss = SlideShowFile::open(&store, cfg())?;
    let report = ss.match_report();
    assert_eq!(report.by_offset, 0);
    assert_eq!(report.by_uid, 2);
    assert_eq!(ss.pictures()[0].offset(), Some(12));

    let bse = ss.blip_store().expect("blip store").children()[0]
        .as_blip_entry()
        .expect("bse")
        .clone();
    assert_eq!(bse.offset, 12);

    // A save writes the blobs back from position 0 and the matches hold.
    let mut out = MemoryStreams::new();
    ss.write(&mut out)?;
    let back = SlideShowFile::open(&out, cfg())?;
    assert_eq!(back.match_report().by_offset, 2);
    assert_eq!(back.pictures()[0].image_bytes(back.config().max_record_bytes)?, png);
    Ok(())
}

#[test]
fn one_stale_descriptor_among_three_is_healed() -> Result<()> {
    let mut ss = SlideShowFile::create(cfg())?;
    for seed in [20u8, 40, 60] {
        ss.add_picture(PictureType::Png, &png_bytes(seed, 50 + seed as usize))?;
    }
    let mut store = MemoryStreams::new();
    ss.write(&mut store)?;

    // Break descriptor #2's offset and write only the document stream.
    let mut ss = SlideShowFile::open(&store, cfg())?;
    {
        let doc = ss.document_record_mut().expect("document");
        let bstore = find_bstore_mut(doc, false).expect("blip store");
        let bse = bstore.children_mut().expect("container")[1]
            .as_blip_entry_mut()
            .expect("bse");
        bse.offset = 0x00FF_FFFF;
    }
    let doc = ss.serialize()?;
    assert_eq!(doc.current_edit_offset, ss.current_user().current_edit_offset);
    store.write_stream(STREAM_DOCUMENT, &doc.bytes)?;

    let back = SlideShowFile::open(&store, cfg())?;
    let report = back.match_report();
    assert_eq!(report.by_offset, 2);
    assert_eq!(report.by_uid, 1);
    assert_eq!(report.synthesized, 0);

    let blob = &back.pictures()[1];
    assert_eq!(blob.descriptor(), Some(1));
    let bse = back.blip_store().expect("blip store").children()[1]
        .as_blip_entry()
        .expect("bse");
    assert_eq!(Some(bse.offset), blob.offset());
    Ok(())
}

#[test]
fn blob_without_descriptor_gets_one_synthesized() -> Result<()> {
    let (mut store, _, _) = deck_with_two_pictures()?;

    let extra = PictureData::new(PictureType::Jpeg, &[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3])?;
    let mut pics = store.require_stream(STREAM_PICTURES)?;
    let extra_at = pics.len() as u32;
    pics.extend_from_slice(&extra.to_bytes());
    store.write_stream(STREAM_PICTURES, &pics)?;

    let ss = SlideShowFile::open(&store, cfg())?;
    let report = ss.match_report();
    assert_eq!(report.by_offset, 2);
    assert_eq!(report.synthesized, 1);
    assert_eq!(ss.pictures().len(), 3);
    assert_eq!(blip_count(&ss), 3);
    assert_eq!(ss.blip_store().map(Record::instance), Some(3));

    let bse = ss.blip_store().expect("blip store").children()[2]
        .as_blip_entry()
        .expect("bse")
        .clone();
    assert_eq!(bse.offset, extra_at);
    assert_eq!(bse.uid, extra.uid());
    assert_eq!(bse.blip_type_win32, PictureType::Jpeg.native_id());
    assert_eq!(ss.pictures()[2].descriptor(), Some(2));
    Ok(())
}

#[test]
fn shared_offset_is_resolved_by_uid() -> Result<()> {
    let pict = PictureData::new(PictureType::Png, &png_bytes(9, 64))?;
    let other = PictureData::new(PictureType::Png, &png_bytes(10, 64))?;

    // Two descriptors both claim offset 0; only the second has the right uid.
    let mut ss = SlideShowFile::create(cfg())?;
    {
        let doc = ss.document_record_mut().expect("document");
        let bstore = find_bstore_mut(doc, true).expect("blip store");
        let children = bstore.children_mut().expect("container");
        children.push(Record::from(BlipStoreEntry::new(6, other.uid(), 0, 0)));
        children.push(Record::from(BlipStoreEntry::new(6, pict.uid(), 0, 0)));
    }
    let mut store = MemoryStreams::new();
    ss.write(&mut store)?;
    store.write_stream(STREAM_PICTURES, &pict.to_bytes())?;

    let back = SlideShowFile::open(&store, cfg())?;
    assert_eq!(back.pictures().len(), 1);
    assert_eq!(back.pictures()[0].descriptor(), Some(1));
    assert_eq!(back.match_report().by_offset, 1);
    assert_eq!(back.match_report().synthesized, 0);
    Ok(())
}

#[test]
fn adding_the_same_image_twice_reuses_the_descriptor() -> Result<()> {
    let png = png_bytes(3, 40);
    let mut ss = SlideShowFile::create(cfg())?;
    let a = ss.add_picture(PictureType::Png, &png)?;
    let b = ss.add_picture(PictureType::Png, &png)?;
    assert_eq!(a, b);
    assert_eq!(ss.pictures().len(), 1);
    assert_eq!(blip_count(&ss), 1);
    Ok(())
}

#[test]
fn unreadable_tail_keeps_the_good_entries() -> Result<()> {
    let (mut store, _, _) = deck_with_two_pictures()?;
    let mut pics = store.require_stream(STREAM_PICTURES)?;
    // Header of a third blip that claims far more bytes than remain.
    pics.extend_from_slice(&pptstore::RecordHeader::new(0, 0x6E0, 0xF01E, 5000).to_bytes());
    pics.extend_from_slice(&[1, 2, 3]);
    store.write_stream(STREAM_PICTURES, &pics)?;

    let ss = SlideShowFile::open(&store, cfg())?;
    assert_eq!(ss.pictures().len(), 2);
    assert_eq!(ss.match_report().by_offset, 2);
    Ok(())
}

#[test]
fn oversized_picture_hits_the_size_guard() -> Result<()> {
    let (mut store, _, _) = deck_with_two_pictures()?;
    let mut pics = store.require_stream(STREAM_PICTURES)?;
    pics.extend_from_slice(&pptstore::RecordHeader::new(0, 0x6E0, 0xF01E, 4096).to_bytes());
    store.write_stream(STREAM_PICTURES, &pics)?;

    let small = ConfigBuilder::from_default().max_record_bytes(1024).build();
    let err = SlideShowFile::open(&store, small).unwrap_err();
    assert!(matches!(err, pptstore::PptError::RecordTooLarge { .. }), "got {err}");
    Ok(())
}
