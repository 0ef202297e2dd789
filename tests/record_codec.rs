use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};
use oorandom::Rand64;

use pptstore::consts::*;
use pptstore::{decode_record, PptError, Record, RecordCodec, RecordHeader, RecordRegistry};

/// Container types registered in the standard registry.
const CONTAINERS: [u16; 5] = [RT_SLIDE, RT_ENVIRONMENT, RT_LIST, RT_PROG_TAGS, ESCHER_SP_CONTAINER];
/// Types with no typed decoder: kept as opaque bytes.
const ATOMS: [u16; 5] = [RT_SLIDE_ATOM, RT_DOCUMENT_ATOM, 4001, 4026, 0x0FA0];

fn random_tree(rng: &mut Rand64, depth: u32) -> Record {
    let make_container = depth < 4 && rng.rand_range(0..3) == 0;
    let instance = rng.rand_range(0..0x1000) as u16;
    if make_container {
        let n = rng.rand_range(0..5) as usize;
        let children = (0..n).map(|_| random_tree(rng, depth + 1)).collect();
        let t = CONTAINERS[rng.rand_range(0..CONTAINERS.len() as u64) as usize];
        Record::container(t, instance, children)
    } else {
        let len = rng.rand_range(0..64) as usize;
        let payload: Vec<u8> = (0..len).map(|_| rng.rand_u64() as u8).collect();
        let t = ATOMS[rng.rand_range(0..ATOMS.len() as u64) as usize];
        Record::atom(t, instance, payload)
    }
}

fn raw_record(ver: u8, instance: u16, rec_type: u16, declared: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = RecordHeader::new(ver, instance, rec_type, declared).to_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

#[test]
fn random_trees_survive_encode_decode() -> Result<()> {
    let mut rng = Rand64::new(0x5EED_0F_7EE5);
    for _ in 0..200 {
        let tree = random_tree(&mut rng, 0);
        let bytes = tree.to_bytes();
        assert_eq!(bytes.len(), tree.encoded_len());

        let (back, used) = decode_record(&bytes, 0)?;
        assert_eq!(used, bytes.len());
        assert_eq!(back, tree);
        assert_eq!(back.subtree_len(), tree.subtree_len());
        assert_eq!(back.last_on_disk_offset(), Some(0));

        // Re-encoding a decoded tree is byte-exact.
        assert_eq!(back.to_bytes(), bytes);
    }
    Ok(())
}

#[test]
fn unknown_atom_bytes_are_preserved() -> Result<()> {
    let payload = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01];
    let bytes = raw_record(0x3, 0x123, 0x7777, payload.len() as u32, &payload);

    let (rec, used) = decode_record(&bytes, 0)?;
    assert_eq!(used, bytes.len());
    assert_eq!(rec.rec_type(), 0x7777);
    assert_eq!(rec.ver(), 0x3);
    assert_eq!(rec.instance(), 0x123);
    assert_eq!(rec.atom_data(), Some(&payload[..]));
    assert_eq!(rec.to_bytes(), bytes);
    Ok(())
}

#[test]
fn child_overrunning_its_container_ends_the_child_list() -> Result<()> {
    // child 1: complete 4-byte atom; child 2: declares 100 bytes, has 2.
    let mut inner = raw_record(0, 0, 4001, 4, &[1, 2, 3, 4]);
    inner.extend_from_slice(&raw_record(0, 0, 4002, 100, &[9, 9]));
    let bytes = raw_record(HDR_VER_CONTAINER, 0, RT_LIST, inner.len() as u32, &inner);

    let (rec, used) = decode_record(&bytes, 0)?;
    assert_eq!(used, bytes.len());
    assert!(rec.is_container());
    assert_eq!(rec.children().len(), 1);
    assert_eq!(rec.children()[0].atom_data(), Some(&[1u8, 2, 3, 4][..]));
    Ok(())
}

#[test]
fn trailing_bytes_shorter_than_a_header_are_ignored() -> Result<()> {
    let mut inner = raw_record(0, 0, 4001, 2, &[7, 7]);
    inner.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
    let bytes = raw_record(HDR_VER_CONTAINER, 0, RT_SLIDE, inner.len() as u32, &inner);

    let (rec, _) = decode_record(&bytes, 0)?;
    assert_eq!(rec.children().len(), 1);
    Ok(())
}

#[test]
fn top_level_overrun_is_corrupt() -> Result<()> {
    let bytes = raw_record(0, 0, 4001, 64, &[0u8; 10]);
    let err = decode_record(&bytes, 0).unwrap_err();
    assert!(err.is_corrupt(), "got {err}");

    // Header itself truncated.
    let err = decode_record(&bytes[..5], 0).unwrap_err();
    assert!(err.is_corrupt(), "got {err}");
    Ok(())
}

#[test]
fn zero_type_ffff_length_at_stream_start_is_rejected() -> Result<()> {
    let mut bytes = vec![0u8; 8 + 0xFFFF];
    LittleEndian::write_u16(&mut bytes[2..4], 0);
    LittleEndian::write_u32(&mut bytes[4..8], 0xFFFF);
    let err = decode_record(&bytes, 0).unwrap_err();
    assert!(err.is_corrupt(), "got {err}");
    Ok(())
}

#[test]
fn size_guard_applies_to_declared_length() -> Result<()> {
    let codec = RecordCodec::new(RecordRegistry::standard(), 16);
    let bytes = raw_record(0, 0, 4001, 32, &[0u8; 32]);
    match codec.decode(&bytes, 0) {
        Err(PptError::RecordTooLarge { offset, len, limit }) => {
            assert_eq!(offset, 0);
            assert_eq!(len, 32);
            assert_eq!(limit, 16);
        }
        other => panic!("expected RecordTooLarge, got {other:?}"),
    }

    // Under the limit is fine.
    let small = raw_record(0, 0, 4001, 8, &[0u8; 8]);
    codec.decode(&small, 0)?;
    Ok(())
}

#[test]
fn decode_all_reads_a_flat_run() -> Result<()> {
    let a = Record::atom(4001, 1, vec![1, 2, 3]);
    let b = Record::container(RT_SLIDE, 0, vec![Record::atom(RT_SLIDE_ATOM, 0, vec![0; 24])]);
    let mut bytes = a.to_bytes();
    bytes.extend_from_slice(&b.to_bytes());

    let recs = RecordCodec::standard().decode_all(&bytes)?;
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0], a);
    assert_eq!(recs[1], b);
    assert_eq!(recs[1].last_on_disk_offset(), Some(a.encoded_len() as u32));
    Ok(())
}

#[test]
fn path_lookup_finds_nested_records() -> Result<()> {
    let tree = Record::container(
        RT_SLIDE,
        0,
        vec![
            Record::atom(RT_SLIDE_ATOM, 0, vec![0; 4]),
            Record::container(RT_PP_DRAWING, 0, vec![Record::atom(0x7777, 0, vec![5])]),
        ],
    );
    let path = tree.find_path(|r| r.rec_type() == 0x7777).expect("nested atom");
    assert_eq!(path, vec![1, 0]);
    assert_eq!(tree.at_path(&path).and_then(Record::atom_data), Some(&[5u8][..]));
    Ok(())
}

/// `levels` list containers, each wrapping the next; the innermost is empty.
fn nested_lists(levels: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(levels * RECORD_HEADER_SIZE);
    for i in 0..levels {
        let inner = ((levels - i - 1) * RECORD_HEADER_SIZE) as u32;
        buf.extend_from_slice(&RecordHeader::new(HDR_VER_CONTAINER, 0, RT_LIST, inner).to_bytes());
    }
    buf
}

#[test]
fn nesting_is_bounded() -> Result<()> {
    let ok = nested_lists(MAX_RECORD_NESTING);
    let (rec, used) = decode_record(&ok, 0)?;
    assert_eq!(used, ok.len());
    let mut depth = 1;
    let mut cur = &rec;
    while let Some(child) = cur.children().first() {
        depth += 1;
        cur = child;
    }
    assert_eq!(depth, MAX_RECORD_NESTING);

    let err = decode_record(&nested_lists(MAX_RECORD_NESTING + 1), 0).unwrap_err();
    assert!(err.is_corrupt(), "got {err}");

    // Far below the size limits, far above the nesting limit: an error, not a crash.
    let err = decode_record(&nested_lists(200_000), 0).unwrap_err();
    assert!(err.is_corrupt(), "got {err}");
    Ok(())
}
