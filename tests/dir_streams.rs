use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use pptstore::consts::*;
use pptstore::streams::lock::LOCK_FILE;
use pptstore::streams::{try_acquire_lock, LockMode};
use pptstore::{ConfigBuilder, DirStreams, PictureType, Record, SlideShowFile, StreamStore};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("pptstore-{prefix}-{pid}-{t}-{id}"))
}

#[test]
fn streams_round_trip_through_a_directory() -> Result<()> {
    let root = unique_root("basic");
    let mut store = DirStreams::create(&root)?;

    assert_eq!(store.read_stream(STREAM_DOCUMENT)?, None);
    store.write_stream(STREAM_DOCUMENT, b"abc")?;
    store.write_stream(STREAM_CURRENT_USER, b"xyz")?;
    assert_eq!(store.read_stream(STREAM_DOCUMENT)?, Some(b"abc".to_vec()));

    // Overwrite replaces the whole stream.
    store.write_stream(STREAM_DOCUMENT, b"0123456789")?;
    assert_eq!(store.require_stream(STREAM_DOCUMENT)?, b"0123456789".to_vec());

    // LOCK and temp files never show up as streams.
    assert!(root.join(LOCK_FILE).exists());
    assert_eq!(
        store.stream_names()?,
        vec![STREAM_CURRENT_USER.to_string(), STREAM_DOCUMENT.to_string()]
    );

    store.remove_stream(STREAM_CURRENT_USER)?;
    store.remove_stream(STREAM_CURRENT_USER)?;
    assert_eq!(store.stream_names()?, vec![STREAM_DOCUMENT.to_string()]);

    let err = store.require_stream(STREAM_PICTURES).unwrap_err();
    assert!(matches!(err, pptstore::PptError::MissingStream(_)), "got {err}");

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn bad_stream_names_are_refused() -> Result<()> {
    let root = unique_root("names");
    let mut store = DirStreams::create(&root)?;
    for name in ["", LOCK_FILE, "..", "a/b", "x.tmp"] {
        assert!(store.write_stream(name, b"1").is_err(), "name {name:?} accepted");
    }
    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn open_requires_an_existing_directory() -> Result<()> {
    let root = unique_root("missing");
    let err = DirStreams::open(&root).unwrap_err();
    assert!(matches!(err, pptstore::PptError::Io(_)), "got {err}");
    Ok(())
}

#[test]
fn exclusive_lock_conflicts() -> Result<()> {
    let root = unique_root("lock");
    fs::create_dir_all(&root)?;
    let held = try_acquire_lock(&root, LockMode::Exclusive)?;
    assert_eq!(held.mode(), LockMode::Exclusive);
    assert!(try_acquire_lock(&root, LockMode::Exclusive).is_err());
    assert!(try_acquire_lock(&root, LockMode::Shared).is_err());
    drop(held);

    let a = try_acquire_lock(&root, LockMode::Shared)?;
    let b = try_acquire_lock(&root, LockMode::Shared)?;
    drop((a, b));
    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn document_saved_to_a_directory_reopens() -> Result<()> {
    let root = unique_root("doc");
    let cfg = ConfigBuilder::from_default().build();

    let mut ss = SlideShowFile::create(cfg.clone())?;
    let id = ss.add_persistent_record(Record::container(
        RT_SLIDE,
        0,
        vec![Record::atom(RT_SLIDE_ATOM, 0, b"hello".to_vec())],
    ))?;
    ss.add_picture(PictureType::Png, &[0x89, b'P', b'N', b'G', 1, 2, 3])?;
    let mut store = DirStreams::create(&root)?;
    ss.write(&mut store)?;

    let names = store.stream_names()?;
    for s in [STREAM_DOCUMENT, STREAM_CURRENT_USER, STREAM_PICTURES] {
        assert!(names.iter().any(|n| n == s), "missing {s}");
    }

    let back = SlideShowFile::open(&DirStreams::open(&root)?, cfg)?;
    assert_eq!(
        back.resolve(id).and_then(|r| r.children()[0].atom_data()),
        Some(&b"hello"[..])
    );
    assert_eq!(back.pictures().len(), 1);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
