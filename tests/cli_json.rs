use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Result};
use serde_json::Value;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("pptstore-cli-{prefix}-{pid}-{t}-{id}"))
}

fn run(args: &[&str]) -> Result<String> {
    let out = Command::new(env!("CARGO_BIN_EXE_pptstore"))
        .args(args)
        .env("RUST_LOG", "warn")
        .env_remove("PPT_PASSWORD")
        .output()?;
    if !out.status.success() {
        bail!(
            "pptstore {:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
    }
    Ok(String::from_utf8(out.stdout)?)
}

fn p(path: &Path) -> &str {
    path.to_str().unwrap_or_default()
}

#[test]
fn init_then_dump_and_persist_as_json() -> Result<()> {
    let root = unique_root("init");
    run(&["init", "--path", p(&root)])?;

    let dump: Value = serde_json::from_str(&run(&["dump", "--path", p(&root), "--json"])?)?;
    let recs = dump.as_array().cloned().unwrap_or_default();
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0]["rec_type"], 1000);
    assert_eq!(recs[0]["persist_id"], 1);
    assert_eq!(recs[2]["kind"], "UserEditAtom");

    let persist: Value = serde_json::from_str(&run(&["persist", "--path", p(&root), "--json"])?)?;
    assert_eq!(persist["revisions"].as_array().map(Vec::len), Some(1));
    assert_eq!(persist["resolved"]["1"], 0);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn encrypt_then_decrypt_via_cli() -> Result<()> {
    let root = unique_root("plain");
    let enc = unique_root("enc");
    let dec = unique_root("dec");
    run(&["init", "--path", p(&root)])?;
    run(&["encrypt", "--path", p(&root), "--out", p(&enc), "--new-password", "s3cret"])?;

    // Without the password the encrypted copy does not open.
    let failed = Command::new(env!("CARGO_BIN_EXE_pptstore"))
        .args(["dump", "--path", p(&enc)])
        .env_remove("PPT_PASSWORD")
        .output()?;
    assert!(!failed.status.success());

    run(&["dump", "--path", p(&enc), "--password", "s3cret"])?;
    run(&["decrypt", "--path", p(&enc), "--out", p(&dec), "--password", "s3cret"])?;

    let pics: Value = serde_json::from_str(&run(&["pictures", "--path", p(&dec), "--json"])?)?;
    assert_eq!(pics["pictures"].as_array().map(Vec::len), Some(0));

    for d in [root, enc, dec] {
        let _ = fs::remove_dir_all(d);
    }
    Ok(())
}

#[test]
fn resave_with_normalize_keeps_the_document_readable() -> Result<()> {
    let root = unique_root("src");
    let out = unique_root("out");
    run(&["init", "--path", p(&root)])?;
    run(&["resave", "--path", p(&root), "--out", p(&out), "--normalize"])?;

    let a = fs::read(root.join("PowerPoint Document"))?;
    let b = fs::read(out.join("PowerPoint Document"))?;
    assert_eq!(a, b);

    let _ = fs::remove_dir_all(&root);
    let _ = fs::remove_dir_all(&out);
    Ok(())
}
