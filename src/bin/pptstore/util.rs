use anyhow::{Context, Result};
use std::path::Path;

use pptstore::{ConfigBuilder, DirStreams, PptConfig, SlideShowFile};

/// Env-based config with the --password override applied.
pub fn config(password: Option<String>) -> PptConfig {
    let b = ConfigBuilder::new();
    match password {
        Some(pw) => b.password(Some(pw)).build(),
        None => b.build(),
    }
}

pub fn open_doc(path: &Path, password: Option<String>) -> Result<SlideShowFile> {
    let store = DirStreams::open(path)
        .with_context(|| format!("open stream directory {}", path.display()))?;
    let ss = SlideShowFile::open(&store, config(password))
        .with_context(|| format!("load document from {}", path.display()))?;
    Ok(ss)
}

pub fn save_doc(ss: &mut SlideShowFile, out: &Path) -> Result<()> {
    let mut store = DirStreams::create(out)
        .with_context(|| format!("create stream directory {}", out.display()))?;
    ss.write(&mut store)
        .with_context(|| format!("write document to {}", out.display()))?;
    Ok(())
}

pub fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}
