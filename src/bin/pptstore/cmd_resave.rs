use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::util;

pub fn exec_resave(
    path: PathBuf,
    out: PathBuf,
    password: Option<String>,
    normalize: bool,
) -> Result<()> {
    let mut ss = util::open_doc(&path, password)?;
    if normalize {
        let changed = ss.normalize_records()?;
        if !changed {
            println!("Revision history already normalized");
        }
    }
    util::save_doc(&mut ss, &out)?;
    println!(
        "Resaved {} -> {} ({} top-level records)",
        path.display(),
        out.display(),
        ss.records().len()
    );
    Ok(())
}

pub fn exec_encrypt(
    path: PathBuf,
    out: PathBuf,
    password: Option<String>,
    new_password: String,
) -> Result<()> {
    if new_password.is_empty() {
        return Err(anyhow!("--new-password must not be empty"));
    }
    let mut ss = util::open_doc(&path, password)?;
    ss.set_password(Some(&new_password))?;
    util::save_doc(&mut ss, &out)?;
    println!("Encrypted copy written to {}", out.display());
    Ok(())
}

pub fn exec_decrypt(path: PathBuf, out: PathBuf, password: Option<String>) -> Result<()> {
    let mut ss = util::open_doc(&path, password)?;
    if !ss.is_encrypted() {
        println!("Document is not encrypted; writing a plain copy");
    }
    ss.set_password(None)?;
    util::save_doc(&mut ss, &out)?;
    println!("Decrypted copy written to {}", out.display());
    Ok(())
}
