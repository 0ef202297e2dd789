use anyhow::Result;
use std::path::PathBuf;

use pptstore::SlideShowFile;

use crate::util;

pub fn exec(path: PathBuf) -> Result<()> {
    let mut ss = SlideShowFile::create(util::config(None))?;
    util::save_doc(&mut ss, &path)?;
    println!(
        "Initialized empty document at {} (current edit at {})",
        path.display(),
        ss.current_user().current_edit_offset
    );
    Ok(())
}
