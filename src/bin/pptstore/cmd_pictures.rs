use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use pptstore::{MatchReport, PictureType};

use crate::util;

#[derive(Serialize)]
struct PictureOut {
    offset: Option<u32>,
    #[serde(rename = "type")]
    ptype: Option<PictureType>,
    signature: u16,
    stream_len: usize,
    uid: String,
    descriptor: Option<usize>,
}

#[derive(Serialize)]
struct PicturesOut {
    pictures: Vec<PictureOut>,
    matching: MatchReport,
}

pub fn exec(
    path: PathBuf,
    password: Option<String>,
    json: bool,
    extract: Option<PathBuf>,
) -> Result<()> {
    let ss = util::open_doc(&path, password)?;

    let out = PicturesOut {
        pictures: ss
            .pictures()
            .iter()
            .map(|p| PictureOut {
                offset: p.offset(),
                ptype: p.picture_type(),
                signature: p.signature(),
                stream_len: p.stream_len(),
                uid: util::hex(&p.uid()),
                descriptor: p.descriptor(),
            })
            .collect(),
        matching: ss.match_report(),
    };

    if let Some(dir) = &extract {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create {}", dir.display()))?;
        let limit = ss.config().max_record_bytes;
        for (i, p) in ss.pictures().iter().enumerate() {
            let ext = p.picture_type().map(|t| t.extension()).unwrap_or("bin");
            let file = dir.join(format!("image{}.{}", i + 1, ext));
            let bytes = p
                .image_bytes(limit)
                .with_context(|| format!("decode picture {}", i + 1))?;
            std::fs::write(&file, &bytes)
                .with_context(|| format!("write {}", file.display()))?;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Pictures: {}", out.pictures.len());
    for (i, p) in out.pictures.iter().enumerate() {
        let ty = p
            .ptype
            .map(|t| t.extension().to_string())
            .unwrap_or_else(|| format!("0x{:04x}", p.signature));
        let off = p
            .offset
            .map(|o| o.to_string())
            .unwrap_or_else(|| "-".to_string());
        let desc = p
            .descriptor
            .map(|d| (d + 1).to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  #{:<3} @{:<10} {:<5} {:>10} B uid={} blip={}",
            i + 1,
            off,
            ty,
            p.stream_len,
            p.uid,
            desc
        );
    }
    let m = &out.matching;
    println!(
        "Matching: by_offset={} by_uid={} synthesized={} unmatched_descriptors={}",
        m.by_offset, m.by_uid, m.synthesized, m.unmatched_descriptors
    );
    if let Some(dir) = extract {
        println!("Extracted to {}", dir.display());
    }
    Ok(())
}
