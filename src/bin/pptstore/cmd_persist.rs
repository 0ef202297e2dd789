use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::util;

#[derive(Serialize)]
struct RevisionOut {
    edit_offset: u32,
    persist_offset: u32,
    last_edit_offset: u32,
    doc_persist_id_ref: u32,
    max_persist_written: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    encrypt_session_persist_id_ref: Option<u32>,
    ids: Vec<u32>,
}

#[derive(Serialize)]
struct RepairOut {
    edit_offset: u32,
    broken: u32,
    repaired: u32,
}

#[derive(Serialize)]
struct PersistOut {
    current_edit_offset: u32,
    revisions: Vec<RevisionOut>,
    repairs: Vec<RepairOut>,
    resolved: BTreeMap<u32, u32>,
}

pub fn exec(path: PathBuf, password: Option<String>, json: bool) -> Result<()> {
    let ss = util::open_doc(&path, password)?;
    let index = ss.persist_index();
    let chain = index.chain();

    let out = PersistOut {
        current_edit_offset: ss.current_user().current_edit_offset,
        revisions: chain
            .revisions()
            .iter()
            .map(|r| RevisionOut {
                edit_offset: r.edit_offset,
                persist_offset: r.persist_offset,
                last_edit_offset: r.edit.last_user_edit_atom_offset,
                doc_persist_id_ref: r.edit.doc_persist_id_ref,
                max_persist_written: r.edit.max_persist_written,
                encrypt_session_persist_id_ref: r.edit.encrypt_session_persist_id_ref,
                ids: r.holder.known_ids(),
            })
            .collect(),
        repairs: chain
            .repairs()
            .iter()
            .map(|r| RepairOut {
                edit_offset: r.edit_offset,
                broken: r.broken,
                repaired: r.repaired,
            })
            .collect(),
        resolved: index.offsets().clone(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Current edit: {}", out.current_edit_offset);
    println!("Revisions (newest first):");
    for r in &out.revisions {
        println!(
            "  edit@{} ptrs@{} prev={} doc={} max={} ids={:?}",
            r.edit_offset,
            r.persist_offset,
            r.last_edit_offset,
            r.doc_persist_id_ref,
            r.max_persist_written,
            r.ids
        );
        if let Some(id) = r.encrypt_session_persist_id_ref {
            println!("    encryption descriptor: persist {}", id);
        }
    }
    for r in &out.repairs {
        println!(
            "  repaired: edit@{} linked {} -> {}",
            r.edit_offset, r.broken, r.repaired
        );
    }
    println!("Resolved ({}):", out.resolved.len());
    for (id, off) in &out.resolved {
        println!("  {:>6} -> {}", id, off);
    }
    Ok(())
}
