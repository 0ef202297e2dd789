use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use pptstore::{Record, RecordBody};

use crate::util;

#[derive(Serialize)]
struct Node {
    rec_type: u16,
    kind: &'static str,
    ver: u8,
    instance: u16,
    length: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    persist_id: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Node>,
}

fn kind(rec: &Record) -> &'static str {
    match rec.body() {
        RecordBody::Atom(_) => "atom",
        RecordBody::Container(_) => "container",
        RecordBody::UserEdit(_) => "UserEditAtom",
        RecordBody::PersistPtr(_) => "PersistPtrHolder",
        RecordBody::Encryption(_) => "DocumentEncryptionAtom",
        RecordBody::BlipEntry(_) => "BlipStoreEntry",
    }
}

fn node(rec: &Record, depth: usize, max_depth: Option<usize>) -> Node {
    let h = rec.current_header();
    let children = match max_depth {
        Some(m) if depth >= m => Vec::new(),
        _ => rec
            .children()
            .iter()
            .map(|c| node(c, depth + 1, max_depth))
            .collect(),
    };
    Node {
        rec_type: h.rec_type,
        kind: kind(rec),
        ver: h.ver,
        instance: h.instance,
        length: h.length,
        offset: rec.last_on_disk_offset(),
        persist_id: rec.persist_id(),
        children,
    }
}

fn print_node(n: &Node, depth: usize) {
    let mut line = format!(
        "{:indent$}type={} ({}) ver={} inst={} len={}",
        "",
        n.rec_type,
        n.kind,
        n.ver,
        n.instance,
        n.length,
        indent = depth * 2
    );
    if let Some(off) = n.offset {
        line.push_str(&format!(" @{}", off));
    }
    if let Some(id) = n.persist_id {
        line.push_str(&format!(" persist={}", id));
    }
    println!("{}", line);
    for c in &n.children {
        print_node(c, depth + 1);
    }
}

pub fn exec(path: PathBuf, password: Option<String>, json: bool, depth: Option<usize>) -> Result<()> {
    let ss = util::open_doc(&path, password)?;
    let nodes: Vec<Node> = ss.records().iter().map(|r| node(r, 0, depth)).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    println!(
        "Document: {} top-level records, encrypted={}",
        nodes.len(),
        ss.is_encrypted()
    );
    for n in &nodes {
        print_node(n, 1);
    }
    Ok(())
}
