//! Centralized configuration for opening and saving documents.
//!
//! Goals:
//! - Single place for the size guards instead of scattering env lookups.
//! - Credentials travel explicitly with the config into open/save; there is no
//!   process-wide "current password".
//! - Fluent setters on the config plus a small builder.
//!
//! Env:
//! - PPT_MAX_RECORD_LENGTH  : max decoded bytes of a single record/picture.
//! - PPT_MAX_DOCUMENT_LENGTH: max bytes of the main document stream.
//! - PPT_PASSWORD           : password for encrypted documents.
//! - PPT_REPAIR_EDIT_CHAIN  : 0|false|off|no disables the edit-chain repair heuristic.

use std::fmt;

use crate::consts::{DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_MAX_RECORD_BYTES};

#[derive(Clone)]
pub struct PptConfig {
    /// Ceiling for any single record or picture payload.
    /// Env: PPT_MAX_RECORD_LENGTH (default 200_000_000)
    pub max_record_bytes: usize,

    /// Ceiling for the whole "PowerPoint Document" stream.
    /// Env: PPT_MAX_DOCUMENT_LENGTH (default 512 MiB)
    pub max_document_bytes: usize,

    /// Password for encrypted documents. None means the format default is tried.
    /// Env: PPT_PASSWORD
    pub password: Option<String>,

    /// Attempt the 36-byte heuristic when the edit chain loops back on itself.
    /// Env: PPT_REPAIR_EDIT_CHAIN (default true)
    pub repair_edit_chain: bool,
}

impl Default for PptConfig {
    fn default() -> Self {
        Self {
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            password: None,
            repair_edit_chain: true,
        }
    }
}

impl PptConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("PPT_MAX_RECORD_LENGTH") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.max_record_bytes = n;
            }
        }

        if let Ok(v) = std::env::var("PPT_MAX_DOCUMENT_LENGTH") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.max_document_bytes = n;
            }
        }

        if let Ok(v) = std::env::var("PPT_PASSWORD") {
            if !v.is_empty() {
                cfg.password = Some(v);
            }
        }

        if let Ok(v) = std::env::var("PPT_REPAIR_EDIT_CHAIN") {
            let s = v.trim().to_ascii_lowercase();
            cfg.repair_edit_chain = !(s == "0" || s == "false" || s == "off" || s == "no");
        }

        cfg
    }

    pub fn with_max_record_bytes(mut self, n: usize) -> Self {
        self.max_record_bytes = n;
        self
    }

    pub fn with_max_document_bytes(mut self, n: usize) -> Self {
        self.max_document_bytes = n;
        self
    }

    pub fn with_password<S: Into<String>>(mut self, password: Option<S>) -> Self {
        self.password = password.map(Into::into);
        self
    }

    pub fn with_repair_edit_chain(mut self, on: bool) -> Self {
        self.repair_edit_chain = on;
        self
    }

    pub fn build(self) -> Self {
        self
    }
}

impl fmt::Display for PptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PptConfig {{ \
             max_record_bytes: {}, \
             max_document_bytes: {}, \
             password: {}, \
             repair_edit_chain: {} \
             }}",
            self.max_record_bytes,
            self.max_document_bytes,
            if self.password.is_some() { "<set>" } else { "default" },
            self.repair_edit_chain,
        )
    }
}

// Debug goes through Display so the password never lands in logs.
impl fmt::Debug for PptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Lightweight builder that produces a PptConfig.
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    cfg: PptConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            cfg: PptConfig::from_env(),
        }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: PptConfig::default(),
        }
    }

    pub fn max_record_bytes(mut self, n: usize) -> Self {
        self.cfg.max_record_bytes = n;
        self
    }

    pub fn max_document_bytes(mut self, n: usize) -> Self {
        self.cfg.max_document_bytes = n;
        self
    }

    pub fn password<S: Into<String>>(mut self, password: Option<S>) -> Self {
        self.cfg.password = password.map(Into::into);
        self
    }

    pub fn repair_edit_chain(mut self, on: bool) -> Self {
        self.cfg.repair_edit_chain = on;
        self
    }

    pub fn build(self) -> PptConfig {
        self.cfg
    }
}
