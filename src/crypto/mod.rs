//! crypto: per-record encryption of the document and picture streams.
//!
//! - KeyMaterial: 32-byte master key, zeroized on drop.
//! - EncryptionProvider: password verify/confirm against the descriptor atom
//!   and the per-block cipher factory. `StandardProvider` is the default.
//! - EncryptionSession: what open/save consult. Without a descriptor it is a
//!   pass-through; with one, every non-bookkeeping record is transformed with
//!   a cipher keyed by its persist id.
//!
//! UserEditAtom, PersistPtrHolder and the DocumentEncryptionAtom itself are
//! always stored in plaintext.
//!
//! Usage:
//!   let session = EncryptionSession::open(&atom, cfg.password.as_deref())?;
//!   session.decrypt_record(&mut stream, persist_id, offset)?;
//!   let mut sink = session.encrypt_record(&mut out, persist_id, rec.rec_type())?;
//!   rec.write_to(&mut sink)?;

use std::io::{self, Write};
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::consts::*;
use crate::error::{PptError, Result};
use crate::record::{DocumentEncryptionAtom, RecordHeader, UserEditAtom};

pub mod cipher;
mod picture;

pub use cipher::{BlockCipher, CipherWriter};

/// 32-byte master key.
#[derive(Clone)]
pub struct KeyMaterial {
    pub key: [u8; 32],
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// Key derivation / verification collaborator.
pub trait EncryptionProvider: Send + Sync {
    /// Master key for `password`, or None if the descriptor's verifier rejects it.
    fn verify(&self, atom: &DocumentEncryptionAtom, password: &str) -> Result<Option<KeyMaterial>>;

    /// Fresh descriptor material for a new password.
    fn confirm(&self, password: &str) -> Result<(DocumentEncryptionAtom, KeyMaterial)>;

    /// Cipher initialised for one block (record persist id, 0 for pictures).
    fn cipher_for_block(&self, key: &KeyMaterial, block: u32) -> Result<BlockCipher> {
        BlockCipher::init(&key.key, block)
    }
}

/// SHA-256 spin key derivation, HMAC-SHA256 keystream.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardProvider;

/// H0 = SHA256(salt || utf16le(password)); Hn = SHA256(n_le || Hn-1).
pub fn derive_key(password: &str, salt: &[u8; ENCRYPTION_SALT_SIZE]) -> KeyMaterial {
    let mut h = Sha256::new();
    h.update(salt);
    for unit in password.encode_utf16() {
        h.update(unit.to_le_bytes());
    }
    let mut digest = h.finalize();
    for i in 0..ENCRYPTION_SPIN_COUNT {
        let mut h = Sha256::new();
        h.update(i.to_le_bytes());
        h.update(digest);
        digest = h.finalize();
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    digest.as_mut_slice().zeroize();
    KeyMaterial { key }
}

#[inline]
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for i in 0..a.len() {
        acc |= a[i] ^ b[i];
    }
    acc == 0
}

impl EncryptionProvider for StandardProvider {
    fn verify(&self, atom: &DocumentEncryptionAtom, password: &str) -> Result<Option<KeyMaterial>> {
        let key = derive_key(password, &atom.salt);
        let mut buf = [0u8; ENCRYPTION_VERIFIER_SIZE + ENCRYPTION_VERIFIER_HASH_SIZE];
        buf[..ENCRYPTION_VERIFIER_SIZE].copy_from_slice(&atom.encrypted_verifier);
        buf[ENCRYPTION_VERIFIER_SIZE..].copy_from_slice(&atom.encrypted_verifier_hash);
        self.cipher_for_block(&key, 0)?.apply(&mut buf)?;
        let expected = Sha256::digest(&buf[..ENCRYPTION_VERIFIER_SIZE]);
        let ok = constant_time_eq(&expected, &buf[ENCRYPTION_VERIFIER_SIZE..]);
        buf.zeroize();
        Ok(if ok { Some(key) } else { None })
    }

    fn confirm(&self, password: &str) -> Result<(DocumentEncryptionAtom, KeyMaterial)> {
        let mut salt = [0u8; ENCRYPTION_SALT_SIZE];
        let mut verifier = [0u8; ENCRYPTION_VERIFIER_SIZE];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut verifier);
        let key = derive_key(password, &salt);

        let mut buf = [0u8; ENCRYPTION_VERIFIER_SIZE + ENCRYPTION_VERIFIER_HASH_SIZE];
        buf[..ENCRYPTION_VERIFIER_SIZE].copy_from_slice(&verifier);
        buf[ENCRYPTION_VERIFIER_SIZE..].copy_from_slice(&Sha256::digest(verifier));
        self.cipher_for_block(&key, 0)?.apply(&mut buf)?;
        verifier.zeroize();

        let mut atom = DocumentEncryptionAtom {
            version_major: ENCRYPTION_VERSION_MAJOR,
            version_minor: ENCRYPTION_VERSION_MINOR,
            flags: 0,
            salt,
            encrypted_verifier: [0u8; ENCRYPTION_VERIFIER_SIZE],
            encrypted_verifier_hash: [0u8; ENCRYPTION_VERIFIER_HASH_SIZE],
            trailing: Vec::new(),
        };
        atom.encrypted_verifier
            .copy_from_slice(&buf[..ENCRYPTION_VERIFIER_SIZE]);
        atom.encrypted_verifier_hash
            .copy_from_slice(&buf[ENCRYPTION_VERIFIER_SIZE..]);
        Ok((atom, key))
    }
}

/// Record types that are never encrypted.
#[inline]
pub fn is_plaintext_record_type(rec_type: u16) -> bool {
    matches!(
        rec_type,
        RT_USER_EDIT_ATOM | RT_PERSIST_PTR_FULL | RT_PERSIST_PTR_INCREMENTAL | RT_DOCUMENT_ENCRYPTION_ATOM
    )
}

/// Plaintext header of a bookkeeping record (exact shape, not just type).
fn is_plaintext_header(h: &RecordHeader) -> bool {
    UserEditAtom::is_valid_header(h)
        || (h.ver_inst() == 0
            && matches!(h.rec_type, RT_PERSIST_PTR_FULL | RT_PERSIST_PTR_INCREMENTAL))
        || (h.rec_type == RT_DOCUMENT_ENCRYPTION_ATOM && h.ver == HDR_VER_CONTAINER && h.instance == 0)
}

#[derive(Clone)]
pub struct EncryptionSession {
    key: Option<KeyMaterial>,
    provider: Arc<dyn EncryptionProvider>,
}

impl std::fmt::Debug for EncryptionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionSession")
            .field("encrypted", &self.key.is_some())
            .finish()
    }
}

impl Default for EncryptionSession {
    fn default() -> Self {
        Self::plaintext()
    }
}

impl EncryptionSession {
    /// Pass-through session (no encryption descriptor).
    pub fn plaintext() -> Self {
        Self {
            key: None,
            provider: Arc::new(StandardProvider),
        }
    }

    /// Verify `password` (or the format default) against the descriptor.
    pub fn open(atom: &DocumentEncryptionAtom, password: Option<&str>) -> Result<Self> {
        Self::open_with(Arc::new(StandardProvider), atom, password)
    }

    pub fn open_with(
        provider: Arc<dyn EncryptionProvider>,
        atom: &DocumentEncryptionAtom,
        password: Option<&str>,
    ) -> Result<Self> {
        let pw = password.unwrap_or(DEFAULT_PASSWORD);
        match provider.verify(atom, pw)? {
            Some(key) => Ok(Self {
                key: Some(key),
                provider,
            }),
            None => Err(PptError::encrypted(if password.is_some() {
                "password does not match the document's encryption verifier"
            } else {
                "document is encrypted; a password must be supplied"
            })),
        }
    }

    /// New descriptor + session for `password`.
    pub fn create(password: &str) -> Result<(Self, DocumentEncryptionAtom)> {
        let provider: Arc<dyn EncryptionProvider> = Arc::new(StandardProvider);
        let (atom, key) = provider.confirm(password)?;
        Ok((
            Self {
                key: Some(key),
                provider,
            },
            atom,
        ))
    }

    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    fn cipher(&self, key: &KeyMaterial, block: u32) -> Result<BlockCipher> {
        self.provider.cipher_for_block(key, block)
    }

    /// Decrypt the record at `offset` in place: header first (to learn the
    /// real payload length), then exactly that many payload bytes.
    pub fn decrypt_record(&self, stream: &mut [u8], persist_id: u32, offset: usize) -> Result<()> {
        let key = match &self.key {
            Some(k) => k,
            None => return Ok(()),
        };
        let plain = RecordHeader::read(stream, offset)?;
        if is_plaintext_header(&plain) {
            return Ok(());
        }

        let mut c = self.cipher(key, persist_id)?;
        let hdr_end = offset + RECORD_HEADER_SIZE;
        c.apply(&mut stream[offset..hdr_end])?;
        let h = RecordHeader::read(stream, offset)?;
        let end = hdr_end
            .checked_add(h.length as usize)
            .filter(|&e| e <= stream.len())
            .ok_or_else(|| {
                PptError::corrupt(format!(
                    "decrypted record at {} (persist id {}) declares {} bytes past end of stream",
                    offset, persist_id, h.length
                ))
            })?;
        c.apply(&mut stream[hdr_end..end])?;
        Ok(())
    }

    /// Sink for one record's encoded bytes: plain for bookkeeping types or
    /// unencrypted documents, otherwise a cipher stream initialised for
    /// `persist_id`.
    pub fn encrypt_record<'w, W: Write>(
        &self,
        out: &'w mut W,
        persist_id: u32,
        rec_type: u16,
    ) -> Result<RecordSink<'w, W>> {
        match &self.key {
            Some(key) if !is_plaintext_record_type(rec_type) => Ok(RecordSink::Cipher(
                CipherWriter::new(out, self.cipher(key, persist_id)?),
            )),
            _ => Ok(RecordSink::Plain(out)),
        }
    }
}

/// Per-record output returned by `encrypt_record`.
pub enum RecordSink<'w, W: Write> {
    Plain(&'w mut W),
    Cipher(CipherWriter<&'w mut W>),
}

impl<'w, W: Write> Write for RecordSink<'w, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            RecordSink::Plain(w) => w.write(buf),
            RecordSink::Cipher(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            RecordSink::Plain(w) => w.flush(),
            RecordSink::Cipher(w) => w.flush(),
        }
    }
}
