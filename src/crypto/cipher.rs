//! crypto/cipher: per-block keystream cipher and the writer that applies it.
//!
//! block_key = HMAC-SHA256(master, "pptstore.block" || block_le)
//! keystream = HMAC-SHA256(block_key, 0_le) || HMAC-SHA256(block_key, 1_le) || ...
//!
//! XOR stream: encrypt and decrypt are the same transform. State is not
//! shared across blocks; every record (or picture segment) starts from a
//! fresh `BlockCipher::init`.

use std::io::{self, Write};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{PptError, Result};

type HmacSha256 = Hmac<Sha256>;

const BLOCK_LABEL: &[u8] = b"pptstore.block";
const CHUNK: usize = 32;

fn hmac(key: &[u8], parts: &[&[u8]]) -> Result<[u8; CHUNK]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| PptError::encrypted(format!("hmac key init: {}", e)))?;
    for p in parts {
        mac.update(p);
    }
    let mut out = [0u8; CHUNK];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

pub struct BlockCipher {
    block_key: [u8; CHUNK],
    counter: u64,
    stream: [u8; CHUNK],
    used: usize,
}

impl BlockCipher {
    /// Cipher state for one block of the document.
    pub fn init(master: &[u8; 32], block: u32) -> Result<Self> {
        let block_key = hmac(master, &[BLOCK_LABEL, &block.to_le_bytes()])?;
        Ok(Self {
            block_key,
            counter: 0,
            stream: [0u8; CHUNK],
            used: CHUNK,
        })
    }

    pub fn apply(&mut self, data: &mut [u8]) -> Result<()> {
        for b in data.iter_mut() {
            if self.used == CHUNK {
                self.stream = hmac(&self.block_key, &[&self.counter.to_le_bytes()])?;
                self.counter += 1;
                self.used = 0;
            }
            *b ^= self.stream[self.used];
            self.used += 1;
        }
        Ok(())
    }
}

impl Drop for BlockCipher {
    fn drop(&mut self) {
        self.block_key.zeroize();
        self.stream.zeroize();
    }
}

/// Writer that encrypts everything passing through it with one block cipher.
pub struct CipherWriter<W: Write> {
    inner: W,
    cipher: BlockCipher,
    scratch: Vec<u8>,
}

impl<W: Write> CipherWriter<W> {
    pub fn new(inner: W, cipher: BlockCipher) -> Self {
        Self {
            inner,
            cipher,
            scratch: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CipherWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.cipher
            .apply(&mut self.scratch)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        self.inner.write_all(&self.scratch)?;
        self.scratch.zeroize();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
