//! crypto/picture: per-segment transform of one entry in the "Pictures" stream.
//!
//! Entry grammar (each item is its own segment, cipher re-initialised at block 0):
//!   [header 8]
//!   BSE entry:  [FBSE fixed parts...][cbName (plain)][name; cbName] then a nested blip
//!   blip:       [uid 16][uid2 16 if double-uid instance][metafile header 34 | tag 1][data...]
//!
//! Decrypting applies the cipher before a segment is interpreted; encrypting
//! interprets the plaintext first. Both directions walk identical boundaries.

use crate::consts::*;
use crate::error::{PptError, Result};
use crate::record::RecordHeader;

use super::{EncryptionSession, KeyMaterial};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Decrypt,
    Encrypt,
}

struct Segments<'a> {
    session: &'a EncryptionSession,
    key: &'a KeyMaterial,
    buf: &'a mut [u8],
    pos: usize,
    dir: Direction,
}

impl<'a> Segments<'a> {
    /// Transform `n` bytes at the cursor; returns the plaintext copy.
    fn seg(&mut self, n: usize, end: usize) -> Result<Vec<u8>> {
        let range = self.range(n, end)?;
        let mut c = self.session.cipher(self.key, 0)?;
        let plain = match self.dir {
            Direction::Decrypt => {
                c.apply(&mut self.buf[range.clone()])?;
                self.buf[range].to_vec()
            }
            Direction::Encrypt => {
                let plain = self.buf[range.clone()].to_vec();
                c.apply(&mut self.buf[range])?;
                plain
            }
        };
        Ok(plain)
    }

    /// Transform `n` bytes without keeping a copy.
    fn bulk(&mut self, n: usize, end: usize) -> Result<()> {
        let range = self.range(n, end)?;
        self.session.cipher(self.key, 0)?.apply(&mut self.buf[range])
    }

    fn skip(&mut self, n: usize, end: usize) -> Result<()> {
        self.range(n, end).map(|_| ())
    }

    fn range(&mut self, n: usize, end: usize) -> Result<std::ops::Range<usize>> {
        let start = self.pos;
        let stop = start
            .checked_add(n)
            .filter(|&s| s <= end && s <= self.buf.len())
            .ok_or_else(|| {
                PptError::corrupt(format!(
                    "picture segment of {} bytes at {} runs past its entry end {}",
                    n, start, end
                ))
            })?;
        self.pos = stop;
        Ok(start..stop)
    }

    fn header(&mut self, end: usize) -> Result<RecordHeader> {
        let plain = self.seg(RECORD_HEADER_SIZE, end)?;
        RecordHeader::read(&plain, 0)
    }

    /// One entry (BSE or blip) at the cursor, bounded by `limit`.
    fn entry(&mut self, limit: usize) -> Result<()> {
        let h = self.header(limit)?;
        let end = self
            .pos
            .checked_add(h.length as usize)
            .filter(|&e| e <= limit)
            .ok_or_else(|| {
                PptError::corrupt(format!(
                    "picture record type {:#06x} declares {} bytes past the end of its stream",
                    h.rec_type, h.length
                ))
            })?;

        if h.rec_type == ESCHER_BSE {
            let mut cb_name = 0usize;
            let mut at = 0usize;
            for part in BSE_PARTS {
                if at == BSE_OFF_CB_NAME {
                    self.skip(part, end)?;
                    cb_name = self.buf[self.pos - 1] as usize;
                } else {
                    self.seg(part, end)?;
                }
                at += part;
            }
            if cb_name > 0 {
                self.bulk(cb_name, end)?;
            }
            if self.pos < end {
                self.entry(end)?;
            }
            return Ok(());
        }

        if (ESCHER_BLIP_FIRST..=ESCHER_BLIP_LAST).contains(&h.rec_type) {
            self.seg(PICTURE_UID_SIZE, end)?;
            if BLIP_DOUBLE_UID_INSTANCES.contains(&h.instance) {
                self.seg(PICTURE_UID_SIZE, end)?;
            }
            let prefix = match h.rec_type {
                ESCHER_BLIP_EMF | ESCHER_BLIP_WMF | ESCHER_BLIP_PICT => METAFILE_HEADER_SIZE,
                _ => 1,
            };
            self.seg(prefix, end)?;
        }
        let rest = end - self.pos;
        if rest > 0 {
            self.bulk(rest, end)?;
        }
        Ok(())
    }
}

impl EncryptionSession {
    /// Decrypt the picture entry at `offset` in place.
    pub fn decrypt_picture(&self, pictures: &mut [u8], offset: usize) -> Result<()> {
        self.transform_picture(pictures, offset, Direction::Decrypt)
    }

    /// Encrypt the plaintext picture entry at `offset` in place.
    pub fn encrypt_picture(&self, pictures: &mut [u8], offset: usize) -> Result<()> {
        self.transform_picture(pictures, offset, Direction::Encrypt)
    }

    fn transform_picture(&self, pictures: &mut [u8], offset: usize, dir: Direction) -> Result<()> {
        let key = match &self.key {
            Some(k) => k,
            None => return Ok(()),
        };
        let limit = pictures.len();
        let mut s = Segments {
            session: self,
            key,
            buf: pictures,
            pos: offset,
            dir,
        };
        s.entry(limit)
    }
}
