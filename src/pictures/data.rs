//! pictures/data: one blob of the "Pictures" stream.
//!
//! Entry = [ver_inst u16][type u16][len u32] + payload, where payload is
//!   [uid 16][uid2 16 for double-uid instances][metafile header 34 | tag 1][image]

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::consts::*;
use crate::error::{PptError, Result};
use crate::record::RecordHeader;

use super::PictureType;

// metafile header layout
const MF_OFF_SIZE: usize = 0;
const MF_OFF_BOUNDS: usize = 4;
const MF_OFF_PT_SIZE: usize = 20;
const MF_OFF_SAVED_SIZE: usize = 28;
const MF_OFF_COMPRESSION: usize = 32;
const MF_OFF_FILTER: usize = 33;

/// ptSize of new metafiles, in EMU.
const EMU_PER_POINT: i32 = 12_700;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureData {
    pub(crate) offset: Option<u32>,
    pub(crate) header: RecordHeader,
    pub(crate) payload: Vec<u8>,
    /// Index of the matched descriptor among the blip store's children.
    pub(crate) descriptor: Option<usize>,
}

impl PictureData {
    pub(crate) fn from_stream(offset: u32, header: RecordHeader, payload: Vec<u8>) -> Self {
        Self {
            offset: Some(offset),
            header,
            payload,
            descriptor: None,
        }
    }

    /// Build a new blob around raw image bytes.
    pub fn new(ptype: PictureType, image: &[u8]) -> Result<Self> {
        let uid = content_uid(image);
        let mut payload = Vec::with_capacity(PICTURE_UID_SIZE + METAFILE_HEADER_SIZE + image.len());
        payload.extend_from_slice(&uid);
        if ptype.is_metafile() {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(image)?;
            let packed = enc.finish()?;

            let mut mf = [0u8; METAFILE_HEADER_SIZE];
            LittleEndian::write_u32(&mut mf[MF_OFF_SIZE..MF_OFF_SIZE + 4], image.len() as u32);
            LittleEndian::write_i32(&mut mf[MF_OFF_PT_SIZE..MF_OFF_PT_SIZE + 4], EMU_PER_POINT);
            LittleEndian::write_i32(&mut mf[MF_OFF_PT_SIZE + 4..MF_OFF_PT_SIZE + 8], EMU_PER_POINT);
            LittleEndian::write_u32(&mut mf[MF_OFF_SAVED_SIZE..MF_OFF_SAVED_SIZE + 4], packed.len() as u32);
            mf[MF_OFF_COMPRESSION] = METAFILE_COMPRESSION_DEFLATE;
            mf[MF_OFF_FILTER] = METAFILE_FILTER_NONE;
            payload.extend_from_slice(&mf);
            payload.extend_from_slice(&packed);
        } else {
            payload.push(BITMAP_TAG);
            payload.extend_from_slice(image);
        }
        let header = RecordHeader::new(0, ptype.default_instance(), ptype.rec_type(), payload.len() as u32);
        Ok(Self {
            offset: None,
            header,
            payload,
            descriptor: None,
        })
    }

    /// Position in the picture stream (None until first written).
    pub fn offset(&self) -> Option<u32> {
        self.offset
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// First header word as stored (instance and version).
    pub fn signature(&self) -> u16 {
        self.header.ver_inst()
    }

    pub fn picture_type(&self) -> Option<PictureType> {
        PictureType::from_rec_type(self.header.rec_type)
    }

    pub fn descriptor(&self) -> Option<usize> {
        self.descriptor
    }

    /// Payload after the preamble (uids, prefix, image).
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Size of the entry in the stream, preamble included.
    pub fn stream_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.payload.len()
    }

    /// Stored content checksum: the first 16 payload bytes.
    pub fn uid(&self) -> [u8; PICTURE_UID_SIZE] {
        let mut uid = [0u8; PICTURE_UID_SIZE];
        let n = self.payload.len().min(PICTURE_UID_SIZE);
        uid[..n].copy_from_slice(&self.payload[..n]);
        uid
    }

    fn has_double_uid(&self) -> bool {
        BLIP_DOUBLE_UID_INSTANCES.contains(&self.header.instance)
    }

    fn body_start(&self) -> usize {
        if self.has_double_uid() {
            2 * PICTURE_UID_SIZE
        } else {
            PICTURE_UID_SIZE
        }
    }

    /// Raw image bytes: metafiles inflated, bitmap tag skipped.
    /// `limit` bounds the inflated size.
    pub fn image_bytes(&self, limit: usize) -> Result<Vec<u8>> {
        let ptype = self.picture_type().ok_or_else(|| {
            PptError::corrupt(format!(
                "unknown picture record type {:#06x}",
                self.header.rec_type
            ))
        })?;
        let start = self.body_start();
        if ptype.is_metafile() {
            let body = start + METAFILE_HEADER_SIZE;
            if self.payload.len() < body {
                return Err(PptError::corrupt("metafile header truncated"));
            }
            let mf = &self.payload[start..body];
            let size = LittleEndian::read_u32(&mf[MF_OFF_SIZE..MF_OFF_SIZE + 4]) as usize;
            let saved = LittleEndian::read_u32(&mf[MF_OFF_SAVED_SIZE..MF_OFF_SAVED_SIZE + 4]) as usize;
            let data = &self.payload[body..(body + saved).min(self.payload.len())];
            if mf[MF_OFF_COMPRESSION] != METAFILE_COMPRESSION_DEFLATE {
                return Ok(data.to_vec());
            }
            if size > limit {
                return Err(PptError::RecordTooLarge {
                    offset: self.offset.unwrap_or(0) as usize,
                    len: size,
                    limit,
                });
            }
            let mut out = Vec::with_capacity(size);
            ZlibDecoder::new(data)
                .take(limit as u64 + 1)
                .read_to_end(&mut out)?;
            if out.len() > limit {
                return Err(PptError::RecordTooLarge {
                    offset: self.offset.unwrap_or(0) as usize,
                    len: out.len(),
                    limit,
                });
            }
            Ok(out)
        } else {
            let data = start + 1;
            if self.payload.len() < data {
                return Err(PptError::corrupt("bitmap picture truncated before its tag"));
            }
            Ok(self.payload[data..].to_vec())
        }
    }

    /// Bounds rectangle of a metafile (left, top, right, bottom).
    pub fn metafile_bounds(&self) -> Option<[i32; 4]> {
        if !self.picture_type()?.is_metafile() {
            return None;
        }
        let at = self.body_start() + MF_OFF_BOUNDS;
        let b = self.payload.get(at..at + 16)?;
        Some([
            LittleEndian::read_i32(&b[0..4]),
            LittleEndian::read_i32(&b[4..8]),
            LittleEndian::read_i32(&b[8..12]),
            LittleEndian::read_i32(&b[12..16]),
        ])
    }

    /// Preamble + payload as stored (plaintext).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.stream_len());
        out.extend_from_slice(&self.header.with_length(self.payload.len() as u32).to_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// 16-byte content checksum of new pictures.
pub fn content_uid(image: &[u8]) -> [u8; PICTURE_UID_SIZE] {
    let digest = Sha256::digest(image);
    let mut uid = [0u8; PICTURE_UID_SIZE];
    uid.copy_from_slice(&digest[..PICTURE_UID_SIZE]);
    uid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_image_bytes() {
        let p = PictureData::new(PictureType::Png, b"\x89PNG fake").unwrap();
        assert_eq!(p.uid(), content_uid(b"\x89PNG fake"));
        assert_eq!(p.image_bytes(1024).unwrap(), b"\x89PNG fake".to_vec());
        assert_eq!(p.stream_len(), 8 + 16 + 1 + 9);
    }

    #[test]
    fn metafile_is_inflated() {
        let wmf: Vec<u8> = (0..2000u32).map(|i| (i % 7) as u8).collect();
        let p = PictureData::new(PictureType::Wmf, &wmf).unwrap();
        assert!(p.payload().len() < wmf.len());
        assert_eq!(p.image_bytes(10_000).unwrap(), wmf);
        assert!(p.image_bytes(100).is_err());
        assert_eq!(p.metafile_bounds(), Some([0, 0, 0, 0]));
    }
}
