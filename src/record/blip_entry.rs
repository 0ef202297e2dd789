use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::consts::{BSE_FIXED_SIZE, ESCHER_BSE, PICTURE_UID_SIZE};
use crate::error::{PptError, Result};

use super::{RecordHeader, TypedAtom};

/// File BLIP Store Entry: descriptor of one picture in the "Pictures" stream.
///
/// Layout (LE, 36 fixed bytes):
///   [btWin32 u8][btMacOS u8][uid 16][tag u16][size u32][cRef u32][foDelay u32]
///   [usage u8][cbName u8][unused2 u8][unused3 u8][name; cbName][embedded blip...]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlipStoreEntry {
    pub blip_type_win32: u8,
    pub blip_type_macos: u8,
    /// Content checksum of the picture.
    pub uid: [u8; PICTURE_UID_SIZE],
    pub tag: u16,
    /// Size of the blob in the picture stream, preamble included.
    pub size: u32,
    pub ref_count: u32,
    /// Position of the blob in the picture stream (foDelay).
    pub offset: u32,
    pub usage: u8,
    pub name: Vec<u8>,
    pub unused2: u8,
    pub unused3: u8,
    /// Blip stored inline after the entry, kept verbatim.
    pub embedded: Vec<u8>,
}

impl BlipStoreEntry {
    pub fn new(blip_type: u8, uid: [u8; PICTURE_UID_SIZE], size: u32, offset: u32) -> Self {
        Self {
            blip_type_win32: blip_type,
            blip_type_macos: blip_type,
            uid,
            tag: 0xFF,
            size,
            ref_count: 0,
            offset,
            usage: 0,
            name: Vec::new(),
            unused2: 0,
            unused3: 0,
            embedded: Vec::new(),
        }
    }

    /// escher convention: ver 2, instance = blip type.
    pub fn header(&self) -> RecordHeader {
        RecordHeader::new(0x2, self.blip_type_win32 as u16, ESCHER_BSE, 0)
    }
}

impl TypedAtom for BlipStoreEntry {
    fn decode(_header: &RecordHeader, p: &[u8]) -> Result<Self> {
        if p.len() < BSE_FIXED_SIZE {
            return Err(PptError::corrupt(format!(
                "BSE record too short: {} bytes",
                p.len()
            )));
        }
        let mut uid = [0u8; PICTURE_UID_SIZE];
        uid.copy_from_slice(&p[2..18]);
        let cb_name = p[33] as usize;
        let name_end = BSE_FIXED_SIZE + cb_name;
        let (name, embedded) = if name_end > p.len() {
            warn!(
                "BSE name length {} runs past record end ({} bytes available)",
                cb_name,
                p.len() - BSE_FIXED_SIZE
            );
            (p[BSE_FIXED_SIZE..].to_vec(), Vec::new())
        } else {
            (p[BSE_FIXED_SIZE..name_end].to_vec(), p[name_end..].to_vec())
        };
        Ok(Self {
            blip_type_win32: p[0],
            blip_type_macos: p[1],
            uid,
            tag: LittleEndian::read_u16(&p[18..20]),
            size: LittleEndian::read_u32(&p[20..24]),
            ref_count: LittleEndian::read_u32(&p[24..28]),
            offset: LittleEndian::read_u32(&p[28..32]),
            usage: p[32],
            name,
            unused2: p[34],
            unused3: p[35],
            embedded,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.blip_type_win32);
        out.push(self.blip_type_macos);
        out.extend_from_slice(&self.uid);
        out.extend_from_slice(&self.tag.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.ref_count.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.push(self.usage);
        out.push(self.name.len().min(u8::MAX as usize) as u8);
        out.push(self.unused2);
        out.push(self.unused3);
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&self.embedded);
    }

    fn payload_len(&self) -> usize {
        BSE_FIXED_SIZE + self.name.len() + self.embedded.len()
    }
}
