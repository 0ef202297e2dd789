//! record/current_user: the "Current User" stream.
//!
//! Layout (LE):
//!   [atom header 8: ver_inst=0, type=4086, len]
//!   [size u32 = 20][header_token u32][offset_to_current_edit u32]
//!   [len_user_name u16][doc_final_version u16][major u8][minor u8][unused u16]
//!   [ansi user name; len_user_name][release_version u32][unicode user name; 2*len]
//!
//! This is the only entry point into the edit chain: `current_edit_offset` is
//! the position of the active UserEditAtom in the document stream.

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::consts::*;
use crate::error::{PptError, Result};

use super::RecordHeader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUserAtom {
    pub encrypted: bool,
    pub current_edit_offset: u32,
    pub doc_final_version: u16,
    pub major_version: u8,
    pub minor_version: u8,
    pub user_name: String,
    pub release_version: u32,
}

impl Default for CurrentUserAtom {
    fn default() -> Self {
        Self {
            encrypted: false,
            current_edit_offset: 0,
            doc_final_version: DOC_FINAL_VERSION,
            major_version: CURRENT_USER_MAJOR,
            minor_version: CURRENT_USER_MINOR,
            user_name: "pptstore".to_string(),
            release_version: CURRENT_USER_RELEASE,
        }
    }
}

impl CurrentUserAtom {
    /// Parse the stream contents. Detects the PowerPoint 95 layout
    /// (4-byte size followed by exactly that many bytes) before anything else.
    pub fn parse(contents: &[u8]) -> Result<Self> {
        if contents.len() < CURRENT_USER_MIN_SIZE {
            if contents.len() >= 4 {
                let size = LittleEndian::read_u32(&contents[0..4]) as usize;
                if size + 4 == contents.len() {
                    return Err(PptError::OldFormat(
                        "the Current User stream has the PowerPoint 95 layout".to_string(),
                    ));
                }
            }
            return Err(PptError::corrupt(format!(
                "Current User stream is only {} bytes, need at least {}",
                contents.len(),
                CURRENT_USER_MIN_SIZE
            )));
        }

        let token = LittleEndian::read_u32(&contents[CU_OFF_TOKEN..CU_OFF_TOKEN + 4]);
        let encrypted = token == HEADER_TOKEN_ENCRYPTED;
        if !encrypted && token != HEADER_TOKEN_PLAIN {
            warn!("unexpected Current User header token {:#010x}", token);
        }

        let current_edit_offset =
            LittleEndian::read_u32(&contents[CU_OFF_EDIT_OFFSET..CU_OFF_EDIT_OFFSET + 4]);
        let doc_final_version =
            LittleEndian::read_u16(&contents[CU_OFF_DOC_VERSION..CU_OFF_DOC_VERSION + 2]);
        let major_version = contents[CU_OFF_MAJOR];
        let minor_version = contents[CU_OFF_MINOR];

        let mut name_len =
            LittleEndian::read_u16(&contents[CU_OFF_NAME_LEN..CU_OFF_NAME_LEN + 2]) as usize;
        if name_len > CURRENT_USER_MAX_NAME {
            warn!(
                "invalid user name length {} in Current User stream, treating as unset",
                name_len
            );
            name_len = 0;
        }

        let release_at = CU_OFF_NAME + name_len;
        let release_version = if contents.len() >= release_at + 4 {
            LittleEndian::read_u32(&contents[release_at..release_at + 4])
        } else {
            0
        };

        // Prefer the unicode copy when it is fully present.
        let uni_at = release_at + 4;
        let user_name = if name_len > 0 && contents.len() >= uni_at + 2 * name_len {
            let units: Vec<u16> = contents[uni_at..uni_at + 2 * name_len]
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            let end = (CU_OFF_NAME + name_len).min(contents.len());
            contents[CU_OFF_NAME..end].iter().map(|&b| b as char).collect()
        };

        Ok(Self {
            encrypted,
            current_edit_offset,
            doc_final_version,
            major_version,
            minor_version,
            user_name,
            release_version,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // ANSI copy is a byte per char; anything outside latin-1 becomes '?'.
        let ansi: Vec<u8> = self
            .user_name
            .chars()
            .take(CURRENT_USER_MAX_NAME)
            .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
            .collect();
        let uni: Vec<u16> = self
            .user_name
            .chars()
            .take(ansi.len())
            .map(|c| if (c as u32) < 0x10000 { c as u16 } else { u16::from(b'?') })
            .collect();

        let atom_len = CURRENT_USER_SIZE_FIELD as usize + 4 + ansi.len();
        let header = RecordHeader::new(0, 0, RT_CURRENT_USER_ATOM, atom_len as u32);

        let mut out = Vec::with_capacity(RECORD_HEADER_SIZE + atom_len + 2 * uni.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&CURRENT_USER_SIZE_FIELD.to_le_bytes());
        let token = if self.encrypted {
            HEADER_TOKEN_ENCRYPTED
        } else {
            HEADER_TOKEN_PLAIN
        };
        out.extend_from_slice(&token.to_le_bytes());
        out.extend_from_slice(&self.current_edit_offset.to_le_bytes());
        out.extend_from_slice(&(ansi.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.doc_final_version.to_le_bytes());
        out.push(self.major_version);
        out.push(self.minor_version);
        out.extend_from_slice(&[0u8, 0u8]);
        out.extend_from_slice(&ansi);
        out.extend_from_slice(&self.release_version.to_le_bytes());
        for u in uni {
            out.extend_from_slice(&u.to_le_bytes());
        }
        out
    }
}
