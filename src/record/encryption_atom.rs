use byteorder::{ByteOrder, LittleEndian};

use crate::consts::*;
use crate::error::{PptError, Result};

use super::{RecordHeader, TypedAtom};

/// Key-derivation and verifier material of an encrypted document.
///
/// Layout (LE):
///   [ver_major u16][ver_minor u16][flags u32][salt 16][enc_verifier 16][enc_verifier_hash 32]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEncryptionAtom {
    pub version_major: u16,
    pub version_minor: u16,
    pub flags: u32,
    pub salt: [u8; ENCRYPTION_SALT_SIZE],
    pub encrypted_verifier: [u8; ENCRYPTION_VERIFIER_SIZE],
    pub encrypted_verifier_hash: [u8; ENCRYPTION_VERIFIER_HASH_SIZE],
    pub trailing: Vec<u8>,
}

const FIXED_LEN: usize =
    8 + ENCRYPTION_SALT_SIZE + ENCRYPTION_VERIFIER_SIZE + ENCRYPTION_VERIFIER_HASH_SIZE;

impl DocumentEncryptionAtom {
    pub fn header() -> RecordHeader {
        RecordHeader::new(HDR_VER_CONTAINER, 0, RT_DOCUMENT_ENCRYPTION_ATOM, FIXED_LEN as u32)
    }
}

impl TypedAtom for DocumentEncryptionAtom {
    fn decode(_header: &RecordHeader, p: &[u8]) -> Result<Self> {
        if p.len() < FIXED_LEN {
            return Err(PptError::encrypted(format!(
                "encryption descriptor too short: {} bytes",
                p.len()
            )));
        }
        let mut salt = [0u8; ENCRYPTION_SALT_SIZE];
        let mut verifier = [0u8; ENCRYPTION_VERIFIER_SIZE];
        let mut verifier_hash = [0u8; ENCRYPTION_VERIFIER_HASH_SIZE];
        let mut pos = 8;
        salt.copy_from_slice(&p[pos..pos + ENCRYPTION_SALT_SIZE]);
        pos += ENCRYPTION_SALT_SIZE;
        verifier.copy_from_slice(&p[pos..pos + ENCRYPTION_VERIFIER_SIZE]);
        pos += ENCRYPTION_VERIFIER_SIZE;
        verifier_hash.copy_from_slice(&p[pos..pos + ENCRYPTION_VERIFIER_HASH_SIZE]);
        Ok(Self {
            version_major: LittleEndian::read_u16(&p[0..2]),
            version_minor: LittleEndian::read_u16(&p[2..4]),
            flags: LittleEndian::read_u32(&p[4..8]),
            salt,
            encrypted_verifier: verifier,
            encrypted_verifier_hash: verifier_hash,
            trailing: p[FIXED_LEN..].to_vec(),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version_major.to_le_bytes());
        out.extend_from_slice(&self.version_minor.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.encrypted_verifier);
        out.extend_from_slice(&self.encrypted_verifier_hash);
        out.extend_from_slice(&self.trailing);
    }

    fn payload_len(&self) -> usize {
        FIXED_LEN + self.trailing.len()
    }
}
