use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    HDR_OFF_LEN, HDR_OFF_TYPE, HDR_OFF_VER_INST, HDR_VER_CONTAINER, HDR_VER_MASK,
    RECORD_HEADER_SIZE,
};
use crate::error::{PptError, Result};

/// 8-byte record header:
///   [ver_inst u16: bits 0..4 = ver, bits 4..16 = instance][type u16][len u32]
/// `length` is the payload length, excluding the header itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordHeader {
    pub ver: u8,
    pub instance: u16,
    pub rec_type: u16,
    pub length: u32,
}

impl RecordHeader {
    pub fn new(ver: u8, instance: u16, rec_type: u16, length: u32) -> Self {
        Self {
            ver: ver & HDR_VER_MASK as u8,
            instance: instance & 0x0FFF,
            rec_type,
            length,
        }
    }

    /// Unpack the header at `offset`. Fails if fewer than 8 bytes remain.
    pub fn read(buf: &[u8], offset: usize) -> Result<Self> {
        let end = offset
            .checked_add(RECORD_HEADER_SIZE)
            .filter(|&e| e <= buf.len())
            .ok_or_else(|| {
                PptError::corrupt(format!(
                    "record header at offset {} runs past end of data ({} bytes)",
                    offset,
                    buf.len()
                ))
            })?;
        let h = &buf[offset..end];
        let ver_inst = LittleEndian::read_u16(&h[HDR_OFF_VER_INST..HDR_OFF_VER_INST + 2]);
        Ok(Self {
            ver: (ver_inst & HDR_VER_MASK) as u8,
            instance: ver_inst >> 4,
            rec_type: LittleEndian::read_u16(&h[HDR_OFF_TYPE..HDR_OFF_TYPE + 2]),
            length: LittleEndian::read_u32(&h[HDR_OFF_LEN..HDR_OFF_LEN + 4]),
        })
    }

    /// Packed first header word.
    #[inline]
    pub fn ver_inst(&self) -> u16 {
        ((self.instance & 0x0FFF) << 4) | (self.ver as u16 & HDR_VER_MASK)
    }

    #[inline]
    pub fn has_container_ver(&self) -> bool {
        self.ver == HDR_VER_CONTAINER
    }

    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut out = [0u8; RECORD_HEADER_SIZE];
        LittleEndian::write_u16(&mut out[HDR_OFF_VER_INST..HDR_OFF_VER_INST + 2], self.ver_inst());
        LittleEndian::write_u16(&mut out[HDR_OFF_TYPE..HDR_OFF_TYPE + 2], self.rec_type);
        LittleEndian::write_u32(&mut out[HDR_OFF_LEN..HDR_OFF_LEN + 4], self.length);
        out
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bit_packing() {
        // ver=0xF, instance=0x123, type=0x03E8, len=0x10
        let raw = [0x3F, 0x12, 0xE8, 0x03, 0x10, 0x00, 0x00, 0x00];
        let h = RecordHeader::read(&raw, 0).unwrap();
        assert_eq!(h.ver, 0xF);
        assert_eq!(h.instance, 0x123);
        assert_eq!(h.rec_type, 1000);
        assert_eq!(h.length, 16);
        assert!(h.has_container_ver());
        assert_eq!(h.to_bytes(), raw);
    }

    #[test]
    fn header_masks_out_of_range_fields() {
        let h = RecordHeader::new(0x1F, 0xF123, 7, 0);
        assert_eq!(h.ver, 0xF);
        assert_eq!(h.instance, 0x123);
        assert_eq!(h.ver_inst(), 0x123F);
    }

    #[test]
    fn header_too_short() {
        let err = RecordHeader::read(&[0u8; 7], 0).unwrap_err();
        assert!(err.is_corrupt());
        assert!(RecordHeader::read(&[0u8; 16], 9).is_err());
    }
}
