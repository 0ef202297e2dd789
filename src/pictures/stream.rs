//! pictures/stream: read and write the flat "Pictures" stream.
//!
//! Reading is best-effort: an entry type outside the blip range ends the
//! walk, an unknown blip type is skipped and an entry that runs past the end
//! of the stream stops the walk. All three are logged. Only the size guard is
//! fatal.

use log::{debug, error, warn};

use crate::consts::*;
use crate::crypto::EncryptionSession;
use crate::error::{PptError, Result};
use crate::record::RecordHeader;

use super::{PictureData, PictureType};

/// Parse every blob in `stream`. The buffer is decrypted in place.
pub fn read_pictures(
    stream: &mut [u8],
    session: &EncryptionSession,
    max_record_bytes: usize,
) -> Result<Vec<PictureData>> {
    let mut pictures = Vec::new();
    let mut pos = 0usize;

    // An empty entry still takes up its 8-byte preamble.
    while pos + PICTURE_PREAMBLE_SIZE <= stream.len() {
        let offset = pos;
        if let Err(e) = session.decrypt_picture(stream, offset) {
            warn!(
                "\"Pictures\" stream may have ended early: entry at {} could not be decrypted ({})",
                offset, e
            );
            break;
        }
        let header = RecordHeader::read(stream, offset)?;
        pos += PICTURE_PREAMBLE_SIZE;

        let rec_type = header.rec_type;
        if !(rec_type == ESCHER_BSE || (ESCHER_BLIP_FIRST..=ESCHER_BLIP_LAST).contains(&rec_type)) {
            debug!(
                "picture stream walk ends at {}: record type {:#06x} is not a blip",
                offset, rec_type
            );
            break;
        }

        let len = header.length as usize;
        if len > max_record_bytes {
            return Err(PptError::RecordTooLarge {
                offset,
                len,
                limit: max_record_bytes,
            });
        }

        match PictureType::from_rec_type(rec_type) {
            None => {
                error!(
                    "problem reading picture at {}: invalid image type {:#06x} with length {}; skipped",
                    offset, rec_type, len
                );
            }
            Some(_) => {
                if pos + len > stream.len() {
                    warn!(
                        "\"Pictures\" stream may have ended early: entry at {} declares {} bytes, {} left",
                        offset,
                        len,
                        stream.len() - pos
                    );
                    break;
                }
                let payload = stream[pos..pos + len].to_vec();
                pictures.push(PictureData::from_stream(offset as u32, header, payload));
            }
        }
        pos += len;
    }
    Ok(pictures)
}

/// Lay out `pictures` back to back, assigning each its new offset, and
/// encrypt every entry when the session is encrypted.
pub fn write_pictures(pictures: &mut [PictureData], session: &EncryptionSession) -> Result<Vec<u8>> {
    let total: usize = pictures.iter().map(PictureData::stream_len).sum();
    let mut out = Vec::with_capacity(total);
    for pict in pictures.iter_mut() {
        let offset = out.len();
        let new = u32::try_from(offset).map_err(|_| PptError::DocumentTooLarge {
            len: offset,
            limit: u32::MAX as usize,
        })?;
        pict.offset = Some(new);
        out.extend_from_slice(&pict.to_bytes());
        session.encrypt_picture(&mut out, offset)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_entry_stops_walk() {
        let a = PictureData::new(PictureType::Png, b"first").unwrap();
        let b = PictureData::new(PictureType::Jpeg, b"second picture").unwrap();
        let mut stream = a.to_bytes();
        let mut tail = b.to_bytes();
        tail.truncate(tail.len() - 3);
        stream.extend_from_slice(&tail);

        let got = read_pictures(&mut stream, &EncryptionSession::plaintext(), 1 << 20).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].offset(), Some(0));
    }

    #[test]
    fn encrypted_double_uid_entry_is_read() {
        let (session, _atom) = EncryptionSession::create("pw").unwrap();
        let mut payload = vec![0x33; 2 * PICTURE_UID_SIZE];
        payload.push(BITMAP_TAG);
        payload.extend_from_slice(b"two uids");
        let mut stream = RecordHeader::new(0, 0x6E1, ESCHER_BLIP_FIRST + 6, payload.len() as u32)
            .to_bytes()
            .to_vec();
        stream.extend_from_slice(&payload);
        session.encrypt_picture(&mut stream, 0).unwrap();

        let got = read_pictures(&mut stream, &session, 1 << 20).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].picture_type(), Some(PictureType::Png));
        assert_eq!(got[0].image_bytes(1 << 20).unwrap(), b"two uids".to_vec());
    }

    #[test]
    fn unknown_type_is_skipped() {
        let mut stream = RecordHeader::new(0, 0, ESCHER_BLIP_FIRST + 0x40, 4).to_bytes().to_vec();
        stream.extend_from_slice(&[1, 2, 3, 4]);
        let p = PictureData::new(PictureType::Png, b"kept").unwrap();
        stream.extend_from_slice(&p.to_bytes());

        let got = read_pictures(&mut stream, &EncryptionSession::plaintext(), 1 << 20).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].offset(), Some(12));
        assert_eq!(got[0].image_bytes(1 << 20).unwrap(), b"kept".to_vec());
    }
}
