//! record/codec: decode records from a flat byte buffer, encode them back.
//!
//! Decode policy:
//! - Top-level record whose declared length runs past the buffer: Corrupt.
//! - Declared length above `max_record_bytes`: RecordTooLarge (never truncated).
//! - Inside a container, a child that would overrun the container's declared
//!   end stops child parsing at that point (logged). Parsing never reads past
//!   `offset + 8 + length` of the enclosing record.
//! - Unregistered type codes become opaque atoms.
//! - Containers nested deeper than `MAX_RECORD_NESTING`: Corrupt.

use std::io::{self, Write};

use log::warn;

use crate::config::PptConfig;
use crate::consts::{DEFAULT_MAX_RECORD_BYTES, MAX_RECORD_NESTING, RECORD_HEADER_SIZE};
use crate::error::{PptError, Result};

use super::{Record, RecordBody, RecordHeader, RecordKind, RecordRegistry};

#[derive(Clone, Copy, Debug)]
pub struct RecordCodec<'a> {
    registry: &'a RecordRegistry,
    max_record_bytes: usize,
}

impl RecordCodec<'static> {
    /// Standard registry, default size guard.
    pub fn standard() -> Self {
        Self {
            registry: RecordRegistry::standard(),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    pub fn from_config(cfg: &PptConfig) -> Self {
        Self {
            registry: RecordRegistry::standard(),
            max_record_bytes: cfg.max_record_bytes,
        }
    }
}

impl<'a> RecordCodec<'a> {
    pub fn new(registry: &'a RecordRegistry, max_record_bytes: usize) -> Self {
        Self {
            registry,
            max_record_bytes,
        }
    }

    pub fn registry(&self) -> &RecordRegistry {
        self.registry
    }

    pub fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }

    /// Decode the record starting at `offset`. Returns the record (with
    /// `last_on_disk_offset = offset`) and the number of bytes consumed.
    pub fn decode(&self, buf: &[u8], offset: usize) -> Result<(Record, usize)> {
        let header = RecordHeader::read(buf, offset)?;
        let len = header.length as usize;
        self.check_len(offset, len)?;
        if offset == 0 && header.rec_type == 0 && len == 0xFFFF {
            return Err(PptError::corrupt(
                "stream starts with record of type 0000 and length 0xFFFF",
            ));
        }

        let start = offset + RECORD_HEADER_SIZE;
        let end = start
            .checked_add(len)
            .filter(|&e| e <= buf.len())
            .ok_or_else(|| {
                PptError::corrupt(format!(
                    "record type {} at offset {} declares {} bytes, only {} available",
                    header.rec_type,
                    offset,
                    len,
                    buf.len().saturating_sub(start)
                ))
            })?;

        let body = self.decode_body(&header, &buf[start..end], start, 0)?;
        let mut rec = Record::from_parts(header, body);
        rec.set_last_on_disk_offset(Some(offset as u32));
        Ok((rec, RECORD_HEADER_SIZE + len))
    }

    /// Decode a flat run of top-level records covering the whole buffer.
    pub fn decode_all(&self, buf: &[u8]) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        let mut pos = 0usize;
        while pos < buf.len() {
            let (rec, used) = self.decode(buf, pos)?;
            out.push(rec);
            pos += used;
        }
        Ok(out)
    }

    /// Parse `payload` as a sequence of child records. `base` is the absolute
    /// position of the payload, used for diagnostics only.
    pub fn decode_children(&self, payload: &[u8], base: usize) -> Result<Vec<Record>> {
        self.decode_nested(payload, base, 1)
    }

    fn decode_nested(&self, payload: &[u8], base: usize, depth: usize) -> Result<Vec<Record>> {
        if depth > MAX_RECORD_NESTING {
            return Err(PptError::corrupt(format!(
                "container at {} nested deeper than {} levels",
                base, MAX_RECORD_NESTING
            )));
        }
        let mut children = Vec::new();
        let mut pos = 0usize;
        while pos < payload.len() {
            let remaining = payload.len() - pos;
            if remaining < RECORD_HEADER_SIZE {
                warn!(
                    "container payload at {}: {} trailing byte(s) too short for a record header, stop",
                    base,
                    remaining
                );
                break;
            }
            let header = RecordHeader::read(payload, pos)?;
            let len = header.length as usize;
            self.check_len(base + pos, len)?;
            if pos == 0 && header.rec_type == 0 && len == 0xFFFF {
                return Err(PptError::corrupt(format!(
                    "container at {} starts with record of type 0000 and length 0xFFFF",
                    base
                )));
            }

            let start = pos + RECORD_HEADER_SIZE;
            if len > payload.len() - start {
                warn!(
                    "child record type {} at {} overruns its container by {} byte(s), stop",
                    header.rec_type,
                    base + pos,
                    len - (payload.len() - start)
                );
                break;
            }
            let end = start + len;
            let body = self.decode_body(&header, &payload[start..end], base + start, depth)?;
            children.push(Record::from_parts(header, body));
            pos = end;
        }
        Ok(children)
    }

    fn decode_body(
        &self,
        header: &RecordHeader,
        payload: &[u8],
        base: usize,
        depth: usize,
    ) -> Result<RecordBody> {
        match self.registry.kind(header.rec_type) {
            Some(RecordKind::Container) => {
                Ok(RecordBody::Container(self.decode_nested(payload, base, depth + 1)?))
            }
            Some(RecordKind::Atom(decode)) => decode(header, payload),
            None => Ok(RecordBody::Atom(payload.to_vec())),
        }
    }

    #[inline]
    fn check_len(&self, offset: usize, len: usize) -> Result<()> {
        if len > self.max_record_bytes {
            return Err(PptError::RecordTooLarge {
                offset,
                len,
                limit: self.max_record_bytes,
            });
        }
        Ok(())
    }
}

/// Decode one record with the standard registry and default size guard.
pub fn decode_record(buf: &[u8], offset: usize) -> Result<(Record, usize)> {
    RecordCodec::standard().decode(buf, offset)
}

/// Write sink that only counts bytes. Used for the measuring pass of a save,
/// so sizes come from the real encoder rather than an estimate.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingWriter {
    count: u64,
}

impl CountingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
