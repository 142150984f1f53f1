//! Binary format of stored stages.
//!
//! Layout (all integers little-endian):
//! - Magic `AMST` (4 bytes)
//! - Format version (u16)
//! - Record count (u32)
//! - Records, one per staged revision:
//!   - component, lang (u32 length + UTF-8 bytes each)
//!   - version code (u32)
//!   - string id (u32 length + UTF-8 bytes)
//!   - text flag (u8, 0 = none, 1 = present), then the text if present
//!   - timemodified (i64)
//!   - deleted (u8, 0 or 1)
//! - CRC32 of everything above (u32)
//!
//! Commit details attached to revisions are not stored.

use std::collections::BTreeMap;

use crate::mlang::{ComponentKey, ComponentSnapshot, StringRevision, VersionRegistry};
use crate::stage::errors::CodecError;

pub const MAGIC: &[u8; 4] = b"AMST";

/// Current format version
pub const FORMAT_VERSION: u16 = 1;

const CHECKSUM_LEN: usize = 4;

/// Encode components into the stored stage format.
pub fn encode<'a, I>(components: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a ComponentSnapshot>,
{
    let mut records = Vec::new();
    let mut count: u32 = 0;

    for component in components {
        for revision in component.iter() {
            put_str(&mut records, component.name());
            put_str(&mut records, component.lang());
            records.extend_from_slice(&component.version().code.to_le_bytes());
            put_str(&mut records, &revision.id);
            match &revision.text {
                Some(text) => {
                    records.push(1);
                    put_str(&mut records, text);
                }
                None => records.push(0),
            }
            records.extend_from_slice(&revision.timemodified.to_le_bytes());
            records.push(u8::from(revision.deleted));
            count += 1;
        }
    }

    let mut buf = Vec::with_capacity(4 + 2 + 4 + records.len() + CHECKSUM_LEN);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&records);

    let checksum = crc32fast::hash(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

/// Decode a stored stage back into components, ordered by key.
pub fn decode(data: &[u8]) -> Result<Vec<ComponentSnapshot>, CodecError> {
    if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
        return Err(CodecError::BadMagic);
    }
    if data.len() < MAGIC.len() + 2 + 4 + CHECKSUM_LEN {
        return Err(CodecError::Truncated {
            needed: MAGIC.len() + 2 + 4 + CHECKSUM_LEN,
            offset: 0,
        });
    }

    let (body, tail) = data.split_at(data.len() - CHECKSUM_LEN);
    let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = crc32fast::hash(body);

    let mut reader = Reader::new(body, MAGIC.len());
    let format = reader.u16()?;
    if format != FORMAT_VERSION {
        return Err(CodecError::UnsupportedFormat(format));
    }
    if stored != computed {
        return Err(CodecError::ChecksumMismatch { stored, computed });
    }

    let count = reader.u32()?;
    let mut components: BTreeMap<ComponentKey, ComponentSnapshot> = BTreeMap::new();

    for _ in 0..count {
        let name = reader.string()?;
        let lang = reader.string()?;
        let code = reader.u32()?;
        let version = VersionRegistry::by_code(code).ok_or(CodecError::UnknownVersion(code))?;
        let id = reader.string()?;
        let text = if reader.flag()? { Some(reader.string()?) } else { None };
        let timemodified = reader.i64()?;
        let deleted = reader.flag()?;

        let key = ComponentKey::new(name, lang, version);
        let component = components
            .entry(key.clone())
            .or_insert_with(|| ComponentSnapshot::from_key(key));
        let revision = StringRevision {
            id,
            text,
            timemodified,
            deleted,
            extra: None,
        };
        // the encoder never writes duplicates; keep the last one if it did
        component.put_string(revision);
    }

    if reader.remaining() > 0 {
        return Err(CodecError::TrailingBytes {
            extra: reader.remaining(),
        });
    }

    Ok(components.into_values().collect())
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// bounds-checked cursor over the record section
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n,
                offset: self.pos,
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn flag(&mut self) -> Result<bool, CodecError> {
        let offset = self.pos;
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(CodecError::InvalidFlag { value, offset }),
        }
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(b))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let len = self.u32()? as usize;
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(offset))
    }
}
