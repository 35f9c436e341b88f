//! Field indexes: scanning a data source into per-field records and
//! the fixed-width on-disk index format.
//!
//! The byte layout written here is external format: readers of old
//! index files must keep working, so the header and record shapes are
//! frozen and pinned by tests.

use std::io::{Read, Seek, Write};

use crate::error::{GribError, IndexError, ParseError};
use crate::helpers::read_as;
use crate::reader::{MessageSections, SeekableGrib2Reader, SECT_HEADER_SIZE};

/// Fixed size of one index record, sized for the largest registered
/// template combination.
pub const INDEX_RECORD_LEN: usize = 3200;

/// Size of the index buffer header.
pub const INDEX_HEADER_LEN: usize = 44;

const SOURCE_NAME_LEN: usize = 32;
const RECORD_FIXED_PART: usize = 32;
const SECT6_PREFIX_LEN: usize = 6;

/// One field of the source, locatable without re-scanning the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// Byte offset of the message within the source.
    pub msg_offset: u64,
    /// Byte offset of Section 4 within the message.
    pub sect4_offset: u32,
    /// Sequence number of the message within the source.
    pub msg_seq: u32,
    /// Sequence number of the field within its message.
    pub field_seq: u32,
    /// Total message length from Section 0.
    pub total_msg_length: u64,
    /// Discipline octet from Section 0.
    pub discipline: u8,
    /// Verbatim copies, each with its 5-octet section header.
    pub sect1: Vec<u8>,
    pub sect3: Vec<u8>,
    pub sect4: Vec<u8>,
    pub sect5: Vec<u8>,
    /// First 6 octets of Section 6 (length, number, bit-map indicator).
    pub sect6_prefix: [u8; SECT6_PREFIX_LEN],
}

impl IndexRecord {
    fn write(&self, out: &mut Vec<u8>) -> Result<(), IndexError> {
        let sections_len =
            self.sect1.len() + self.sect3.len() + self.sect4.len() + self.sect5.len();
        if RECORD_FIXED_PART + sections_len + SECT6_PREFIX_LEN > INDEX_RECORD_LEN {
            return Err(IndexError::IndexIOError(format!(
                "field sections of {sections_len} octet(s) exceed the fixed record length"
            )));
        }

        let start = out.len();
        out.extend_from_slice(&self.msg_offset.to_be_bytes());
        out.extend_from_slice(&self.sect4_offset.to_be_bytes());
        out.extend_from_slice(&self.msg_seq.to_be_bytes());
        out.extend_from_slice(&self.field_seq.to_be_bytes());
        out.extend_from_slice(&self.total_msg_length.to_be_bytes());
        out.push(self.discipline);
        out.extend_from_slice(&[0u8; 3]); // reserved
        out.extend_from_slice(&self.sect1);
        out.extend_from_slice(&self.sect3);
        out.extend_from_slice(&self.sect4);
        out.extend_from_slice(&self.sect5);
        out.extend_from_slice(&self.sect6_prefix);
        out.resize(start + INDEX_RECORD_LEN, 0);
        Ok(())
    }

    fn read(buf: &[u8]) -> Result<Self, IndexError> {
        if buf.len() < INDEX_RECORD_LEN {
            return Err(IndexError::InvalidIndexFile);
        }
        let msg_offset = read_as!(u64, buf, 0);
        let sect4_offset = read_as!(u32, buf, 8);
        let msg_seq = read_as!(u32, buf, 12);
        let field_seq = read_as!(u32, buf, 16);
        let total_msg_length = read_as!(u64, buf, 20);
        let discipline = buf[28];

        let mut pos = RECORD_FIXED_PART;
        let sect1 = read_embedded_section(buf, &mut pos, 1)?;
        let sect3 = read_embedded_section(buf, &mut pos, 3)?;
        let sect4 = read_embedded_section(buf, &mut pos, 4)?;
        let sect5 = read_embedded_section(buf, &mut pos, 5)?;
        if pos + SECT6_PREFIX_LEN > buf.len() {
            return Err(IndexError::InvalidIndexFile);
        }
        let sect6_prefix = buf[pos..pos + SECT6_PREFIX_LEN].try_into().unwrap();

        Ok(Self {
            msg_offset,
            sect4_offset,
            msg_seq,
            field_seq,
            total_msg_length,
            discipline,
            sect1,
            sect3,
            sect4,
            sect5,
            sect6_prefix,
        })
    }

    /// Bit-map indicator of the field, from the Section 6 prefix.
    pub fn bitmap_indicator(&self) -> u8 {
        self.sect6_prefix[5]
    }
}

fn read_embedded_section(buf: &[u8], pos: &mut usize, num: u8) -> Result<Vec<u8>, IndexError> {
    if *pos + SECT_HEADER_SIZE > buf.len() {
        return Err(IndexError::InvalidIndexFile);
    }
    let len = read_as!(u32, buf, *pos) as usize;
    if len < SECT_HEADER_SIZE || *pos + len > buf.len() || buf[*pos + 4] != num {
        return Err(IndexError::InvalidIndexFile);
    }
    let section = buf[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(section)
}

/// All index records of one source, in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuffer {
    pub source_name: String,
    pub records: Vec<IndexRecord>,
}

impl IndexBuffer {
    /// Scans a seekable source one message at a time, emitting one
    /// record per field.
    pub fn from_reader<R: Read + Seek>(
        reader: &mut SeekableGrib2Reader<R>,
        source_name: &str,
    ) -> Result<Self, GribError> {
        let mut records = Vec::new();
        let mut next_offset = 0u64;
        let mut msg_seq = 0u32;
        while let Some(location) = reader.seek_next_message(next_offset)? {
            let buf = reader.read_message_bytes(&location)?;
            index_message(&buf, location.offset, msg_seq, &mut records)?;
            next_offset = location.offset + location.total_length;
            msg_seq += 1;
        }
        Ok(Self {
            source_name: source_name.to_owned(),
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serializes the buffer in the external index format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, GribError> {
        let mut out = Vec::with_capacity(INDEX_HEADER_LEN + self.records.len() * INDEX_RECORD_LEN);
        out.extend_from_slice(&(INDEX_RECORD_LEN as u32).to_be_bytes());
        out.extend_from_slice(&(self.records.len() as u32).to_be_bytes());
        let mut name = [0u8; SOURCE_NAME_LEN];
        let trimmed = self.source_name.as_bytes();
        let len = trimmed.len().min(SOURCE_NAME_LEN);
        name[..len].copy_from_slice(&trimmed[..len]);
        out.extend_from_slice(&name);
        out.extend_from_slice(&(self.records.len() as u32).to_be_bytes());
        for record in &self.records {
            record.write(&mut out)?;
        }
        Ok(out)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, GribError> {
        if buf.len() < INDEX_HEADER_LEN {
            return Err(IndexError::InvalidIndexFile.into());
        }
        let record_len = read_as!(u32, buf, 0) as usize;
        let record_count = read_as!(u32, buf, 4) as usize;
        let name_bytes = &buf[8..8 + SOURCE_NAME_LEN];
        let name_end = name_bytes
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(SOURCE_NAME_LEN);
        let source_name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

        if record_len < RECORD_FIXED_PART
            || buf.len() < INDEX_HEADER_LEN + record_count * record_len
        {
            return Err(IndexError::InvalidIndexFile.into());
        }

        let mut records = Vec::with_capacity(record_count);
        for i in 0..record_count {
            let start = INDEX_HEADER_LEN + i * record_len;
            records.push(IndexRecord::read(&buf[start..start + record_len])?);
        }
        Ok(Self {
            source_name,
            records,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), GribError> {
        let bytes = self.to_bytes()?;
        writer
            .write_all(&bytes)
            .map_err(|e| IndexError::IndexIOError(e.to_string()))?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, GribError> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| IndexError::IndexIOError(e.to_string()))?;
        Self::from_bytes(&buf)
    }
}

/// Walks one message and appends a record per Section 4 encountered.
fn index_message(
    buf: &[u8],
    msg_offset: u64,
    msg_seq: u32,
    records: &mut Vec<IndexRecord>,
) -> Result<(), GribError> {
    let sections = MessageSections::new(buf)?;
    let discipline = buf[6];
    let total_msg_length = buf.len() as u64;

    let mut sect1: Option<Vec<u8>> = None;
    let mut sect3: Option<Vec<u8>> = None;
    let mut pending: Option<IndexRecord> = None;
    let mut field_seq = 0u32;

    for sect in sections {
        let sect = sect?;
        match sect.num {
            1 => sect1 = Some(sect.bytes.to_vec()),
            3 => sect3 = Some(sect.bytes.to_vec()),
            4 => {
                let sect1 = sect1
                    .clone()
                    .ok_or(ParseError::InvalidSectionOrder(sect.offset))?;
                let sect3 = sect3
                    .clone()
                    .ok_or(ParseError::NoGridDefinition(sect.offset))?;
                pending = Some(IndexRecord {
                    msg_offset,
                    sect4_offset: sect.offset as u32,
                    msg_seq,
                    field_seq,
                    total_msg_length,
                    discipline,
                    sect1,
                    sect3,
                    sect4: sect.bytes.to_vec(),
                    sect5: Vec::new(),
                    sect6_prefix: [0; SECT6_PREFIX_LEN],
                });
                field_seq += 1;
            }
            5 => {
                if let Some(record) = pending.as_mut() {
                    record.sect5 = sect.bytes.to_vec();
                }
            }
            6 => {
                if let Some(mut record) = pending.take() {
                    let len = sect.bytes.len().min(SECT6_PREFIX_LEN);
                    record.sect6_prefix[..len].copy_from_slice(&sect.bytes[..len]);
                    records.push(record);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> IndexRecord {
        IndexRecord {
            msg_offset: 0x0102030405060708,
            sect4_offset: 99,
            msg_seq: 2,
            field_seq: 1,
            total_msg_length: 12345,
            discipline: 10,
            sect1: embedded_section(1, 16),
            sect3: embedded_section(3, 30),
            sect4: embedded_section(4, 20),
            sect5: embedded_section(5, 12),
            sect6_prefix: [0, 0, 0, 6, 6, 255],
        }
    }

    fn embedded_section(num: u8, body_len: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(body_len + 5);
        bytes.extend_from_slice(&((body_len + 5) as u32).to_be_bytes());
        bytes.push(num);
        bytes.extend(std::iter::repeat(num).take(body_len));
        bytes
    }

    #[test]
    fn record_round_trip_through_fixed_width_form() {
        let record = sample_record();
        let mut buf = Vec::new();
        record.write(&mut buf).unwrap();
        assert_eq!(buf.len(), INDEX_RECORD_LEN);
        assert_eq!(IndexRecord::read(&buf).unwrap(), record);
    }

    #[test]
    fn record_header_layout_is_frozen() {
        let record = sample_record();
        let mut buf = Vec::new();
        record.write(&mut buf).unwrap();

        assert_eq!(&buf[0..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&buf[8..12], &99u32.to_be_bytes());
        assert_eq!(&buf[12..16], &2u32.to_be_bytes());
        assert_eq!(&buf[16..20], &1u32.to_be_bytes());
        assert_eq!(&buf[20..28], &12345u64.to_be_bytes());
        assert_eq!(buf[28], 10);
        assert_eq!(&buf[32..36], &21u32.to_be_bytes()); // Section 1 length
    }

    #[test]
    fn oversized_sections_are_rejected() {
        let mut record = sample_record();
        record.sect4 = embedded_section(4, INDEX_RECORD_LEN);
        let mut buf = Vec::new();
        assert!(record.write(&mut buf).is_err());
    }

    #[test]
    fn buffer_round_trip_preserves_header_fields() {
        let buffer = IndexBuffer {
            source_name: "gdas.t12z.pgrb2".to_owned(),
            records: vec![sample_record(), sample_record()],
        };
        let bytes = buffer.to_bytes().unwrap();
        assert_eq!(bytes.len(), INDEX_HEADER_LEN + 2 * INDEX_RECORD_LEN);
        assert_eq!(&bytes[0..4], &(INDEX_RECORD_LEN as u32).to_be_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_be_bytes());
        assert_eq!(&bytes[40..44], &2u32.to_be_bytes());

        assert_eq!(IndexBuffer::from_bytes(&bytes).unwrap(), buffer);
    }

    #[test]
    fn truncated_index_file_is_rejected() {
        let buffer = IndexBuffer {
            source_name: "x".to_owned(),
            records: vec![sample_record()],
        };
        let bytes = buffer.to_bytes().unwrap();
        assert!(IndexBuffer::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
