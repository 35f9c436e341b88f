//! Random access to GRIB2 data through a seekable source.

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::ParseError;
use crate::helpers::read_as;

pub(crate) const SECT0_MAGIC: &[u8] = b"GRIB";
pub(crate) const SECT0_SIZE: usize = 16;
pub(crate) const SECT_HEADER_SIZE: usize = 5;
pub(crate) const SECT8_MAGIC: &[u8] = b"7777";
pub(crate) const SECT8_SIZE: usize = SECT8_MAGIC.len();

/// First search window for the `GRIB` sentinel, in octets.
pub(crate) const MSK1: usize = 32000;
/// Follow-up search block size, in octets.
pub(crate) const MSK2: usize = 4000;

/// Location of one message found in a seekable source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLocation {
    /// Byte offset of the `GRIB` sentinel within the source.
    pub offset: u64,
    /// Total message length from Section 0.
    pub total_length: u64,
    /// Discipline octet from Section 0.
    pub discipline: u8,
}

pub struct SeekableGrib2Reader<R> {
    reader: R,
}

impl<R> SeekableGrib2Reader<R> {
    pub fn new(r: R) -> Self {
        Self { reader: r }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Read for SeekableGrib2Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.reader.read_exact(buf)
    }
}

impl<S: Seek> Seek for SeekableGrib2Reader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl<R: Read + Seek> SeekableGrib2Reader<R> {
    /// Scans forward from `from` for the next `GRIB` sentinel and
    /// returns its location, or `None` past the last message.
    ///
    /// The first probe window is [`MSK1`] octets; follow-up windows
    /// are [`MSK2`] octets, matching the original bounded scan.
    pub fn seek_next_message(&mut self, from: u64) -> Result<Option<MessageLocation>, ParseError> {
        let mut window_start = from;
        let mut window_size = MSK1;
        loop {
            self.seek(SeekFrom::Start(window_start))?;
            let mut window = vec![0; window_size + SECT0_SIZE];
            let n = read_up_to(&mut self.reader, &mut window)?;
            window.truncate(n);
            if window.len() < SECT0_SIZE {
                return Ok(None);
            }

            for pos in 0..=(window.len() - SECT0_SIZE).min(window_size - 1) {
                if &window[pos..pos + SECT0_MAGIC.len()] != SECT0_MAGIC {
                    continue;
                }
                let version = window[pos + 7];
                if version != 2 {
                    return Err(ParseError::GRIBVersionMismatch(version));
                }
                let total_length = read_as!(u64, window, pos + 8);
                return Ok(Some(MessageLocation {
                    offset: window_start + pos as u64,
                    total_length,
                    discipline: window[pos + 6],
                }));
            }

            if window.len() < window_size + SECT0_SIZE {
                return Ok(None);
            }
            window_start += window_size as u64;
            window_size = MSK2;
        }
    }

    /// Reads a whole message found by [`Self::seek_next_message`].
    pub fn read_message_bytes(&mut self, location: &MessageLocation) -> Result<Vec<u8>, ParseError> {
        self.seek(SeekFrom::Start(location.offset))?;
        let mut buf = vec![0; location.total_length as usize];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// One raw section of an in-memory message; `bytes` includes the
/// 5-octet section header for Sections 1-7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection<'a> {
    pub num: u8,
    /// Offset of the section within the message.
    pub offset: usize,
    pub bytes: &'a [u8],
}

impl RawSection<'_> {
    /// Section body without the 5-octet header.
    pub fn body(&self) -> &[u8] {
        match self.num {
            0 | 8 => self.bytes,
            _ => &self.bytes[SECT_HEADER_SIZE..],
        }
    }
}

/// Iterates over the sections of one complete message held in memory.
///
/// The `GRIB ... 7777` envelope is validated up front; section walking
/// then trusts the per-section lengths and fails on any mismatch.
#[derive(Debug)]
pub struct MessageSections<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> MessageSections<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self, ParseError> {
        if buf.len() < SECT0_SIZE + SECT8_SIZE || &buf[0..SECT0_MAGIC.len()] != SECT0_MAGIC {
            return Err(ParseError::NotGRIB);
        }
        let version = buf[7];
        if version != 2 {
            return Err(ParseError::GRIBVersionMismatch(version));
        }
        let total_length = read_as!(u64, buf, 8);
        if total_length as usize != buf.len() {
            return Err(ParseError::UnexpectedEndOfData(buf.len()));
        }
        if &buf[buf.len() - SECT8_SIZE..] != SECT8_MAGIC {
            return Err(ParseError::EndSectionMismatch);
        }
        Ok(Self {
            buf,
            pos: 0,
            failed: false,
        })
    }
}

impl<'a> Iterator for MessageSections<'a> {
    type Item = Result<RawSection<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        if self.pos == 0 {
            self.pos = SECT0_SIZE;
            return Some(Ok(RawSection {
                num: 0,
                offset: 0,
                bytes: &self.buf[..SECT0_SIZE],
            }));
        }
        if self.pos == self.buf.len() - SECT8_SIZE {
            let offset = self.pos;
            self.pos = self.buf.len();
            return Some(Ok(RawSection {
                num: 8,
                offset,
                bytes: &self.buf[offset..],
            }));
        }

        if self.pos + SECT_HEADER_SIZE > self.buf.len() - SECT8_SIZE {
            self.failed = true;
            return Some(Err(ParseError::UnexpectedEndOfData(self.pos)));
        }
        let buf = self.buf;
        let len = read_as!(u32, buf, self.pos) as usize;
        let num = buf[self.pos + 4];
        if len < SECT_HEADER_SIZE || self.pos + len > self.buf.len() - SECT8_SIZE {
            self.failed = true;
            return Some(Err(ParseError::UnexpectedEndOfData(self.pos)));
        }
        if !(1..=7).contains(&num) {
            self.failed = true;
            return Some(Err(ParseError::UnknownSectionNumber(num)));
        }
        let offset = self.pos;
        self.pos += len;
        Some(Ok(RawSection {
            num,
            offset,
            bytes: &self.buf[offset..offset + len],
        }))
    }
}
