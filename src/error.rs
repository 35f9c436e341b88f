use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;

use crate::packers::{DecodeError, EncodeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GribError {
    ParseError(ParseError),
    BuildError(BuildError),
    TemplateError(TemplateError),
    EncodeError(EncodeError),
    DecodeError(DecodeError),
    IndexError(IndexError),
    NotFound,
}

impl Error for GribError {}

impl From<ParseError> for GribError {
    fn from(e: ParseError) -> Self {
        Self::ParseError(e)
    }
}

impl From<BuildError> for GribError {
    fn from(e: BuildError) -> Self {
        Self::BuildError(e)
    }
}

impl From<TemplateError> for GribError {
    fn from(e: TemplateError) -> Self {
        Self::TemplateError(e)
    }
}

impl From<EncodeError> for GribError {
    fn from(e: EncodeError) -> Self {
        Self::EncodeError(e)
    }
}

impl From<DecodeError> for GribError {
    fn from(e: DecodeError) -> Self {
        Self::DecodeError(e)
    }
}

impl From<IndexError> for GribError {
    fn from(e: IndexError) -> Self {
        Self::IndexError(e)
    }
}

impl Display for GribError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::ParseError(e) => write!(f, "{e}"),
            Self::BuildError(e) => write!(f, "{e}"),
            Self::TemplateError(e) => write!(f, "{e}"),
            Self::EncodeError(e) => write!(f, "{e}"),
            Self::DecodeError(e) => write!(f, "{e:#?}"),
            Self::IndexError(e) => write!(f, "{e}"),
            Self::NotFound => write!(f, "No field matched the request"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParseError {
    ReadError(String),
    NotGRIB,
    GRIBVersionMismatch(u8),
    UnknownSectionNumber(u8),
    EndSectionMismatch,
    UnexpectedEndOfData(usize),
    InvalidSectionOrder(usize),
    NoGridDefinition(usize),
}

impl Error for ParseError {}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::ReadError(s) => write!(f, "Read error: {s}"),
            Self::NotGRIB => write!(f, "Not GRIB data"),
            Self::GRIBVersionMismatch(i) => write!(f, "Not GRIB version 2: {i}"),
            Self::UnknownSectionNumber(s) => write!(f, "Unknown section number: {s}"),
            Self::EndSectionMismatch => write!(f, "Content of End Section is not valid"),
            Self::UnexpectedEndOfData(i) => write!(f, "Unexpected end of data at {i}"),
            Self::InvalidSectionOrder(i) => write!(f, "GRIB2 sections wrongly ordered at {i}"),
            Self::NoGridDefinition(i) => write!(f, "Grid Definition Section not found at {i}"),
        }
    }
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        Self::ReadError(e.to_string())
    }
}

/// Errors surfaced while a message is being assembled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildError {
    AlreadyComplete,
    BadPredecessorSection(u8),
    InternalLengthMismatch,
    MissingGridDefinition,
    MissingPriorBitmap,
    SphericalHarmonicGdtRequired,
    BitmapLengthMismatch,
}

impl Error for BuildError {}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::AlreadyComplete => write!(f, "GRIB message is already finalized"),
            Self::BadPredecessorSection(n) => {
                write!(f, "Operation is invalid after Section {n}")
            }
            Self::InternalLengthMismatch => {
                write!(f, "Sum of section lengths does not match the message length")
            }
            Self::MissingGridDefinition => write!(f, "Grid Definition Section has not been added"),
            Self::MissingPriorBitmap => write!(
                f,
                "Bit-map indicator 254 used without a previously defined bit map"
            ),
            Self::SphericalHarmonicGdtRequired => {
                write!(f, "Spectral packing requires grid definition template 3.50")
            }
            Self::BitmapLengthMismatch => {
                write!(f, "Bit map length does not cover all grid points")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateError {
    Unsupported(u8, u16),
    ValueOutOfRange {
        index: usize,
        value: i64,
        num_octets: u8,
    },
    WrongNumberOfValues { expected: usize, actual: usize },
}

impl Error for TemplateError {}

impl Display for TemplateError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Unsupported(sect, num) => write!(f, "Unsupported template {sect}.{num}"),
            Self::ValueOutOfRange {
                index,
                value,
                num_octets,
            } => write!(
                f,
                "Template value {value} at position {index} does not fit in {num_octets} octet(s)"
            ),
            Self::WrongNumberOfValues { expected, actual } => {
                write!(f, "Template expects {expected} value(s), got {actual}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexError {
    OutOfRange(i64),
    IndexIOError(String),
    DataIOError(String),
    InvalidIndexFile,
}

impl Error for IndexError {}

impl Display for IndexError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::OutOfRange(h) => write!(f, "File handle {h} is outside 1..=9999"),
            Self::IndexIOError(s) => write!(f, "Index read/write error: {s}"),
            Self::DataIOError(s) => write!(f, "Data read error: {s}"),
            Self::InvalidIndexFile => write!(f, "Content of index file is not valid"),
        }
    }
}
