pub mod bits;
mod builder;
mod cache;
mod codec;
mod datatypes;
mod error;
mod extractor;
mod helpers;
pub mod ieee;
mod index;
mod packers;
mod reader;
mod search;
pub mod tmpl;

pub use crate::{
    builder::*,
    cache::*,
    codec::RasterCodec,
    datatypes::*,
    error::*,
    extractor::*,
    index::*,
    packers::{
        ComplexPackingDecodeError, DecodeError, EncodeError, RunLengthEncodingDecodeError,
        SimplePackingDecodeError,
    },
    reader::*,
    search::*,
};

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
