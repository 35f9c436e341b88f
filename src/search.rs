//! Wildcarded matching of fields against an index.

use crate::datatypes::Identification;
use crate::error::GribError;
use crate::helpers::read_as;
use crate::index::{IndexBuffer, IndexRecord};
use crate::reader::SECT_HEADER_SIZE;
use crate::tmpl;

/// Matches any value at its position in a query array.
pub const WILDCARD: i64 = -9999;

/// Matches any template number or discipline.
pub const ANY: i64 = -1;

/// A wildcarded description of the field being looked for.
///
/// Empty arrays match everything; a populated array is compared
/// position by position, with [`WILDCARD`] entries matching any
/// decoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldQuery {
    /// Discipline, or [`ANY`].
    pub discipline: i64,
    /// Section 1 identification values, in wire order.
    pub identification: Vec<i64>,
    /// Product definition template number, or [`ANY`].
    pub prod_tmpl_num: i64,
    pub prod_vals: Vec<i64>,
    /// Grid definition template number, or [`ANY`].
    pub grid_tmpl_num: i64,
    pub grid_vals: Vec<i64>,
}

impl Default for FieldQuery {
    fn default() -> Self {
        Self::any()
    }
}

impl FieldQuery {
    /// A query every field matches.
    pub fn any() -> Self {
        Self {
            discipline: ANY,
            identification: Vec::new(),
            prod_tmpl_num: ANY,
            prod_vals: Vec::new(),
            grid_tmpl_num: ANY,
            grid_vals: Vec::new(),
        }
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = i64::from(discipline);
        self
    }

    pub fn with_product(mut self, tmpl_num: i64, vals: Vec<i64>) -> Self {
        self.prod_tmpl_num = tmpl_num;
        self.prod_vals = vals;
        self
    }

    pub fn with_grid(mut self, tmpl_num: i64, vals: Vec<i64>) -> Self {
        self.grid_tmpl_num = tmpl_num;
        self.grid_vals = vals;
        self
    }

    pub fn with_identification(mut self, vals: Vec<i64>) -> Self {
        self.identification = vals;
        self
    }

    pub(crate) fn matches_discipline(&self, discipline: u8) -> bool {
        self.discipline == ANY || self.discipline == i64::from(discipline)
    }

    pub(crate) fn matches_identification(&self, identification: &Identification) -> bool {
        matches_vals(&self.identification, &identification.query_vals())
    }

    pub(crate) fn matches_product(&self, tmpl_num: u16, vals: &[i64]) -> bool {
        (self.prod_tmpl_num == ANY || self.prod_tmpl_num == i64::from(tmpl_num))
            && matches_vals(&self.prod_vals, vals)
    }

    pub(crate) fn matches_grid(&self, tmpl_num: u16, vals: &[i64]) -> bool {
        (self.grid_tmpl_num == ANY || self.grid_tmpl_num == i64::from(tmpl_num))
            && matches_vals(&self.grid_vals, vals)
    }
}

fn matches_vals(query: &[i64], decoded: &[i64]) -> bool {
    query.iter().enumerate().all(|(k, q)| {
        *q == WILDCARD || decoded.get(k).map(|d| d == q).unwrap_or(false)
    })
}

/// Linear scan of `index`: decodes each record's embedded sections
/// just far enough for the match test; the first match wins.
pub fn search_index<'i>(
    index: &'i IndexBuffer,
    query: &FieldQuery,
) -> Result<(usize, &'i IndexRecord), GribError> {
    for (pos, record) in index.records.iter().enumerate() {
        if record_matches(record, query)? {
            return Ok((pos, record));
        }
    }
    Err(GribError::NotFound)
}

fn record_matches(record: &IndexRecord, query: &FieldQuery) -> Result<bool, GribError> {
    if !query.matches_discipline(record.discipline) {
        return Ok(false);
    }

    if !query.identification.is_empty() {
        let identification = Identification::from_payload(&record.sect1[SECT_HEADER_SIZE..])?;
        if !query.matches_identification(&identification) {
            return Ok(false);
        }
    }

    if query.prod_tmpl_num != ANY || !query.prod_vals.is_empty() {
        let body = &record.sect4[SECT_HEADER_SIZE..];
        let tmpl_num = read_as!(u16, body, 2);
        if query.prod_tmpl_num != ANY && query.prod_tmpl_num != i64::from(tmpl_num) {
            return Ok(false);
        }
        if !query.prod_vals.is_empty() {
            let def = tmpl::product_template(tmpl_num)?;
            let mut pos = 4;
            let vals = tmpl::decode_template(def, 4, body, &mut pos)?;
            if !matches_vals(&query.prod_vals, &vals) {
                return Ok(false);
            }
        }
    }

    if query.grid_tmpl_num != ANY || !query.grid_vals.is_empty() {
        let body = &record.sect3[SECT_HEADER_SIZE..];
        let tmpl_num = read_as!(u16, body, 7);
        if query.grid_tmpl_num != ANY && query.grid_tmpl_num != i64::from(tmpl_num) {
            return Ok(false);
        }
        if !query.grid_vals.is_empty() {
            let def = tmpl::grid_template(tmpl_num)?;
            let mut pos = 9;
            let vals = tmpl::decode_template(def, 3, body, &mut pos)?;
            if !matches_vals(&query.grid_vals, &vals) {
                return Ok(false);
            }
        }
    }

    Ok(true)
}
