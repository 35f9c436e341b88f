//! Keyed cache of generated indexes.
//!
//! The cache is an ordinary owned value; dropping it releases every
//! entry. A process-global instance guarded by a mutex is layered on
//! top for callers porting from the original handle-oriented API.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::{GribError, IndexError};
use crate::index::IndexBuffer;
use crate::reader::SeekableGrib2Reader;

/// Inclusive range of valid file handles.
pub const HANDLE_RANGE: std::ops::RangeInclusive<i64> = 1..=9999;

#[derive(Debug, Default)]
pub struct IndexCache {
    entries: BTreeMap<i64, IndexBuffer>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached index for `handle`, scanning `source` on
    /// first access. The reference stays valid until the next mutating
    /// call.
    pub fn get<R: Read + Seek>(
        &mut self,
        handle: i64,
        source: &mut R,
        source_name: &str,
    ) -> Result<&IndexBuffer, GribError> {
        check_handle(handle)?;
        if !self.entries.contains_key(&handle) {
            let mut reader = SeekableGrib2Reader::new(source);
            let index = IndexBuffer::from_reader(&mut reader, source_name)?;
            self.entries.insert(handle, index);
        }
        Ok(&self.entries[&handle])
    }

    /// Returns the cached index for `handle`, reading a previously
    /// written index file on first access.
    pub fn get_from_index<R: Read>(
        &mut self,
        handle: i64,
        index_source: &mut R,
    ) -> Result<&IndexBuffer, GribError> {
        check_handle(handle)?;
        if !self.entries.contains_key(&handle) {
            let index = IndexBuffer::read_from(index_source)?;
            self.entries.insert(handle, index);
        }
        Ok(&self.entries[&handle])
    }

    /// Drops any entry for `handle` and rescans the data source.
    pub fn regenerate<R: Read + Seek>(
        &mut self,
        handle: i64,
        source: &mut R,
        source_name: &str,
    ) -> Result<&IndexBuffer, GribError> {
        check_handle(handle)?;
        self.entries.remove(&handle);
        self.get(handle, source, source_name)
    }

    /// Drops any entry for `handle` and re-reads an index file.
    pub fn reload_from<R: Read>(
        &mut self,
        handle: i64,
        index_source: &mut R,
    ) -> Result<&IndexBuffer, GribError> {
        check_handle(handle)?;
        self.entries.remove(&handle);
        self.get_from_index(handle, index_source)
    }

    /// Drops the entry for `handle`, if any.
    pub fn invalidate(&mut self, handle: i64) -> Result<(), GribError> {
        check_handle(handle)?;
        self.entries.remove(&handle);
        Ok(())
    }

    pub fn contains(&self, handle: i64) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Releases every entry. Equivalent to dropping the value; kept as
    /// a named operation for callers holding the cache in a long-lived
    /// slot.
    pub fn finalize(&mut self) {
        self.entries.clear();
    }
}

fn check_handle(handle: i64) -> Result<(), IndexError> {
    if HANDLE_RANGE.contains(&handle) {
        Ok(())
    } else {
        Err(IndexError::OutOfRange(handle))
    }
}

static GLOBAL_CACHE: Lazy<Mutex<IndexCache>> = Lazy::new(|| Mutex::new(IndexCache::new()));

fn source_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Process-global variant of [`IndexCache::get`]; returns a snapshot
/// of the cached index for the data file at `path`.
pub fn index_get(handle: i64, path: impl AsRef<Path>) -> Result<IndexBuffer, GribError> {
    let path = path.as_ref();
    let mut cache = GLOBAL_CACHE.lock().unwrap();
    check_handle(handle)?;
    if cache.contains(handle) {
        return Ok(cache.entries[&handle].clone());
    }
    let file = File::open(path).map_err(|e| IndexError::DataIOError(e.to_string()))?;
    let mut reader = BufReader::new(file);
    let name = source_name_of(path);
    Ok(cache.get(handle, &mut reader, &name)?.clone())
}

/// Process-global variant of [`IndexCache::regenerate`].
pub fn index_regenerate(handle: i64, path: impl AsRef<Path>) -> Result<IndexBuffer, GribError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IndexError::DataIOError(e.to_string()))?;
    let mut reader = BufReader::new(file);
    let name = source_name_of(path);
    let mut cache = GLOBAL_CACHE.lock().unwrap();
    Ok(cache.regenerate(handle, &mut reader, &name)?.clone())
}

/// Process-global variant of [`IndexCache::reload_from`].
pub fn index_reload(handle: i64, index_path: impl AsRef<Path>) -> Result<IndexBuffer, GribError> {
    let file =
        File::open(index_path.as_ref()).map_err(|e| IndexError::IndexIOError(e.to_string()))?;
    let mut reader = BufReader::new(file);
    let mut cache = GLOBAL_CACHE.lock().unwrap();
    Ok(cache.reload_from(handle, &mut reader)?.clone())
}

/// Releases every entry of the process-global cache.
pub fn finalize_all() {
    GLOBAL_CACHE.lock().unwrap().finalize();
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    fn empty_source() -> Cursor<Vec<u8>> {
        Cursor::new(Vec::new())
    }

    #[test]
    fn handle_range_is_enforced() {
        let mut cache = IndexCache::new();
        for handle in [0, -1, 10000] {
            assert_eq!(
                cache
                    .get(handle, &mut empty_source(), "x")
                    .unwrap_err(),
                GribError::IndexError(IndexError::OutOfRange(handle))
            );
        }
    }

    #[test]
    fn get_caches_and_returns_the_same_entry() {
        let mut cache = IndexCache::new();
        cache.get(1, &mut empty_source(), "first").unwrap();
        assert!(cache.contains(1));
        // A second get does not re-scan; the original name survives.
        let entry = cache.get(1, &mut empty_source(), "second").unwrap();
        assert_eq!(entry.source_name, "first");
    }

    #[test]
    fn regenerate_replaces_the_entry() {
        let mut cache = IndexCache::new();
        cache.get(5, &mut empty_source(), "old").unwrap();
        let entry = cache.regenerate(5, &mut empty_source(), "new").unwrap();
        assert_eq!(entry.source_name, "new");
    }

    #[test]
    fn finalize_releases_everything() {
        let mut cache = IndexCache::new();
        cache.get(1, &mut empty_source(), "a").unwrap();
        cache.get(2, &mut empty_source(), "b").unwrap();
        assert_eq!(cache.len(), 2);
        cache.finalize();
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_drops_a_single_entry() {
        let mut cache = IndexCache::new();
        cache.get(1, &mut empty_source(), "a").unwrap();
        cache.get(2, &mut empty_source(), "b").unwrap();
        cache.invalidate(1).unwrap();
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
    }
}
