mod utils;

use std::fs::File;
use std::io::{Cursor, Write};

use gribforge::{
    extract_indexed, finalize_all, index_get, index_regenerate, index_reload, search_index,
    FieldQuery, GribError, IndexBuffer, IndexCache, SeekableGrib2Reader, WILDCARD,
};
use utils::simple_message;

fn three_message_file() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&simple_message(0, 1, 0, &[1.0, 2.0, 3.0]));
    data.extend_from_slice(&simple_message(10, 1, 2, &[4.0, 5.0, 6.0]));
    data.extend_from_slice(&simple_message(0, 2, 2, &[7.0, 8.0, 9.0]));
    data
}

#[test]
fn index_build_then_search_by_discipline() {
    let data = three_message_file();
    let mut reader = SeekableGrib2Reader::new(Cursor::new(&data));
    let index = IndexBuffer::from_reader(&mut reader, "testdata").unwrap();
    assert_eq!(index.len(), 3);

    let query = FieldQuery::any().with_discipline(10);
    let (pos, record) = search_index(&index, &query).unwrap();
    assert_eq!(pos, 1);
    assert_eq!(record.msg_seq, 1);
    assert_eq!(record.discipline, 10);

    let field = extract_indexed(&mut reader, record, f64::NAN).unwrap();
    assert_eq!(field.discipline, 10);
    assert_eq!(field.values, vec![4.0, 5.0, 6.0]);
}

#[test]
fn wildcarded_product_search_matches_by_position() {
    let data = three_message_file();
    let mut reader = SeekableGrib2Reader::new(Cursor::new(&data));
    let index = IndexBuffer::from_reader(&mut reader, "testdata").unwrap();

    // Any parameter category, parameter number 2: first hit is the
    // second field.
    let query = FieldQuery::any().with_product(0, vec![WILDCARD, 2]);
    let (pos, record) = search_index(&index, &query).unwrap();
    assert_eq!(pos, 1);
    assert_eq!(record.msg_seq, 1);

    // Category 2 narrows it down to the third field.
    let query = FieldQuery::any().with_product(0, vec![2, 2]);
    let (pos, _) = search_index(&index, &query).unwrap();
    assert_eq!(pos, 2);

    let query = FieldQuery::any().with_product(0, vec![3, WILDCARD]);
    assert!(matches!(
        search_index(&index, &query),
        Err(GribError::NotFound)
    ));
}

#[test]
fn index_survives_its_external_format() {
    let data = three_message_file();
    let mut reader = SeekableGrib2Reader::new(Cursor::new(&data));
    let index = IndexBuffer::from_reader(&mut reader, "testdata").unwrap();

    let mut file_bytes = Vec::new();
    index.write_to(&mut file_bytes).unwrap();
    let reread = IndexBuffer::read_from(&mut Cursor::new(&file_bytes)).unwrap();
    assert_eq!(reread, index);
}

#[test]
fn cache_returns_the_same_buffer_until_regenerated() {
    let data = three_message_file();
    let mut cache = IndexCache::new();

    let first_len = {
        let index = cache.get(7, &mut Cursor::new(&data), "data").unwrap();
        index.len()
    };
    // A repeated get returns the cached entry without rescanning.
    let again = cache.get(7, &mut Cursor::new(Vec::new()), "data").unwrap();
    assert_eq!(again.len(), first_len);

    // Regeneration rescans the (now empty) source.
    let fresh = cache
        .regenerate(7, &mut Cursor::new(Vec::new()), "data")
        .unwrap();
    assert!(fresh.is_empty());
}

#[test]
fn cache_reload_reads_an_index_file() {
    let data = three_message_file();
    let mut reader = SeekableGrib2Reader::new(Cursor::new(&data));
    let index = IndexBuffer::from_reader(&mut reader, "testdata").unwrap();
    let mut index_bytes = Vec::new();
    index.write_to(&mut index_bytes).unwrap();

    let mut cache = IndexCache::new();
    cache.get(3, &mut Cursor::new(Vec::new()), "empty").unwrap();
    let reloaded = cache
        .reload_from(3, &mut Cursor::new(&index_bytes))
        .unwrap();
    assert_eq!(reloaded.len(), 3);
    assert_eq!(reloaded.source_name, "testdata");
}

// The process-global layer shares one cache across the whole test
// binary, so everything touching it lives in a single test.
#[test]
fn process_global_cache_layer() {
    // Out-of-range handles never reach the file system.
    assert!(matches!(
        index_get(0, "/nonexistent"),
        Err(GribError::IndexError(_))
    ));
    assert!(matches!(
        index_get(10000, "/nonexistent"),
        Err(GribError::IndexError(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.grib2");

    let mut file = File::create(&path).unwrap();
    file.write_all(&simple_message(0, 1, 0, &[1.0, 2.0]))
        .unwrap();
    drop(file);

    let index = index_get(5, &path).unwrap();
    assert_eq!(index.len(), 1);

    // Mutate the file: append a second message.
    let mut file = File::options().append(true).open(&path).unwrap();
    file.write_all(&simple_message(10, 1, 0, &[3.0, 4.0]))
        .unwrap();
    drop(file);

    // The cached entry still reflects the old state; forced
    // regeneration picks up the mutation.
    assert_eq!(index_get(5, &path).unwrap().len(), 1);
    let regenerated = index_regenerate(5, &path).unwrap();
    assert_eq!(regenerated.len(), 2);
    assert_eq!(index_get(5, &path).unwrap().len(), 2);

    // Reloading from a sibling index file replaces the entry.
    let index_path = dir.path().join("data.grib2.idx");
    let current = index_get(5, &path).unwrap();
    let mut index_file = File::create(&index_path).unwrap();
    current.write_to(&mut index_file).unwrap();
    drop(index_file);
    let reloaded = index_reload(5, &index_path).unwrap();
    assert_eq!(reloaded, current);

    // After finalize, the next get rescans the (mutated) file.
    finalize_all();
    assert_eq!(index_get(5, &path).unwrap().len(), 2);
}
