mod common;

use common::*;
use rarfile::{Locator, RarFile};
use std::io::Cursor;

#[test]
fn test_extract_by_index() {
    init_tracing();
    let temp_dir = setup_test_dir();
    let path = write_archive(
        &temp_dir,
        "test.rar",
        &stored_archive(&[("a.txt", b"Hello, World!"), ("dir/b.txt", b"Nested content")]),
    );

    let mut archive = RarFile::open_with(&path, &disabled_options());
    let data = archive.extract(1).expect("Failed to extract entry");
    assert_eq!(data.len(), 14);
    assert_eq!(&*data, b"Nested content");
    assert_eq!(data.as_padded(), b"Nested content\0\0");

    let data = archive.extract(0).expect("Failed to extract entry");
    assert_eq!(&*data, b"Hello, World!");
}

#[test]
fn test_extract_is_idempotent() {
    let temp_dir = setup_test_dir();
    let path = write_archive(
        &temp_dir,
        "test.rar",
        &stored_archive(&[("a.txt", b"alpha"), ("b.txt", b"bravo")]),
    );

    let mut archive = RarFile::open_with(&path, &disabled_options());
    let first = archive.extract(1).unwrap();
    let second = archive.extract(1).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), second.len());
}

#[test]
fn test_extract_spans_several_blocks() {
    let temp_dir = setup_test_dir();
    let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    let path = write_archive(&temp_dir, "test.rar", &stored_archive(&[("big.bin", &payload)]));
    let options = rarfile::OpenOptions {
        block_size: 64,
        ..disabled_options()
    };

    let mut archive = RarFile::open_with(&path, &options);
    assert_eq!(archive.extract(0).unwrap().into_vec(), payload);
}

#[test]
fn test_extract_compressed_entry() {
    init_tracing();
    let expected = std::fs::read(fixture("pattern.txt")).unwrap();

    let mut archive = RarFile::open_with(fixture("compressed.rar"), &disabled_options());
    assert_eq!(archive.entry_count(), 2);
    assert_eq!(archive.name_at(0), Some("pattern.txt"));
    assert_eq!(archive.name_at(1), Some("notes/readme.txt"));

    let first = archive.extract(0).expect("Failed to extract compressed entry");
    assert_eq!(&*first, expected.as_slice());
    assert_eq!(
        &*archive.extract_by_name("NOTES/README.TXT").unwrap(),
        b"stored next to a compressed entry"
    );

    let second = archive.extract(0).unwrap();
    assert_eq!(first, second);
    assert_eq!(second.as_padded().len(), expected.len() + 2);
    assert!(!archive.entries()[0].is_fallback_only());
}

#[test]
fn test_compressed_entry_from_stream() {
    let bytes = std::fs::read(fixture("compressed.rar")).unwrap();
    let expected = std::fs::read(fixture("pattern.txt")).unwrap();

    let mut archive = RarFile::from_reader(Cursor::new(bytes));
    assert_eq!(archive.extract(0).unwrap().into_vec(), expected);
}

#[test]
fn test_compressed_entry_beyond_window_uses_fallback() {
    let temp_dir = setup_test_dir();
    let bytes = rar4_archive(&[
        file_block("small.txt", b"small", 0),
        compressed_block("big.bin", 3 * 1024 * 1024),
    ]);
    let path = write_archive(&temp_dir, "test.rar", &bytes);
    let (options, stats) = mock_options(&[("small.txt", b"small"), ("big.bin", b"from fallback")]);

    let mut archive = RarFile::open_with(&path, &options);
    assert_eq!(archive.entry_count(), 2);
    assert_eq!(&*archive.extract(1).unwrap(), b"from fallback");
    assert!(archive.entries()[1].is_fallback_only());
    assert_eq!(stats.extracted(), ["big.bin"]);

    let mut archive = RarFile::open_with(&path, &disabled_options());
    assert!(archive.extract(1).is_none());
    assert_eq!(&*archive.extract(0).unwrap(), b"small");
}

#[test]
fn test_extract_out_of_range() {
    let temp_dir = setup_test_dir();
    let path = write_archive(&temp_dir, "test.rar", &stored_archive(&[("a.txt", b"alpha")]));
    let (options, stats) = mock_options(&[("a.txt", b"alpha")]);

    let mut archive = RarFile::open_with(&path, &options);
    let count = archive.entry_count();
    assert!(archive.extract(count).is_none());
    assert!(archive.extract(count + 1).is_none());
    assert_eq!(stats.created(), 0);
}

#[test]
fn test_extract_by_name() {
    let temp_dir = setup_test_dir();
    let path = write_archive(
        &temp_dir,
        "test.rar",
        &stored_archive(&[("a.txt", b"a"), ("b/c.txt", b"lower"), ("B/C.TXT", b"upper")]),
    );

    let mut archive = RarFile::open_with(&path, &disabled_options());
    assert_eq!(&*archive.extract_by_name("b/c.txt").unwrap(), b"lower");
    assert_eq!(&*archive.extract_by_name("B/C.TXT").unwrap(), b"lower");
    assert_eq!(&*archive.extract_by_name("A.TXT").unwrap(), b"a");
    assert!(archive.extract_by_name("missing.txt").is_none());
}

#[test]
fn test_extract_empty_entry() {
    let temp_dir = setup_test_dir();
    let path = write_archive(&temp_dir, "test.rar", &stored_archive(&[("empty.txt", b"")]));

    let mut archive = RarFile::open_with(&path, &disabled_options());
    let data = archive.extract(0).unwrap();
    assert!(data.is_empty());
    assert_eq!(data.as_padded(), &[0, 0]);
}

#[test]
fn test_corrupt_data_demotes_entry() {
    init_tracing();
    let temp_dir = setup_test_dir();
    let bytes = rar4_archive(&[
        file_block("a.txt", b"alpha", 0),
        corrupt_data_block("b.txt", b"bravo"),
    ]);
    let path = write_archive(&temp_dir, "test.rar", &bytes);
    let (options, stats) = mock_options(&[("a.txt", b"alpha"), ("b.txt", b"bravo")]);

    let mut archive = RarFile::open_with(&path, &options);
    assert_eq!(archive.entry_count(), 2);
    assert!(!archive.entries()[1].is_fallback_only());
    assert_eq!(stats.created(), 0);

    assert_eq!(&*archive.extract(1).unwrap(), b"bravo");
    assert_eq!(archive.entries()[1].locator(), Locator::FallbackOnly);
    assert!(!archive.entries()[0].is_fallback_only());

    // The demoted entry goes straight to the same fallback instance.
    assert_eq!(&*archive.extract(1).unwrap(), b"bravo");
    assert_eq!(&*archive.extract(0).unwrap(), b"alpha");
    assert_eq!(stats.created(), 1);
    assert_eq!(stats.extracted(), ["b.txt", "b.txt"]);
}

#[test]
fn test_corrupt_data_without_fallback() {
    let temp_dir = setup_test_dir();
    let bytes = rar4_archive(&[corrupt_data_block("a.txt", b"alpha")]);
    let path = write_archive(&temp_dir, "test.rar", &bytes);

    let mut archive = RarFile::open_with(&path, &disabled_options());
    assert!(archive.extract(0).is_none());
    assert_eq!(archive.entries()[0].offset(), Some(20));
}

#[test]
fn test_corrupt_data_in_stream_session() {
    let bytes = rar4_archive(&[
        file_block("a.txt", b"alpha", 0),
        corrupt_data_block("b.txt", b"bravo"),
    ]);
    let (options, stats) = mock_options(&[("a.txt", b"alpha"), ("b.txt", b"bravo")]);

    let mut archive = RarFile::from_reader_with(Cursor::new(bytes), &options);
    assert!(archive.extract(1).is_none());
    assert!(!archive.entries()[1].is_fallback_only());
    assert_eq!(&*archive.extract(0).unwrap(), b"alpha");
    assert_eq!(stats.created(), 0);
}

#[test]
fn test_encrypted_entry_uses_fallback() {
    let temp_dir = setup_test_dir();
    let bytes = rar4_archive(&[file_block("secret.txt", b"ciphertext", ENCRYPTED)]);
    let path = write_archive(&temp_dir, "test.rar", &bytes);
    let (options, stats) = mock_options(&[("secret.txt", b"plaintext")]);

    let mut archive = RarFile::open_with(&path, &options);
    assert_eq!(&*archive.extract(0).unwrap(), b"plaintext");
    assert!(archive.entries()[0].is_fallback_only());
    assert_eq!(stats.extracted(), ["secret.txt"]);
}

#[test]
fn test_fallback_only_entries_extract_through_fallback() {
    let temp_dir = setup_test_dir();
    let path = write_archive(&temp_dir, "test.rar", &rar5_archive());
    let (options, stats) = mock_options(&[("x.txt", b"ex"), ("y.txt", b"why")]);

    let mut archive = RarFile::open_with(&path, &options);
    let data = archive.extract_by_name("Y.TXT").unwrap();
    assert_eq!(&*data, b"why");
    assert_eq!(data.as_padded(), b"why\0\0");
    assert_eq!(stats.created(), 1);
}

#[test]
fn test_fallback_failure_is_absent() {
    let temp_dir = setup_test_dir();
    let bytes = rar4_archive(&[corrupt_data_block("a.txt", b"alpha")]);
    let path = write_archive(&temp_dir, "test.rar", &bytes);
    let (options, _) = mock_options(&[("other.txt", b"other")]);

    let mut archive = RarFile::open_with(&path, &options);
    assert!(archive.extract(0).is_none());
    assert!(archive.entries()[0].is_fallback_only());
}

#[test]
fn test_close_session() {
    let temp_dir = setup_test_dir();
    let path = write_archive(&temp_dir, "test.rar", &stored_archive(&[("a.txt", b"alpha")]));

    let mut archive = RarFile::open(&path);
    assert!(archive.extract(0).is_some());
    archive.close();
}
