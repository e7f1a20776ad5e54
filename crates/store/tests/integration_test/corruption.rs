use std::path::Path;

use fidstats_core::StatsError;
use fidstats_store::{ArchiveKind, ArchiveWriter, StatsStore};
use fidstats_core::config::Compression;

use crate::helpers::{make_stats, test_data_dir};

fn assert_format_error(result: Result<impl std::fmt::Debug, StatsError>, needle: &str) {
    match result {
        Err(StatsError::Format { reason, .. }) => {
            assert!(reason.contains(needle), "reason '{}' lacks '{}'", reason, needle)
        }
        other => panic!("expected format error containing '{}', got {:?}", needle, other),
    }
}

fn write_raw(path: &Path, bytes: &[u8]) {
    std::fs::write(path, bytes).unwrap();
}

#[test]
fn test_missing_file_is_io_error() {
    let data_dir = test_data_dir();
    let result = StatsStore::default().load(&data_dir.join("absent.fidz"));
    assert!(matches!(result, Err(StatsError::Io { .. })));
    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_unwritable_path_is_io_error() {
    let data_dir = test_data_dir();
    // A regular file where a parent directory is expected
    let blocker = data_dir.join("blocker");
    write_raw(&blocker, b"not a directory");

    let result = StatsStore::default().save(&blocker.join("stats.fidz"), &make_stats(4, 2));
    match result {
        Err(StatsError::Io { path, .. }) => assert!(path.starts_with(&data_dir)),
        other => panic!("expected io error, got {:?}", other),
    }
    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_bad_magic_rejected() {
    let data_dir = test_data_dir();
    let path = data_dir.join("junk.fidz");
    write_raw(&path, b"PK\x03\x04 definitely a zip file");

    assert_format_error(StatsStore::default().load(&path), "bad magic");
    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_short_file_rejected() {
    let data_dir = test_data_dir();
    let path = data_dir.join("short.fidz");
    write_raw(&path, b"FID");

    assert_format_error(StatsStore::default().load(&path), "too short");
    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_missing_sigma_names_the_array() {
    let data_dir = test_data_dir();
    let path = data_dir.join("mu-only.fidz");
    let mut writer = ArchiveWriter::new(ArchiveKind::Statistics);
    writer.add_f64("mu", &[3], &[1.0, 2.0, 3.0]);
    writer.write(&path, Compression::None).unwrap();

    assert_format_error(StatsStore::default().load(&path), "missing array 'sigma'");
    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_missing_mu_names_the_array() {
    let data_dir = test_data_dir();
    let path = data_dir.join("sigma-only.fidz");
    let mut writer = ArchiveWriter::new(ArchiveKind::Statistics);
    writer.add_f64("sigma", &[1, 1], &[1.0]);
    writer.write(&path, Compression::None).unwrap();

    assert_format_error(StatsStore::default().load(&path), "missing array 'mu'");
    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_inconsistent_shapes_rejected() {
    let data_dir = test_data_dir();
    let path = data_dir.join("mismatch.fidz");
    let mut writer = ArchiveWriter::new(ArchiveKind::Statistics);
    writer
        .add_f64("mu", &[3], &[0.0; 3])
        .add_f64("sigma", &[2, 2], &[1.0, 0.0, 0.0, 1.0]);
    writer.write(&path, Compression::None).unwrap();

    assert_format_error(StatsStore::default().load(&path), "inconsistent");
    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_flipped_payload_byte_fails_checksum() {
    let data_dir = test_data_dir();
    let path = data_dir.join("flipped.fidz");
    StatsStore::default().save(&path, &make_stats(10, 3)).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    write_raw(&path, &bytes);

    assert_format_error(StatsStore::default().load(&path), "checksum");
    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_truncated_payload_rejected() {
    let data_dir = test_data_dir();
    let path = data_dir.join("truncated.fidz");
    StatsStore::default().save(&path, &make_stats(10, 3)).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    write_raw(&path, &bytes[..bytes.len() - 16]);

    assert!(matches!(
        StatsStore::default().load(&path),
        Err(StatsError::Format { .. })
    ));
    std::fs::remove_dir_all(&data_dir).ok();
}
