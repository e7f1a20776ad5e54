use fidstats_core::config::Compression;
use fidstats_store::StatsStore;

use crate::helpers::{assert_bits_eq, make_stats, test_data_dir};

#[test]
fn test_round_trip_is_bit_exact() {
    let data_dir = test_data_dir();
    let path = data_dir.join("stats.fidz");
    let stats = make_stats(40, 6);

    let store = StatsStore::new(Compression::None);
    store.save(&path, &stats).unwrap();
    let loaded = store.load(&path).unwrap();

    assert_eq!(loaded.dim(), 6);
    assert_bits_eq(loaded.mu(), stats.mu());
    assert_bits_eq(loaded.sigma(), stats.sigma());

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_round_trip_with_zstd_is_bit_exact() {
    let data_dir = test_data_dir();
    let path = data_dir.join("stats.fidz");
    let stats = make_stats(25, 9);

    let store = StatsStore::new(Compression::Zstd);
    store.save(&path, &stats).unwrap();

    // Loading does not depend on the store's own compression setting.
    let loaded = StatsStore::new(Compression::None).load(&path).unwrap();
    assert_bits_eq(loaded.mu(), stats.mu());
    assert_bits_eq(loaded.sigma(), stats.sigma());

    let summary = store.describe(&path).unwrap();
    assert_eq!(summary.compression, Compression::Zstd);
    assert_eq!(summary.dims, 9);
    assert_eq!(summary.count, None);

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_save_creates_parent_directories() {
    let data_dir = test_data_dir();
    let path = data_dir.join("nested").join("deeper").join("stats.fidz");

    StatsStore::default().save(&path, &make_stats(5, 2)).unwrap();
    assert!(path.exists());
    // No temp file left behind
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_save_overwrites_existing_archive() {
    let data_dir = test_data_dir();
    let path = data_dir.join("stats.fidz");
    let store = StatsStore::default();

    store.save(&path, &make_stats(10, 4)).unwrap();
    let second = make_stats(30, 3);
    store.save(&path, &second).unwrap();

    let loaded = store.load(&path).unwrap();
    assert_eq!(loaded.dim(), 3);
    assert_bits_eq(loaded.sigma(), second.sigma());

    std::fs::remove_dir_all(&data_dir).ok();
}
