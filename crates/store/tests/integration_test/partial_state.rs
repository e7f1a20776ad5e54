use fidstats_compute::{merge_all, MomentAccumulator};
use fidstats_core::config::Compression;
use fidstats_store::{ArchiveKind, StatsStore};

use crate::helpers::{assert_bits_eq, make_accumulator, make_vectors, test_data_dir};

#[test]
fn test_state_round_trip_is_exact() {
    let data_dir = test_data_dir();
    let path = data_dir.join("partial.fidz");
    let state = make_accumulator(33, 5);

    let store = StatsStore::new(Compression::Zstd);
    store.save_state(&path, &state).unwrap();
    let loaded = store.load_state(&path).unwrap();

    assert_eq!(loaded.count(), 33);
    assert_eq!(loaded.dim(), 5);
    assert_bits_eq(loaded.mean(), state.mean());
    assert_bits_eq(loaded.packed_m2(), state.packed_m2());

    let summary = store.describe(&path).unwrap();
    assert_eq!(summary.kind, ArchiveKind::Accumulator);
    assert_eq!(summary.count, Some(33));

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_empty_state_round_trips() {
    let data_dir = test_data_dir();
    let path = data_dir.join("empty.fidz");
    let store = StatsStore::default();

    store.save_state(&path, &MomentAccumulator::new(3).unwrap()).unwrap();
    let loaded = store.load_state(&path).unwrap();
    assert!(loaded.is_empty());
    assert_eq!(loaded.dim(), 3);

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_persisted_shards_merge_to_single_pass_result() {
    let data_dir = test_data_dir();
    let store = StatsStore::default();
    let vectors = make_vectors(60, 4);

    // Three "processes" each persist their shard.
    let mut paths = Vec::new();
    for (i, chunk) in vectors.chunks(20).enumerate() {
        let mut acc = MomentAccumulator::new(4).unwrap();
        acc.update(chunk).unwrap();
        let path = data_dir.join(format!("shard-{}.fidz", i));
        store.save_state(&path, &acc).unwrap();
        paths.push(path);
    }

    let states: Vec<MomentAccumulator> =
        paths.iter().map(|p| store.load_state(p).unwrap()).collect();
    let merged = merge_all(4, states).unwrap();

    let mut single = MomentAccumulator::new(4).unwrap();
    single.update(&vectors).unwrap();

    assert_eq!(merged.count(), 60);
    assert!(merged
        .finalize()
        .unwrap()
        .approx_eq(&single.finalize().unwrap(), 1e-9));

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_impossible_state_is_rejected_on_load() {
    use fidstats_core::StatsError;
    use fidstats_store::ArchiveWriter;

    let data_dir = test_data_dir();
    let path = data_dir.join("crafted.fidz");

    // D = 2 with a negative variance on the second diagonal entry.
    let mut writer = ArchiveWriter::new(ArchiveKind::Accumulator);
    writer
        .add_u64("count", &[1], &[10])
        .add_f64("mean", &[2], &[0.5, 1.5])
        .add_f64("m2_upper", &[3], &[4.0, 0.0, -1.0]);
    writer.write(&path, Compression::None).unwrap();

    let err = StatsStore::default().load_state(&path).unwrap_err();
    match err {
        StatsError::Format { reason, .. } => assert!(reason.contains("negative")),
        other => panic!("expected format error, got {:?}", other),
    }

    std::fs::remove_dir_all(&data_dir).ok();
}
