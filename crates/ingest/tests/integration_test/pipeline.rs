use fidstats_compute::{fold_shards, FoldError, MomentAccumulator};
use fidstats_core::StatsError;
use fidstats_ingest::{accumulate_shard, discover_shards, EmbeddingError};

use crate::helpers::{make_embeddings, test_data_dir, write_binary_shard, write_jsonl_shard};

const DIM: usize = 5;

#[test]
fn test_parallel_fold_matches_single_pass() {
    let data_dir = test_data_dir();
    let mut all = Vec::new();
    for shard in 0..6 {
        // Uneven shard sizes, one of them a single vector.
        let n = if shard == 3 { 1 } else { 10 + shard * 7 };
        let vectors = make_embeddings(all.len(), n, DIM);
        let path = data_dir.join(format!("part-{:03}.emb", shard));
        write_binary_shard(&path, &vectors);
        all.extend(vectors);
    }

    let shards = discover_shards(&data_dir).unwrap();
    assert_eq!(shards.len(), 6);

    let parallel = fold_shards(&shards, DIM, 3, |path, acc| {
        accumulate_shard(path, acc, 4).map(|_| ())
    })
    .unwrap();

    let mut single = MomentAccumulator::new(DIM).unwrap();
    single.update_f32(&all).unwrap();

    assert_eq!(parallel.count(), all.len() as u64);
    let a = parallel.finalize().unwrap();
    let b = single.finalize().unwrap();
    assert!(a.approx_eq(&b, 1e-10));

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_mixed_formats_agree() {
    let data_dir = test_data_dir();
    let first = make_embeddings(0, 12, DIM);
    let second = make_embeddings(12, 9, DIM);
    write_binary_shard(&data_dir.join("a.emb"), &first);
    write_jsonl_shard(&data_dir.join("b.jsonl"), &second);

    let shards = discover_shards(&data_dir).unwrap();
    let folded = fold_shards(&shards, DIM, 2, |path, acc| {
        accumulate_shard(path, acc, 50).map(|_| ())
    })
    .unwrap();

    let mut expected = MomentAccumulator::new(DIM).unwrap();
    expected.update_f32(&first).unwrap();
    expected.update_f32(&second).unwrap();
    assert!(folded.approx_eq(&expected, 1e-10));

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_bad_shard_aborts_fold() {
    let data_dir = test_data_dir();
    write_binary_shard(&data_dir.join("a.emb"), &make_embeddings(0, 8, DIM));
    // Wrong dimensionality in the second shard.
    write_jsonl_shard(&data_dir.join("b.jsonl"), &make_embeddings(0, 3, DIM + 1));

    let shards = discover_shards(&data_dir).unwrap();
    let result = fold_shards(&shards, DIM, 2, |path, acc| {
        accumulate_shard(path, acc, 50).map(|_| ())
    });
    match result {
        Err(FoldError::Shard { index, source }) => {
            assert_eq!(index, 1);
            assert!(matches!(
                source,
                EmbeddingError::Stats(StatsError::DimensionMismatch {
                    expected: DIM,
                    got: 6
                })
            ));
        }
        other => panic!("expected shard failure, got {:?}", other.map(|a| a.count())),
    }

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_truncated_shard_aborts_fold() {
    let data_dir = test_data_dir();
    write_binary_shard(&data_dir.join("a.emb"), &make_embeddings(0, 8, DIM));
    let cut = data_dir.join("b.emb");
    write_binary_shard(&cut, &make_embeddings(8, 300, DIM));
    let bytes = std::fs::read(&cut).unwrap();
    std::fs::write(&cut, &bytes[..bytes.len() / 2]).unwrap();

    let shards = discover_shards(&data_dir).unwrap();
    let result = fold_shards(&shards, DIM, 2, |path, acc| {
        accumulate_shard(path, acc, 16).map(|_| ())
    });
    assert!(matches!(
        result,
        Err(FoldError::Shard {
            index: 1,
            source: EmbeddingError::Shard { .. }
        })
    ));

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_empty_directory_has_no_shards() {
    let data_dir = test_data_dir();
    assert!(discover_shards(&data_dir).unwrap().is_empty());
    std::fs::remove_dir_all(&data_dir).ok();
}
