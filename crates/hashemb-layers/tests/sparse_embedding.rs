use std::path::{Path, PathBuf};

use hashemb_checkpoint::{EmbeddingTable, TileCheckpointer};
use hashemb_data::{CsrBatchWriter, DataSetHeader};
use hashemb_layers::{Combiner, SparseEmbeddingConfig, SparseEmbeddingHashCpu};
use hashemb_optimizer::OptimizerConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::{tempdir, TempDir};

const KEYS: [i64; 4] = [100, 101, 102, 103];

/// One sample's slots.
type Sample = Vec<Vec<i64>>;

struct Fixture {
    _dir: TempDir,
    table: PathBuf,
    data: PathBuf,
}

fn write_fixture(table: &EmbeddingTable<i64>, samples: &[Sample], slot_num: usize) -> Fixture {
    let dir = tempdir().unwrap();
    let table_path = dir.path().join("table.bin");
    let data_path = dir.path().join("data.bin");

    TileCheckpointer::<i64>::new(table.vocabulary_size(), table.dim())
        .save(&table_path, table)
        .unwrap();

    let header = DataSetHeader::new(samples.len() as i64, 1, slot_num as i64);
    let mut writer = CsrBatchWriter::<i64>::create(&data_path, header).unwrap();
    for (i, slots) in samples.iter().enumerate() {
        writer.write_sample(&[i as i32], slots).unwrap();
    }
    writer.finish().unwrap();

    Fixture {
        _dir: dir,
        table: table_path,
        data: data_path,
    }
}

fn small_table() -> EmbeddingTable<i64> {
    EmbeddingTable::new(
        KEYS.to_vec(),
        vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0],
        2,
    )
    .unwrap()
}

fn config(
    batch_size: usize,
    slot_num: usize,
    combiner: Combiner,
    optimizer: OptimizerConfig,
) -> SparseEmbeddingConfig {
    SparseEmbeddingConfig {
        batch_size,
        max_feature_num: 4,
        vocabulary_size: KEYS.len(),
        embedding_vec_size: 2,
        slot_num,
        combiner,
        optimizer,
        label_dim: 1,
    }
}

fn open(
    fixture: &Fixture,
    config: SparseEmbeddingConfig,
) -> SparseEmbeddingHashCpu<i64> {
    SparseEmbeddingHashCpu::new(config, &fixture.table, &fixture.data).unwrap()
}

#[test]
fn worked_example_sum_and_mean() {
    // Keys resolve to row indices [2, 0, 2].
    let fixture = write_fixture(&small_table(), &[vec![vec![102, 100, 102]]], 1);

    let mut sum = open(&fixture, config(1, 1, Combiner::Sum, OptimizerConfig::adam(0.1)));
    sum.forward().unwrap();
    assert_eq!(sum.row_indices(), &[2, 0, 2]);
    assert_eq!(sum.embedding_feature(), &[7.0, 7.0]);

    let mut mean = open(&fixture, config(1, 1, Combiner::Mean, OptimizerConfig::adam(0.1)));
    mean.forward().unwrap();
    assert_eq!(mean.embedding_feature(), &[7.0f32 / 3.0, 7.0 / 3.0]);

    sum.backward_from_output().unwrap();
    sum.update_params().unwrap();
    let groups = sum.aggregator().groups();
    assert_eq!(groups.len(), 2);
    assert_eq!((groups[0].row_index, groups[0].len()), (0, 1));
    assert_eq!((groups[1].row_index, groups[1].len()), (2, 2));
}

#[test]
fn checkpoint_round_trip_through_forward() {
    let mut rng = StdRng::seed_from_u64(11);
    let dim = 5;
    let keys: Vec<i64> = (0..16).map(|i| i * 7919 - 40).collect();
    let values: Vec<f32> = (0..keys.len() * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let table = EmbeddingTable::new(keys.clone(), values, dim).unwrap();

    let samples: Vec<Sample> = keys.iter().map(|&k| vec![vec![k]]).collect();
    let fixture = write_fixture(&table, &samples, 1);

    let mut config = config(1, 1, Combiner::Sum, OptimizerConfig::momentum(0.1));
    config.vocabulary_size = keys.len();
    config.embedding_vec_size = dim;
    let mut layer = open(&fixture, config);

    for row in 0..keys.len() {
        layer.forward().unwrap();
        assert_eq!(layer.embedding_feature(), table.row(row));
    }
    assert!(layer.forward().unwrap_err().is_end_of_stream());
}

#[test]
fn mean_backward_is_scaled_sum_backward() {
    // Rows with 3, 0 and 1 features.
    let samples: Vec<Sample> = vec![vec![vec![100, 101, 101], vec![]], vec![vec![103], vec![102]]];
    let fixture = write_fixture(&small_table(), &samples, 2);
    let top_grad = [3.0, 6.0, 1.0, 1.0, 2.0, 4.0, 8.0, 16.0];

    let mut sum = open(&fixture, config(2, 2, Combiner::Sum, OptimizerConfig::adam(0.1)));
    let mut mean = open(&fixture, config(2, 2, Combiner::Mean, OptimizerConfig::adam(0.1)));
    sum.forward().unwrap();
    mean.forward().unwrap();
    sum.backward(&top_grad).unwrap();
    mean.backward(&top_grad).unwrap();

    assert_eq!(sum.wgrad(), &top_grad);
    assert_eq!(&mean.wgrad()[..2], &[3.0 * (1.0 / 3.0), 6.0 * (1.0 / 3.0)]);
    assert_eq!(&mean.wgrad()[2..], &sum.wgrad()[2..]);

    // Empty rows pool to zero in both modes.
    assert_eq!(&sum.embedding_feature()[2..4], &[0.0, 0.0]);
    assert_eq!(&mean.embedding_feature()[2..4], &[0.0, 0.0]);
    // Single-feature rows agree between modes.
    assert_eq!(&sum.embedding_feature()[4..], &mean.embedding_feature()[4..]);
}

#[test]
fn updates_only_touch_looked_up_rows() {
    let samples: Vec<Sample> = vec![vec![vec![101, 103, 101]]];
    let fixture = write_fixture(&small_table(), &samples, 1);

    for optimizer in [
        OptimizerConfig::adam(0.1),
        OptimizerConfig::momentum(0.1),
        OptimizerConfig::nesterov(0.1),
    ] {
        let mut layer = open(&fixture, config(1, 1, Combiner::Sum, optimizer));
        let before = layer.hash_table_values().to_vec();

        layer.forward().unwrap();
        layer.backward_from_output().unwrap();
        layer.update_params().unwrap();

        let after = layer.hash_table_values();
        assert_eq!(&after[0..2], &before[0..2]);
        assert_eq!(&after[4..6], &before[4..6]);
        assert_ne!(&after[2..4], &before[2..4]);
        assert_ne!(&after[6..8], &before[6..8]);

        for slot in layer.optimizer().state_slots() {
            assert_eq!(&slot.values[0..2], &[0.0, 0.0], "{}", slot.name);
            assert_eq!(&slot.values[4..6], &[0.0, 0.0], "{}", slot.name);
        }
    }
}

#[test]
fn momentum_update_uses_aggregated_gradient() {
    let samples: Vec<Sample> = vec![vec![vec![101, 103, 101]]];
    let fixture = write_fixture(&small_table(), &samples, 1);
    let factor_free = OptimizerConfig::Momentum {
        learning_rate: 0.5,
        factor: 0.0,
    };
    let mut layer = open(&fixture, config(1, 1, Combiner::Sum, factor_free));

    layer.forward().unwrap();
    layer.backward(&[1.0, -1.0]).unwrap();
    layer.update_params().unwrap();

    // Row 1 appears twice, so its gradient is [2, -2].
    let values = layer.hash_table_values();
    assert_eq!(&values[2..4], &[2.0 - 1.0, 2.0 + 1.0]);
    assert_eq!(&values[6..8], &[4.0 - 0.5, 4.0 + 0.5]);
    assert_eq!(layer.steps(), 1);
}

#[test]
fn random_batches_keep_group_invariants() {
    let mut rng = StdRng::seed_from_u64(3);
    let batch_size = 8;
    let slot_num = 3;
    let samples: Vec<Sample> = (0..batch_size * 4)
        .map(|_| {
            (0..slot_num)
                .map(|_| {
                    let n = rng.gen_range(0..3);
                    (0..n).map(|_| KEYS[rng.gen_range(0..KEYS.len())]).collect()
                })
                .collect()
        })
        .collect();
    let fixture = write_fixture(&small_table(), &samples, slot_num);

    let mut config = config(batch_size, slot_num, Combiner::Mean, OptimizerConfig::adam(0.01));
    config.max_feature_num = 6;
    let mut layer = open(&fixture, config);

    for _ in 0..4 {
        layer.forward().unwrap();
        layer.backward_from_output().unwrap();
        layer.update_params().unwrap();

        let nnz = layer.batch().nnz();
        let groups = layer.aggregator().groups();
        let total: usize = groups.iter().map(|g| g.len()).sum();
        assert_eq!(total, nnz);
        assert!(groups.windows(2).all(|w| w[0].row_index < w[1].row_index));
        for group in groups {
            let sorted = &layer.aggregator().sorted_row_indices()[group.start..group.end];
            assert!(sorted.iter().all(|&r| r == group.row_index));
        }
    }
    assert_eq!(layer.steps(), 4);
    assert!(layer.forward().unwrap_err().is_end_of_stream());
}

#[test]
fn missing_checkpoint_is_reported() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.bin");
    let err = SparseEmbeddingHashCpu::<i64>::new(
        config(1, 1, Combiner::Sum, OptimizerConfig::adam(0.1)),
        &missing,
        Path::new("unused.bin"),
    )
    .unwrap_err();
    assert!(matches!(err, hashemb_layers::LayerError::Checkpoint(_)));
}
