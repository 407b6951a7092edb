use hashemb_data::{CsrBatch, CsrBatchReader, CsrBatchWriter, DataError, DataSetHeader};
use tempfile::tempdir;

#[test]
fn file_roundtrip_across_batches() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.bin");

    let samples: Vec<(Vec<i32>, Vec<Vec<u32>>)> = (0..6u32)
        .map(|i| (vec![i as i32], vec![vec![i; (i % 3) as usize], vec![100 + i]]))
        .collect();

    let header = DataSetHeader::new(samples.len() as i64, 1, 2);
    let mut writer = CsrBatchWriter::<u32>::create(&path, header).unwrap();
    for (labels, slots) in &samples {
        writer.write_sample(labels, slots).unwrap();
    }
    writer.finish().unwrap();

    let mut reader = CsrBatchReader::<u32>::open(&path, 1).unwrap();
    assert_eq!(*reader.header(), header);

    let mut batch = CsrBatch::new(3, 2, 3);
    for chunk in samples.chunks(3) {
        reader.read_batch(&mut batch).unwrap();
        let expected: Vec<u32> = chunk
            .iter()
            .flat_map(|(_, slots)| slots.iter().flatten().copied())
            .collect();
        assert_eq!(batch.keys(), expected.as_slice());
        assert!(batch.is_complete());
    }

    let err = reader.read_batch(&mut batch).unwrap_err();
    assert!(err.is_end_of_stream());
}

#[test]
fn missing_file_reports_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.bin");
    let err = CsrBatchReader::<i64>::open(&path, 1).unwrap_err();
    match err {
        DataError::Open { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected Open error, got {other:?}"),
    }
}
