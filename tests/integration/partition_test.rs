use rayon::prelude::*;

use crate::utils::{current_id, open_reader, sample_subjects, sequential_ids, write_sample_file};
use tdf_timeline::create_partitions;

/// Test every timeline is read exactly once whatever the partition size
#[test]
fn test_partitions_cover_file() {
    let file = write_sample_file(&sample_subjects(25));
    let mut reader = open_reader(&file, "Cr", "");
    let expected = sequential_ids(&mut reader);
    assert_eq!(expected.len(), 25);
    let total = file.as_file().metadata().unwrap().len();

    for size in [64, 500, 1024, 4096, total] {
        let mut ids = Vec::new();
        for partition in create_partitions(file.path(), size).unwrap() {
            let mut found = reader.seek_first_timeline_in_partition(partition).unwrap();
            while found {
                ids.push(current_id(&reader));
                found = reader.seek_next_timeline_in_partition(partition).unwrap();
            }
        }
        assert_eq!(ids, expected, "partition size {size}");
    }
}

/// Test independent readers over partitions agree with a sequential scan
#[test]
fn test_parallel_partition_readers() {
    let file = write_sample_file(&sample_subjects(40));
    let partitions = create_partitions(file.path(), 700).unwrap();
    assert!(partitions.len() > 1);

    let per_partition: Vec<Vec<String>> = partitions
        .par_iter()
        .map(|&partition| {
            let mut reader = open_reader(&file, "Cr;Na", "");
            let mut ids = Vec::new();
            let mut found = reader.seek_first_timeline_in_partition(partition).unwrap();
            while found {
                ids.push(current_id(&reader));
                found = reader.seek_next_timeline_in_partition(partition).unwrap();
            }
            ids
        })
        .collect();

    let ids: Vec<String> = per_partition.into_iter().flatten().collect();
    let expected: Vec<String> = (1..=40).map(|n| n.to_string()).collect();
    assert_eq!(ids, expected);
}

/// Test located byte ranges can be revisited directly
#[test]
fn test_read_timeline_at_range() {
    let file = write_sample_file(&sample_subjects(5));
    let mut reader = open_reader(&file, "Cr", "");
    let total = file.as_file().metadata().unwrap().len();
    let ranges = reader
        .find_timelines_in_partition(tdf_timeline::FilePartition::new(0, total))
        .unwrap();
    assert_eq!(ranges.len(), 5);

    for (n, range) in ranges.iter().enumerate().rev() {
        let timeline = reader.read_timeline_at(*range).unwrap();
        assert_eq!(timeline.demographics.subject_id, (n + 1).to_string());
    }
}
