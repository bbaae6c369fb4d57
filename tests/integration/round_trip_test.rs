use crate::utils::{current_id, open_reader, sample_subjects, sequential_ids, write_sample_file};
use tdf_timeline::query::DayValue;

/// Test written labs come back with the same days and values
#[test]
fn test_write_then_read() {
    let subjects = sample_subjects(6);
    let file = write_sample_file(&subjects);
    let mut reader = open_reader(&file, "Cr;Na", "");
    assert_eq!(reader.description("Description"), Some("Integration sample"));

    let mut found = reader.seek_first_timeline().unwrap();
    for subject in &subjects {
        assert!(found, "missing subject {}", subject.id);
        assert_eq!(current_id(&reader), subject.id);
        let timeline = reader.current_timeline().unwrap();
        assert_eq!(timeline.demographics.is_male, subject.gender == "M");
        assert_eq!(timeline.len(), subject.labs.len());

        let expected_cr: Vec<DayValue> = subject
            .labs
            .iter()
            .map(|&(day, value, _)| DayValue { day, value })
            .collect();
        let expected_na: Vec<DayValue> = subject
            .labs
            .iter()
            .map(|&(day, _, value)| DayValue { day, value })
            .collect();
        assert_eq!(reader.raw_values("Cr", true).unwrap(), expected_cr);
        assert_eq!(reader.raw_values("Na", false).unwrap(), expected_na);

        found = reader.seek_next_timeline().unwrap();
    }
    assert!(!found);
}

/// Test the raw fragment can be copied into a new file unchanged
#[test]
fn test_copy_fragments() {
    let subjects = sample_subjects(3);
    let source = write_sample_file(&subjects);
    let mut reader = open_reader(&source, "Cr", "");

    let copy = tempfile::NamedTempFile::new().unwrap();
    let mut writer = tdf_timeline::TdfWriter::new(copy.reopen().unwrap());
    writer.write_header("Copy", "tests", "").unwrap();
    let mut found = reader.seek_first_timeline().unwrap();
    while found {
        writer.write_raw(reader.current_fragment().unwrap()).unwrap();
        found = reader.seek_next_timeline().unwrap();
    }
    writer.write_footer().unwrap();
    writer.into_inner().unwrap();

    let mut copied = open_reader(&copy, "Cr", "");
    assert_eq!(copied.description("Description"), Some("Copy"));
    assert_eq!(sequential_ids(&mut copied), vec!["1", "2", "3"]);
}
