use crate::utils::{Subject, open_reader, write_sample_file};
use tdf_timeline::query::DayValue;
use tdf_timeline::{
    DescriptorTable, ExtractOptions, ReaderConfig, TdfReader, VariableRequest, VariableSet,
};

fn rising_creatinine() -> Vec<Subject> {
    vec![Subject {
        id: "7".to_string(),
        gender: "F",
        labs: vec![
            (100, 1.0, 136.0),
            (101, 1.1, 137.0),
            (102, 1.2, 138.0),
            (103, 1.3, 139.0),
            (104, 1.4, 140.0),
        ],
    }]
}

/// Test window lookups search in the direction the endpoints give
#[test]
fn test_window_lookup() {
    let file = write_sample_file(&rising_creatinine());
    let mut reader = open_reader(&file, "Cr;Cr[-3:-1];Cr[-1:-3];Cr[1:2]", "");
    assert!(reader.seek_first_timeline().unwrap());

    assert_eq!(
        reader.resolve_value("Cr", 4, None).unwrap(),
        Some(DayValue { day: 104, value: 1.4 })
    );
    assert_eq!(
        reader.resolve_value("Cr[-3:-1]", 4, None).unwrap(),
        Some(DayValue { day: 101, value: 1.1 })
    );
    assert_eq!(
        reader.resolve_value("Cr[-1:-3]", 4, None).unwrap(),
        Some(DayValue { day: 103, value: 1.3 })
    );
    assert_eq!(reader.resolve_value("Cr[1:2]", 4, None).unwrap(), None);
    assert_eq!(
        reader.resolve_value("Cr[1:2]", 0, None).unwrap().map(|d| d.day),
        Some(101)
    );
}

/// Test aligned series pair each day with the previous day's value
#[test]
fn test_aligned_series() {
    let file = write_sample_file(&rising_creatinine());
    let mut reader = open_reader(&file, "Cr[-1:-1]", "Na");
    assert!(reader.seek_first_timeline().unwrap());

    let series = reader.extract_aligned_series(&ExtractOptions::default());
    assert_eq!(series.days, vec![101, 102, 103, 104]);
    assert_eq!(series.inputs, vec![vec![1.0], vec![1.1], vec![1.2], vec![1.3]]);
    assert_eq!(
        series.results,
        vec![Some(137.0), Some(138.0), Some(139.0), Some(140.0)]
    );
}

/// Test filters restrict the extracted rows
#[test]
fn test_filtered_series() {
    let file = write_sample_file(&rising_creatinine());
    let table = DescriptorTable::medicine().unwrap();
    let request = VariableRequest::new("Cr", "").with_filter_variables("Na");
    let mut reader = TdfReader::open(file.path(), &table, &request, ReaderConfig::default()).unwrap();
    reader.set_filter("Na>137").unwrap();
    assert!(reader.seek_first_timeline().unwrap());

    let series = reader.extract_aligned_series(&ExtractOptions::default());
    assert_eq!(series.days, vec![102, 103, 104]);
    assert_eq!(series.inputs, vec![vec![1.2], vec![1.3], vec![1.4]]);

    let between = reader.values_between_days("Cr", 101, 103, true).unwrap();
    assert_eq!(between.iter().map(|d| d.day).collect::<Vec<_>>(), vec![101, 102, 103]);
}

/// Test resolution pulls in dependencies once and is repeatable
#[test]
fn test_dependency_resolution() {
    let table = DescriptorTable::medicine().unwrap();
    let request = VariableRequest::new("GFR;Cr;Cr[-1:-1]", "");
    let first = VariableSet::resolve(&table, &request).unwrap();
    let second = VariableSet::resolve(&table, &request).unwrap();

    let names: Vec<&str> = first.names().collect();
    assert_eq!(names, second.names().collect::<Vec<_>>());
    for dependency in ["Cr", "WtKg", "AgeInYrs", "IsMale"] {
        assert!(first.id(dependency).is_some(), "{dependency} not resolved");
    }
    let crs = names.iter().filter(|n| **n == "Cr").count();
    assert_eq!(crs, 1);
    assert_eq!(first.num_inputs(), 3);

    let unknown = VariableSet::resolve(&table, &VariableRequest::new("NoSuchLab", ""));
    assert!(unknown.is_err_and(|e| e.is_configuration()));
}
