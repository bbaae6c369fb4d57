use std::io::BufWriter;

use tdf_timeline::timeline::make_timestamp;
use tdf_timeline::writer::append_name_value;
use tdf_timeline::{DescriptorTable, ReaderConfig, TdfReader, TdfWriter, VariableRequest};
use tempfile::NamedTempFile;

/// One synthetic subject: id, gender and daily `(day, Cr, Na)` labs
#[derive(Debug, Clone)]
pub struct Subject {
    pub id: String,
    pub gender: &'static str,
    pub labs: Vec<(i32, f64, f64)>,
}

/// Subjects with deterministic, slowly varying labs
#[must_use]
pub fn sample_subjects(count: usize) -> Vec<Subject> {
    (0..count)
        .map(|n| {
            let first_day = 1000 + 10 * n as i32;
            let labs = (0..5 + n % 4)
                .map(|offset| {
                    let day = first_day + offset as i32;
                    let cr = 0.8 + 0.1 * ((n + offset) % 7) as f64;
                    let na = 135.0 + ((n * 3 + offset) % 9) as f64;
                    (day, (cr * 10.0).round() / 10.0, na)
                })
                .collect();
            Subject {
                id: (n + 1).to_string(),
                gender: if n % 2 == 0 { "M" } else { "F" },
                labs,
            }
        })
        .collect()
}

/// Write subjects to a temporary TDF file
pub fn write_sample_file(subjects: &[Subject]) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temporary file");
    let mut writer = TdfWriter::new(BufWriter::new(file.reopen().expect("reopen")));
    writer
        .write_header("Integration sample", "tests", "")
        .expect("header");
    for subject in subjects {
        writer
            .start_timeline(&subject.id, subject.gender, "W")
            .expect("timeline");
        for &(day, cr, na) in &subject.labs {
            let mut values = String::new();
            append_name_value(&mut values, "Cr", &format!("{cr:.1}"));
            append_name_value(&mut values, "Na", &format!("{na:.0}"));
            writer
                .write_data_node("L", &make_timestamp(day, 8, 0), "", &values)
                .expect("data node");
        }
        writer.finish_timeline().expect("finish");
    }
    writer.write_footer().expect("footer");
    writer.into_inner().expect("flush");
    file
}

/// Open a reader over the bundled vocabulary
pub fn open_reader(file: &NamedTempFile, inputs: &str, result: &str) -> TdfReader {
    let table = DescriptorTable::medicine().expect("bundled vocabulary");
    TdfReader::open(
        file.path(),
        &table,
        &VariableRequest::new(inputs, result),
        ReaderConfig::default(),
    )
    .expect("reader")
}

/// Subject ids in file order, reading sequentially
pub fn sequential_ids(reader: &mut TdfReader) -> Vec<String> {
    let mut ids = Vec::new();
    let mut found = reader.seek_first_timeline().expect("seek");
    while found {
        ids.push(current_id(reader));
        found = reader.seek_next_timeline().expect("seek");
    }
    ids
}

#[must_use]
pub fn current_id(reader: &TdfReader) -> String {
    reader
        .current_timeline()
        .map(|t| t.demographics.subject_id.clone())
        .unwrap_or_default()
}
