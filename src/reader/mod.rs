//! Partitioned streaming reader for TDF files
//!
//! A `TdfReader` owns one file handle. It reads the header once, then
//! advances through timelines one at a time, compiling each into a
//! `Timeline` that the query methods run against. Restricting the scan to a
//! `FilePartition` lets independent readers split one file between them.

pub mod header;
pub mod partition;
pub mod scanner;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::compiler::TimelineCompiler;
use crate::config::ReaderConfig;
use crate::error::{Result, TdfError};
use crate::fragment::parse_fragment;
use crate::query::{
    Admission, AlignedSeries, DayValue, ExtractOptions, FilterPredicate, admissions,
    extract_aligned_series, raw_values, resolve_value, synced_pairs, value_changes,
    values_between_days,
};
use crate::resolver::{EntryRole, FunctionBank, ResolvedEntry, VariableRequest, VariableSet};
use crate::timeline::Timeline;
use crate::variables::{DescriptorTable, RangeMode, VariableReference};
pub use header::{FOOTER, TdfHeader};
pub use partition::{FilePartition, create_partitions, split_range};
pub use scanner::{Boundary, BoundaryScanner};

/// The timeline the reader is positioned on
///
/// Parsed nodes are dropped once compiled; admissions are kept as records.
#[derive(Debug)]
struct CurrentTimeline {
    range: FilePartition,
    xml: String,
    admissions: Vec<Admission>,
    timeline: Timeline,
}

/// Streaming reader over one TDF file
#[derive(Debug)]
pub struct TdfReader {
    path: PathBuf,
    config: ReaderConfig,
    header: TdfHeader,
    scanner: BoundaryScanner<File>,
    compiler: TimelineCompiler,
    functions: FunctionBank,
    filters: Vec<FilterPredicate>,
    partition: Option<FilePartition>,
    current: Option<CurrentTimeline>,
}

impl TdfReader {
    /// Open a file, read its header and resolve the requested variables
    ///
    /// # Arguments
    /// * `path` - The TDF file
    /// * `table` - Descriptor lookup for every variable the request can reach
    /// * `request` - Input, result and filter variables
    /// * `config` - Reader configuration
    ///
    /// # Errors
    /// Returns a configuration error when the request does not resolve, an
    /// I/O error when the file cannot be read, and `MalformedHeader` or
    /// `MissingElement` when the header cannot be established.
    pub fn open(
        path: &Path,
        table: &DescriptorTable,
        request: &VariableRequest,
        config: ReaderConfig,
    ) -> Result<Self> {
        config.validate()?;
        let set = Arc::new(VariableSet::resolve(table, request)?);

        let mut file = File::open(path)?;
        let header = TdfHeader::read(&mut file, config.max_header_bytes)?;
        let mut scanner = BoundaryScanner::new(file, config.read_buffer_size);
        scanner.seek(header.body_offset())?;

        let functions = FunctionBank::for_set(&set);
        let compiler = TimelineCompiler::new(set, &config);
        info!(
            "Opened {} ({})",
            path.display(),
            header.field("Description").unwrap_or("no description")
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            header,
            scanner,
            compiler,
            functions,
            filters: Vec::new(),
            partition: None,
            current: None,
        })
    }

    /// Path the reader was opened on
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The resolved variable set
    #[must_use]
    pub fn variables(&self) -> &VariableSet {
        self.compiler.variables()
    }

    /// Restrict queries to time points passing a `;`-separated filter
    ///
    /// Every variable the filter tests must have been resolved, typically
    /// through `VariableRequest::with_filter_variables`.
    pub fn set_filter(&mut self, filter: &str) -> Result<()> {
        self.filters = FilterPredicate::parse_list(filter, self.compiler.variables())?;
        debug!("Using {} filter predicates", self.filters.len());
        Ok(())
    }

    /// Text of a named `<Head>` child such as `Description` or `DataSource`
    #[must_use]
    pub fn description(&self, name: &str) -> Option<&str> {
        self.header.field(name)
    }

    /// Header text, ending in the `<TimelineList>` tag
    #[must_use]
    pub fn raw_header(&self) -> &str {
        self.header.raw()
    }

    /// Closing text of the file
    #[must_use]
    pub const fn raw_footer(&self) -> &'static str {
        FOOTER
    }

    /// Position on the first timeline of the file
    pub fn seek_first_timeline(&mut self) -> Result<bool> {
        self.partition = None;
        self.scanner.seek(self.header.body_offset())?;
        self.seek_next_timeline()
    }

    /// Advance to the next timeline
    ///
    /// Returns `false` once no timeline remains, in the file or in the
    /// active partition. A timeline whose XML is malformed is skipped with a
    /// warning; one without a `TL` element is a hard error.
    pub fn seek_next_timeline(&mut self) -> Result<bool> {
        let limit = self.partition.map(|p| p.stop);
        loop {
            let Some(range) = self.scanner.next_timeline(limit)? else {
                self.current = None;
                return Ok(false);
            };
            match self.load(range) {
                Ok(()) => return Ok(true),
                Err(e @ (TdfError::Xml(_) | TdfError::XmlAttribute(_))) => {
                    warn!("Skipping timeline at offset {}: {e}", range.start);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Position on the first timeline whose opening marker lies in `partition`
    pub fn seek_first_timeline_in_partition(&mut self, partition: FilePartition) -> Result<bool> {
        self.partition = Some(partition);
        self.scanner
            .seek(partition.start.max(self.header.body_offset()))?;
        self.seek_next_timeline()
    }

    /// Advance to the next timeline of `partition`
    pub fn seek_next_timeline_in_partition(&mut self, partition: FilePartition) -> Result<bool> {
        if self.partition != Some(partition) || self.scanner.position() < partition.start {
            return self.seek_first_timeline_in_partition(partition);
        }
        self.seek_next_timeline()
    }

    /// Byte ranges of every timeline whose opening marker lies in `partition`
    ///
    /// The current timeline and scan position are left as they were.
    pub fn find_timelines_in_partition(
        &mut self,
        partition: FilePartition,
    ) -> Result<Vec<FilePartition>> {
        let resume = self.scanner.position();
        self.scanner
            .seek(partition.start.max(self.header.body_offset()))?;
        let mut found = Vec::new();
        while let Some(range) = self.scanner.next_timeline(Some(partition.stop))? {
            found.push(range);
        }
        self.scanner.seek(resume)?;
        debug!(
            "Found {} timelines in [{}, {})",
            found.len(),
            partition.start,
            partition.stop
        );
        Ok(found)
    }

    /// Load the timeline at a known byte range and make it current
    pub fn read_timeline_at(&mut self, range: FilePartition) -> Result<&Timeline> {
        self.load(range)?;
        self.current_timeline()
            .ok_or_else(|| TdfError::MissingElement("TL".to_string()))
    }

    fn load(&mut self, range: FilePartition) -> Result<()> {
        self.current = None;
        let bytes = self.scanner.read_range(range)?;
        let xml = match String::from_utf8(bytes) {
            Ok(xml) => xml,
            Err(e) => {
                warn!("Timeline at offset {} is not valid UTF-8; decoding lossily", range.start);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        let fragment = parse_fragment(&xml)?;
        let timeline = self.compiler.compile(&fragment);
        let admissions = admissions(&fragment);
        self.functions.reset();
        self.current = Some(CurrentTimeline {
            range,
            xml,
            admissions,
            timeline,
        });
        Ok(())
    }

    /// The compiled current timeline
    #[must_use]
    pub fn current_timeline(&self) -> Option<&Timeline> {
        self.current.as_ref().map(|c| &c.timeline)
    }

    /// Raw XML of the current timeline
    #[must_use]
    pub fn current_fragment(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.xml.as_str())
    }

    /// Byte range of the current timeline
    #[must_use]
    pub fn current_range(&self) -> Option<FilePartition> {
        self.current.as_ref().map(|c| c.range)
    }

    /// Resolved entry for a token, searching the requested entries first
    fn entry(&self, token: &str) -> Result<(usize, &ResolvedEntry)> {
        let reference = VariableReference::parse_unchecked(token)?;
        self.compiler
            .variables()
            .entries()
            .iter()
            .enumerate()
            .find(|(_, e)| e.reference == reference)
            .ok_or_else(|| TdfError::UnknownVariable(token.to_string()))
    }

    /// A plain entry for any resolved base variable
    fn base_entry(&self, name: &str) -> Result<ResolvedEntry> {
        let id = self
            .compiler
            .variables()
            .id(name)
            .ok_or_else(|| TdfError::UnknownVariable(name.to_string()))?;
        Ok(ResolvedEntry {
            reference: VariableReference::current(name),
            id,
            role: EntryRole::Dependency,
        })
    }

    /// Resolve a requested reference at one time point of the current timeline
    ///
    /// Function references must be resolved in time-point order; their
    /// window state carries over between calls until the next timeline.
    ///
    /// # Errors
    /// Returns `UnknownVariable` when `token` is not one of the requested references.
    pub fn resolve_value(
        &mut self,
        token: &str,
        point: usize,
        last_used_day: Option<i32>,
    ) -> Result<Option<DayValue>> {
        let (index, entry) = self.entry(token)?;
        let entry = entry.clone();
        let Some(current) = self.current.as_ref() else {
            return Ok(None);
        };
        let slot = self.functions.slot(index);
        let functions = &mut self.functions;
        Ok(resolve_value(
            &current.timeline,
            point,
            entry.id,
            &entry.reference,
            last_used_day,
            |value, day| slot.and_then(|slot| functions.compute(slot, point, value, day)),
        ))
    }

    /// Aligned inputs, results and days for the current timeline
    pub fn extract_aligned_series(&mut self, options: &ExtractOptions) -> AlignedSeries {
        let Some(current) = self.current.as_ref() else {
            return AlignedSeries::default();
        };
        let options = ExtractOptions {
            results_to_bools: options.results_to_bools || self.config.convert_results_to_bools,
            ..*options
        };
        extract_aligned_series(
            &current.timeline,
            self.compiler.variables(),
            &mut self.functions,
            &self.filters,
            &options,
        )
    }

    /// Same-day value pairs of two references on the current timeline
    ///
    /// Either token may name any resolved variable, with offsets or a
    /// function. Ranges are searched around each time point's own day.
    pub fn synced_pairs(&self, first: &str, second: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        let first = self.pair_entry(first)?;
        let second = self.pair_entry(second)?;
        let Some(current) = self.current.as_ref() else {
            return Ok((Vec::new(), Vec::new()));
        };

        let mut first_function = first.reference.function.map(|f| f.instantiate());
        let mut second_function = second.reference.function.map(|f| f.instantiate());
        Ok(synced_pairs(
            &current.timeline,
            (&first, |v: f64, d: i32| first_function.as_mut().and_then(|f| f.compute(v, d))),
            (&second, |v: f64, d: i32| second_function.as_mut().and_then(|f| f.compute(v, d))),
            &self.filters,
        ))
    }

    fn pair_entry(&self, token: &str) -> Result<ResolvedEntry> {
        let mut reference = VariableReference::parse_unchecked(token)?;
        reference.mode = RangeMode::Nearest;
        let mut entry = self.base_entry(&reference.name)?;
        entry.reference = reference;
        Ok(entry)
    }

    /// Every present value of a resolved variable on the current timeline
    pub fn raw_values(&self, name: &str, one_per_day: bool) -> Result<Vec<DayValue>> {
        let entry = self.base_entry(name)?;
        Ok(self
            .current_timeline()
            .map(|timeline| raw_values(timeline, &entry, one_per_day))
            .unwrap_or_default())
    }

    /// Values between two days inclusive, clamped to the variable's range
    pub fn values_between_days(
        &self,
        name: &str,
        first_day: i32,
        last_day: i32,
        one_per_day: bool,
    ) -> Result<Vec<DayValue>> {
        let entry = self.base_entry(name)?;
        let descriptor = self.compiler.variables().descriptor(entry.id);
        let range = (descriptor.min, descriptor.max);
        Ok(self
            .current_timeline()
            .map(|timeline| values_between_days(timeline, &entry, range, first_day, last_day, one_per_day))
            .unwrap_or_default())
    }

    /// Points where a reference's same-day value changes
    pub fn value_changes(&self, token: &str, min_value: f64) -> Result<Vec<DayValue>> {
        let entry = self.pair_entry(token)?;
        let mut function = entry.reference.function.map(|f| f.instantiate());
        Ok(self
            .current_timeline()
            .map(|timeline| {
                value_changes(timeline, &entry, min_value, |v: f64, d: i32| {
                    function.as_mut().and_then(|f| f.compute(v, d))
                })
            })
            .unwrap_or_default())
    }

    /// Admissions of the current timeline
    #[must_use]
    pub fn admissions(&self) -> &[Admission] {
        self.current.as_ref().map_or(&[], |c| c.admissions.as_slice())
    }

    /// Release the file handle
    pub fn close(self) {
        debug!("Closed {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::variables::{DataKind, VariableDescriptor};

    const FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TDF version="0.1">
<Head>
    <Description>Reader test</Description>
    <TLLocationIndex></TLLocationIndex>
</Head>

<TimelineList>
<TL id="1" gender="M" race="W">
<D C="L" T="100:08:00">Cr=1.0,Na=140</D>
<D C="L" T="101:08:00">Cr=1.2,Na=138</D>
</TL>
<TL id="2" gender="F" race="B">
<D C="L" T="200:08:00">Cr=2.0</D>
<D C="L" T="200:09:00" broken=>Cr=3.0</D>
</TL>
<TL id="3" gender="F" race="B">
<E C="Admit" T="300:08:00" V="Med" D="Emergency"/>
<D C="L" T="300:09:00">Cr=0.9,Na=141</D>
<E C="Discharge" T="302:12:00" V=""/>
</TL>
</TimelineList>
</TDF>
"#;

    fn table() -> DescriptorTable {
        vec![
            VariableDescriptor::new("Cr", DataKind::Float, 0.5, 6.0),
            VariableDescriptor::new("Na", DataKind::Float, 115.0, 155.0),
        ]
        .into_iter()
        .collect()
    }

    fn open(text: &str, request: &VariableRequest) -> (tempfile::NamedTempFile, TdfReader) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let reader = TdfReader::open(file.path(), &table(), request, ReaderConfig::default()).unwrap();
        (file, reader)
    }

    fn subject(reader: &TdfReader) -> String {
        reader.current_timeline().unwrap().demographics.subject_id.clone()
    }

    /// Test sequential iteration skips the malformed timeline
    #[test]
    fn test_sequential_scan() {
        let (_file, mut reader) = open(FILE, &VariableRequest::new("Cr", "Na"));
        assert_eq!(reader.description("description"), Some("Reader test"));
        assert!(reader.raw_header().ends_with("<TimelineList>"));

        assert!(reader.seek_first_timeline().unwrap());
        assert_eq!(subject(&reader), "1");
        assert!(reader.current_fragment().unwrap().starts_with("<TL id=\"1\""));
        assert!(reader.seek_next_timeline().unwrap());
        assert_eq!(subject(&reader), "3");
        assert!(!reader.seek_next_timeline().unwrap());
        assert!(reader.current_timeline().is_none());
    }

    /// Test partition scans assign each timeline to the partition holding its opening marker
    #[test]
    fn test_partition_scan() {
        let (file, mut reader) = open(FILE, &VariableRequest::new("Cr", ""));
        let total = file.as_file().metadata().unwrap().len();
        let whole = reader.find_timelines_in_partition(FilePartition::new(0, total)).unwrap();
        assert_eq!(whole.len(), 3);

        for size in [16, 97, 256, total] {
            let mut pieces = Vec::new();
            for partition in split_range(total, size).unwrap() {
                pieces.extend(reader.find_timelines_in_partition(partition).unwrap());
            }
            assert_eq!(pieces, whole, "partition size {size}");
        }

        let second = FilePartition::new(whole[1].start, whole[2].start);
        assert!(reader.seek_first_timeline_in_partition(second).is_ok());
        assert!(reader.current_timeline().is_none());
        let third = FilePartition::new(whole[2].start - 1, total);
        assert!(reader.seek_first_timeline_in_partition(third).unwrap());
        assert_eq!(subject(&reader), "3");
        assert!(!reader.seek_next_timeline_in_partition(third).unwrap());
    }

    /// Test queries against the current timeline
    #[test]
    fn test_queries() {
        let (_file, mut reader) = open(FILE, &VariableRequest::new("Cr;Cr[-1:-1]", "Na"));
        reader.seek_first_timeline().unwrap();

        let found = reader.resolve_value("Cr", 1, None).unwrap();
        assert_eq!(found, Some(DayValue { day: 101, value: 1.2 }));
        let previous = reader.resolve_value("Cr[-1:-1]", 1, None).unwrap();
        assert_eq!(previous.map(|d| d.value), Some(1.0));
        assert!(reader.resolve_value("Na[-3:-1]", 1, None).is_err());

        let series = reader.extract_aligned_series(&ExtractOptions::default());
        assert_eq!(series.days, vec![101]);
        assert_eq!(series.inputs, vec![vec![1.2, 1.0]]);

        let (cr, na) = reader.synced_pairs("Cr", "Na").unwrap();
        assert_eq!(cr, vec![1.0, 1.2]);
        assert_eq!(na, vec![140.0, 138.0]);
        assert_eq!(reader.raw_values("Cr", true).unwrap().len(), 2);

        let range = reader.current_range().unwrap();
        reader.seek_next_timeline().unwrap();
        assert_eq!(reader.admissions().len(), 1);
        let timeline = reader.read_timeline_at(range).unwrap();
        assert_eq!(timeline.demographics.subject_id, "1");
        reader.close();
    }

    /// Test admissions are recorded at load and follow the current timeline
    #[test]
    fn test_admissions_follow_current_timeline() {
        let (_file, mut reader) = open(FILE, &VariableRequest::new("Cr", ""));
        assert!(reader.admissions().is_empty());
        reader.seek_first_timeline().unwrap();
        assert!(reader.admissions().is_empty());

        reader.seek_next_timeline().unwrap();
        let stays = reader.admissions();
        assert_eq!(stays.len(), 1);
        assert_eq!((stays[0].first.days, stays[0].last.days), (300, 302));
        assert_eq!(stays[0].team, "Med");
        assert_eq!(stays[0].admit_class, "Emergency");

        assert!(!reader.seek_next_timeline().unwrap());
        assert!(reader.admissions().is_empty());
    }

    /// Test a file without a timeline list is rejected
    #[test]
    fn test_bad_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<TDF><Head></Head></TDF>").unwrap();
        let result = TdfReader::open(
            file.path(),
            &table(),
            &VariableRequest::new("Cr", ""),
            ReaderConfig::default(),
        );
        assert!(matches!(result, Err(TdfError::MalformedHeader(_))));
    }
}
