//! Command-line driver for TDF timeline files
//!
//! `partition` splits a file and counts timelines per partition in
//! parallel, `compile` runs every timeline through the compiler and the
//! aligned-series extraction, and `generate` writes a synthetic file.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use tdf_timeline::query::predicate_variables;
use tdf_timeline::timeline::make_timestamp;
use tdf_timeline::utils::{
    ScanSummary, create_main_progress_bar, create_spinner, finish_progress_bar,
    log_scan_complete, log_scan_start,
};
use tdf_timeline::writer::{append_med_info, append_name_value};
use tdf_timeline::{
    DescriptorTable, ExtractOptions, ReaderConfig, TdfReader, TdfWriter, VariableRequest,
    create_partitions,
};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

#[derive(Debug, Parser)]
#[command(name = "tdf-timeline")]
#[command(about = "Compile and query TDF clinical timeline files")]
#[command(version)]
struct Cli {
    /// Descriptor table JSON; the bundled medicine vocabulary when omitted
    #[arg(long, global = true)]
    vocabulary: Option<PathBuf>,
    /// Reader configuration JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Split a file into byte partitions and count the timelines in each
    Partition {
        file: PathBuf,
        /// Partition size in bytes
        bytes: u64,
        /// Worker threads; one per CPU when omitted
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Compile every timeline and extract aligned series
    Compile {
        file: PathBuf,
        /// `;`-separated input references
        inputs: String,
        /// Result reference
        result: String,
        /// `;`-separated filter predicates
        #[arg(short, long, default_value = "")]
        filter: String,
    },
    /// Write a synthetic TDF file
    Generate {
        file: PathBuf,
        /// Number of subjects
        subjects: usize,
        #[arg(short, long, default_value_t = 7)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ReaderConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => ReaderConfig::default(),
    };
    let table = match &cli.vocabulary {
        Some(path) => DescriptorTable::from_json_file(path)
            .with_context(|| format!("Failed to load vocabulary {}", path.display()))?,
        None => DescriptorTable::medicine().context("Failed to load the bundled vocabulary")?,
    };

    match cli.command {
        Commands::Partition {
            file,
            bytes,
            threads,
        } => partition(&file, bytes, threads, &table, &config),
        Commands::Compile {
            file,
            inputs,
            result,
            filter,
        } => compile(&file, &inputs, &result, &filter, &table, config),
        Commands::Generate {
            file,
            subjects,
            seed,
        } => generate(&file, subjects, seed),
    }
}

fn partition(
    path: &Path,
    bytes: u64,
    threads: Option<usize>,
    table: &DescriptorTable,
    config: &ReaderConfig,
) -> Result<()> {
    let start = Instant::now();
    log_scan_start("Partitioning", path, None);
    let partitions = create_partitions(path, bytes)
        .with_context(|| format!("Failed to partition {}", path.display()))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or_else(num_cpus::get))
        .build()
        .context("Failed to build the worker pool")?;
    let pb = create_main_progress_bar(partitions.len() as u64, Some("Scanning partitions"));
    let request = VariableRequest::new("", "");

    let counts: Vec<usize> = pool.install(|| {
        partitions
            .par_iter()
            .map(|&partition| {
                log_scan_start("Scanning", path, Some(partition));
                let mut reader = TdfReader::open(path, table, &request, config.clone())?;
                let found = reader.find_timelines_in_partition(partition)?;
                reader.close();
                pb.inc(1);
                Ok(found.len())
            })
            .collect::<tdf_timeline::Result<Vec<_>>>()
    })?;
    finish_progress_bar(&pb, Some("done"));

    for (partition, count) in partitions.iter().zip(&counts) {
        println!("{}\t{}\t{count}", partition.start, partition.stop);
    }
    let summary = counts.iter().fold(ScanSummary::default(), |total, &timelines| {
        total.merge(ScanSummary {
            timelines,
            ..ScanSummary::default()
        })
    });
    log_scan_complete("scanned", path, &summary, Some(start.elapsed()));
    Ok(())
}

fn compile(
    path: &Path,
    inputs: &str,
    result: &str,
    filter: &str,
    table: &DescriptorTable,
    config: ReaderConfig,
) -> Result<()> {
    let start = Instant::now();
    log_scan_start("Compiling", path, None);
    let filter_variables = predicate_variables(filter)?.join(";");
    let request = VariableRequest::new(inputs, result).with_filter_variables(&filter_variables);
    let mut reader = TdfReader::open(path, table, &request, config)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    reader.set_filter(filter)?;

    let spinner = create_spinner(Some("Compiling timelines"));
    let options = ExtractOptions::default();
    let mut summary = ScanSummary::default();
    let mut found = reader.seek_first_timeline()?;
    while found {
        let time_points = reader.current_timeline().map_or(0, |t| t.len());
        let rows = reader.extract_aligned_series(&options).len();
        summary.add_timeline(time_points, rows);
        spinner.set_message(format!("{} timelines", summary.timelines));
        found = reader.seek_next_timeline()?;
    }
    finish_progress_bar(&spinner, None);

    log_scan_complete("compiled", path, &summary, Some(start.elapsed()));
    reader.close();
    Ok(())
}

fn generate(path: &Path, subjects: usize, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = TdfWriter::new(BufWriter::new(file));
    let properties = format!("seed={seed}");
    writer.write_header("Synthetic timelines", "tdf-timeline generate", &properties)?;

    let pb = create_main_progress_bar(subjects as u64, Some("Writing subjects"));
    for subject in 0..subjects {
        let gender = if rng.random_bool(0.5) { "M" } else { "F" };
        writer.start_timeline(&(subject + 1).to_string(), gender, "W")?;

        // Age between 20 and 90 years
        let admit_day: i32 = rng.random_range(20 * 365..90 * 365);
        let length_of_stay: i32 = rng.random_range(1..15);
        let died = rng.random_bool(0.05);
        writer.write_outcomes(if died { "T" } else { "F" }, "", "F")?;
        writer.write_event_node(
            "Admit",
            &make_timestamp(admit_day, 7, 0),
            "",
            "",
            "Med",
            "Emergency",
        )?;

        let mut creatinine: f64 = rng.random_range(0.6..1.4);
        for day in admit_day..admit_day + length_of_stay {
            let step: f64 = rng.random_range(-0.3..0.4);
            creatinine = (creatinine + step).clamp(0.5, 6.0);
            let mut labs = String::new();
            append_name_value(&mut labs, "Cr", &format!("{creatinine:.2}"));
            let sodium: u32 = rng.random_range(128..148);
            let hemoglobin: f64 = rng.random_range(7.0..15.0);
            append_name_value(&mut labs, "Na", &sodium.to_string());
            append_name_value(&mut labs, "Hgb", &format!("{hemoglobin:.1}"));
            writer.write_data_node("L", &make_timestamp(day, 6, 0), "", &labs)?;

            if rng.random_bool(0.3) {
                let mut meds = String::new();
                append_med_info(&mut meds, "VancDose", "1000", "i", "2");
                writer.write_event_node("IMed", &make_timestamp(day, 9, 0), "", "", &meds, "")?;
            }
        }

        let disposition = if died { "Expired" } else { "Home" };
        let discharged = make_timestamp(admit_day + length_of_stay, 12, 0);
        writer.write_event_node("Discharge", &discharged, "", "", disposition, "")?;
        writer.finish_timeline()?;
        pb.inc(1);
    }
    writer.write_footer()?;
    finish_progress_bar(&pb, Some("done"));

    info!("Wrote {} timelines to {}", writer.timelines(), path.display());
    Ok(())
}
