use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use musial::pipeline;
use musial::{
    BuildParameters, FeatureDefinition, HtslibCallSource, MusialStorage, PipelineConfig, Strand,
};
use rust_htslib::faidx;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "musial", about = "Aggregate sample variant calls into alleles and proteoforms")]
struct Cli {
    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build alleles and proteoforms from indexed VCF/BCF samples.
    Build {
        /// Indexed FASTA reference (`.fai` next to it).
        reference: PathBuf,
        /// Feature table: `name contig start end strand coding` per line.
        features: PathBuf,
        /// Samples as `NAME=PATH` to an indexed VCF/BCF.
        #[arg(required = true)]
        samples: Vec<String>,
        /// Excluded positions: `contig position` per line.
        #[arg(long)]
        exclude_positions: Option<PathBuf>,
        /// Excluded variants: `contig position reference alternate` per line.
        #[arg(long)]
        exclude_variants: Option<PathBuf>,
        /// Minimum read depth of a call.
        #[arg(long, default_value_t = 5.0)]
        min_coverage: f64,
        /// Minimum call quality.
        #[arg(long, default_value_t = 30.0)]
        min_quality: f64,
        /// Minimum allele frequency of homozygous calls.
        #[arg(long, default_value_t = 0.65)]
        min_hom_frequency: f64,
        /// Minimum allele frequency of heterozygous calls.
        #[arg(long, default_value_t = 0.45)]
        min_het_frequency: f64,
        /// Maximum allele frequency of heterozygous calls.
        #[arg(long, default_value_t = 0.55)]
        max_het_frequency: f64,
        /// Worker threads (0 = all cores).
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            reference,
            features,
            samples,
            exclude_positions,
            exclude_variants,
            min_coverage,
            min_quality,
            min_hom_frequency,
            min_het_frequency,
            max_het_frequency,
            threads,
        } => {
            let parameters = BuildParameters::default()
                .with_min_coverage(min_coverage)
                .with_min_quality(min_quality)
                .with_min_homozygous_frequency(min_hom_frequency)
                .with_heterozygous_window(min_het_frequency, max_het_frequency);
            let mut storage =
                MusialStorage::new(parameters).context("invalid filtering thresholds")?;
            load_reference(&mut storage, &reference)?;
            load_features(&mut storage, &features)?;
            if let Some(path) = exclude_positions {
                load_excluded_positions(&mut storage, &path)?;
            }
            if let Some(path) = exclude_variants {
                load_excluded_variants(&mut storage, &path)?;
            }
            for entry in &samples {
                let (name, path) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("sample `{entry}` is not NAME=PATH"))?;
                let source = HtslibCallSource::open(path)
                    .with_context(|| format!("failed to open calls of sample {name}"))?;
                storage.add_sample(name, Arc::new(source))?;
            }

            let report = pipeline::run(&storage, &PipelineConfig::default().with_threads(threads))
                .context("build failed")?;
            print_summary(&storage);
            println!("{report}");
        }
    }

    Ok(())
}

fn load_reference(storage: &mut MusialStorage, path: &Path) -> Result<()> {
    let reader = faidx::Reader::from_path(path)
        .with_context(|| format!("failed to open indexed reference {}", path.display()))?;
    for idx in 0..reader.n_seqs() {
        let name = reader.seq_name(idx as i32)?;
        let length = reader.fetch_seq_len(&name) as usize;
        let sequence = if length == 0 {
            String::new()
        } else {
            reader
                .fetch_seq_string(&name, 0, length - 1)
                .with_context(|| format!("failed to read contig {name}"))?
        };
        storage.add_contig(&name, Some(sequence))?;
    }
    Ok(())
}

fn load_features(storage: &mut MusialStorage, path: &Path) -> Result<()> {
    for (line_no, fields) in read_table(path)? {
        let [name, contig, start, end, strand, coding] = fields.as_slice() else {
            bail!("{}:{}: expected 6 columns", path.display(), line_no);
        };
        let coding = match coding.as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            other => bail!("{}:{}: invalid coding flag `{other}`", path.display(), line_no),
        };
        storage
            .add_feature(FeatureDefinition {
                name: name.clone(),
                contig: contig.clone(),
                start: start
                    .parse()
                    .with_context(|| format!("{}:{}: invalid start", path.display(), line_no))?,
                end: end
                    .parse()
                    .with_context(|| format!("{}:{}: invalid end", path.display(), line_no))?,
                strand: strand.parse::<Strand>()?,
                coding,
            })
            .with_context(|| format!("{}:{}: invalid feature", path.display(), line_no))?;
    }
    Ok(())
}

fn load_excluded_positions(storage: &mut MusialStorage, path: &Path) -> Result<()> {
    for (line_no, fields) in read_table(path)? {
        let [contig, position] = fields.as_slice() else {
            bail!("{}:{}: expected 2 columns", path.display(), line_no);
        };
        let position = position
            .parse()
            .with_context(|| format!("{}:{}: invalid position", path.display(), line_no))?;
        storage.exclude_position(contig, position);
    }
    Ok(())
}

fn load_excluded_variants(storage: &mut MusialStorage, path: &Path) -> Result<()> {
    for (line_no, fields) in read_table(path)? {
        let [contig, position, reference, alternate] = fields.as_slice() else {
            bail!("{}:{}: expected 4 columns", path.display(), line_no);
        };
        let position = position
            .parse()
            .with_context(|| format!("{}:{}: invalid position", path.display(), line_no))?;
        storage.exclude_variant(contig, position, reference, alternate);
    }
    Ok(())
}

/// Whitespace-separated rows with 1-based line numbers; blank and `#` lines skipped.
fn read_table(path: &Path) -> Result<Vec<(usize, Vec<String>)>> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
    );
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        rows.push((idx + 1, line.split_whitespace().map(str::to_string).collect()));
    }
    Ok(rows)
}

fn print_summary(storage: &MusialStorage) {
    for feature in storage.features() {
        let state = feature.state();
        println!(
            "{}\t{}:{}-{}({})\talleles={}\tproteoforms={}\tvariants={}",
            feature.name(),
            feature.contig(),
            feature.start(),
            feature.end(),
            feature.strand(),
            state.alleles().len(),
            state.proteoforms().len(),
            state.nucleotide_variants().values().map(|v| v.len()).sum::<usize>()
        );
    }
    for sample in storage.samples() {
        for (feature, allele) in sample.alleles() {
            let proteoform = sample.proteoform(&feature).unwrap_or_else(|| "-".to_string());
            println!("{}\t{}\t{}\t{}", sample.name(), feature, allele, proteoform);
        }
    }
}
