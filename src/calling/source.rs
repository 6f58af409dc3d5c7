//! Queryable sources of per-sample variant calls.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`VariantCallSource`].
#[derive(Debug, Error)]
pub enum CallSourceError {
    /// The backing file could not be opened or lacks an index.
    #[error("failed to open variant calls at {}", .path.display())]
    Open {
        /// Path of the call file.
        path: PathBuf,
        /// Underlying reader error.
        #[source]
        source: rust_htslib::errors::Error,
    },

    /// A region query failed.
    #[error("failed to query {contig}:{start}-{end} from {}", .path.display())]
    Query {
        /// Path of the call file.
        path: PathBuf,
        /// Queried contig.
        contig: String,
        /// 1-based inclusive start.
        start: u64,
        /// 1-based inclusive end.
        end: u64,
        /// Underlying reader error.
        #[source]
        source: rust_htslib::errors::Error,
    },

    /// A record could not be decoded.
    #[error("malformed record in {}: {message}", .path.display())]
    Malformed {
        /// Path of the call file.
        path: PathBuf,
        /// What was wrong.
        message: String,
    },
}

/// Genotype of the single sample of a call record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Genotype {
    /// The record carries no genotype.
    Unknown,
    /// Every allele of the genotype is missing.
    NoCall,
    /// Called allele indices, `0` being the reference.
    Alleles(Vec<u32>),
}

impl Genotype {
    /// Whether only the reference allele was called.
    pub fn is_reference_only(&self) -> bool {
        matches!(self, Genotype::Alleles(alleles) if alleles.iter().all(|&allele| allele == 0))
    }
}

/// Read support of one alternate allele.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternateAllele {
    /// Allele content as written in the call record.
    pub content: String,
    /// Reads supporting the allele.
    pub depth: Option<u32>,
    /// Allele frequency given by the caller, preferred over depth ratios.
    pub frequency: Option<f64>,
}

/// One call record of a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// Contig name.
    pub contig: String,
    /// 1-based position of the first reference base.
    pub position: u64,
    /// Phred-scaled call quality.
    pub quality: Option<f64>,
    /// Total read depth at the site.
    pub depth: Option<u32>,
    /// Reference allele content.
    pub reference: String,
    /// Reads supporting the reference allele.
    pub reference_depth: Option<u32>,
    /// Alternate alleles in record order.
    pub alternates: Vec<AlternateAllele>,
    /// Sample genotype.
    pub genotype: Genotype,
}

impl CallRecord {
    /// Record without alternates, quality, depth or genotype.
    pub fn new(contig: &str, position: u64, reference: &str) -> Self {
        Self {
            contig: contig.to_string(),
            position,
            quality: None,
            depth: None,
            reference: reference.to_string(),
            reference_depth: None,
            alternates: Vec::new(),
            genotype: Genotype::Unknown,
        }
    }

    /// Append an alternate allele with read support `depth`.
    pub fn with_alternate(mut self, content: &str, depth: u32) -> Self {
        self.alternates.push(AlternateAllele {
            content: content.to_string(),
            depth: Some(depth),
            frequency: None,
        });
        self
    }

    /// Append an alternate allele with a caller-supplied frequency.
    pub fn with_alternate_frequency(mut self, content: &str, frequency: f64) -> Self {
        self.alternates.push(AlternateAllele {
            content: content.to_string(),
            depth: None,
            frequency: Some(frequency),
        });
        self
    }

    /// Set the call quality.
    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Set the total read depth.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Set the reference allele read depth.
    pub fn with_reference_depth(mut self, depth: u32) -> Self {
        self.reference_depth = Some(depth);
        self
    }

    /// Set the genotype.
    pub fn with_genotype(mut self, genotype: Genotype) -> Self {
        self.genotype = genotype;
        self
    }

    /// Total depth, falling back to the sum of allele depths.
    pub fn total_depth(&self) -> u32 {
        self.depth.unwrap_or_else(|| {
            self.reference_depth.unwrap_or(0)
                + self
                    .alternates
                    .iter()
                    .filter_map(|alternate| alternate.depth)
                    .sum::<u32>()
        })
    }
}

/// Provider of call records overlapping a region.
///
/// Implementations are shared between worker threads.
pub trait VariantCallSource: Send + Sync + fmt::Debug {
    /// Records of `contig` overlapping the 1-based inclusive `[start, end]`,
    /// in source order.
    fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<Vec<CallRecord>, CallSourceError>;
}

/// Call records held in memory, e.g. for tests or pre-parsed inputs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCallSource {
    records: BTreeMap<String, Vec<CallRecord>>,
}

impl MemoryCallSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, keeping insertion order per contig.
    pub fn push(&mut self, record: CallRecord) {
        self.records
            .entry(record.contig.clone())
            .or_default()
            .push(record);
    }

    /// Builder form of [`MemoryCallSource::push`].
    pub fn with_record(mut self, record: CallRecord) -> Self {
        self.push(record);
        self
    }
}

impl FromIterator<CallRecord> for MemoryCallSource {
    fn from_iter<I: IntoIterator<Item = CallRecord>>(iter: I) -> Self {
        let mut source = Self::new();
        for record in iter {
            source.push(record);
        }
        source
    }
}

impl VariantCallSource for MemoryCallSource {
    fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<Vec<CallRecord>, CallSourceError> {
        let Some(records) = self.records.get(contig) else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .filter(|record| {
                let last = record.position + record.reference.len().max(1) as u64 - 1;
                record.position <= end && last >= start
            })
            .cloned()
            .collect())
    }
}
