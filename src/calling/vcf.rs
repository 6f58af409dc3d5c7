//! Indexed VCF/BCF call source backed by htslib.

use super::source::{AlternateAllele, CallRecord, CallSourceError, Genotype, VariantCallSource};
use rust_htslib::bcf::{self, Read};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Per-sample indexed VCF/BCF file.
///
/// The reader is opened on first use and kept for later queries. Queries of
/// one source are serialized.
pub struct HtslibCallSource {
    path: PathBuf,
    reader: Mutex<Option<bcf::IndexedReader>>,
}

impl HtslibCallSource {
    /// Source reading `path`; the file needs a `.csi`/`.tbi` index.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reader: Mutex::new(None),
        }
    }

    /// Open the reader eagerly to surface missing files or indices.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CallSourceError> {
        let source = Self::new(path);
        let reader = bcf::IndexedReader::from_path(&source.path).map_err(|source_err| {
            CallSourceError::Open {
                path: source.path.clone(),
                source: source_err,
            }
        })?;
        *source.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(reader);
        Ok(source)
    }

    /// Path of the call file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn convert(&self, contig: &str, record: &bcf::Record) -> Result<CallRecord, CallSourceError> {
        let alleles = record.alleles();
        let Some((reference, alternates)) = alleles.split_first() else {
            return Err(CallSourceError::Malformed {
                path: self.path.clone(),
                message: format!("record at {}:{} has no alleles", contig, record.pos() + 1),
            });
        };

        let quality = record.qual();
        let quality = (!quality.is_nan()).then_some(f64::from(quality));
        let depth = record
            .info(b"DP")
            .integer()
            .ok()
            .flatten()
            .and_then(|values| values.first().copied())
            .and_then(present)
            .or_else(|| {
                record
                    .format(b"DP")
                    .integer()
                    .ok()
                    .and_then(|values| values.first().and_then(|sample| sample.first().copied()))
                    .and_then(present)
            });
        let allele_depths: Vec<Option<u32>> = record
            .format(b"AD")
            .integer()
            .ok()
            .and_then(|values| values.first().map(|sample| sample.iter().map(|&v| present(v)).collect()))
            .unwrap_or_default();
        let allele_frequencies: Vec<Option<f64>> = record
            .format(b"AF")
            .float()
            .ok()
            .and_then(|values| {
                values.first().map(|sample| {
                    sample
                        .iter()
                        .map(|&v| (!v.is_nan()).then_some(f64::from(v)))
                        .collect()
                })
            })
            .unwrap_or_default();

        let genotype = match record.genotypes() {
            Ok(genotypes) => {
                let called: Vec<u32> = genotypes
                    .get(0)
                    .iter()
                    .filter_map(|allele| allele.index())
                    .collect();
                if called.is_empty() {
                    Genotype::NoCall
                } else {
                    Genotype::Alleles(called)
                }
            }
            Err(_) => Genotype::Unknown,
        };

        Ok(CallRecord {
            contig: contig.to_string(),
            position: (record.pos() + 1) as u64,
            quality,
            depth,
            reference: String::from_utf8_lossy(reference).into_owned(),
            reference_depth: allele_depths.first().copied().flatten(),
            alternates: alternates
                .iter()
                .enumerate()
                .map(|(idx, content)| AlternateAllele {
                    content: String::from_utf8_lossy(content).into_owned(),
                    depth: allele_depths.get(idx + 1).copied().flatten(),
                    frequency: allele_frequencies.get(idx).copied().flatten(),
                })
                .collect(),
            genotype,
        })
    }
}

impl fmt::Debug for HtslibCallSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtslibCallSource")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// htslib encodes missing integers and vector padding as the two smallest i32.
fn present(value: i32) -> Option<u32> {
    u32::try_from(value).ok()
}

impl VariantCallSource for HtslibCallSource {
    fn fetch(&self, contig: &str, start: u64, end: u64) -> Result<Vec<CallRecord>, CallSourceError> {
        let mut guard = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            let reader = bcf::IndexedReader::from_path(&self.path).map_err(|source| {
                CallSourceError::Open {
                    path: self.path.clone(),
                    source,
                }
            })?;
            *guard = Some(reader);
        }
        let Some(reader) = guard.as_mut() else {
            return Ok(Vec::new());
        };

        let Ok(rid) = reader.header().name2rid(contig.as_bytes()) else {
            tracing::debug!(path = %self.path.display(), contig, "contig absent from call file");
            return Ok(Vec::new());
        };
        reader
            .fetch(rid, start.saturating_sub(1), Some(end.saturating_sub(1)))
            .map_err(|source| CallSourceError::Query {
                path: self.path.clone(),
                contig: contig.to_string(),
                start,
                end,
                source,
            })?;

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|err| CallSourceError::Malformed {
                path: self.path.clone(),
                message: err.to_string(),
            })?;
            records.push(self.convert(contig, &record)?);
        }
        Ok(records)
    }
}
