//! Parallel build of alleles and proteoforms over a catalog.
//!
//! A build runs in two joined phases on a dedicated `rayon` pool:
//!
//! 1. every (sample, feature) unit collects the sample's calls and registers
//!    its allele at the feature;
//! 2. every coding (feature, allele) pair touched in phase 1 either extends
//!    an already inferred proteoform to the new carriers or infers it.
//!
//! Workers keep their aligners in `map_init` state. Form names depend only on
//! content, so the outcome does not depend on scheduling or thread count.

use crate::calling::{CollectError, SampleVariantCollector};
use crate::proteoform::{assign, InferenceError, ProteoformInferencer};
use crate::storage::{Feature, FormName, MusialStorage, Sample, StorageError};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Errors that prevent a build from starting.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A requested sample is not in the catalog.
    #[error("unknown sample `{0}`")]
    UnknownSample(String),
}

#[derive(Debug, Error)]
enum UnitError {
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Execution settings of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// Worker threads; `0` lets `rayon` pick.
    pub threads: usize,
}

impl PipelineConfig {
    /// Use `threads` workers.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

/// Counters of one build run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Samples processed.
    pub samples: usize,
    /// Features processed.
    pub features: usize,
    /// (sample, feature) units that completed.
    pub units: usize,
    /// Units that failed and were skipped.
    pub failed_units: usize,
    /// Accepted primary calls.
    pub accepted_calls: usize,
    /// Rejected primary calls.
    pub rejected_calls: usize,
    /// Distinct (feature, allele) pairs assigned in this run.
    pub alleles: usize,
    /// Distinct (feature, proteoform) pairs assigned in this run.
    pub proteoforms: usize,
    /// Allele translations that failed.
    pub failed_inferences: usize,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} samples x {} features: {} units ({} failed), {} accepted / {} rejected calls, \
             {} alleles, {} proteoforms ({} failed)",
            self.samples,
            self.features,
            self.units,
            self.failed_units,
            self.accepted_calls,
            self.rejected_calls,
            self.alleles,
            self.proteoforms,
            self.failed_inferences
        )
    }
}

struct UnitOutcome {
    feature: String,
    sample: String,
    allele: FormName,
    coding: bool,
    accepted: usize,
    rejected: usize,
}

/// Build alleles and proteoforms for every sample of `storage`.
pub fn run(storage: &MusialStorage, config: &PipelineConfig) -> Result<BuildReport, BuildError> {
    let samples: Vec<&Sample> = storage.samples().collect();
    build(storage, &samples, config)
}

/// Build alleles and proteoforms for `names` only.
///
/// Forms registered by earlier runs are kept; allele and amino-acid variant
/// occurrence sets grow by the new samples.
pub fn expand(
    storage: &MusialStorage,
    names: &[&str],
    config: &PipelineConfig,
) -> Result<BuildReport, BuildError> {
    let samples = names
        .iter()
        .map(|name| {
            storage
                .sample(name)
                .ok_or_else(|| BuildError::UnknownSample(name.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    build(storage, &samples, config)
}

fn build(
    storage: &MusialStorage,
    samples: &[&Sample],
    config: &PipelineConfig,
) -> Result<BuildReport, BuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()?;
    let features: Vec<&Feature> = storage.features().collect();
    let units: Vec<(&Sample, &Feature)> = samples
        .iter()
        .flat_map(|&sample| features.iter().map(move |&feature| (sample, feature)))
        .collect();
    tracing::info!(
        samples = samples.len(),
        features = features.len(),
        units = units.len(),
        threads = pool.current_num_threads(),
        "collecting sample alleles"
    );

    let mut report = BuildReport {
        samples: samples.len(),
        features: features.len(),
        ..BuildReport::default()
    };

    let outcomes: Vec<Option<UnitOutcome>> = pool.install(|| {
        units
            .par_iter()
            .map_init(SampleVariantCollector::new, |collector, &(sample, feature)| {
                match collect_unit(collector, sample, feature, storage) {
                    Ok(outcome) => Some(outcome),
                    Err(err) => {
                        tracing::error!(
                            sample = sample.name(),
                            feature = feature.name(),
                            error = %err,
                            "sample analysis failed"
                        );
                        None
                    }
                }
            })
            .collect()
    });

    let mut alleles: BTreeSet<(String, FormName)> = BTreeSet::new();
    let mut carriers: BTreeMap<(String, FormName), BTreeSet<String>> = BTreeMap::new();
    for outcome in outcomes {
        let Some(outcome) = outcome else {
            report.failed_units += 1;
            continue;
        };
        report.units += 1;
        report.accepted_calls += outcome.accepted;
        report.rejected_calls += outcome.rejected;
        let key = (outcome.feature, outcome.allele);
        if outcome.coding {
            carriers
                .entry(key.clone())
                .or_default()
                .insert(outcome.sample);
        }
        alleles.insert(key);
    }
    report.alleles = alleles.len();

    tracing::info!(alleles = carriers.len(), "inferring proteoforms");
    let carriers: Vec<_> = carriers.into_iter().collect();
    let proteoforms: Vec<Option<(String, FormName)>> = pool.install(|| {
        carriers
            .par_iter()
            .map_init(ProteoformInferencer::new, |inferencer, ((feature, allele), samples)| {
                match resolve_proteoform(inferencer, storage, feature, allele, samples) {
                    Ok(name) => Some((feature.clone(), name)),
                    Err(err) => {
                        tracing::error!(
                            feature = %feature,
                            allele = %allele,
                            error = %err,
                            "allele analysis failed"
                        );
                        None
                    }
                }
            })
            .collect()
    });
    report.failed_inferences = proteoforms.iter().filter(|p| p.is_none()).count();
    report.proteoforms = proteoforms.into_iter().flatten().collect::<BTreeSet<_>>().len();

    tracing::info!(%report, "build finished");
    Ok(report)
}

fn collect_unit(
    collector: &mut SampleVariantCollector,
    sample: &Sample,
    feature: &Feature,
    storage: &MusialStorage,
) -> Result<UnitOutcome, UnitError> {
    let calls = collector.collect(sample, feature, storage)?;
    let allele = feature.register_allele(sample.name(), &calls)?;
    sample.set_allele(feature.name(), &allele);
    Ok(UnitOutcome {
        feature: feature.name().to_string(),
        sample: sample.name().to_string(),
        allele,
        coding: feature.is_coding(),
        accepted: calls.fingerprint.sites().len(),
        rejected: calls.rejected,
    })
}

fn resolve_proteoform(
    inferencer: &mut ProteoformInferencer,
    storage: &MusialStorage,
    feature: &str,
    allele: &str,
    samples: &BTreeSet<String>,
) -> Result<FormName, UnitError> {
    let feature = storage
        .feature(feature)
        .ok_or_else(|| StorageError::UnknownFeature(feature.to_string()))?;
    if let Some(name) = feature.propagate_proteoform(allele, samples)? {
        assign(storage, feature, samples, &name);
        return Ok(name);
    }
    Ok(inferencer.infer(feature, allele, storage)?)
}
