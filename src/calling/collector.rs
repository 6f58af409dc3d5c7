//! Per-sample, per-feature call collection and filtering.

use super::source::{CallRecord, CallSourceError, Genotype};
use crate::alignment::{
    canonical_variants, AlignmentParams, CanonicalError, CanonicalVariant, GlobalAligner,
};
use crate::sequence::{is_nucleotide, GAP};
use crate::storage::{Feature, Fingerprint, MusialStorage, Sample, Site};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that abort the collection of one (sample, feature) unit.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The call source failed.
    #[error(transparent)]
    Source(#[from] CallSourceError),

    /// A realigned call could not be canonicalized.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

/// Shape of a call's reference/alternate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    /// One base replaced by one base.
    Substitution,
    /// One anchor base followed by inserted bases.
    Insertion,
    /// Anchor base kept, following bases deleted.
    Deletion,
    /// Anything else; resolved by realignment.
    Complex,
}

impl CallClass {
    /// Classify ungapped call content.
    pub fn of(reference: &str, alternate: &str) -> Self {
        let anchored = reference.as_bytes().first() == alternate.as_bytes().first();
        match (reference.len(), alternate.len()) {
            (1, 1) => CallClass::Substitution,
            (1, n) if n > 1 && anchored => CallClass::Insertion,
            (n, 1) if n > 1 && anchored => CallClass::Deletion,
            _ => CallClass::Complex,
        }
    }
}

/// One resolved call of a sample, accepted or not.
#[derive(Debug, Clone, PartialEq)]
pub struct CallObservation {
    /// Contig position of the resolved variant.
    pub position: u64,
    /// Gapped reference content.
    pub reference: String,
    /// Gapped alternate content.
    pub alternate: String,
    /// Rank by decreasing frequency among the record's alternates, from 1.
    pub rank: usize,
    /// Number of alternates of the record.
    pub alternates: usize,
    /// Whether the call failed a threshold.
    pub rejected: bool,
    /// Allele frequency.
    pub frequency: f64,
    /// Call quality.
    pub quality: f64,
    /// Read depth at the site.
    pub depth: u32,
}

impl CallObservation {
    /// `rank/max:rejected:frequency:quality:depth` summary.
    pub fn summary(&self) -> String {
        format!(
            "{}/{}:{}:{:.2}:{:.2}:{}",
            self.rank, self.alternates, self.rejected, self.frequency, self.quality, self.depth
        )
    }

    /// Whether the call is the accepted top-ranked alternate.
    pub fn is_primary(&self) -> bool {
        self.rank == 1 && !self.rejected
    }
}

/// Outcome of collecting one sample at one feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCalls {
    /// Feature name.
    pub feature: String,
    /// Sample name.
    pub sample: String,
    /// Accepted primary sites in processing order.
    pub fingerprint: Fingerprint,
    /// Every resolved call, accepted or rejected.
    pub calls: Vec<CallObservation>,
    /// Number of rejected top-ranked calls.
    pub rejected: usize,
}

/// Turns a sample's call records at a feature into a fingerprint.
///
/// Owns a nucleotide aligner for complex calls; keep one per worker.
#[derive(Debug, Clone)]
pub struct SampleVariantCollector {
    aligner: GlobalAligner,
    params: AlignmentParams,
}

impl Default for SampleVariantCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleVariantCollector {
    /// Collector with nucleotide alignment defaults.
    pub fn new() -> Self {
        Self {
            aligner: GlobalAligner::nucleotide(),
            params: AlignmentParams::nucleotide(),
        }
    }

    /// Query, filter and resolve the calls of `sample` at `feature`.
    pub fn collect(
        &mut self,
        sample: &Sample,
        feature: &Feature,
        storage: &MusialStorage,
    ) -> Result<FeatureCalls, CollectError> {
        let records = sample
            .source()
            .fetch(feature.contig(), feature.start(), feature.end())?;
        let mut outcome = FeatureCalls {
            feature: feature.name().to_string(),
            sample: sample.name().to_string(),
            ..FeatureCalls::default()
        };
        let mut sites = Vec::new();
        let mut used_positions = HashSet::new();

        for record in &records {
            if !self.is_usable(record, sample, feature, storage) {
                continue;
            }
            let depth = record.total_depth();
            let quality = record.quality.unwrap_or(0.0);

            let mut ranked: Vec<(&str, f64)> = record
                .alternates
                .iter()
                .map(|alternate| {
                    let frequency = alternate.frequency.unwrap_or_else(|| match (alternate.depth, depth) {
                        (Some(support), total) if total > 0 => f64::from(support) / f64::from(total),
                        _ => 0.0,
                    });
                    (alternate.content.as_str(), frequency)
                })
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

            for (idx, (alternate, frequency)) in ranked.into_iter().enumerate() {
                let rank = idx + 1;
                let heterozygous = rank > 1;
                if !alternate.bytes().all(is_nucleotide) || alternate.is_empty() {
                    tracing::debug!(
                        sample = sample.name(),
                        position = record.position,
                        alternate,
                        "skipping symbolic allele"
                    );
                    continue;
                }
                if storage.is_variant_excluded(&record.contig, record.position, &record.reference, alternate) {
                    tracing::debug!(
                        sample = sample.name(),
                        position = record.position,
                        alternate,
                        "skipping excluded variant"
                    );
                    continue;
                }
                let rejected = storage.parameters().rejects(
                    quality,
                    f64::from(depth),
                    frequency,
                    heterozygous,
                );
                if rank == 1 && rejected {
                    outcome.rejected += 1;
                }

                for (position, reference, content) in self.resolve(record, alternate)? {
                    let observation = CallObservation {
                        position,
                        reference,
                        alternate: content,
                        rank,
                        alternates: record.alternates.len(),
                        rejected,
                        frequency,
                        quality,
                        depth,
                    };
                    if observation.is_primary() {
                        if used_positions.insert(position) {
                            sites.push(Site::new(
                                position,
                                observation.reference.clone(),
                                observation.alternate.clone(),
                            ));
                        } else {
                            tracing::warn!(
                                sample = sample.name(),
                                feature = feature.name(),
                                position,
                                alternate = %observation.alternate,
                                "second accepted call at position, dropping"
                            );
                        }
                    }
                    outcome.calls.push(observation);
                }
            }
        }

        outcome.fingerprint = Fingerprint::new(sites);
        Ok(outcome)
    }

    fn is_usable(
        &self,
        record: &CallRecord,
        sample: &Sample,
        feature: &Feature,
        storage: &MusialStorage,
    ) -> bool {
        let reason = if record.contig != feature.contig() {
            "other contig"
        } else if !feature.contains(record.position) {
            "outside feature"
        } else if storage.is_position_excluded(&record.contig, record.position) {
            "excluded position"
        } else if record.genotype == Genotype::NoCall {
            "no-call genotype"
        } else if record.genotype.is_reference_only() {
            "reference genotype"
        } else if record.alternates.is_empty() {
            "no alternate allele"
        } else if record.reference.is_empty() || !record.reference.bytes().all(is_nucleotide) {
            "unsupported reference content"
        } else {
            return true;
        };
        tracing::debug!(
            sample = sample.name(),
            contig = %record.contig,
            position = record.position,
            reason,
            "skipping call record"
        );
        false
    }

    /// Gapped `(position, reference, alternate)` triples of one alternate.
    fn resolve(
        &mut self,
        record: &CallRecord,
        alternate: &str,
    ) -> Result<Vec<(u64, String, String)>, CollectError> {
        let reference = record.reference.to_ascii_uppercase();
        let alternate = alternate.to_ascii_uppercase();
        let gap = char::from(GAP);
        let resolved = match CallClass::of(&reference, &alternate) {
            CallClass::Substitution if reference == alternate => Vec::new(),
            CallClass::Substitution => vec![(record.position, reference, alternate)],
            CallClass::Insertion => {
                let padded = format!("{}{}", reference, gap.to_string().repeat(alternate.len() - 1));
                vec![(record.position, padded, alternate)]
            }
            CallClass::Deletion => {
                let padded = format!("{}{}", alternate, gap.to_string().repeat(reference.len() - 1));
                vec![(record.position, reference, padded)]
            }
            CallClass::Complex => {
                let alignment =
                    match self
                        .aligner
                        .align(reference.as_bytes(), alternate.as_bytes(), &self.params)
                    {
                        Ok(alignment) => alignment,
                        Err(err) => {
                            tracing::warn!(
                                position = record.position,
                                reference = %reference,
                                alternate = %alternate,
                                error = %err,
                                "cannot realign complex call, dropping"
                            );
                            return Ok(Vec::new());
                        }
                    };
                let variants = merge_shared_anchors(canonical_variants(&alignment.a, &alignment.b)?);
                if variants.is_empty() {
                    tracing::warn!(
                        position = record.position,
                        reference = %reference,
                        alternate = %alternate,
                        "complex call resolves to no variant, dropping"
                    );
                }
                variants
                    .into_iter()
                    .map(|variant| {
                        (
                            record.position + variant.position as u64,
                            variant.reference,
                            variant.alternate,
                        )
                    })
                    .collect()
            }
        };
        Ok(resolved)
    }
}

/// Fold records that start at the same position into one.
///
/// A realigned call can yield a substitution of an anchor base followed by an
/// indel anchored at that same base. The indel's copy of the anchor is dropped
/// unless the preceding record is an unanchored leading insertion.
fn merge_shared_anchors(variants: Vec<CanonicalVariant>) -> Vec<CanonicalVariant> {
    let gap = char::from(GAP);
    let mut merged: Vec<CanonicalVariant> = Vec::with_capacity(variants.len());
    for variant in variants {
        match merged.last_mut() {
            Some(last) if last.position == variant.position => {
                let skip = usize::from(!last.reference.chars().all(|c| c == gap));
                last.reference.push_str(&variant.reference[skip..]);
                last.alternate.push_str(&variant.alternate[skip..]);
            }
            _ => merged.push(variant),
        }
    }
    merged
}
