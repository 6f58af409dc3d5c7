//! Translation of alleles into proteoforms.

use crate::alignment::{
    canonical_variants, AlignmentError, AlignmentParams, CanonicalError, GlobalAligner,
    VariantKind,
};
use crate::sequence::{has_stop, translate, ungapped, TranslationError, GAP, STOP};
use crate::storage::{Feature, Fingerprint, FormName, MusialStorage, Site, StorageError};
use std::collections::BTreeSet;
use thiserror::Error;

/// Gap opening penalty of protein alignments.
///
/// Upstream MUSIAL scores proteins with PAM120, opens gaps at the longer
/// sequence length and bands at `|m - n|`; this crate uses PAM250 with fixed
/// penalties and a wider band, so alignment scores are not comparable.
const PROTEIN_GAP_OPEN: i32 = 12;
/// Gap extension penalty of protein alignments.
const PROTEIN_GAP_EXTEND: i32 = 6;
/// Smallest band of protein alignments.
const MIN_PROTEIN_BAND: usize = 12;

/// Errors that abort the inference of one allele's proteoform.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Proteoforms are only inferred for coding features.
    #[error("feature `{0}` is not coding")]
    NotCoding(String),

    /// The allele is not registered at the feature.
    #[error("feature `{feature}` has no allele `{allele}`")]
    UnknownAllele {
        /// Feature name.
        feature: String,
        /// Allele name.
        allele: String,
    },

    /// The feature carries no reference sequence.
    #[error("feature `{0}` has no reference sequence")]
    MissingReference(String),

    /// A site's reference content disagrees with the feature sequence.
    #[error("site at {position} of `{feature}` expects `{expected}` but the reference reads `{found}`")]
    ReferenceMismatch {
        /// Feature name.
        feature: String,
        /// Contig position of the site.
        position: u64,
        /// Ungapped reference content of the site.
        expected: String,
        /// Reference sequence at the site, empty when out of range.
        found: String,
    },

    /// The spliced sequence could not be translated.
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// The protein alignment failed.
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    /// The protein alignment could not be canonicalized.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    /// Registering the proteoform failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Amino-acid content of an allele, ready for registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProteoformDraft {
    /// Amino-acid sites at 1-based protein positions.
    pub fingerprint: Fingerprint,
    /// 1-based positions of premature stops in the translation.
    pub novel_stops: Vec<usize>,
    /// Effect terms.
    pub effects: Vec<String>,
}

/// Derives proteoforms by re-translating alleles.
///
/// Owns a PAM250 aligner; keep one per worker.
#[derive(Debug, Clone)]
pub struct ProteoformInferencer {
    aligner: GlobalAligner,
}

impl Default for ProteoformInferencer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProteoformInferencer {
    /// Inferencer with a PAM250 protein aligner.
    pub fn new() -> Self {
        Self {
            aligner: GlobalAligner::protein(),
        }
    }

    /// Infer, register and assign the proteoform of `allele` at `feature`.
    ///
    /// The proteoform lists `allele` as occurrence; every sample carrying the
    /// allele is recorded as carrying the proteoform.
    pub fn infer(
        &mut self,
        feature: &Feature,
        allele: &str,
        storage: &MusialStorage,
    ) -> Result<FormName, InferenceError> {
        if !feature.is_coding() {
            return Err(InferenceError::NotCoding(feature.name().to_string()));
        }
        let (fingerprint, samples) = {
            let state = feature.state();
            let form = state
                .allele(allele)
                .ok_or_else(|| InferenceError::UnknownAllele {
                    feature: feature.name().to_string(),
                    allele: allele.to_string(),
                })?;
            (form.fingerprint.clone(), form.occurrence.clone())
        };

        let draft = self.draft(feature, &fingerprint)?;
        let proteoform = feature.register_proteoform(allele, &draft, &samples)?;
        assign(storage, feature, &samples, &proteoform);
        tracing::debug!(
            feature = feature.name(),
            allele,
            proteoform = %proteoform,
            sites = draft.fingerprint.sites().len(),
            "proteoform inferred"
        );
        Ok(proteoform)
    }

    /// Amino-acid sites, novel stops and effects of an allele fingerprint.
    pub fn draft(
        &mut self,
        feature: &Feature,
        fingerprint: &Fingerprint,
    ) -> Result<ProteoformDraft, InferenceError> {
        let Some(reference_protein) = feature.protein() else {
            return Err(InferenceError::NotCoding(feature.name().to_string()));
        };
        if fingerprint.is_empty() {
            return Ok(ProteoformDraft::default());
        }
        let reference = feature
            .reference()
            .ok_or_else(|| InferenceError::MissingReference(feature.name().to_string()))?;

        let spliced = splice(feature, reference, fingerprint)?;
        let protein = translate(spliced.as_bytes(), feature.strand().is_reverse())?;
        if protein == reference_protein {
            return Ok(ProteoformDraft::default());
        }

        let params = AlignmentParams::protein(PROTEIN_GAP_OPEN, PROTEIN_GAP_EXTEND)
            .with_band(band(fingerprint, reference_protein.len(), protein.len()));
        let alignment = self
            .aligner
            .align(reference_protein.as_bytes(), protein.as_bytes(), &params)?;
        let sites: Vec<Site> = canonical_variants(&alignment.a, &alignment.b)?
            .into_iter()
            .map(|variant| Site::new(variant.position as u64 + 1, variant.reference, variant.alternate))
            .collect();
        let novel_stops = novel_stops(&alignment.a, &alignment.b);
        let fingerprint_change = fingerprint.length_change();

        let mut effects = Vec::new();
        if fingerprint_change % 3 != 0 {
            effects.push("frameshift_sequence_variation");
        }
        if sites.iter().any(|site| site.kind() == VariantKind::Insertion) {
            effects.push("amino_acid_insertion");
        }
        if sites.iter().any(|site| site.kind() == VariantKind::Deletion) {
            effects.push("amino_acid_deletion");
        }
        if reference_protein.starts_with('M') && !protein.starts_with('M') {
            effects.push("start_lost");
        }
        if sites
            .iter()
            .any(|site| has_stop(&site.alternate) && !has_stop(&site.reference))
        {
            effects.push("stop_gained");
        }

        Ok(ProteoformDraft {
            fingerprint: Fingerprint::new(sites),
            novel_stops,
            effects: effects.into_iter().map(str::to_string).collect(),
        })
    }
}

/// Record `proteoform` on every sample in `samples`.
pub(crate) fn assign(
    storage: &MusialStorage,
    feature: &Feature,
    samples: &BTreeSet<String>,
    proteoform: &str,
) {
    for name in samples {
        match storage.sample(name) {
            Some(sample) => sample.set_proteoform(feature.name(), proteoform),
            None => tracing::warn!(sample = %name, feature = feature.name(), "allele carrier is not a known sample"),
        }
    }
}

/// Apply the sites of `fingerprint` to the forward reference of `feature`.
///
/// Sites are applied in ascending position order; a site overlapping an
/// already applied one is skipped.
fn splice(feature: &Feature, reference: &str, fingerprint: &Fingerprint) -> Result<String, InferenceError> {
    let mut sites: Vec<&Site> = fingerprint.sites().iter().collect();
    sites.sort_by_key(|site| site.position);

    let mut spliced = String::with_capacity(reference.len());
    let mut cursor = 0usize;
    for site in sites {
        let expected = ungapped(&site.reference);
        let offset = site.position.saturating_sub(feature.start()) as usize;
        let found = site
            .position
            .checked_sub(feature.start())
            .and_then(|_| reference.get(offset..offset + expected.len()));
        if found != Some(expected.as_str()) {
            return Err(InferenceError::ReferenceMismatch {
                feature: feature.name().to_string(),
                position: site.position,
                expected,
                found: found.unwrap_or_default().to_string(),
            });
        }
        if offset < cursor {
            tracing::warn!(
                feature = feature.name(),
                position = site.position,
                alternate = %site.alternate,
                "site overlaps a preceding site, skipping"
            );
            continue;
        }
        spliced.push_str(&reference[cursor..offset]);
        spliced.push_str(&ungapped(&site.alternate));
        cursor = offset + expected.len();
    }
    spliced.push_str(&reference[cursor..]);
    Ok(spliced)
}

/// Band wide enough for the longest gap run of `fingerprint` in codons.
fn band(fingerprint: &Fingerprint, reference_len: usize, alternate_len: usize) -> usize {
    let gaps = |content: &str| content.bytes().filter(|&b| b == GAP).count();
    let longest_indel = fingerprint
        .sites()
        .iter()
        .map(|site| gaps(&site.reference).max(gaps(&site.alternate)))
        .max()
        .unwrap_or(0);
    MIN_PROTEIN_BAND
        .max(longest_indel.div_ceil(3))
        .max(reference_len.abs_diff(alternate_len))
}

/// 1-based positions of stops in `alternate` that the reference does not
/// carry, excluding the final column.
fn novel_stops(reference: &str, alternate: &str) -> Vec<usize> {
    let columns = reference.len().min(alternate.len());
    let mut stops = Vec::new();
    let mut residue = 0usize;
    for (column, (r, a)) in reference.bytes().zip(alternate.bytes()).enumerate() {
        if a == GAP {
            continue;
        }
        residue += 1;
        if a == STOP && r != STOP && column + 1 < columns {
            stops.push(residue);
        }
    }
    stops
}
