//! Genomic features and their per-feature registries.
//!
//! All mutable state of a feature (variant tables and form registries) sits
//! behind one mutex, so concurrent workers registering alleles of the same
//! feature serialize on a short critical section while different features
//! proceed independently.

use super::form::{intern, Form, FormKind, FormName};
use super::variant::{observe, VariantTable, SAMPLE_CALL_PREFIX};
use super::StorageError;
use crate::calling::FeatureCalls;
use crate::proteoform::ProteoformDraft;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Allele annotation naming the proteoform an allele translates to.
pub const PROTEOFORM_ANNOTATION: &str = "proteoform";
/// Net length change of a form.
pub const LENGTH_VARIATION_ANNOTATION: &str = "length_variation";
/// Comma-separated effect terms of a form.
pub const EFFECTS_ANNOTATION: &str = "effects";
/// Comma-separated 1-based positions of premature stops in a proteoform.
pub const NOVEL_STOPS_ANNOTATION: &str = "novel_stops";

/// Strand a feature is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strand {
    /// Sense strand.
    Forward,
    /// Antisense strand; sequences are reverse complemented before translation.
    Reverse,
}

impl Strand {
    /// Whether the feature is read as reverse complement.
    pub fn is_reverse(self) -> bool {
        matches!(self, Strand::Reverse)
    }
}

impl FromStr for Strand {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" | "forward" => Ok(Strand::Forward),
            "-" | "reverse" => Ok(Strand::Reverse),
            other => Err(StorageError::InvalidStrand(other.to_string())),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strand::Forward => "+",
            Strand::Reverse => "-",
        })
    }
}

/// Coding status of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeatureKind {
    /// Only nucleotide alleles are tracked.
    NonCoding,
    /// Proteoforms are tracked as well.
    Coding {
        /// Translation of the reference sequence.
        protein: String,
    },
}

/// Mutable registries of one feature.
#[derive(Debug, Default)]
pub struct FeatureState {
    pub(crate) nucleotide_variants: VariantTable,
    pub(crate) alleles: BTreeMap<FormName, Form>,
    pub(crate) amino_acid_variants: VariantTable,
    pub(crate) proteoforms: BTreeMap<FormName, Form>,
}

impl FeatureState {
    /// Nucleotide variants keyed by contig position.
    pub fn nucleotide_variants(&self) -> &VariantTable {
        &self.nucleotide_variants
    }

    /// Amino-acid variants keyed by 1-based protein position.
    pub fn amino_acid_variants(&self) -> &VariantTable {
        &self.amino_acid_variants
    }

    /// Registered alleles.
    pub fn alleles(&self) -> &BTreeMap<FormName, Form> {
        &self.alleles
    }

    /// Registered proteoforms.
    pub fn proteoforms(&self) -> &BTreeMap<FormName, Form> {
        &self.proteoforms
    }

    /// Allele by name.
    pub fn allele(&self, name: &str) -> Option<&Form> {
        self.alleles.get(name)
    }

    /// Proteoform by name.
    pub fn proteoform(&self, name: &str) -> Option<&Form> {
        self.proteoforms.get(name)
    }
}

/// A named interval of a contig.
#[derive(Debug)]
pub struct Feature {
    name: String,
    contig: String,
    start: u64,
    end: u64,
    strand: Strand,
    kind: FeatureKind,
    reference: Option<String>,
    state: Mutex<FeatureState>,
}

impl Feature {
    pub(crate) fn new(
        name: String,
        contig: String,
        start: u64,
        end: u64,
        strand: Strand,
        kind: FeatureKind,
        reference: Option<String>,
    ) -> Self {
        Self {
            name,
            contig,
            start,
            end,
            strand,
            kind,
            reference,
            state: Mutex::new(FeatureState::default()),
        }
    }

    /// Feature name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Contig the feature lies on.
    pub fn contig(&self) -> &str {
        &self.contig
    }

    /// 1-based inclusive start.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// 1-based inclusive end.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Reading strand.
    pub fn strand(&self) -> Strand {
        self.strand
    }

    /// Coding status.
    pub fn kind(&self) -> &FeatureKind {
        &self.kind
    }

    /// Whether proteoforms are tracked.
    pub fn is_coding(&self) -> bool {
        matches!(self.kind, FeatureKind::Coding { .. })
    }

    /// Cached reference translation of a coding feature.
    pub fn protein(&self) -> Option<&str> {
        match &self.kind {
            FeatureKind::Coding { protein } => Some(protein),
            FeatureKind::NonCoding => None,
        }
    }

    /// Forward-strand reference sequence, when the contig sequence is known.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Whether `position` lies within `[start, end]`.
    pub fn contains(&self, position: u64) -> bool {
        (self.start..=self.end).contains(&position)
    }

    /// Lock the feature's registries.
    pub fn state(&self) -> MutexGuard<'_, FeatureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the calls of `sample` and resolve its allele.
    ///
    /// Every call is noted on its variant record as `of_sample_<sample>`;
    /// accepted primary sites also gain `sample` as occurrence. The allele is
    /// created on first sight and `sample` is added to its occurrence set.
    pub fn register_allele(&self, sample: &str, calls: &FeatureCalls) -> Result<FormName, StorageError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let key = format!("{SAMPLE_CALL_PREFIX}{sample}");
        for call in &calls.calls {
            if let Some(record) = observe(
                &mut state.nucleotide_variants,
                call.position,
                &call.reference,
                &call.alternate,
            ) {
                record.annotations.insert(key.clone(), call.summary());
            }
        }
        for site in calls.fingerprint.sites() {
            if let Some(record) = observe(
                &mut state.nucleotide_variants,
                site.position,
                &site.reference,
                &site.alternate,
            ) {
                record.occurrence.insert(sample.to_string());
            }
        }

        let (allele, created) = intern(&mut state.alleles, FormKind::Allele, &calls.fingerprint)?;
        allele.occurrence.insert(sample.to_string());
        if created && !allele.is_reference() {
            let change = calls.fingerprint.length_change();
            allele
                .annotations
                .insert(LENGTH_VARIATION_ANNOTATION.to_string(), change.to_string());
            if self.is_coding() && change % 3 != 0 {
                allele
                    .annotations
                    .insert(EFFECTS_ANNOTATION.to_string(), "frameshift".to_string());
            }
        }
        Ok(allele.name.clone())
    }

    /// Register the proteoform `allele` translates to.
    ///
    /// Amino-acid records gain every name in `samples` as occurrence, the
    /// proteoform gains `allele`, and the allele is annotated with the
    /// proteoform name.
    pub fn register_proteoform(
        &self,
        allele: &str,
        draft: &ProteoformDraft,
        samples: &BTreeSet<String>,
    ) -> Result<FormName, StorageError> {
        if !self.is_coding() {
            return Err(StorageError::NotCoding(self.name.clone()));
        }
        let mut guard = self.state();
        let state = &mut *guard;
        if !state.alleles.contains_key(allele) {
            return Err(StorageError::UnknownForm(allele.to_string()));
        }
        for site in draft.fingerprint.sites() {
            if let Some(record) = observe(
                &mut state.amino_acid_variants,
                site.position,
                &site.reference,
                &site.alternate,
            ) {
                record.occurrence.extend(samples.iter().cloned());
            }
        }

        let (proteoform, created) =
            intern(&mut state.proteoforms, FormKind::Proteoform, &draft.fingerprint)?;
        proteoform.occurrence.insert(allele.to_string());
        if created && !proteoform.is_reference() {
            let annotations = &mut proteoform.annotations;
            annotations.insert(
                LENGTH_VARIATION_ANNOTATION.to_string(),
                draft.fingerprint.length_change().to_string(),
            );
            if !draft.novel_stops.is_empty() {
                let stops: Vec<String> = draft.novel_stops.iter().map(usize::to_string).collect();
                annotations.insert(NOVEL_STOPS_ANNOTATION.to_string(), stops.join(","));
            }
            if !draft.effects.is_empty() {
                annotations.insert(EFFECTS_ANNOTATION.to_string(), draft.effects.join(","));
            }
        }
        let name = proteoform.name.clone();
        if let Some(form) = state.alleles.get_mut(allele) {
            form.annotations
                .insert(PROTEOFORM_ANNOTATION.to_string(), name.clone());
        }
        Ok(name)
    }

    /// Extend the amino-acid records of the proteoform already inferred for
    /// `allele` to `samples`.
    ///
    /// Returns `None` when the allele has no proteoform yet.
    pub fn propagate_proteoform(
        &self,
        allele: &str,
        samples: &BTreeSet<String>,
    ) -> Result<Option<FormName>, StorageError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let Some(name) = state
            .alleles
            .get(allele)
            .and_then(|form| form.annotation(PROTEOFORM_ANNOTATION))
            .map(str::to_string)
        else {
            return Ok(None);
        };
        let proteoform = state
            .proteoforms
            .get(&name)
            .ok_or_else(|| StorageError::UnknownForm(name.clone()))?;
        for site in proteoform.fingerprint.sites() {
            if let Some(record) = state
                .amino_acid_variants
                .get_mut(&site.position)
                .and_then(|records| records.get_mut(&site.alternate))
            {
                record.occurrence.extend(samples.iter().cloned());
            }
        }
        Ok(Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calling::CallObservation;
    use crate::storage::{Fingerprint, Site, REFERENCE_FORM};

    fn coding_feature() -> Feature {
        Feature::new(
            "gene".into(),
            "chr".into(),
            1,
            9,
            Strand::Forward,
            FeatureKind::Coding {
                protein: "MK*".into(),
            },
            Some("ATGAAATAA".into()),
        )
    }

    fn calls(sites: Vec<Site>) -> FeatureCalls {
        let observations = sites
            .iter()
            .map(|site| CallObservation {
                position: site.position,
                reference: site.reference.clone(),
                alternate: site.alternate.clone(),
                rank: 1,
                alternates: 1,
                rejected: false,
                frequency: 1.0,
                quality: 60.0,
                depth: 20,
            })
            .collect();
        FeatureCalls {
            feature: "gene".into(),
            sample: "s".into(),
            fingerprint: Fingerprint::new(sites),
            calls: observations,
            rejected: 0,
        }
    }

    #[test]
    fn strand_parses_symbols() {
        assert_eq!("+".parse::<Strand>().unwrap(), Strand::Forward);
        assert_eq!("-".parse::<Strand>().unwrap(), Strand::Reverse);
        assert!("x".parse::<Strand>().is_err());
    }

    #[test]
    fn samples_without_sites_share_reference_allele() {
        let feature = coding_feature();
        let empty = calls(vec![]);
        assert_eq!(feature.register_allele("s1", &empty).unwrap(), REFERENCE_FORM);
        assert_eq!(feature.register_allele("s2", &empty).unwrap(), REFERENCE_FORM);
        let state = feature.state();
        let reference = state.allele(REFERENCE_FORM).unwrap();
        assert_eq!(reference.occurrence.len(), 2);
    }

    #[test]
    fn allele_registration_records_variants_and_frameshift() {
        let feature = coding_feature();
        let name = feature
            .register_allele("s1", &calls(vec![Site::new(4, "AA", "A-")]))
            .unwrap();
        let state = feature.state();
        let allele = state.allele(&name).unwrap();
        assert_eq!(allele.annotation(LENGTH_VARIATION_ANNOTATION), Some("-1"));
        assert_eq!(allele.annotation(EFFECTS_ANNOTATION), Some("frameshift"));
        let record = &state.nucleotide_variants()[&4]["A-"];
        assert!(record.occurrence.contains("s1"));
        assert_eq!(record.sample_call("s1"), Some("1/1:false:1.00:60.00:20"));
    }

    #[test]
    fn proteoform_registration_annotates_allele() {
        let feature = coding_feature();
        let allele = feature
            .register_allele("s1", &calls(vec![Site::new(4, "A", "G")]))
            .unwrap();
        let draft = ProteoformDraft {
            fingerprint: Fingerprint::new(vec![Site::new(2, "K", "E")]),
            novel_stops: vec![],
            effects: vec![],
        };
        let samples: BTreeSet<String> = ["s1".to_string()].into();
        let proteoform = feature.register_proteoform(&allele, &draft, &samples).unwrap();

        let more: BTreeSet<String> = ["s2".to_string()].into();
        let propagated = feature.propagate_proteoform(&allele, &more).unwrap();
        assert_eq!(propagated.as_deref(), Some(proteoform.as_str()));

        let state = feature.state();
        assert_eq!(
            state.allele(&allele).unwrap().annotation(PROTEOFORM_ANNOTATION),
            Some(proteoform.as_str())
        );
        let occurrence = &state.proteoform(&proteoform).unwrap().occurrence;
        assert_eq!(occurrence.iter().collect::<Vec<_>>(), vec![&allele]);
        assert_eq!(state.amino_acid_variants()[&2]["E"].occurrence.len(), 2);
    }

    #[test]
    fn proteoform_occurrence_lists_alleles() {
        let feature = coding_feature();
        let first = feature
            .register_allele("s1", &calls(vec![Site::new(4, "A", "G")]))
            .unwrap();
        let second = feature
            .register_allele("s2", &calls(vec![Site::new(4, "A", "G"), Site::new(6, "A", "G")]))
            .unwrap();
        let draft = ProteoformDraft {
            fingerprint: Fingerprint::new(vec![Site::new(2, "K", "E")]),
            ..ProteoformDraft::default()
        };
        let s1: BTreeSet<String> = ["s1".to_string()].into();
        let s2: BTreeSet<String> = ["s2".to_string()].into();
        let a = feature.register_proteoform(&first, &draft, &s1).unwrap();
        let b = feature.register_proteoform(&second, &draft, &s2).unwrap();
        assert_eq!(a, b);

        let state = feature.state();
        let occurrence = &state.proteoform(&a).unwrap().occurrence;
        assert_eq!(occurrence.len(), 2);
        assert!(occurrence.contains(&first) && occurrence.contains(&second));
        assert!(!occurrence.contains("s1"));
        let record = &state.amino_acid_variants()[&2]["E"];
        assert!(record.occurrence.contains("s1") && record.occurrence.contains("s2"));
    }

    #[test]
    fn proteoform_for_unknown_allele_is_an_error() {
        let feature = coding_feature();
        let draft = ProteoformDraft::default();
        let err = feature
            .register_proteoform("missing", &draft, &BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownForm(_)));
    }
}
