//! Samples and their per-feature form assignments.

use super::form::FormName;
use crate::calling::VariantCallSource;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Annotation key prefix naming the proteoform of a sample at a feature.
pub const SAMPLE_PROTEOFORM_PREFIX: &str = "proteoform_";

#[derive(Debug, Default)]
struct SampleState {
    alleles: BTreeMap<String, FormName>,
    annotations: BTreeMap<String, String>,
}

/// A sequenced sample backed by a variant call source.
#[derive(Debug)]
pub struct Sample {
    name: String,
    source: Arc<dyn VariantCallSource>,
    state: Mutex<SampleState>,
}

impl Sample {
    pub(crate) fn new(name: String, source: Arc<dyn VariantCallSource>) -> Self {
        Self {
            name,
            source,
            state: Mutex::new(SampleState::default()),
        }
    }

    /// Sample name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source of the sample's variant calls.
    pub fn source(&self) -> &dyn VariantCallSource {
        self.source.as_ref()
    }

    fn state(&self) -> MutexGuard<'_, SampleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the allele selected at `feature`.
    pub fn set_allele(&self, feature: &str, allele: &str) {
        self.state()
            .alleles
            .insert(feature.to_string(), allele.to_string());
    }

    /// Allele selected at `feature`.
    pub fn allele(&self, feature: &str) -> Option<FormName> {
        self.state().alleles.get(feature).cloned()
    }

    /// All selected alleles keyed by feature.
    pub fn alleles(&self) -> BTreeMap<String, FormName> {
        self.state().alleles.clone()
    }

    /// Record the proteoform of the sample at `feature`.
    pub fn set_proteoform(&self, feature: &str, proteoform: &str) {
        self.annotate(&format!("{SAMPLE_PROTEOFORM_PREFIX}{feature}"), proteoform);
    }

    /// Proteoform of the sample at `feature`.
    pub fn proteoform(&self, feature: &str) -> Option<FormName> {
        self.annotation(&format!("{SAMPLE_PROTEOFORM_PREFIX}{feature}"))
    }

    /// Set an annotation.
    pub fn annotate(&self, key: &str, value: &str) {
        self.state()
            .annotations
            .insert(key.to_string(), value.to_string());
    }

    /// Annotation value for `key`.
    pub fn annotation(&self, key: &str) -> Option<String> {
        self.state().annotations.get(key).cloned()
    }
}
