//! In-memory catalog of contigs, features and samples.
//!
//! [`MusialStorage`] is built once from the reference and the sample list.
//! Variant records and forms are created lazily inside each [`Feature`] and
//! are never removed, so repeated builds over new samples only extend them.

mod feature;
mod form;
mod params;
mod sample;
mod variant;

pub use feature::{
    Feature, FeatureKind, FeatureState, Strand, EFFECTS_ANNOTATION, LENGTH_VARIATION_ANNOTATION,
    NOVEL_STOPS_ANNOTATION, PROTEOFORM_ANNOTATION,
};
pub use form::{
    compress_fingerprint, decompress_fingerprint, Fingerprint, Form, FormKind, FormName, Site,
    LABEL_ANNOTATION, REFERENCE_FORM, VARIANTS_ANNOTATION,
};
pub use params::{BuildParameters, ConfigError};
pub use sample::{Sample, SAMPLE_PROTEOFORM_PREFIX};
pub use variant::{VariantInformation, VariantTable, SAMPLE_CALL_PREFIX};

use crate::calling::VariantCallSource;
use crate::sequence::{translate, TranslationError};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building or querying the catalog.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A contig with this name already exists.
    #[error("duplicate contig `{0}`")]
    DuplicateContig(String),

    /// A feature with this name already exists.
    #[error("duplicate feature `{0}`")]
    DuplicateFeature(String),

    /// A sample with this name already exists.
    #[error("duplicate sample `{0}`")]
    DuplicateSample(String),

    /// No contig with this name.
    #[error("unknown contig `{0}`")]
    UnknownContig(String),

    /// No feature with this name.
    #[error("unknown feature `{0}`")]
    UnknownFeature(String),

    /// No form with this name at the feature.
    #[error("unknown form `{0}`")]
    UnknownForm(String),

    /// No variant record for the position and alternate content.
    #[error("feature `{feature}` has no variant {alternate} at {position}")]
    UnknownVariant {
        /// Feature name.
        feature: String,
        /// Variant position.
        position: u64,
        /// Alternate content.
        alternate: String,
    },

    /// Feature coordinates are not a 1-based inclusive interval.
    #[error("feature `{feature}` has invalid range [{start}, {end}]")]
    InvalidRange {
        /// Feature name.
        feature: String,
        /// Start coordinate.
        start: u64,
        /// End coordinate.
        end: u64,
    },

    /// Feature extends past the end of its contig.
    #[error("feature `{feature}` ends at {end} beyond contig length {length}")]
    BeyondContig {
        /// Feature name.
        feature: String,
        /// End coordinate.
        end: u64,
        /// Contig length.
        length: u64,
    },

    /// A coding feature lies on a contig without sequence.
    #[error("coding feature `{feature}` requires the sequence of contig `{contig}`")]
    MissingSequence {
        /// Feature name.
        feature: String,
        /// Contig name.
        contig: String,
    },

    /// Proteoform operation on a non-coding feature.
    #[error("feature `{0}` is not coding")]
    NotCoding(String),

    /// Unparseable strand symbol.
    #[error("invalid strand `{0}`, expected `+` or `-`")]
    InvalidStrand(String),

    /// A stored annotation could not be decoded.
    #[error("corrupt annotation: {0}")]
    CorruptAnnotation(String),

    /// Reference translation failed.
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// Invalid build parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Compression I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A reference sequence and the features placed on it.
#[derive(Debug, Clone)]
pub struct Contig {
    name: String,
    sequence: Option<String>,
    features: BTreeSet<String>,
}

impl Contig {
    /// Contig name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Materialized sequence, if loaded.
    pub fn sequence(&self) -> Option<&str> {
        self.sequence.as_deref()
    }

    /// Names of features on this contig.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(String::as_str)
    }
}

/// Input description of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureDefinition {
    /// Unique feature name.
    pub name: String,
    /// Contig name.
    pub contig: String,
    /// 1-based inclusive start.
    pub start: u64,
    /// 1-based inclusive end.
    pub end: u64,
    /// Reading strand.
    pub strand: Strand,
    /// Whether proteoforms are inferred.
    pub coding: bool,
}

/// The catalog every build reads from and writes into.
#[derive(Debug)]
pub struct MusialStorage {
    parameters: BuildParameters,
    contigs: BTreeMap<String, Contig>,
    features: BTreeMap<String, Feature>,
    samples: BTreeMap<String, Sample>,
    excluded_positions: HashMap<String, HashSet<u64>>,
    excluded_variants: HashMap<String, HashSet<(u64, String, String)>>,
}

impl MusialStorage {
    /// Empty catalog with validated `parameters`.
    pub fn new(parameters: BuildParameters) -> Result<Self, ConfigError> {
        parameters.validate()?;
        Ok(Self {
            parameters,
            contigs: BTreeMap::new(),
            features: BTreeMap::new(),
            samples: BTreeMap::new(),
            excluded_positions: HashMap::new(),
            excluded_variants: HashMap::new(),
        })
    }

    /// Call filtering thresholds.
    pub fn parameters(&self) -> &BuildParameters {
        &self.parameters
    }

    /// Register a contig, optionally with its sequence.
    pub fn add_contig(&mut self, name: &str, sequence: Option<String>) -> Result<(), StorageError> {
        if self.contigs.contains_key(name) {
            return Err(StorageError::DuplicateContig(name.to_string()));
        }
        let contig = Contig {
            name: name.to_string(),
            sequence: sequence.map(|s| s.to_ascii_uppercase()),
            features: BTreeSet::new(),
        };
        self.contigs.insert(name.to_string(), contig);
        Ok(())
    }

    /// Register a feature on a known contig.
    ///
    /// Coding features are translated once here; the translation is cached
    /// on the feature.
    pub fn add_feature(&mut self, definition: FeatureDefinition) -> Result<(), StorageError> {
        let FeatureDefinition {
            name,
            contig,
            start,
            end,
            strand,
            coding,
        } = definition;
        if self.features.contains_key(&name) {
            return Err(StorageError::DuplicateFeature(name));
        }
        let Some(entry) = self.contigs.get_mut(&contig) else {
            return Err(StorageError::UnknownContig(contig));
        };
        if start == 0 || start > end {
            return Err(StorageError::InvalidRange {
                feature: name,
                start,
                end,
            });
        }
        let reference = match entry.sequence.as_deref() {
            Some(sequence) => {
                let length = sequence.len() as u64;
                if end > length {
                    return Err(StorageError::BeyondContig {
                        feature: name,
                        end,
                        length,
                    });
                }
                Some(sequence[(start - 1) as usize..end as usize].to_string())
            }
            None => None,
        };
        let kind = if coding {
            let Some(reference) = reference.as_deref() else {
                return Err(StorageError::MissingSequence {
                    feature: name,
                    contig,
                });
            };
            FeatureKind::Coding {
                protein: translate(reference.as_bytes(), strand.is_reverse())?,
            }
        } else {
            FeatureKind::NonCoding
        };
        entry.features.insert(name.clone());
        tracing::debug!(feature = %name, contig = %contig, start, end, coding, "feature added");
        self.features.insert(
            name.clone(),
            Feature::new(name, contig, start, end, strand, kind, reference),
        );
        Ok(())
    }

    /// Register a sample backed by `source`.
    pub fn add_sample(
        &mut self,
        name: &str,
        source: Arc<dyn VariantCallSource>,
    ) -> Result<(), StorageError> {
        if self.samples.contains_key(name) {
            return Err(StorageError::DuplicateSample(name.to_string()));
        }
        self.samples
            .insert(name.to_string(), Sample::new(name.to_string(), source));
        Ok(())
    }

    /// Ignore every call at `position` of `contig`.
    pub fn exclude_position(&mut self, contig: &str, position: u64) {
        self.excluded_positions
            .entry(contig.to_string())
            .or_default()
            .insert(position);
    }

    /// Ignore calls of `reference` → `alternate` at `position` of `contig`.
    ///
    /// Content is compared with the raw call record, without gaps.
    pub fn exclude_variant(&mut self, contig: &str, position: u64, reference: &str, alternate: &str) {
        self.excluded_variants
            .entry(contig.to_string())
            .or_default()
            .insert((position, reference.to_string(), alternate.to_string()));
    }

    /// Whether `position` of `contig` is excluded.
    pub fn is_position_excluded(&self, contig: &str, position: u64) -> bool {
        self.excluded_positions
            .get(contig)
            .is_some_and(|positions| positions.contains(&position))
    }

    /// Whether the variant is excluded.
    pub fn is_variant_excluded(&self, contig: &str, position: u64, reference: &str, alternate: &str) -> bool {
        self.excluded_variants.get(contig).is_some_and(|variants| {
            variants.contains(&(position, reference.to_string(), alternate.to_string()))
        })
    }

    /// Contig by name.
    pub fn contig(&self, name: &str) -> Option<&Contig> {
        self.contigs.get(name)
    }

    /// Feature by name.
    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.get(name)
    }

    /// Sample by name.
    pub fn sample(&self, name: &str) -> Option<&Sample> {
        self.samples.get(name)
    }

    /// All contigs in name order.
    pub fn contigs(&self) -> impl Iterator<Item = &Contig> {
        self.contigs.values()
    }

    /// All features in name order.
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    /// All samples in name order.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }

    /// Features of `contig` covering `position`.
    pub fn features_at(&self, contig: &str, position: u64) -> Vec<&Feature> {
        let Some(entry) = self.contigs.get(contig) else {
            return Vec::new();
        };
        entry
            .features
            .iter()
            .filter_map(|name| self.features.get(name))
            .filter(|feature| feature.contains(position))
            .collect()
    }

    /// Attach an annotation to a nucleotide variant record of `feature`.
    pub fn annotate_variant(
        &self,
        feature: &str,
        position: u64,
        alternate: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StorageError> {
        let entry = self
            .features
            .get(feature)
            .ok_or_else(|| StorageError::UnknownFeature(feature.to_string()))?;
        let mut state = entry.state();
        let record = state
            .nucleotide_variants
            .get_mut(&position)
            .and_then(|records| records.get_mut(alternate))
            .ok_or_else(|| StorageError::UnknownVariant {
                feature: feature.to_string(),
                position,
                alternate: alternate.to_string(),
            })?;
        record.annotations.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calling::MemoryCallSource;

    fn storage() -> MusialStorage {
        let mut storage = MusialStorage::new(BuildParameters::default()).unwrap();
        storage
            .add_contig("chr", Some("atgaaataaCCCCGGGG".to_string()))
            .unwrap();
        storage
    }

    fn definition(name: &str, start: u64, end: u64, coding: bool) -> FeatureDefinition {
        FeatureDefinition {
            name: name.to_string(),
            contig: "chr".to_string(),
            start,
            end,
            strand: Strand::Forward,
            coding,
        }
    }

    #[test]
    fn coding_feature_caches_translation() {
        let mut storage = storage();
        storage.add_feature(definition("gene", 1, 9, true)).unwrap();
        let feature = storage.feature("gene").unwrap();
        assert_eq!(feature.protein(), Some("MK*"));
        assert_eq!(feature.reference(), Some("ATGAAATAA"));
    }

    #[test]
    fn invalid_features_are_rejected() {
        let mut storage = storage();
        assert!(matches!(
            storage.add_feature(definition("a", 5, 2, false)),
            Err(StorageError::InvalidRange { .. })
        ));
        assert!(matches!(
            storage.add_feature(definition("b", 10, 40, false)),
            Err(StorageError::BeyondContig { .. })
        ));
        let mut unknown = definition("c", 1, 3, false);
        unknown.contig = "other".into();
        assert!(matches!(
            storage.add_feature(unknown),
            Err(StorageError::UnknownContig(_))
        ));
        storage.add_contig("bare", None).unwrap();
        let mut bare = definition("d", 1, 3, true);
        bare.contig = "bare".into();
        assert!(matches!(
            storage.add_feature(bare),
            Err(StorageError::MissingSequence { .. })
        ));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut storage = storage();
        assert!(matches!(
            storage.add_contig("chr", None),
            Err(StorageError::DuplicateContig(_))
        ));
        storage.add_feature(definition("gene", 1, 9, false)).unwrap();
        assert!(matches!(
            storage.add_feature(definition("gene", 1, 9, false)),
            Err(StorageError::DuplicateFeature(_))
        ));
        let source = Arc::new(MemoryCallSource::default());
        storage.add_sample("s1", source.clone()).unwrap();
        assert!(matches!(
            storage.add_sample("s1", source),
            Err(StorageError::DuplicateSample(_))
        ));
    }

    #[test]
    fn features_at_position() {
        let mut storage = storage();
        storage.add_feature(definition("left", 1, 9, false)).unwrap();
        storage.add_feature(definition("right", 8, 17, false)).unwrap();
        let names = |position| -> Vec<String> {
            storage
                .features_at("chr", position)
                .iter()
                .map(|f| f.name().to_string())
                .collect()
        };
        assert_eq!(names(1), vec!["left"]);
        assert_eq!(names(9), vec!["left", "right"]);
        assert_eq!(names(17), vec!["right"]);
        assert!(names(18).is_empty());
        assert!(storage.features_at("missing", 1).is_empty());
    }

    #[test]
    fn exclusions_are_per_contig() {
        let mut storage = storage();
        storage.exclude_position("chr", 4);
        storage.exclude_variant("chr", 7, "T", "C");
        assert!(storage.is_position_excluded("chr", 4));
        assert!(!storage.is_position_excluded("other", 4));
        assert!(storage.is_variant_excluded("chr", 7, "T", "C"));
        assert!(!storage.is_variant_excluded("chr", 7, "T", "G"));
    }

    #[test]
    fn annotating_unknown_variant_fails() {
        let mut storage = storage();
        storage.add_feature(definition("gene", 1, 9, false)).unwrap();
        assert!(matches!(
            storage.annotate_variant("gene", 4, "G", "effect", "missense"),
            Err(StorageError::UnknownVariant { .. })
        ));
        assert!(matches!(
            storage.annotate_variant("nope", 4, "G", "effect", "missense"),
            Err(StorageError::UnknownFeature(_))
        ));
    }

    #[test]
    fn invalid_parameters_fail_construction() {
        let params = BuildParameters::default().with_min_quality(-3.0);
        assert!(MusialStorage::new(params).is_err());
    }
}
