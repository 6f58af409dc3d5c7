//! # musial
//!
//! Aggregates per-sample variant calls into deduplicated, per-feature alleles
//! and, for coding features, proteoforms.
//!
//! ## Pipeline
//!
//! 1. **Collection**: each sample's calls inside a feature are filtered
//!    against [`BuildParameters`] and resolved into canonical sites
//! 2. **Registration**: the ordered sites form a fingerprint; identical
//!    fingerprints share one content-named allele per feature
//! 3. **Inference**: alleles of coding features are spliced into the
//!    reference, translated and re-aligned to yield proteoforms
//!
//! ## Usage Example
//!
//! ```ignore
//! use musial::{pipeline, BuildParameters, MusialStorage, PipelineConfig};
//!
//! let mut storage = MusialStorage::new(BuildParameters::default())?;
//! storage.add_contig("chr1", Some(sequence))?;
//! storage.add_feature(definition)?;
//! storage.add_sample("s1", Arc::new(HtslibCallSource::new("s1.vcf.gz")))?;
//! let report = pipeline::run(&storage, &PipelineConfig::default())?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod alignment; // Banded global alignment and variant canonicalization
pub mod calling; // Call sources and per-sample collection
pub mod pipeline; // Parallel build driver
pub mod proteoform; // Allele translation
pub mod sequence; // Nucleotide and amino-acid helpers
pub mod storage; // Catalog, forms and variant records

// Re-exports for convenience
pub use alignment::{
    canonical_variants, Alignment, AlignmentParams, CanonicalVariant, GlobalAligner,
    MarginalGaps, SubstitutionMatrix, VariantKind,
};
pub use calling::{
    CallRecord, FeatureCalls, HtslibCallSource, MemoryCallSource, SampleVariantCollector,
    VariantCallSource,
};
pub use pipeline::{BuildError, BuildReport, PipelineConfig};
pub use proteoform::{ProteoformDraft, ProteoformInferencer};
pub use storage::{
    BuildParameters, Feature, FeatureDefinition, Fingerprint, Form, FormName, MusialStorage,
    Sample, Site, Strand, StorageError,
};
