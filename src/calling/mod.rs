//! Variant call sources and per-sample call collection.
//!
//! A [`VariantCallSource`] yields raw [`CallRecord`]s for a genomic
//! interval; [`SampleVariantCollector`] filters and resolves them into the
//! fingerprint of one sample at one feature.

pub mod collector;
pub mod source;
pub mod vcf;

pub use collector::{CallClass, CallObservation, CollectError, FeatureCalls, SampleVariantCollector};
pub use source::{
    AlternateAllele, CallRecord, CallSourceError, Genotype, MemoryCallSource, VariantCallSource,
};
pub use vcf::HtslibCallSource;
