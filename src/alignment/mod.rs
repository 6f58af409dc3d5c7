//! Pairwise alignment and variant canonicalization.
//!
//! [`GlobalAligner`] produces gapped renditions of two sequences and
//! [`canonical_variants`] turns such a rendition into position-anchored
//! variant records.

mod canonical;
mod global;
mod matrix;

pub use canonical::{canonical_variants, CanonicalError, CanonicalVariant, VariantKind};
pub use global::{Alignment, AlignmentError, AlignmentParams, GlobalAligner, MarginalGaps, Side};
pub use matrix::SubstitutionMatrix;
