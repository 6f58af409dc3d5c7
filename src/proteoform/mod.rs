//! Proteoform inference for coding features.

mod inference;

pub(crate) use inference::assign;
pub use inference::{InferenceError, ProteoformDraft, ProteoformInferencer};
