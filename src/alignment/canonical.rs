//! Extraction of canonical variant records from a pairwise alignment.

use crate::sequence::GAP;
use thiserror::Error;

/// Structural class of a variant, derived from its gap pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariantKind {
    /// Residues replaced one for one.
    Substitution,
    /// Residues gained; the reference carries gaps.
    Insertion,
    /// Residues lost; the alternate carries gaps.
    Deletion,
    /// Gaps on both sides.
    Mixed,
}

impl VariantKind {
    /// Classify gapped reference/alternate content.
    pub fn of(reference: &str, alternate: &str) -> Self {
        let gap = char::from(GAP);
        match (reference.contains(gap), alternate.contains(gap)) {
            (true, true) => VariantKind::Mixed,
            (true, false) => VariantKind::Insertion,
            (false, true) => VariantKind::Deletion,
            (false, false) => VariantKind::Substitution,
        }
    }
}

/// A variant relative to the ungapped reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalVariant {
    /// 0-based offset into the ungapped reference.
    pub position: usize,
    /// Reference content including gap symbols.
    pub reference: String,
    /// Alternate content including gap symbols.
    pub alternate: String,
}

impl CanonicalVariant {
    /// Structural class of this record.
    pub fn kind(&self) -> VariantKind {
        VariantKind::of(&self.reference, &self.alternate)
    }
}

/// Errors raised while canonicalizing an alignment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanonicalError {
    /// The aligned sequences differ in length.
    #[error("aligned sequences differ in length: {reference} vs {alternate}")]
    LengthMismatch {
        /// Length of the aligned reference.
        reference: usize,
        /// Length of the aligned alternate.
        alternate: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run {
    Insertion,
    Deletion,
    Mixed,
}

#[derive(Debug, Default)]
struct Collector {
    records: Vec<CanonicalVariant>,
    run: Option<Run>,
    start: usize,
    reference: String,
    alternate: String,
}

impl Collector {
    fn flush(&mut self) {
        if self.run.take().is_some() {
            self.records.push(CanonicalVariant {
                position: self.start,
                reference: std::mem::take(&mut self.reference),
                alternate: std::mem::take(&mut self.alternate),
            });
        }
    }

    fn open(&mut self, run: Run, start: usize, anchor: Option<char>) {
        self.flush();
        self.run = Some(run);
        self.start = start;
        if let Some(base) = anchor {
            self.reference.push(base);
            self.alternate.push(base);
        }
    }

    fn push(&mut self, reference: char, alternate: char) {
        self.reference.push(reference);
        self.alternate.push(alternate);
    }
}

/// Convert an aligned `(reference, alternate)` pair into variant records.
///
/// Every mismatching column becomes its own substitution. Gap runs are
/// prefixed with the preceding reference residue and positioned at it; a run
/// before the first reference residue is left unanchored. A run switching
/// between insertion and deletion without an intervening match is merged into
/// one mixed record.
pub fn canonical_variants(
    reference: &str,
    alternate: &str,
) -> Result<Vec<CanonicalVariant>, CanonicalError> {
    if reference.len() != alternate.len() {
        return Err(CanonicalError::LengthMismatch {
            reference: reference.len(),
            alternate: alternate.len(),
        });
    }
    let gap = char::from(GAP);
    let mut collector = Collector::default();
    let mut anchor: Option<(usize, char)> = None;
    let mut offset = 0usize;

    for (r, a) in reference.chars().zip(alternate.chars()) {
        if r == gap && a == gap {
            continue;
        }
        if r == a {
            collector.flush();
        } else if r == gap {
            match collector.run {
                Some(Run::Insertion) | Some(Run::Mixed) => {}
                Some(Run::Deletion) => {
                    tracing::warn!(position = collector.start, "deletion switches to insertion, merging");
                    collector.run = Some(Run::Mixed);
                }
                None => {
                    let (start, base) = match anchor {
                        Some((position, base)) => (position, Some(base)),
                        None => (0, None),
                    };
                    collector.open(Run::Insertion, start, base);
                }
            }
            collector.push(r, a);
        } else if a == gap {
            match collector.run {
                Some(Run::Deletion) | Some(Run::Mixed) => {}
                Some(Run::Insertion) => {
                    tracing::warn!(position = collector.start, "insertion switches to deletion, merging");
                    collector.run = Some(Run::Mixed);
                }
                None => {
                    let (start, base) = match anchor {
                        Some((position, base)) => (position, Some(base)),
                        None => (offset, None),
                    };
                    collector.open(Run::Deletion, start, base);
                }
            }
            collector.push(r, a);
        } else {
            collector.flush();
            collector.records.push(CanonicalVariant {
                position: offset,
                reference: r.to_string(),
                alternate: a.to_string(),
            });
        }

        if r != gap {
            anchor = Some((offset, r));
            offset += 1;
        }
    }
    collector.flush();
    Ok(collector.records)
}
