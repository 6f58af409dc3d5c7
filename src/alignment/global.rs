//! Banded, gap-affine global alignment.
//!
//! Three score layers are kept per cell: `M` (the pair ends in a match or
//! mismatch), `D` (a deletion: a residue of `a` against a gap) and `I` (an
//! insertion: a residue of `b` against a gap). Cells are stored band-major so a
//! band of width `w` only costs `O(m·w)` memory and time.

use super::SubstitutionMatrix;
use crate::sequence::GAP;
use thiserror::Error;

/// Score of cells that no path can reach.
const UNREACHABLE: i32 = i32::MIN / 4;

/// Score of a forbidden marginal gap. Lower than any real alignment but still
/// above [`UNREACHABLE`] so a forced path (e.g. against an empty sequence)
/// survives.
const FORBIDDEN: i32 = i32::MIN / 8;

/// Treatment of gaps at the leading edge of one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MarginalGaps {
    /// Leading gaps cost nothing.
    Free,
    /// Leading gaps are scored like any other gap.
    Penalize,
    /// Leading gaps are only taken when no other path exists.
    Forbid,
}

impl MarginalGaps {
    fn cost(self, gap_open: i32, gap_extend: i32, length: usize) -> i32 {
        match self {
            MarginalGaps::Free => 0,
            MarginalGaps::Penalize => -(gap_open + (length as i32 - 1) * gap_extend),
            MarginalGaps::Forbid => FORBIDDEN,
        }
    }
}

/// Parameters of a single alignment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlignmentParams {
    /// Penalty for the first position of a gap.
    pub gap_open: i32,
    /// Penalty for every further position of a gap.
    pub gap_extend: i32,
    /// Leading columns where a prefix of `a` faces gaps.
    pub a_margin: MarginalGaps,
    /// Leading columns where a prefix of `b` faces gaps.
    pub b_margin: MarginalGaps,
    /// Maximal diagonal offset `|i - j|`; `None` aligns unbanded.
    pub band: Option<usize>,
}

impl AlignmentParams {
    /// Nucleotide defaults used to resolve complex variant calls.
    pub fn nucleotide() -> Self {
        Self {
            gap_open: 2,
            gap_extend: 1,
            a_margin: MarginalGaps::Forbid,
            b_margin: MarginalGaps::Penalize,
            band: None,
        }
    }

    /// Protein alignment against a reference translation.
    pub fn protein(gap_open: i32, gap_extend: i32) -> Self {
        Self {
            gap_open,
            gap_extend,
            a_margin: MarginalGaps::Forbid,
            b_margin: MarginalGaps::Penalize,
            band: None,
        }
    }

    /// Restrict the alignment to a diagonal band.
    pub fn with_band(mut self, band: usize) -> Self {
        self.band = Some(band);
        self
    }

    /// Override marginal gap handling.
    pub fn with_margins(mut self, a_margin: MarginalGaps, b_margin: MarginalGaps) -> Self {
        self.a_margin = a_margin;
        self.b_margin = b_margin;
        self
    }
}

/// Gapped rendition of two sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    /// Optimal score.
    pub score: i32,
    /// First sequence with gaps inserted.
    pub a: String,
    /// Second sequence with gaps inserted.
    pub b: String,
}

/// Which input sequence an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The first sequence.
    A,
    /// The second sequence.
    B,
}

/// Errors raised by [`GlobalAligner::align`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlignmentError {
    /// Length difference exceeds the band, no path stays inside it.
    #[error("band {band} too narrow for sequences of length {a_len} and {b_len}")]
    BandTooNarrow {
        /// Requested band.
        band: usize,
        /// Length of `a`.
        a_len: usize,
        /// Length of `b`.
        b_len: usize,
    },

    /// A symbol is not part of the substitution matrix alphabet.
    #[error("unknown symbol '{symbol}' at offset {offset} of sequence {side:?}")]
    UnknownSymbol {
        /// Offending symbol.
        symbol: char,
        /// Offset within the sequence.
        offset: usize,
        /// Sequence the symbol came from.
        side: Side,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Match,
    Deletion,
    Insertion,
}

#[derive(Debug, Clone, Copy)]
struct Band {
    width: usize,
    stride: usize,
    columns: usize,
}

impl Band {
    fn new(width: usize, columns: usize) -> Self {
        Self {
            width,
            stride: 2 * width + 1,
            columns,
        }
    }

    #[inline]
    fn cell(&self, i: usize, j: usize) -> Option<usize> {
        if j > self.columns || j + self.width < i || j > i + self.width {
            return None;
        }
        Some(i * self.stride + j + self.width - i)
    }
}

/// Global aligner owning its score layers.
///
/// Buffers are resized per call and reused afterwards, so one aligner per
/// worker thread is enough for any number of alignments.
#[derive(Debug, Clone)]
pub struct GlobalAligner {
    matrix: SubstitutionMatrix,
    matches: Vec<i32>,
    deletions: Vec<i32>,
    insertions: Vec<i32>,
    a_codes: Vec<u8>,
    b_codes: Vec<u8>,
}

impl GlobalAligner {
    /// Create an aligner scoring pairs with `matrix`.
    pub fn new(matrix: SubstitutionMatrix) -> Self {
        Self {
            matrix,
            matches: Vec::new(),
            deletions: Vec::new(),
            insertions: Vec::new(),
            a_codes: Vec::new(),
            b_codes: Vec::new(),
        }
    }

    /// Aligner using [`SubstitutionMatrix::nucleotide`].
    pub fn nucleotide() -> Self {
        Self::new(SubstitutionMatrix::nucleotide())
    }

    /// Aligner using [`SubstitutionMatrix::pam250`].
    pub fn protein() -> Self {
        Self::new(SubstitutionMatrix::pam250())
    }

    /// Substitution matrix in use.
    pub fn matrix(&self) -> &SubstitutionMatrix {
        &self.matrix
    }

    /// Globally align `a` against `b`.
    ///
    /// Ties on traceback prefer a deletion, then an insertion, then a match;
    /// inside a gap, extending is preferred over reopening.
    pub fn align(
        &mut self,
        a: &[u8],
        b: &[u8],
        params: &AlignmentParams,
    ) -> Result<Alignment, AlignmentError> {
        let (m, n) = (a.len(), b.len());
        if let Some(band) = params.band {
            if m.abs_diff(n) > band {
                return Err(AlignmentError::BandTooNarrow {
                    band,
                    a_len: m,
                    b_len: n,
                });
            }
        }
        encode(&self.matrix, a, Side::A, &mut self.a_codes)?;
        encode(&self.matrix, b, Side::B, &mut self.b_codes)?;

        let band = Band::new(params.band.unwrap_or(m.max(n)), n);
        self.fill(m, n, band, params);

        let end = band.cell(m, n).unwrap_or_default();
        let score = self.best(end);
        let (aligned_a, aligned_b) = self.traceback(a, b, band, params);
        Ok(Alignment {
            score,
            a: aligned_a,
            b: aligned_b,
        })
    }

    fn fill(&mut self, m: usize, n: usize, band: Band, params: &AlignmentParams) {
        let cells = (m + 1) * band.stride;
        for layer in [&mut self.matches, &mut self.deletions, &mut self.insertions] {
            layer.clear();
            layer.resize(cells, UNREACHABLE);
        }

        if let Some(origin) = band.cell(0, 0) {
            self.matches[origin] = 0;
        }
        for j in 1..=n.min(band.width) {
            if let Some(idx) = band.cell(0, j) {
                self.insertions[idx] = params.b_margin.cost(params.gap_open, params.gap_extend, j);
            }
        }
        for i in 1..=m.min(band.width) {
            if let Some(idx) = band.cell(i, 0) {
                self.deletions[idx] = params.a_margin.cost(params.gap_open, params.gap_extend, i);
            }
        }

        for i in 1..=m {
            let lo = i.saturating_sub(band.width).max(1);
            let hi = (i + band.width).min(n);
            let a_code = self.a_codes[i - 1];
            for j in lo..=hi {
                let Some(here) = band.cell(i, j) else {
                    continue;
                };
                let diagonal = band.cell(i - 1, j - 1).map_or(UNREACHABLE, |idx| self.best(idx));
                self.matches[here] = diagonal + self.matrix.score(a_code, self.b_codes[j - 1]);

                self.deletions[here] = match band.cell(i - 1, j) {
                    Some(up) => (self.best(up) - params.gap_open)
                        .max(self.deletions[up] - params.gap_extend),
                    None => UNREACHABLE,
                };
                self.insertions[here] = match band.cell(i, j - 1) {
                    Some(left) => (self.best(left) - params.gap_open)
                        .max(self.insertions[left] - params.gap_extend),
                    None => UNREACHABLE,
                };
            }
        }
    }

    #[inline]
    fn best(&self, idx: usize) -> i32 {
        self.matches[idx]
            .max(self.deletions[idx])
            .max(self.insertions[idx])
    }

    fn best_layer(&self, idx: usize) -> Layer {
        let total = self.best(idx);
        if self.deletions[idx] == total {
            Layer::Deletion
        } else if self.insertions[idx] == total {
            Layer::Insertion
        } else {
            Layer::Match
        }
    }

    fn traceback(
        &self,
        a: &[u8],
        b: &[u8],
        band: Band,
        params: &AlignmentParams,
    ) -> (String, String) {
        let (mut i, mut j) = (a.len(), b.len());
        let mut aligned_a = Vec::with_capacity(i + j);
        let mut aligned_b = Vec::with_capacity(i + j);
        let mut layer = band
            .cell(i, j)
            .map_or(Layer::Match, |idx| self.best_layer(idx));

        while i > 0 || j > 0 {
            if i == 0 {
                layer = Layer::Insertion;
            } else if j == 0 {
                layer = Layer::Deletion;
            }
            match layer {
                Layer::Match => {
                    aligned_a.push(a[i - 1]);
                    aligned_b.push(b[j - 1]);
                    i -= 1;
                    j -= 1;
                    layer = self.next_layer(band, i, j);
                }
                Layer::Deletion => {
                    aligned_a.push(a[i - 1]);
                    aligned_b.push(GAP);
                    let extended = j > 0
                        && match (band.cell(i, j), band.cell(i - 1, j)) {
                            (Some(here), Some(up)) => {
                                self.deletions[up] - params.gap_extend == self.deletions[here]
                            }
                            _ => false,
                        };
                    i -= 1;
                    if !extended {
                        layer = self.next_layer(band, i, j);
                    }
                }
                Layer::Insertion => {
                    aligned_a.push(GAP);
                    aligned_b.push(b[j - 1]);
                    let extended = i > 0
                        && match (band.cell(i, j), band.cell(i, j - 1)) {
                            (Some(here), Some(left)) => {
                                self.insertions[left] - params.gap_extend
                                    == self.insertions[here]
                            }
                            _ => false,
                        };
                    j -= 1;
                    if !extended {
                        layer = self.next_layer(band, i, j);
                    }
                }
            }
        }

        aligned_a.reverse();
        aligned_b.reverse();
        (into_string(aligned_a), into_string(aligned_b))
    }

    fn next_layer(&self, band: Band, i: usize, j: usize) -> Layer {
        band.cell(i, j)
            .map_or(Layer::Match, |idx| self.best_layer(idx))
    }
}

fn encode(
    matrix: &SubstitutionMatrix,
    sequence: &[u8],
    side: Side,
    codes: &mut Vec<u8>,
) -> Result<(), AlignmentError> {
    codes.clear();
    for (offset, &symbol) in sequence.iter().enumerate() {
        let code = matrix
            .index_of(symbol)
            .ok_or(AlignmentError::UnknownSymbol {
                symbol: char::from(symbol),
                offset,
                side,
            })?;
        codes.push(code);
    }
    Ok(())
}

// Inputs were validated against an ASCII alphabet.
fn into_string(bytes: Vec<u8>) -> String {
    bytes.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn align_nucleotides(a: &str, b: &str) -> Alignment {
        GlobalAligner::nucleotide()
            .align(a.as_bytes(), b.as_bytes(), &AlignmentParams::nucleotide())
            .expect("alignment succeeds")
    }

    fn align_proteins(a: &str, b: &str, band: usize) -> Alignment {
        let params = AlignmentParams::protein(8, 7).with_band(band);
        GlobalAligner::protein()
            .align(a.as_bytes(), b.as_bytes(), &params)
            .expect("alignment succeeds")
    }

    #[test]
    fn identical_sequences_align_without_gaps() {
        let alignment = align_nucleotides("ACGT", "ACGT");
        assert_eq!(alignment.a, "ACGT");
        assert_eq!(alignment.b, "ACGT");
        assert_eq!(alignment.score, 4);
    }

    #[test]
    fn substitution_stays_ungapped() {
        let alignment = align_nucleotides("ACGT", "AGGT");
        assert_eq!((alignment.a.as_str(), alignment.b.as_str()), ("ACGT", "AGGT"));
    }

    #[test]
    fn trailing_insertion_is_gapped_in_a() {
        let alignment = align_nucleotides("ACGT", "ACGTT");
        assert_eq!((alignment.a.as_str(), alignment.b.as_str()), ("ACGT-", "ACGTT"));
    }

    #[test]
    fn deletion_is_gapped_in_b() {
        let alignment = align_nucleotides("ACGT", "ACT");
        assert_eq!((alignment.a.as_str(), alignment.b.as_str()), ("ACGT", "AC-T"));
    }

    #[test]
    fn empty_sequences_are_padded_with_gaps() {
        let alignment = align_nucleotides("", "ACGT");
        assert_eq!((alignment.a.as_str(), alignment.b.as_str()), ("----", "ACGT"));

        let alignment = align_nucleotides("ACGT", "");
        assert_eq!((alignment.a.as_str(), alignment.b.as_str()), ("ACGT", "----"));
    }

    #[test]
    fn protein_identity_and_substitution_in_zero_band() {
        let alignment = align_proteins("ACDEFGHIKLMNPQRSTVWY", "ACDEFGHIKLMNPQRSTVWY", 0);
        assert_eq!(alignment.a, alignment.b);

        let alignment = align_proteins("ACDEFGHIKLMNPQRSTVWY", "ACDEFGHIKLMNPQRSTVWZ", 0);
        assert_eq!(alignment.a, "ACDEFGHIKLMNPQRSTVWY");
        assert_eq!(alignment.b, "ACDEFGHIKLMNPQRSTVWZ");
    }

    #[test]
    fn protein_insertion_within_band() {
        let alignment = align_proteins("ACDEFGHIKLMNPQRSTVWY", "ACDEFGSSSHIKLMNPQRSTVWY", 3);
        assert_eq!(alignment.a, "ACDEFG---HIKLMNPQRSTVWY");
        assert_eq!(alignment.b, "ACDEFGSSSHIKLMNPQRSTVWY");
    }

    #[test]
    fn protein_deletion_within_band() {
        let alignment = align_proteins("ACDEFGHIKLMNPQRSTVW", "ACDEFGHIKLQRSTVW", 3);
        assert_eq!(alignment.a, "ACDEFGHIKLMNPQRSTVW");
        assert_eq!(alignment.b, "ACDEFGHIKL---QRSTVW");
    }

    #[test]
    fn protein_mixed_indels_within_band() {
        let alignment = align_proteins("ACDEFGSSSHIKLMNPQRSW", "ACDEFGHIKLMNPQRSTVW", 5);
        assert_eq!(alignment.a, "ACDEFGSSSHIKLMNPQRS--W");
        assert_eq!(alignment.b, "ACDEFG---HIKLMNPQRSTVW");
    }

    #[test]
    fn band_narrower_than_length_difference_fails() {
        let params = AlignmentParams::nucleotide().with_band(1);
        let err = GlobalAligner::nucleotide()
            .align(b"ACGTAC", b"ACG", &params)
            .unwrap_err();
        assert_eq!(
            err,
            AlignmentError::BandTooNarrow {
                band: 1,
                a_len: 6,
                b_len: 3
            }
        );
    }

    #[test]
    fn unknown_symbol_is_reported_with_offset() {
        let err = GlobalAligner::nucleotide()
            .align(b"ACGT", b"ACXT", &AlignmentParams::nucleotide())
            .unwrap_err();
        assert_eq!(
            err,
            AlignmentError::UnknownSymbol {
                symbol: 'X',
                offset: 2,
                side: Side::B
            }
        );
    }

    #[test]
    fn aligner_is_reusable_across_sizes() {
        let mut aligner = GlobalAligner::nucleotide();
        let params = AlignmentParams::nucleotide();
        let long = aligner.align(b"ACGTACGTACGT", b"ACGTACGAACGT", &params).unwrap();
        let short = aligner.align(b"ACGT", b"ACT", &params).unwrap();
        assert_eq!(long.a, "ACGTACGTACGT");
        assert_eq!(short.b, "AC-T");
    }

    #[test]
    fn free_margins_cost_nothing() {
        let params = AlignmentParams::nucleotide().with_margins(MarginalGaps::Free, MarginalGaps::Free);
        let alignment = GlobalAligner::nucleotide()
            .align(b"", b"ACGT", &params)
            .unwrap();
        assert_eq!(alignment.score, 0);
    }
}
