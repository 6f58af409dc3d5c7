//! Substitution matrices used to score aligned symbol pairs.

/// Symbols of the nucleotide matrix, in index order.
const NUCLEOTIDE_SYMBOLS: &[u8] = b"ACGTN";

/// Symbols of the PAM250 matrix, in index order.
const PAM250_SYMBOLS: &[u8] = b"ARNDCQEGHILKMFPSTWYVBJZX*";

#[rustfmt::skip]
const PAM250: [[i32; 25]; 25] = [
    [ 2, -2,  0,  0, -2,  0,  0,  1, -1, -1, -2, -1, -1, -3,  1,  1,  1, -6, -3,  0,  0, -1,  0, -1, -8],
    [-2,  6,  0, -1, -4,  1, -1, -3,  2, -2, -3,  3,  0, -4,  0,  0, -1,  2, -4, -2, -1, -3,  0, -1, -8],
    [ 0,  0,  2,  2, -4,  1,  1,  0,  2, -2, -3,  1, -2, -3,  0,  1,  0, -4, -2, -2,  2, -3,  1, -1, -8],
    [ 0, -1,  2,  4, -5,  2,  3,  1,  1, -2, -4,  0, -3, -6, -1,  0,  0, -7, -4, -2,  3, -3,  3, -1, -8],
    [-2, -4, -4, -5, 12, -5, -5, -3, -3, -2, -6, -5, -5, -4, -3,  0, -2, -8,  0, -2, -4, -5, -5, -1, -8],
    [ 0,  1,  1,  2, -5,  4,  2, -1,  3, -2, -2,  1, -1, -5,  0, -1, -1, -5, -4, -2,  1, -2,  3, -1, -8],
    [ 0, -1,  1,  3, -5,  2,  4,  0,  1, -2, -3,  0, -2, -5, -1,  0,  0, -7, -4, -2,  3, -3,  3, -1, -8],
    [ 1, -3,  0,  1, -3, -1,  0,  5, -2, -3, -4, -2, -3, -5,  0,  1,  0, -7, -5, -1,  0, -4,  0, -1, -8],
    [-1,  2,  2,  1, -3,  3,  1, -2,  6, -2, -2,  0, -2, -2,  0, -1, -1, -3,  0, -2,  1, -2,  2, -1, -8],
    [-1, -2, -2, -2, -2, -2, -2, -3, -2,  5,  2, -2,  2,  1, -2, -1,  0, -5, -1,  4, -2,  3, -2, -1, -8],
    [-2, -3, -3, -4, -6, -2, -3, -4, -2,  2,  6, -3,  4,  2, -3, -3, -2, -2, -1,  2, -3,  5, -3, -1, -8],
    [-1,  3,  1,  0, -5,  1,  0, -2,  0, -2, -3,  5,  0, -5, -1,  0,  0, -3, -4, -2,  1, -3,  0, -1, -8],
    [-1,  0, -2, -3, -5, -1, -2, -3, -2,  2,  4,  0,  6,  0, -2, -2, -1, -4, -2,  2, -2,  3, -2, -1, -8],
    [-3, -4, -3, -6, -4, -5, -5, -5, -2,  1,  2, -5,  0,  9, -5, -3, -3,  0,  7, -1, -4,  2, -5, -1, -8],
    [ 1,  0,  0, -1, -3,  0, -1,  0,  0, -2, -3, -1, -2, -5,  6,  1,  0, -6, -5, -1, -1, -2,  0, -1, -8],
    [ 1,  0,  1,  0,  0, -1,  0,  1, -1, -1, -3,  0, -2, -3,  1,  2,  1, -2, -3, -1,  0, -2,  0, -1, -8],
    [ 1, -1,  0,  0, -2, -1,  0,  0, -1,  0, -2,  0, -1, -3,  0,  1,  3, -5, -3,  0,  0, -1, -1, -1, -8],
    [-6,  2, -4, -7, -8, -5, -7, -7, -3, -5, -2, -3, -4,  0, -6, -2, -5, 17,  0, -6, -5, -3, -6, -1, -8],
    [-3, -4, -2, -4,  0, -4, -4, -5,  0, -1, -1, -4, -2,  7, -5, -3, -3,  0, 10, -2, -3, -1, -4, -1, -8],
    [ 0, -2, -2, -2, -2, -2, -2, -1, -2,  4,  2, -2,  2, -1, -1, -1,  0, -6, -2,  4, -2,  2, -2, -1, -8],
    [ 0, -1,  2,  3, -4,  1,  3,  0,  1, -2, -3,  1, -2, -4, -1,  0,  0, -5, -3, -2,  3, -3,  2, -1, -8],
    [-1, -3, -3, -3, -5, -2, -3, -4, -2,  3,  5, -3,  3,  2, -2, -2, -1, -3, -1,  2, -3,  5, -2, -1, -8],
    [ 0,  0,  1,  3, -5,  3,  3,  0,  2, -2, -3,  0, -2, -5,  0,  0, -1, -6, -4, -2,  2, -2,  3, -1, -8],
    [-1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -8],
    [-8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8, -8,  1],
];

/// Square score table together with the symbol→index map that addresses it.
///
/// Lookups are case-insensitive for ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionMatrix {
    index: [Option<u8>; 256],
    size: usize,
    scores: Vec<i32>,
}

impl SubstitutionMatrix {
    /// Build a matrix from an ordered symbol list and a row-major score table.
    ///
    /// Panics if the table is not `symbols.len()²` long; matrices are static
    /// configuration, not user input.
    pub fn new(symbols: &[u8], scores: Vec<i32>) -> Self {
        assert_eq!(
            scores.len(),
            symbols.len() * symbols.len(),
            "score table must be square over the symbol list"
        );
        let mut index = [None; 256];
        for (idx, &symbol) in symbols.iter().enumerate() {
            index[symbol.to_ascii_uppercase() as usize] = Some(idx as u8);
            index[symbol.to_ascii_lowercase() as usize] = Some(idx as u8);
        }
        Self {
            index,
            size: symbols.len(),
            scores,
        }
    }

    /// Simple nucleotide scoring: match `1` (including `N`/`N`), mismatch `-1`.
    pub fn nucleotide() -> Self {
        let size = NUCLEOTIDE_SYMBOLS.len();
        let mut scores = vec![-1; size * size];
        for idx in 0..size {
            scores[idx * size + idx] = 1;
        }
        Self::new(NUCLEOTIDE_SYMBOLS, scores)
    }

    /// PAM250 over the 20 standard amino acids, `B`, `J`, `Z`, `X` and `*`.
    pub fn pam250() -> Self {
        let scores = PAM250.iter().flat_map(|row| row.iter().copied()).collect();
        Self::new(PAM250_SYMBOLS, scores)
    }

    /// Matrix index of `symbol`, if the symbol belongs to the alphabet.
    #[inline]
    pub fn index_of(&self, symbol: u8) -> Option<u8> {
        self.index[symbol as usize]
    }

    /// Score of two symbol indices.
    #[inline]
    pub fn score(&self, a: u8, b: u8) -> i32 {
        self.scores[a as usize * self.size + b as usize]
    }

    /// Number of symbols in the alphabet.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the alphabet is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nucleotide_matrix_scores_matches_and_mismatches() {
        let matrix = SubstitutionMatrix::nucleotide();
        let a = matrix.index_of(b'A').unwrap();
        let c = matrix.index_of(b'c').unwrap();
        let n = matrix.index_of(b'N').unwrap();
        assert_eq!(matrix.score(a, a), 1);
        assert_eq!(matrix.score(a, c), -1);
        assert_eq!(matrix.score(n, n), 1);
        assert_eq!(matrix.score(n, a), -1);
        assert!(matrix.index_of(b'-').is_none());
    }

    #[test]
    fn pam250_is_symmetric() {
        let matrix = SubstitutionMatrix::pam250();
        for a in 0..matrix.len() as u8 {
            for b in 0..matrix.len() as u8 {
                assert_eq!(matrix.score(a, b), matrix.score(b, a));
            }
        }
        let w = matrix.index_of(b'W').unwrap();
        assert_eq!(matrix.score(w, w), 17);
    }
}
