//! Standard-code translation of nucleotide sequences.

use super::{reverse_complement, ANY_AMINO_ACID, STOP};
use thiserror::Error;

/// Errors raised by [`translate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslationError {
    /// The sequence holds a symbol that is neither a nucleotide nor `N`.
    #[error("cannot translate symbol '{symbol}' at offset {offset}")]
    InvalidBase {
        /// Offending symbol.
        symbol: char,
        /// Offset within the (sense) sequence.
        offset: usize,
    },
}

fn base_index(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'T' => Some(0),
        b'C' => Some(1),
        b'A' => Some(2),
        b'G' => Some(3),
        _ => None,
    }
}

// Indexed by 16·first + 4·second + third over the order T, C, A, G.
const CODON_TABLE: &[u8; 64] =
    b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

fn translate_codon(codon: &[u8]) -> u8 {
    match codon {
        [first, second, third] => match (base_index(*first), base_index(*second), base_index(*third)) {
            (Some(x), Some(y), Some(z)) => CODON_TABLE[16 * x + 4 * y + z],
            _ => ANY_AMINO_ACID,
        },
        _ => ANY_AMINO_ACID,
    }
}

/// Translate `sequence` codon by codon, on the reverse strand when `reverse`.
///
/// Stop codons become `*` and translation continues past them. Codons with
/// an `N` and a trailing incomplete codon become `X`.
pub fn translate(sequence: &[u8], reverse: bool) -> Result<String, TranslationError> {
    if let Some(offset) = sequence.iter().position(|&b| !super::is_nucleotide(b)) {
        return Err(TranslationError::InvalidBase {
            symbol: char::from(sequence[offset]),
            offset,
        });
    }
    let sense = if reverse {
        reverse_complement(sequence)
    } else {
        sequence.to_vec()
    };
    let protein = sense
        .chunks(3)
        .map(|codon| char::from(translate_codon(codon)))
        .collect();
    Ok(protein)
}

/// Whether `protein` carries a stop symbol.
pub(crate) fn has_stop(protein: &str) -> bool {
    protein.bytes().any(|b| b == STOP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_forward_strand() {
        assert_eq!(translate(b"ATGCGT", false).unwrap(), "MR");
    }

    #[test]
    fn translates_reverse_strand() {
        assert_eq!(translate(b"ATGCGT", true).unwrap(), "TH");
    }

    #[test]
    fn empty_sequence_translates_to_empty_protein() {
        assert_eq!(translate(b"", false).unwrap(), "");
    }

    #[test]
    fn stops_ambiguous_and_incomplete_codons() {
        assert_eq!(translate(b"ATGTAANNNTGGTA", false).unwrap(), "M*XWX");
        assert!(has_stop("M*"));
    }

    #[test]
    fn invalid_symbol_is_rejected() {
        assert_eq!(
            translate(b"ATGCGTX", false),
            Err(TranslationError::InvalidBase {
                symbol: 'X',
                offset: 6
            })
        );
    }
}
