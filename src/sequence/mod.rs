//! Nucleotide and amino-acid sequence helpers.

mod translate;

pub(crate) use translate::has_stop;
pub use translate::{translate, TranslationError};

/// Gap symbol used in aligned sequences and variant content.
pub const GAP: u8 = b'-';

/// Symbol of a translated stop codon.
pub const STOP: u8 = b'*';

/// Symbol of an amino acid that could not be determined.
pub const ANY_AMINO_ACID: u8 = b'X';

/// Whether `base` is an unambiguous nucleotide or `N`.
pub fn is_nucleotide(base: u8) -> bool {
    matches!(base.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N')
}

/// Complement of a nucleotide; other symbols are returned unchanged.
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' => b'a',
        other => other,
    }
}

/// Reverse complement of a nucleotide sequence.
pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence.iter().rev().map(|&base| complement(base)).collect()
}

/// Copy of `content` without gap symbols.
pub fn ungapped(content: &str) -> String {
    content.chars().filter(|&c| c != char::from(GAP)).collect()
}
