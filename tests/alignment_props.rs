use proptest::prelude::*;
use musial::alignment::{canonical_variants, AlignmentParams, GlobalAligner};
use musial::sequence::ungapped;

fn nucleotides(max: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')],
        1..max,
    )
}

proptest! {
    #[test]
    fn alignment_preserves_both_sequences(a in nucleotides(24), b in nucleotides(24)) {
        let mut aligner = GlobalAligner::nucleotide();
        let alignment = aligner
            .align(&a, &b, &AlignmentParams::nucleotide())
            .expect("unbanded alignment succeeds");

        prop_assert_eq!(alignment.a.len(), alignment.b.len());
        let (restored_a, restored_b) = (ungapped(&alignment.a), ungapped(&alignment.b));
        prop_assert_eq!(restored_a.as_bytes(), a.as_slice());
        prop_assert_eq!(restored_b.as_bytes(), b.as_slice());
        let gap_columns = alignment
            .a
            .bytes()
            .zip(alignment.b.bytes())
            .filter(|&(x, y)| x == b'-' && y == b'-')
            .count();
        prop_assert_eq!(gap_columns, 0, "no column may pair two gaps");
    }

    #[test]
    fn self_alignment_is_gapless(a in nucleotides(32)) {
        let mut aligner = GlobalAligner::nucleotide();
        let alignment = aligner
            .align(&a, &a, &AlignmentParams::nucleotide().with_band(0))
            .expect("zero band admits the diagonal");
        prop_assert_eq!(alignment.score, a.len() as i32);
        prop_assert!(canonical_variants(&alignment.a, &alignment.b).expect("equal lengths").is_empty());
    }

    #[test]
    fn full_width_band_matches_unbanded(a in nucleotides(20), b in nucleotides(20)) {
        let mut aligner = GlobalAligner::nucleotide();
        let params = AlignmentParams::nucleotide();
        let unbanded = aligner.align(&a, &b, &params).expect("unbanded alignment succeeds");
        let banded = aligner
            .align(&a, &b, &params.with_band(a.len().max(b.len())))
            .expect("full band succeeds");
        prop_assert_eq!(unbanded, banded);
    }

    #[test]
    fn narrow_band_never_beats_unbanded(a in nucleotides(20), b in nucleotides(20), extra in 0usize..4) {
        let mut aligner = GlobalAligner::nucleotide();
        let params = AlignmentParams::nucleotide();
        let unbanded = aligner.align(&a, &b, &params).expect("unbanded alignment succeeds");
        let band = a.len().abs_diff(b.len()) + extra;
        let banded = aligner
            .align(&a, &b, &params.with_band(band))
            .expect("band covers the length difference");
        prop_assert!(banded.score <= unbanded.score);
    }

    #[test]
    fn canonical_records_match_the_reference(a in nucleotides(24), b in nucleotides(24)) {
        let mut aligner = GlobalAligner::nucleotide();
        let alignment = aligner
            .align(&a, &b, &AlignmentParams::nucleotide())
            .expect("unbanded alignment succeeds");
        let records = canonical_variants(&alignment.a, &alignment.b).expect("equal lengths");
        let reference = String::from_utf8(a.clone()).expect("ascii");

        let mut previous = 0usize;
        for record in &records {
            prop_assert!(record.position >= previous, "records are ordered by position");
            previous = record.position;
            prop_assert_eq!(record.reference.len(), record.alternate.len());
            prop_assert_ne!(&record.reference, &record.alternate);
            let content = ungapped(&record.reference);
            prop_assert_eq!(
                reference.get(record.position..record.position + content.len()),
                Some(content.as_str())
            );
        }
    }
}
