mod common;

use std::collections::HashSet;
use std::fmt::Write;

use blake3::hash;
use common::{add_feature, add_sample, call, catalog, contig_with};
use musial::pipeline::{self, PipelineConfig};
use musial::storage::{BuildParameters, MusialStorage};
use musial::CallRecord;

fn populated() -> MusialStorage {
    let sequence = contig_with("ATGAAACCCGGGTTTTAA", 10, 120);
    let mut storage = catalog(BuildParameters::default(), &sequence);
    add_feature(&mut storage, "gene", 10, 27, true);
    add_feature(&mut storage, "upstream", 1, 9, false);
    add_feature(&mut storage, "tail", 28, 120, false);

    let variants: [Vec<CallRecord>; 6] = [
        vec![call(13, "A", "G")],
        vec![call(13, "A", "G"), call(40, "A", "C")],
        vec![call(16, "C", "CAAA")],
        vec![call(19, "G", "T"), call(5, "A", "T")],
        vec![],
        vec![call(22, "TT", "T"), call(13, "A", "G")],
    ];
    for (idx, records) in variants.into_iter().enumerate() {
        add_sample(&mut storage, &format!("sample{idx}"), records);
    }
    storage
}

fn render(storage: &MusialStorage) -> String {
    let mut out = String::new();
    for feature in storage.features() {
        let state = feature.state();
        for (name, form) in state.alleles().iter().chain(state.proteoforms()) {
            writeln!(out, "{} {} {} {:?} {:?}", feature.name(), name, form.fingerprint, form.occurrence, form.annotations)
                .expect("write to string");
        }
        for (position, records) in state
            .nucleotide_variants()
            .iter()
            .chain(state.amino_acid_variants())
        {
            for (alternate, record) in records {
                writeln!(out, "{position} {alternate} {:?} {:?}", record.occurrence, record.annotations)
                    .expect("write to string");
            }
        }
    }
    for sample in storage.samples() {
        writeln!(out, "{} {:?} {:?}", sample.name(), sample.alleles(), sample.proteoform("gene"))
            .expect("write to string");
    }
    out
}

#[test]
fn build_is_independent_of_thread_count() {
    let mut fingerprints = HashSet::new();
    for threads in [1, 2, 4, 8] {
        let storage = populated();
        let report = pipeline::run(&storage, &PipelineConfig::default().with_threads(threads))
            .expect("build succeeds");
        assert_eq!(report.failed_units, 0);
        assert_eq!(report.failed_inferences, 0);
        fingerprints.insert(hash(render(&storage).as_bytes()));
    }
    assert_eq!(fingerprints.len(), 1, "outputs diverged across thread counts");
}

#[test]
fn expanding_in_batches_matches_a_single_build() {
    let whole = populated();
    pipeline::run(&whole, &PipelineConfig::default()).expect("build succeeds");

    let batched = populated();
    pipeline::expand(&batched, &["sample0", "sample2", "sample4"], &PipelineConfig::default())
        .expect("first batch");
    pipeline::expand(&batched, &["sample1", "sample3", "sample5"], &PipelineConfig::default())
        .expect("second batch");

    assert_eq!(render(&whole), render(&batched));
}
