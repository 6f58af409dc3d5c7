#![allow(dead_code)]

use std::sync::Arc;

use musial::storage::{BuildParameters, FeatureDefinition, MusialStorage, Strand};
use musial::{CallRecord, MemoryCallSource};

/// Contig `chr` holding `segment` at 1-based position `offset`, padded with `A`.
pub fn contig_with(segment: &str, offset: u64, length: usize) -> String {
    let mut sequence = "A".repeat(offset as usize - 1);
    sequence.push_str(segment);
    while sequence.len() < length {
        sequence.push('A');
    }
    sequence
}

pub fn catalog(parameters: BuildParameters, sequence: &str) -> MusialStorage {
    let mut storage = MusialStorage::new(parameters).expect("valid parameters");
    storage
        .add_contig("chr", Some(sequence.to_string()))
        .expect("contig added");
    storage
}

pub fn add_feature(storage: &mut MusialStorage, name: &str, start: u64, end: u64, coding: bool) {
    storage
        .add_feature(FeatureDefinition {
            name: name.to_string(),
            contig: "chr".to_string(),
            start,
            end,
            strand: Strand::Forward,
            coding,
        })
        .expect("feature added");
}

pub fn add_sample(storage: &mut MusialStorage, name: &str, records: Vec<CallRecord>) {
    let source: MemoryCallSource = records.into_iter().collect();
    storage
        .add_sample(name, Arc::new(source))
        .expect("sample added");
}

/// Well supported homozygous call.
pub fn call(position: u64, reference: &str, alternate: &str) -> CallRecord {
    CallRecord::new("chr", position, reference)
        .with_alternate(alternate, 40)
        .with_depth(40)
        .with_quality(60.0)
}
