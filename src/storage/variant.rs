//! Per-position variant records of a feature.

use std::collections::{BTreeMap, BTreeSet};

/// Annotation key prefix of per-sample call details.
pub const SAMPLE_CALL_PREFIX: &str = "of_sample_";

/// Everything known about one `(position, alternate)` pair of a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariantInformation {
    /// Gapped reference content; fixed by the first observation.
    pub reference: String,
    /// Gapped alternate content.
    pub alternate: String,
    /// Samples carrying the variant as an accepted call.
    pub occurrence: BTreeSet<String>,
    /// Free-form annotations, including `of_sample_<name>` call details.
    pub annotations: BTreeMap<String, String>,
}

impl VariantInformation {
    /// Empty record for `reference` → `alternate`.
    pub fn new(reference: impl Into<String>, alternate: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            alternate: alternate.into(),
            occurrence: BTreeSet::new(),
            annotations: BTreeMap::new(),
        }
    }

    /// Annotation value for `key`.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Call details recorded for `sample`.
    pub fn sample_call(&self, sample: &str) -> Option<&str> {
        self.annotation(&format!("{SAMPLE_CALL_PREFIX}{sample}"))
    }
}

/// Variant records of a feature keyed by position, then alternate content.
pub type VariantTable = BTreeMap<u64, BTreeMap<String, VariantInformation>>;

/// Look up or create the record for `(position, alternate)`.
///
/// Returns `None` when the observation contradicts the table: a different
/// reference for the same alternate, or a different anchor base than other
/// records at the position. The first observation is kept.
pub(crate) fn observe<'a>(
    table: &'a mut VariantTable,
    position: u64,
    reference: &str,
    alternate: &str,
) -> Option<&'a mut VariantInformation> {
    let records = table.entry(position).or_default();
    if let Some(existing) = records.get(alternate) {
        if existing.reference != reference {
            tracing::warn!(
                position,
                alternate,
                known = %existing.reference,
                observed = reference,
                "conflicting reference content, keeping first observation"
            );
            return None;
        }
    } else if let Some(known) = records.values().next() {
        if known.reference.chars().next() != reference.chars().next() {
            tracing::warn!(
                position,
                alternate,
                known = %known.reference,
                observed = reference,
                "conflicting anchor base, dropping observation"
            );
            return None;
        }
    }
    Some(
        records
            .entry(alternate.to_string())
            .or_insert_with(|| VariantInformation::new(reference, alternate)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reference_wins() {
        let mut table = VariantTable::new();
        observe(&mut table, 10, "A", "G").unwrap().occurrence.insert("s1".into());
        assert!(observe(&mut table, 10, "AC", "G").is_none());
        let record = &table[&10]["G"];
        assert_eq!(record.reference, "A");
        assert_eq!(record.occurrence.len(), 1);
    }

    #[test]
    fn records_at_a_position_share_the_anchor() {
        let mut table = VariantTable::new();
        assert!(observe(&mut table, 10, "A", "G").is_some());
        assert!(observe(&mut table, 10, "A--", "ATT").is_some());
        assert!(observe(&mut table, 10, "C", "T").is_none());
        assert_eq!(table[&10].len(), 2);
    }

    #[test]
    fn sample_call_lookup_uses_prefix() {
        let mut record = VariantInformation::new("A", "G");
        record
            .annotations
            .insert(format!("{SAMPLE_CALL_PREFIX}s1"), "1/1:false:1:60:20".into());
        assert_eq!(record.sample_call("s1"), Some("1/1:false:1:60:20"));
        assert_eq!(record.sample_call("s2"), None);
    }
}
