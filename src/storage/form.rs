//! Content-addressed allele and proteoform records.

use super::StorageError;
use crate::alignment::VariantKind;
use crate::sequence::GAP;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{Read, Write};

/// Name of a registered [`Form`].
pub type FormName = String;

/// Reserved name of the form without any variant site.
pub const REFERENCE_FORM: &str = "reference";

/// Annotation holding the compressed fingerprint.
pub const VARIANTS_ANNOTATION: &str = "variants";

/// Annotation holding the `S<n>.I<n>.D<n>.M<n>` site counts.
pub const LABEL_ANNOTATION: &str = "label";

/// Whether a form describes nucleotide or amino-acid content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormKind {
    /// Nucleotide variant combination of a feature.
    Allele,
    /// Amino-acid variant combination of a coding feature.
    Proteoform,
}

/// One accepted variant site of a form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Site {
    /// Contig position (alleles) or 1-based protein position (proteoforms).
    pub position: u64,
    /// Gapped reference content.
    pub reference: String,
    /// Gapped alternate content.
    pub alternate: String,
}

impl Site {
    /// Create a site.
    pub fn new(position: u64, reference: impl Into<String>, alternate: impl Into<String>) -> Self {
        Self {
            position,
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }

    /// Structural class of the site.
    pub fn kind(&self) -> VariantKind {
        VariantKind::of(&self.reference, &self.alternate)
    }

    /// Net residue gain (positive) or loss (negative) of the site.
    pub fn length_change(&self) -> i64 {
        let gap = char::from(GAP);
        let gained = self.reference.chars().filter(|&c| c == gap).count() as i64;
        let lost = self.alternate.chars().filter(|&c| c == gap).count() as i64;
        gained - lost
    }
}

/// Ordered sequence of variant sites identifying a form.
///
/// Rendered as `pos|alt;pos|alt` in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fingerprint {
    sites: Vec<Site>,
}

impl Fingerprint {
    /// Fingerprint over `sites`, keeping their order.
    pub fn new(sites: Vec<Site>) -> Self {
        Self { sites }
    }

    /// Sites in processing order.
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Whether no site was accepted, i.e. the reference form.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// 64-bit content digest rendered as 16 hex digits.
    pub fn digest(&self) -> String {
        let hash = blake3::hash(self.to_string().as_bytes());
        hash.as_bytes()[..8]
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    /// `S<n>.I<n>.D<n>.M<n>` counts of site kinds.
    pub fn label(&self) -> String {
        let mut counts = [0usize; 4];
        for site in &self.sites {
            let slot = match site.kind() {
                VariantKind::Substitution => 0,
                VariantKind::Insertion => 1,
                VariantKind::Deletion => 2,
                VariantKind::Mixed => 3,
            };
            counts[slot] += 1;
        }
        format!("S{}.I{}.D{}.M{}", counts[0], counts[1], counts[2], counts[3])
    }

    /// Net length change over all sites.
    pub fn length_change(&self) -> i64 {
        self.sites.iter().map(Site::length_change).sum()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, site) in self.sites.iter().enumerate() {
            if idx > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}|{}", site.position, site.alternate)?;
        }
        Ok(())
    }
}

/// Deflate and base64url-encode a rendered fingerprint.
pub fn compress_fingerprint(rendered: &str) -> Result<String, StorageError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rendered.as_bytes())?;
    let bytes = encoder.finish()?;
    Ok(base64_url::encode(&bytes))
}

/// Inverse of [`compress_fingerprint`].
pub fn decompress_fingerprint(annotation: &str) -> Result<String, StorageError> {
    let bytes = base64_url::decode(annotation)
        .map_err(|err| StorageError::CorruptAnnotation(err.to_string()))?;
    let mut rendered = String::new();
    DeflateDecoder::new(bytes.as_slice()).read_to_string(&mut rendered)?;
    Ok(rendered)
}

/// A deduplicated variant combination of one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Form {
    /// Content-derived name.
    pub name: FormName,
    /// Allele or proteoform.
    pub kind: FormKind,
    /// Full fingerprint the name was derived from.
    pub fingerprint: Fingerprint,
    /// Samples (alleles) or samples carrying a source allele (proteoforms).
    pub occurrence: BTreeSet<String>,
    /// Free-form annotations.
    pub annotations: BTreeMap<String, String>,
}

impl Form {
    fn new(name: FormName, kind: FormKind, fingerprint: Fingerprint) -> Self {
        Self {
            name,
            kind,
            fingerprint,
            occurrence: BTreeSet::new(),
            annotations: BTreeMap::new(),
        }
    }

    /// Whether this is the reference form.
    pub fn is_reference(&self) -> bool {
        self.name == REFERENCE_FORM
    }

    /// Annotation value for `key`.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// Resolve `fingerprint` to a form in `forms`, creating it when absent.
///
/// Returns the form and whether it was created. The name is the fingerprint
/// digest; a digest held by a different fingerprint is disambiguated with a
/// `.1`, `.2`, ... suffix.
pub(crate) fn intern<'a>(
    forms: &'a mut BTreeMap<FormName, Form>,
    kind: FormKind,
    fingerprint: &Fingerprint,
) -> Result<(&'a mut Form, bool), StorageError> {
    let name = if fingerprint.is_empty() {
        REFERENCE_FORM.to_string()
    } else {
        let digest = fingerprint.digest();
        let mut candidate = digest.clone();
        let mut suffix = 0usize;
        while let Some(existing) = forms.get(&candidate) {
            if existing.fingerprint == *fingerprint {
                break;
            }
            suffix += 1;
            tracing::warn!(digest = %digest, suffix, "form digest collision");
            candidate = format!("{digest}.{suffix}");
        }
        candidate
    };

    let created = !forms.contains_key(&name);
    if created {
        let mut form = Form::new(name.clone(), kind, fingerprint.clone());
        if !fingerprint.is_empty() {
            let rendered = fingerprint.to_string();
            form.annotations
                .insert(VARIANTS_ANNOTATION.to_string(), compress_fingerprint(&rendered)?);
            form.annotations
                .insert(LABEL_ANNOTATION.to_string(), fingerprint.label());
        }
        forms.insert(name.clone(), form);
    }
    let form = forms
        .get_mut(&name)
        .ok_or_else(|| StorageError::UnknownForm(name.clone()))?;
    Ok((form, created))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(sites: &[(u64, &str, &str)]) -> Fingerprint {
        Fingerprint::new(
            sites
                .iter()
                .map(|&(position, reference, alternate)| Site::new(position, reference, alternate))
                .collect(),
        )
    }

    #[test]
    fn renders_position_alternate_pairs() {
        let fp = fingerprint(&[(104, "A", "G"), (120, "T--", "TAA")]);
        assert_eq!(fp.to_string(), "104|G;120|TAA");
        assert_eq!(fp.label(), "S1.I1.D0.M0");
        assert_eq!(fp.length_change(), 2);
    }

    #[test]
    fn digest_is_stable_and_sixteen_hex_digits() {
        let a = fingerprint(&[(104, "A", "G")]);
        let b = fingerprint(&[(104, "A", "G")]);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 16);
        assert!(a.digest().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.digest(), fingerprint(&[(104, "A", "T")]).digest());
    }

    #[test]
    fn empty_fingerprint_interns_as_reference() {
        let mut forms = BTreeMap::new();
        let (form, created) = intern(&mut forms, FormKind::Allele, &Fingerprint::default()).unwrap();
        assert!(created);
        assert!(form.is_reference());
        assert!(form.annotations.is_empty());
    }

    #[test]
    fn identical_fingerprints_share_one_form() {
        let mut forms = BTreeMap::new();
        let fp = fingerprint(&[(5, "C", "T")]);
        let first = intern(&mut forms, FormKind::Allele, &fp).unwrap().0.name.clone();
        let (second, created) = intern(&mut forms, FormKind::Allele, &fp).unwrap();
        assert!(!created);
        assert_eq!(first, second.name);
        assert_eq!(forms.len(), 1);
    }

    #[test]
    fn colliding_digest_gets_suffix() {
        let mut forms = BTreeMap::new();
        let fp = fingerprint(&[(5, "C", "T")]);
        let other = fingerprint(&[(9, "G", "A")]);
        // Occupy the digest of `fp` with a different fingerprint.
        let digest = fp.digest();
        forms.insert(
            digest.clone(),
            Form::new(digest.clone(), FormKind::Allele, other),
        );
        let (form, created) = intern(&mut forms, FormKind::Allele, &fp).unwrap();
        assert!(created);
        assert_eq!(form.name, format!("{digest}.1"));
        assert_eq!(form.fingerprint, fp);
    }

    #[test]
    fn compressed_fingerprint_decodes() {
        let fp = fingerprint(&[(104, "A", "G"), (108, "CG", "C-")]);
        let mut forms = BTreeMap::new();
        let (form, _) = intern(&mut forms, FormKind::Allele, &fp).unwrap();
        let encoded = form.annotation(VARIANTS_ANNOTATION).unwrap();
        assert_eq!(decompress_fingerprint(encoded).unwrap(), "104|G;108|C-");
        assert_eq!(form.annotation(LABEL_ANNOTATION), Some("S1.I0.D1.M0"));
    }
}
