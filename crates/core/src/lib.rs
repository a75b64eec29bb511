//! bindex core types: source records, enrichment keys and index documents.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

mod error;
mod normalize;

pub use error::{Error, Result};
pub use normalize::{normalize, LegalSuffixNormalizer, NameNormalizer, NAME_ENDINGS};

/// Kind stamped on every index document.
pub const RECORD_KIND: &str = "searchresults#company";
/// Record type stamped on every index document item.
pub const RECORD_TYPE: &str = "companies";
/// Joins the ordering key and the record id in `ordered_alpha_key_with_id`.
pub const ORDERING_KEY_SEPARATOR: char = ':';

/// Attributes of a source record. Any field may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawAttributes {
    #[serde(rename = "company_name", default)]
    pub name: String,
    #[serde(rename = "company_number", default)]
    pub number: String,
    #[serde(rename = "company_status", default)]
    pub status: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// One record as read from the document store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// Absent attributes and an empty name are distinct conditions.
    #[serde(rename = "data", default)]
    pub attributes: Option<RawAttributes>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, attributes: Option<RawAttributes>) -> Self {
        Self { id: id.into(), attributes }
    }

    /// Name used for the enrichment request; empty when the record has none.
    pub fn name(&self) -> &str {
        self.attributes.as_ref().map(|a| a.name.as_str()).unwrap_or("")
    }
}

/// Keys derived by the enrichment service from a single name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichmentKey {
    #[serde(rename = "sameAsAlphaKey", default)]
    pub equivalence_key: String,
    #[serde(rename = "orderedAlphaKey", default)]
    pub ordering_key: String,
}

impl EnrichmentKey {
    pub fn new(equivalence_key: impl Into<String>, ordering_key: impl Into<String>) -> Self {
        Self { equivalence_key: equivalence_key.into(), ordering_key: ordering_key.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentItems {
    #[serde(rename = "company_number")]
    pub number: String,
    #[serde(rename = "company_status", default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(rename = "corporate_name")]
    pub name: String,
    #[serde(rename = "corporate_name_start")]
    pub name_stem: String,
    #[serde(rename = "corporate_name_ending", default, skip_serializing_if = "String::is_empty")]
    pub name_suffix: String,
    pub record_type: String,
    #[serde(rename = "alpha_key")]
    pub equivalence_key: String,
    #[serde(rename = "ordered_alpha_key")]
    pub ordering_key: String,
}

/// Search-index document built from one record and its enrichment key.
///
/// The id travels in the bulk `create` directive, not in the document body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexDocument {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "company_type")]
    pub record_type: String,
    pub items: DocumentItems,
    pub kind: String,
    pub links: DocumentLinks,
    #[serde(rename = "ordered_alpha_key_with_id")]
    pub ordering_key_with_id: String,
}

/// Self link for a record id.
pub fn self_link(id: &str) -> String {
    format!("/company/{}", id)
}

/// Composite ordering key that sub-orders documents sharing an ordering key by id.
pub fn ordering_key_with_id(ordering_key: &str, id: &str) -> String {
    format!("{}{}{}", ordering_key, ORDERING_KEY_SEPARATOR, id)
}

/// An ordered slice of source records processed as one unit of work.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Admission sequence number, starting at 0.
    pub seq: u64,
    pub records: Vec<RawRecord>,
}

impl Batch {
    pub fn new(seq: u64, records: Vec<RawRecord>) -> Self {
        Self { seq, records }
    }

    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Enrichment request names, one slot per record (empty when the record has no name).
    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|r| r.name().to_string()).collect()
    }
}

pub mod prelude {
    pub use super::{
        Batch, DocumentItems, DocumentLinks, EnrichmentKey, Error, IndexDocument, NameNormalizer,
        RawAttributes, RawRecord, Result,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_distinguishes_missing_data_from_empty_name() {
        let missing: RawRecord = serde_json::from_str(r#"{"_id":"a1"}"#).unwrap();
        assert!(missing.attributes.is_none());
        assert_eq!(missing.name(), "");

        let empty: RawRecord = serde_json::from_str(r#"{"_id":"a2","data":{"company_number":"01"}}"#).unwrap();
        let attrs = empty.attributes.as_ref().unwrap();
        assert_eq!(attrs.name, "");
        assert_eq!(attrs.number, "01");
    }

    #[test]
    fn document_wire_shape_omits_empty_optionals_and_id() {
        let doc = IndexDocument {
            id: "X1".into(),
            record_type: "ltd".into(),
            items: DocumentItems {
                number: "X1".into(),
                status: String::new(),
                name: "ACME".into(),
                name_stem: "ACME".into(),
                name_suffix: String::new(),
                record_type: RECORD_TYPE.into(),
                equivalence_key: "ACME".into(),
                ordering_key: "ACME0".into(),
            },
            kind: RECORD_KIND.into(),
            links: DocumentLinks { self_link: self_link("X1") },
            ordering_key_with_id: ordering_key_with_id("ACME0", "X1"),
        };
        let v = serde_json::to_value(&doc).unwrap();
        assert!(v.get("id").is_none());
        assert!(v["items"].get("company_status").is_none());
        assert!(v["items"].get("corporate_name_ending").is_none());
        assert_eq!(v["links"]["self"], "/company/X1");
        assert_eq!(v["ordered_alpha_key_with_id"], "ACME0:X1");
        assert_eq!(v["company_type"], "ltd");
    }

    #[test]
    fn batch_names_keep_one_slot_per_record() {
        let b = Batch::new(0, vec![
            RawRecord::new("1", Some(RawAttributes { name: "A".into(), ..Default::default() })),
            RawRecord::new("2", None),
            RawRecord::new("3", Some(RawAttributes::default())),
        ]);
        assert_eq!(b.names(), vec!["A".to_string(), String::new(), String::new()]);
    }
}
