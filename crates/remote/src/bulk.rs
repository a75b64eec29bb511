//! Newline-delimited bulk payloads and the per-item bulk response.

use std::collections::HashMap;

use bindex_core::{Error, IndexDocument, Result};
use serde::{Deserialize, Serialize};

/// Status the search engine reports for a freshly created document.
pub const CREATED: u16 = 201;

#[derive(Serialize)]
struct CreateAction<'a> {
    create: CreateMeta<'a>,
}

#[derive(Serialize)]
struct CreateMeta<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
}

/// A bulk body of `create` directives plus the matching id listing for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct BulkPayload {
    body: Vec<u8>,
    audit: String,
    docs: usize,
}

impl BulkPayload {
    pub fn new() -> Self { Self::default() }

    pub fn with_capacity(docs: usize) -> Self {
        Self { body: Vec::with_capacity(docs * 512), audit: String::with_capacity(docs * 12), docs: 0 }
    }

    /// Append a `create` directive line and the serialized document line.
    pub fn push(&mut self, doc: &IndexDocument) -> Result<()> {
        let encode = |source| Error::Encode { id: doc.id.clone(), source };
        let action = serde_json::to_vec(&CreateAction { create: CreateMeta { id: &doc.id } }).map_err(encode)?;
        let body = serde_json::to_vec(doc).map_err(encode)?;
        self.body.extend_from_slice(&action);
        self.body.push(b'\n');
        self.body.extend_from_slice(&body);
        self.body.push(b'\n');
        if !self.audit.is_empty() { self.audit.push('\n'); }
        self.audit.push_str(&doc.id);
        self.docs += 1;
        Ok(())
    }

    pub fn len(&self) -> usize { self.docs }
    pub fn is_empty(&self) -> bool { self.docs == 0 }
    pub fn as_bytes(&self) -> &[u8] { &self.body }

    /// Newline-joined ids of the documents in this payload.
    pub fn audit_trail(&self) -> &str { &self.audit }

    pub fn into_parts(self) -> (Vec<u8>, String) { (self.body, self.audit) }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkItem {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl BulkItem {
    /// Human-readable rejection reason, if the engine supplied one.
    pub fn reason(&self) -> String {
        match &self.error {
            None => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Object(o)) => match (o.get("type").and_then(|v| v.as_str()), o.get("reason").and_then(|v| v.as_str())) {
                (Some(t), Some(r)) => format!("{}: {}", t, r),
                (None, Some(r)) => r.to_string(),
                _ => serde_json::Value::Object(o.clone()).to_string(),
            },
            Some(other) => other.to_string(),
        }
    }
}

/// Bulk API response; items report per-document status even when the call succeeded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkItem>>,
}

impl BulkResponse {
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(Error::ResponseDecode)
    }

    fn creates(&self) -> impl Iterator<Item = &BulkItem> + '_ {
        self.items.iter().filter_map(|m| m.get("create"))
    }

    /// First item not reported as created. Only consulted when `errors` is set.
    /// Every action sent is a `create`; an item of any other shape reads as status 0.
    pub fn first_rejection(&self) -> Option<BulkItem> {
        if !self.errors { return None; }
        self.items.iter().find_map(|m| match m.get("create") {
            Some(item) if item.status == CREATED => None,
            Some(item) => Some(item.clone()),
            None => {
                let other = m.values().next();
                Some(BulkItem {
                    index: other.map(|i| i.index.clone()).unwrap_or_default(),
                    id: other.map(|i| i.id.clone()).unwrap_or_default(),
                    status: 0,
                    error: other.and_then(|i| i.error.clone()),
                })
            }
        })
    }

    pub fn created(&self) -> usize {
        self.creates().filter(|i| i.status == CREATED).count()
    }
}
