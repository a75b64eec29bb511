//! Record to index-document mapping.

use std::sync::Arc;

use bindex_core::{
    ordering_key_with_id, self_link, DocumentItems, DocumentLinks, EnrichmentKey, IndexDocument,
    LegalSuffixNormalizer, NameNormalizer, RawRecord, RECORD_KIND, RECORD_TYPE,
};
use bindex_diag::{DiagnosticSink, SinkKind};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingAttributes,
    MissingName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformed {
    Document(IndexDocument),
    Skipped(SkipReason),
}

impl Transformed {
    pub fn into_document(self) -> Option<IndexDocument> {
        match self {
            Transformed::Document(d) => Some(d),
            Transformed::Skipped(_) => None,
        }
    }
}

pub struct Transformer {
    normalizer: Arc<dyn NameNormalizer>,
    sinks: Arc<dyn DiagnosticSink>,
}

impl Transformer {
    pub fn new(sinks: Arc<dyn DiagnosticSink>) -> Self {
        Self { normalizer: Arc::new(LegalSuffixNormalizer), sinks }
    }

    pub fn with_normalizer(normalizer: Arc<dyn NameNormalizer>, sinks: Arc<dyn DiagnosticSink>) -> Self {
        Self { normalizer, sinks }
    }

    /// Build the index document for `record`, or skip it when it has no attributes or no name.
    /// Each skip leaves one entry in the sink for its reason.
    pub fn transform(&self, record: &RawRecord, key: &EnrichmentKey) -> Transformed {
        let Some(attrs) = record.attributes.as_ref() else {
            debug!(id = %record.id, "missing company data element");
            self.sinks.append(SinkKind::MissingAttributes, &record.id);
            return Transformed::Skipped(SkipReason::MissingAttributes);
        };
        if attrs.name.is_empty() {
            self.sinks.append(SinkKind::MissingName, &record.id);
            return Transformed::Skipped(SkipReason::MissingName);
        }

        let (name_stem, name_suffix) = self.normalizer.normalize(&attrs.name);
        Transformed::Document(IndexDocument {
            id: record.id.clone(),
            record_type: attrs.kind.clone(),
            items: DocumentItems {
                number: attrs.number.clone(),
                status: attrs.status.clone(),
                name: attrs.name.clone(),
                name_stem,
                name_suffix,
                record_type: RECORD_TYPE.to_string(),
                equivalence_key: key.equivalence_key.clone(),
                ordering_key: key.ordering_key.clone(),
            },
            kind: RECORD_KIND.to_string(),
            links: DocumentLinks { self_link: self_link(&record.id) },
            ordering_key_with_id: ordering_key_with_id(&key.ordering_key, &record.id),
        })
    }
}
