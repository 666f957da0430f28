// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stored records and their typed metadata.
//!
//! On disk every metadata object carries a `type` discriminator. Known types
//! are parsed into structured variants; anything else is kept verbatim so
//! snapshots written by other tools survive a load/persist cycle.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::StoreError;

pub const TYPE_KEY: &str = "type";
pub const BUSINESS_ANALYSIS: &str = "business_analysis";
pub const RISK_PROFILE: &str = "risk_profile";
pub const LEGAL_DOCUMENT: &str = "legal_document";
pub const JURISDICTION_KEY: &str = "jurisdiction";

/// Metadata for a chunk of a business description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessAnalysisMeta {
    #[serde(default)]
    pub analysis: Value,
}

/// Metadata for a risk profile anchored on `"{domain}_{geography}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfileMeta {
    pub domain: String,
    pub geography: String,
    #[serde(default)]
    pub profile: Value,
}

/// Metadata for a chunk of a legal document.
///
/// Caller-supplied fields other than `jurisdiction` are kept in `extra` and
/// written next to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegalDocumentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LegalDocumentMeta {
    pub fn new(jurisdiction: Option<&str>) -> Self {
        Self {
            jurisdiction: jurisdiction.map(str::to_string),
            extra: Map::new(),
        }
    }

    /// Adds a caller field. `type` is reserved and ignored. A string (or null)
    /// `jurisdiction` sets the typed field; any other value is kept in `extra`
    /// and rejected by [`LegalDocumentMeta::validate`].
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match (key.as_str(), value) {
            (TYPE_KEY, _) => {}
            (JURISDICTION_KEY, Value::String(jurisdiction)) => {
                self.extra.remove(JURISDICTION_KEY);
                self.jurisdiction = Some(jurisdiction);
            }
            (JURISDICTION_KEY, Value::Null) => {
                self.extra.remove(JURISDICTION_KEY);
                self.jurisdiction = None;
            }
            (_, value) => {
                self.extra.insert(key, value);
            }
        }
        self
    }

    /// Rejects caller fields that would collide with the typed ones on disk.
    pub fn validate(&self) -> crate::errors::Result<()> {
        if let Some(value) = self.extra.get(JURISDICTION_KEY) {
            return Err(StoreError::invalid_config(format!(
                "legal document jurisdiction must be a string, got {}",
                value
            )));
        }
        if self.extra.contains_key(TYPE_KEY) {
            return Err(StoreError::invalid_config(
                "legal document metadata may not set 'type'",
            ));
        }
        Ok(())
    }

    /// Builds legal metadata from an arbitrary caller map.
    pub fn from_map(mut map: Map<String, Value>) -> serde_json::Result<Self> {
        map.remove(TYPE_KEY);
        serde_json::from_value(Value::Object(map))
    }
}

/// Metadata attached to a record, keyed by its `type` discriminator.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordMetadata {
    BusinessAnalysis(BusinessAnalysisMeta),
    RiskProfile(RiskProfileMeta),
    LegalDocument(LegalDocumentMeta),
    /// Unknown or missing `type`; the original object is preserved.
    Other(Map<String, Value>),
}

impl RecordMetadata {
    /// The `type` discriminator, if any.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            RecordMetadata::BusinessAnalysis(_) => Some(BUSINESS_ANALYSIS),
            RecordMetadata::RiskProfile(_) => Some(RISK_PROFILE),
            RecordMetadata::LegalDocument(_) => Some(LEGAL_DOCUMENT),
            RecordMetadata::Other(map) => map.get(TYPE_KEY).and_then(Value::as_str),
        }
    }

    pub fn jurisdiction(&self) -> Option<&str> {
        match self {
            RecordMetadata::LegalDocument(meta) => meta.jurisdiction.as_deref(),
            _ => None,
        }
    }

    pub fn is_legal_document(&self) -> bool {
        matches!(self, RecordMetadata::LegalDocument(_))
    }

    /// Converts to the JSON object stored in snapshots.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let (type_name, body) = match self {
            RecordMetadata::BusinessAnalysis(meta) => {
                (BUSINESS_ANALYSIS, serde_json::to_value(meta)?)
            }
            RecordMetadata::RiskProfile(meta) => (RISK_PROFILE, serde_json::to_value(meta)?),
            RecordMetadata::LegalDocument(meta) => (LEGAL_DOCUMENT, serde_json::to_value(meta)?),
            RecordMetadata::Other(map) => return Ok(Value::Object(map.clone())),
        };

        let mut map = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.insert(TYPE_KEY.to_string(), Value::String(type_name.to_string()));
        Ok(Value::Object(map))
    }

    /// Parses a snapshot metadata object.
    pub fn from_map(mut map: Map<String, Value>) -> serde_json::Result<Self> {
        let type_name = map.get(TYPE_KEY).and_then(Value::as_str).map(str::to_string);
        let parsed = match type_name.as_deref() {
            Some(BUSINESS_ANALYSIS) => {
                map.remove(TYPE_KEY);
                RecordMetadata::BusinessAnalysis(serde_json::from_value(Value::Object(map))?)
            }
            Some(RISK_PROFILE) => {
                map.remove(TYPE_KEY);
                RecordMetadata::RiskProfile(serde_json::from_value(Value::Object(map))?)
            }
            Some(LEGAL_DOCUMENT) => {
                RecordMetadata::LegalDocument(LegalDocumentMeta::from_map(map)?)
            }
            _ => RecordMetadata::Other(map),
        };
        Ok(parsed)
    }
}

impl Serialize for RecordMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as _;
        self.to_value()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RecordMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        RecordMetadata::from_map(map).map_err(D::Error::custom)
    }
}

/// One stored (text, vector, metadata) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// Read-only projection of a record returned by searches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: RecordMetadata,
}

/// A search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document: Document,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
    /// Insertion position of the matching record.
    pub index: usize,
}

/// A legal document match, shaped as `{content, metadata, similarity}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegalMatch {
    pub content: String,
    pub metadata: RecordMetadata,
    pub similarity: f32,
}

impl From<SearchHit> for LegalMatch {
    fn from(hit: SearchHit) -> Self {
        Self {
            content: hit.document.page_content,
            metadata: hit.document.metadata,
            similarity: hit.score,
        }
    }
}
