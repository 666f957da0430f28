// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic document store.
//!
//! An append-only list of records mirrored to a JSON snapshot. Adds chunk,
//! embed, append and persist; searches embed the query once and rank every
//! record by cosine similarity.
//!
//! Mutating calls take `&mut self`, so one instance is never written from two
//! places at once. Two processes sharing a snapshot path can still lose
//! updates; give each process its own store or wrap one in a lock.

pub mod record;
pub mod similarity;
pub mod snapshot;

use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::embedding::{ChunkConfig, EmbeddingProvider, TaskType, TextChunker};
use crate::errors::{Result, StoreError};

pub use record::{
    BusinessAnalysisMeta, Document, LegalDocumentMeta, LegalMatch, Record, RecordMetadata,
    RiskProfileMeta, SearchHit,
};
pub use similarity::cosine_similarity;

/// Default number of hits for [`SemanticStore::similarity_search`].
pub const DEFAULT_SEARCH_K: usize = 3;

/// Default number of candidates for [`SemanticStore::search_legal_documents`].
pub const DEFAULT_LEGAL_K: usize = 5;

/// Default score gate for the `find_similar_*` lookups.
pub const DEFAULT_THRESHOLD: f32 = 0.8;

/// Builds the anchor key a risk profile is stored and looked up under.
pub fn risk_profile_key(domain: &str, geography: &str) -> String {
    format!("{}_{}", domain, geography)
}

/// Knobs that shape how a store chunks and embeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    pub chunk: ChunkConfig,
    /// Task hint used when embedding stored text.
    pub document_task: TaskType,
    /// Task hint used when embedding queries.
    pub query_task: TaskType,
}

/// Record counts by metadata type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub business_analyses: usize,
    pub risk_profiles: usize,
    pub legal_documents: usize,
    pub other: usize,
    pub dimension: Option<usize>,
}

/// Brute-force semantic store backed by a JSON snapshot.
pub struct SemanticStore {
    path: PathBuf,
    records: Vec<Record>,
    chunker: TextChunker,
    provider: Box<dyn EmbeddingProvider>,
    options: StoreOptions,
}

impl SemanticStore {
    /// Opens the store at `path` with default chunking (1000 / 200).
    pub fn open<P: AsRef<Path>>(path: P, provider: Box<dyn EmbeddingProvider>) -> Result<Self> {
        Self::open_with(path, provider, StoreOptions::default())
    }

    /// Opens the store at `path`, loading the snapshot if one exists.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        provider: Box<dyn EmbeddingProvider>,
        options: StoreOptions,
    ) -> Result<Self> {
        // Re-validate in case the caller built the config by hand.
        let chunk = ChunkConfig::new(options.chunk.chunk_size, options.chunk.chunk_overlap)?;

        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            records: Vec::new(),
            chunker: TextChunker::new(chunk),
            provider,
            options,
        };
        store.load()?;
        Ok(store)
    }

    /// Replaces the in-memory records with the snapshot on disk.
    pub fn load(&mut self) -> Result<()> {
        let records = snapshot::read(&self.path)?;
        if let Some(dim) = records.first().map(|r| r.vector.len()) {
            if let Some(i) = records.iter().position(|r| r.vector.len() != dim) {
                return Err(StoreError::corrupt(
                    &self.path,
                    format!(
                        "vectors[{}] has {} dimensions, expected {}",
                        i,
                        records[i].vector.len(),
                        dim
                    ),
                ));
            }
        }
        info!(path = %self.path.display(), records = records.len(), "store loaded");
        self.records = records;
        Ok(())
    }

    /// Writes the full store to its snapshot path.
    pub fn persist(&self) -> Result<()> {
        snapshot::write(&self.path, &self.records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Embedding dimension of the stored vectors, if any are stored.
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.vector.len())
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn chunk_config(&self) -> &ChunkConfig {
        self.chunker.config()
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: self.records.len(),
            dimension: self.dimension(),
            ..Default::default()
        };
        for record in &self.records {
            match record.metadata {
                RecordMetadata::BusinessAnalysis(_) => stats.business_analyses += 1,
                RecordMetadata::RiskProfile(_) => stats.risk_profiles += 1,
                RecordMetadata::LegalDocument(_) => stats.legal_documents += 1,
                RecordMetadata::Other(_) => stats.other += 1,
            }
        }
        stats
    }

    /// Chunks `description` and stores one record per chunk, each carrying
    /// the same `analysis`. Returns the number of records added.
    pub fn add_business_analysis(&mut self, description: &str, analysis: Value) -> Result<usize> {
        let chunks = self.chunker.split(description);
        let meta = RecordMetadata::BusinessAnalysis(BusinessAnalysisMeta { analysis });
        self.append_chunks(chunks, meta)
    }

    /// Stores one record anchored on `"{domain}_{geography}"`. The anchor key,
    /// not the profile content, is what gets embedded.
    pub fn add_risk_profile(
        &mut self,
        domain: &str,
        geography: &str,
        profile: Value,
    ) -> Result<()> {
        let key = risk_profile_key(domain, geography);
        let meta = RecordMetadata::RiskProfile(RiskProfileMeta {
            domain: domain.to_string(),
            geography: geography.to_string(),
            profile,
        });
        self.append_chunks(vec![key], meta)?;
        Ok(())
    }

    /// Chunks `content` and stores one record per chunk with the caller's
    /// metadata tagged as a legal document. Returns the number of records added.
    pub fn add_legal_document(
        &mut self,
        content: &str,
        metadata: LegalDocumentMeta,
    ) -> Result<usize> {
        metadata.validate()?;
        let chunks = self.chunker.split(content);
        self.append_chunks(chunks, RecordMetadata::LegalDocument(metadata))
    }

    /// Stores each text whole, without chunking. Empty texts are skipped.
    pub fn add_texts<I>(&mut self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = (String, RecordMetadata)>,
    {
        let (texts, metas): (Vec<String>, Vec<RecordMetadata>) =
            items.into_iter().filter(|(text, _)| !text.is_empty()).unzip();
        if texts.is_empty() {
            return Ok(0);
        }
        for metadata in &metas {
            if let RecordMetadata::LegalDocument(meta) = metadata {
                meta.validate()?;
            }
        }

        let vectors = self.embed_all(&texts, self.options.document_task)?;
        let added = texts.len();
        self.records.extend(
            texts
                .into_iter()
                .zip(vectors)
                .zip(metas)
                .map(|((text, vector), metadata)| Record {
                    text,
                    vector,
                    metadata,
                }),
        );
        debug!(added, total = self.records.len(), "texts added");
        self.persist()?;
        Ok(added)
    }

    /// Embeds every chunk first, then appends them all and persists once.
    /// An embedding failure leaves the store untouched.
    fn append_chunks(&mut self, chunks: Vec<String>, metadata: RecordMetadata) -> Result<usize> {
        if chunks.is_empty() {
            debug!("nothing to add");
            return Ok(0);
        }

        let vectors = self.embed_all(&chunks, self.options.document_task)?;
        let added = chunks.len();
        self.records
            .extend(chunks.into_iter().zip(vectors).map(|(text, vector)| Record {
                text,
                vector,
                metadata: metadata.clone(),
            }));
        debug!(
            added,
            total = self.records.len(),
            kind = metadata.type_name().unwrap_or("untyped"),
            "records added"
        );
        self.persist()?;
        Ok(added)
    }

    /// Embeds `texts` and checks every vector against the store's dimension.
    fn embed_all(&mut self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.provider.batch_size().max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let embedded = self
                .provider
                .embed_texts(batch, task)
                .map_err(StoreError::embedding)?;
            if embedded.len() != batch.len() {
                return Err(StoreError::embedding(anyhow::anyhow!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        let expected = self
            .dimension()
            .or_else(|| vectors.first().map(Vec::len))
            .unwrap_or(0);
        for vector in &vectors {
            self.check_vector(vector, expected)?;
        }
        Ok(vectors)
    }

    fn check_vector(&self, vector: &[f32], expected: usize) -> Result<()> {
        if vector.is_empty() {
            return Err(StoreError::embedding(anyhow::anyhow!(
                "embedding service returned an empty vector"
            )));
        }
        if vector.len() != expected {
            return Err(StoreError::embedding(anyhow::anyhow!(
                "embedding has {} dimensions, store uses {}",
                vector.len(),
                expected
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(StoreError::embedding(anyhow::anyhow!(
                "embedding contains non-finite values"
            )));
        }
        Ok(())
    }

    /// Returns up to `k` records most similar to `query`, best first. Equal
    /// scores keep insertion order. An empty store returns no hits without
    /// calling the embedding service.
    pub fn similarity_search(&mut self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .provider
            .embed_one(query, self.options.query_task)
            .map_err(StoreError::embedding)?;
        let expected = self.dimension().unwrap_or(0);
        self.check_vector(&query_vector, expected)?;

        let ranked = similarity::rank_top_k(
            &query_vector,
            self.records.iter().map(|r| r.vector.as_slice()),
            k,
        );
        debug!(k, hits = ranked.len(), scanned = self.records.len(), "similarity search");

        Ok(ranked
            .into_iter()
            .map(|(index, score)| {
                let record = &self.records[index];
                SearchHit {
                    document: Document {
                        page_content: record.text.clone(),
                        metadata: record.metadata.clone(),
                    },
                    score,
                    index,
                }
            })
            .collect())
    }

    /// Ranks the top `k` records, then keeps the legal documents among them,
    /// optionally only those whose jurisdiction matches exactly.
    ///
    /// Filtering runs after ranking, so fewer than `k` matches (or none) can
    /// come back even when more legal documents are stored.
    pub fn search_legal_documents(
        &mut self,
        query: &str,
        jurisdiction: Option<&str>,
        k: usize,
    ) -> Result<Vec<LegalMatch>> {
        let hits = self.similarity_search(query, k)?;
        Ok(hits
            .into_iter()
            .filter(|hit| hit.document.metadata.is_legal_document())
            .filter(|hit| {
                jurisdiction.is_none() || hit.document.metadata.jurisdiction() == jurisdiction
            })
            .map(LegalMatch::from)
            .collect())
    }

    /// Returns the stored analysis of the closest record if it is a business
    /// analysis scoring at least `threshold`.
    pub fn find_similar_business(
        &mut self,
        description: &str,
        threshold: f32,
    ) -> Result<Option<Value>> {
        let best = self.similarity_search(description, 1)?.into_iter().next();
        Ok(best.and_then(|hit| match hit.document.metadata {
            RecordMetadata::BusinessAnalysis(meta) if hit.score >= threshold => Some(meta.analysis),
            _ => {
                debug!(score = hit.score, threshold, "no business analysis above threshold");
                None
            }
        }))
    }

    /// Looks up a risk profile by its `"{domain}_{geography}"` anchor. This is
    /// a near-exact key match rather than a search over profile content.
    pub fn find_similar_risk_profile(
        &mut self,
        domain: &str,
        geography: &str,
        threshold: f32,
    ) -> Result<Option<Value>> {
        let key = risk_profile_key(domain, geography);
        let best = self.similarity_search(&key, 1)?.into_iter().next();
        Ok(best.and_then(|hit| match hit.document.metadata {
            RecordMetadata::RiskProfile(meta) if hit.score >= threshold => Some(meta.profile),
            _ => {
                debug!(score = hit.score, threshold, "no risk profile above threshold");
                None
            }
        }))
    }
}
