// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command handlers for the semstore binary

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use semstore::config::Config;
use semstore::embedding::DummyProvider;
use semstore::ingest::{ingest_dir, IngestOptions};
use semstore::output::{
    colorize_context, colorize_kind, colorize_path, colorize_score, print_json, preview,
    use_colors,
};
use semstore::store::{LegalDocumentMeta, SemanticStore};

/// Characters of record text shown per hit in text output
const PREVIEW_CHARS: usize = 160;

/// Settings shared by every command in one invocation
pub struct Session {
    config: Config,
    store_path: PathBuf,
    format: OutputFormat,
    compact: bool,
    use_color: bool,
}

#[derive(Serialize)]
struct AddResult<'a> {
    store: &'a Path,
    added: usize,
    total: usize,
}

#[derive(Serialize)]
struct LookupResult<'a> {
    found: bool,
    threshold: f32,
    value: Option<&'a Value>,
}

impl Session {
    pub fn new(
        config: Config,
        cli_store: Option<&Path>,
        format: OutputFormat,
        compact: bool,
    ) -> Self {
        let store_path = config.store_path(cli_store);
        Self {
            config,
            store_path,
            format,
            compact,
            use_color: use_colors(),
        }
    }

    fn open_store(&self) -> Result<SemanticStore> {
        let provider = self.config.build_provider()?;
        let options = self.config.store_options()?;
        SemanticStore::open_with(&self.store_path, provider, options)
            .with_context(|| format!("Failed to open store {}", self.store_path.display()))
    }

    fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn report_added(&self, store: &SemanticStore, added: usize) -> Result<()> {
        if self.is_json() {
            return print_json(
                &AddResult {
                    store: store.path(),
                    added,
                    total: store.len(),
                },
                self.compact,
            );
        }
        println!(
            "{} Added {} record(s) to {} ({} total)",
            "✓".green(),
            added,
            colorize_path(&store.path().display().to_string(), self.use_color),
            store.len()
        );
        Ok(())
    }

    pub fn add_business(&self, description: &str, analysis: &str) -> Result<()> {
        let analysis = parse_json_arg("--analysis", analysis)?;
        let mut store = self.open_store()?;
        let added = store.add_business_analysis(description, analysis)?;
        self.report_added(&store, added)
    }

    pub fn add_risk(&self, domain: &str, geography: &str, profile: &str) -> Result<()> {
        let profile = parse_json_arg("--profile", profile)?;
        let mut store = self.open_store()?;
        store.add_risk_profile(domain, geography, profile)?;
        self.report_added(&store, 1)
    }

    pub fn add_legal(
        &self,
        content: Option<&str>,
        file: Option<&Path>,
        jurisdiction: Option<&str>,
        fields: &[String],
    ) -> Result<()> {
        let mut metadata = LegalDocumentMeta::new(jurisdiction);
        let text = match (content, file) {
            (Some(text), _) => text.to_string(),
            (None, Some(path)) => {
                metadata = metadata.with_field("source", path.display().to_string());
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?
            }
            (None, None) => anyhow::bail!("Provide document text or --file"),
        };
        for field in fields {
            let (key, value) = field
                .split_once('=')
                .with_context(|| format!("Invalid --field '{}', expected KEY=VALUE", field))?;
            metadata = metadata.with_field(key.trim(), value.to_string());
        }

        let mut store = self.open_store()?;
        let added = store.add_legal_document(&text, metadata)?;
        self.report_added(&store, added)
    }

    pub fn ingest(
        &self,
        dir: &Path,
        jurisdiction: Option<String>,
        recursive: bool,
        extension: String,
    ) -> Result<()> {
        let mut store = self.open_store()?;
        let options = IngestOptions {
            jurisdiction,
            recursive,
            extension: extension.trim_start_matches('.').to_string(),
            progress: !self.is_json(),
        };
        let report = ingest_dir(&mut store, dir, &options)?;

        if self.is_json() {
            return print_json(&report, self.compact);
        }
        println!(
            "{} Ingested {} file(s) into {} record(s)",
            "✓".green(),
            report.files,
            report.records
        );
        for path in &report.skipped {
            println!(
                "  {} {}",
                colorize_context("skipped", self.use_color),
                colorize_path(&path.display().to_string(), self.use_color)
            );
        }
        Ok(())
    }

    pub fn search(&self, query: &str, k: Option<usize>) -> Result<()> {
        let k = k.unwrap_or_else(|| self.config.search.k());
        let mut store = self.open_store()?;
        let hits = store.similarity_search(query, k)?;

        if self.is_json() {
            return print_json(&hits, self.compact);
        }
        if hits.is_empty() {
            println!("{} No matches for: {}", "✗".red(), query.yellow());
            return Ok(());
        }
        let threshold = self.config.search.threshold();
        for (rank, hit) in hits.iter().enumerate() {
            println!(
                "{:>3}. {} {} {}",
                rank + 1,
                colorize_score(hit.score, threshold, self.use_color),
                colorize_kind(
                    hit.document.metadata.type_name().unwrap_or("untyped"),
                    self.use_color
                ),
                preview(&hit.document.page_content, PREVIEW_CHARS)
            );
        }
        Ok(())
    }

    pub fn search_legal(
        &self,
        query: &str,
        jurisdiction: Option<&str>,
        k: Option<usize>,
    ) -> Result<()> {
        let k = k.unwrap_or_else(|| self.config.search.legal_k());
        let mut store = self.open_store()?;
        let matches = store.search_legal_documents(query, jurisdiction, k)?;

        if self.is_json() {
            return print_json(&matches, self.compact);
        }
        if matches.is_empty() {
            println!("{} No legal documents for: {}", "✗".red(), query.yellow());
            return Ok(());
        }
        let threshold = self.config.search.threshold();
        for (rank, m) in matches.iter().enumerate() {
            println!(
                "{:>3}. {} {} {}",
                rank + 1,
                colorize_score(m.similarity, threshold, self.use_color),
                colorize_kind(m.metadata.jurisdiction().unwrap_or("-"), self.use_color),
                preview(&m.content, PREVIEW_CHARS)
            );
        }
        Ok(())
    }

    pub fn find_business(&self, description: &str, threshold: Option<f32>) -> Result<()> {
        let threshold = threshold.unwrap_or_else(|| self.config.search.threshold());
        let mut store = self.open_store()?;
        let found = store.find_similar_business(description, threshold)?;
        self.report_lookup(found.as_ref(), threshold, "business analysis")
    }

    pub fn find_risk(&self, domain: &str, geography: &str, threshold: Option<f32>) -> Result<()> {
        let threshold = threshold.unwrap_or_else(|| self.config.search.threshold());
        let mut store = self.open_store()?;
        let found = store.find_similar_risk_profile(domain, geography, threshold)?;
        self.report_lookup(found.as_ref(), threshold, "risk profile")
    }

    fn report_lookup(&self, found: Option<&Value>, threshold: f32, what: &str) -> Result<()> {
        if self.is_json() {
            return print_json(
                &LookupResult {
                    found: found.is_some(),
                    threshold,
                    value: found,
                },
                self.compact,
            );
        }
        match found {
            Some(value) => {
                println!("{} Found cached {}", "✓".green(), what);
                println!("{}", serde_json::to_string_pretty(value)?);
            }
            None => println!(
                "{} No {} at or above {:.2}",
                "✗".red(),
                what,
                threshold
            ),
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<()> {
        // Counting needs no embeddings, so skip provider setup and API keys.
        let store = SemanticStore::open_with(
            &self.store_path,
            Box::new(DummyProvider::new(1)),
            self.config.store_options()?,
        )
        .with_context(|| format!("Failed to open store {}", self.store_path.display()))?;
        let stats = store.stats();

        if self.is_json() {
            return print_json(&stats, self.compact);
        }
        println!(
            "{}",
            colorize_path(&store.path().display().to_string(), self.use_color)
        );
        println!("  records:            {}", stats.total);
        println!("  business analyses:  {}", stats.business_analyses);
        println!("  risk profiles:      {}", stats.risk_profiles);
        println!("  legal documents:    {}", stats.legal_documents);
        println!("  other:              {}", stats.other);
        match stats.dimension {
            Some(dim) => println!("  dimension:          {}", dim),
            None => println!("  dimension:          -"),
        }
        Ok(())
    }

    pub fn show_config(&self) -> Result<()> {
        let resolved = self.config.resolved(Some(&self.store_path));
        if self.is_json() {
            return print_json(&resolved, self.compact);
        }
        let source = resolved
            .source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string());
        println!("config:          {}", colorize_path(&source, self.use_color));
        println!("store:           {}", resolved.store_path.display());
        println!(
            "chunking:        {} chars, {} overlap",
            resolved.chunk_size, resolved.chunk_overlap
        );
        println!(
            "embeddings:      {:?} ({})",
            resolved.provider, resolved.model
        );
        println!("query task:      {}", resolved.query_task_type);
        println!(
            "search:          k={} legal_k={} threshold={}",
            resolved.k, resolved.legal_k, resolved.threshold
        );
        Ok(())
    }
}

fn parse_json_arg(flag: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{} is not valid JSON", flag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_arg() {
        assert_eq!(
            parse_json_arg("--analysis", r#"{"risk": "low"}"#).unwrap()["risk"],
            "low"
        );
        let err = parse_json_arg("--profile", "{oops").unwrap_err();
        assert!(err.to_string().contains("--profile"));
    }
}
