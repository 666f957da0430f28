// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory ingestion for legal documents
//!
//! Every `.txt` file under a directory becomes a legal document whose
//! metadata records the file it came from.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::store::{LegalDocumentMeta, SemanticStore};

/// Ingestion parameters
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Jurisdiction attached to every ingested document
    pub jurisdiction: Option<String>,
    /// Descend into subdirectories
    pub recursive: bool,
    /// File extension to pick up, without the dot
    pub extension: String,
    /// Draw a progress bar on stderr
    pub progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            jurisdiction: None,
            recursive: false,
            extension: "txt".to_string(),
            progress: false,
        }
    }
}

/// Outcome of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files: usize,
    pub records: usize,
    pub skipped: Vec<PathBuf>,
}

/// Lists matching files under `dir`, sorted so ingestion order is stable.
pub fn collect_files(dir: &Path, options: &IngestOptions) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&options.extension))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Adds every matching file under `dir` to `store` as a legal document.
///
/// Unreadable and empty files are skipped and reported. An embedding or
/// persistence failure stops the run; files added before it stay stored.
pub fn ingest_dir(
    store: &mut SemanticStore,
    dir: &Path,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let files = collect_files(dir, options)?;
    let mut report = IngestReport::default();

    let pb = if options.progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} files | Ingesting {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("##."),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    for path in &files {
        pb.set_message(path.display().to_string());
        let content = match std::fs::read_to_string(path) {
            Ok(content) if !content.trim().is_empty() => content,
            Ok(_) => {
                debug!(path = %path.display(), "skipping empty file");
                report.skipped.push(path.clone());
                pb.inc(1);
                continue;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                report.skipped.push(path.clone());
                pb.inc(1);
                continue;
            }
        };

        let metadata = LegalDocumentMeta::new(options.jurisdiction.as_deref())
            .with_field("source", path.display().to_string());
        let added = store
            .add_legal_document(&content, metadata)
            .with_context(|| format!("Failed to ingest {}", path.display()))?;

        report.files += 1;
        report.records += added;
        pb.inc(1);
    }

    pb.finish_and_clear();
    debug!(files = report.files, records = report.records, "ingestion finished");
    Ok(report)
}
