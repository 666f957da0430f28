// SPDX-License-Identifier: MIT OR Apache-2.0

//! semstore - Semantic document store
//!
//! Command-line front end over the `semstore` library: add documents, search
//! them, and look up cached analyses.

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use commands::Session;
use semstore::config::Config;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize tracing with SEMSTORE_LOG env var (e.g., SEMSTORE_LOG=debug semstore stats)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SEMSTORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "semstore", &mut std::io::stdout());
        return Ok(());
    }

    let config = Config::load()?;
    let session = Session::new(config, cli.store.as_deref(), cli.format, cli.compact);

    match cli.command {
        Commands::AddBusiness {
            description,
            analysis,
        } => session.add_business(&description, &analysis)?,
        Commands::AddRisk {
            domain,
            geography,
            profile,
        } => session.add_risk(&domain, &geography, &profile)?,
        Commands::AddLegal {
            content,
            file,
            jurisdiction,
            fields,
        } => session.add_legal(
            content.as_deref(),
            file.as_deref(),
            jurisdiction.as_deref(),
            &fields,
        )?,
        Commands::Ingest {
            dir,
            jurisdiction,
            recursive,
            extension,
        } => session.ingest(&dir, jurisdiction, recursive, extension)?,
        Commands::Search { query, k } => session.search(&query, k)?,
        Commands::SearchLegal {
            query,
            jurisdiction,
            k,
        } => session.search_legal(&query, jurisdiction.as_deref(), k)?,
        Commands::FindBusiness {
            description,
            threshold,
        } => session.find_business(&description, threshold)?,
        Commands::FindRisk {
            domain,
            geography,
            threshold,
        } => session.find_risk(&domain, &geography, threshold)?,
        Commands::Stats => session.stats()?,
        Commands::Config => session.show_config()?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
