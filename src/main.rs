// Entry point of course-eval-digest.
//
// **Architecture Overview:**
// - `core/` = The two workflows (Drive upload, batch summarization) and the
//   traits they depend on
// - `infra/` = Implementations of core traits (Google auth, Drive, Gemini, CSV)
// - `config.rs` = Command line and environment options
//
// This file's job is to:
// 1. Load configuration
// 2. Build the clients (dependency injection)
// 3. Run the requested workflow

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::{Cli, Command, DriveAuthArgs, SummarizeArgs, UploadArgs};
use crate::core::drive::{DriveService, UploadOutcome, UploadRequest};
use crate::core::summaries::summary_service::list_pdf_files;
use crate::core::summaries::{SummaryPrompt, SummaryService, SummaryStore};
use crate::infra::ai::{GeminiClient, GenerationConfig};
use crate::infra::drive::GoogleDriveClient;
use crate::infra::google_auth::{load_authenticator, AccessTokenProvider};
use crate::infra::summaries::CsvSummaryStore;
use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let timeout = cli.timeout();

    match cli.command {
        Command::Auth(args) => run_auth(&args).await,
        Command::Upload(args) => run_upload(args, timeout).await,
        Command::Summarize(args) => run_summarize(args, timeout).await,
    }
}

async fn authenticator(args: &DriveAuthArgs) -> anyhow::Result<Box<dyn AccessTokenProvider>> {
    load_authenticator(&args.credentials_path, &args.token_path)
        .await
        .with_context(|| {
            format!(
                "Failed to load Google credentials from {}",
                args.credentials_path.display()
            )
        })
}

async fn run_auth(args: &DriveAuthArgs) -> anyhow::Result<()> {
    let auth = authenticator(args).await?;
    auth.access_token()
        .await
        .context("Could not obtain a Google Drive session")?;
    tracing::info!("Google Drive session ready ({})", auth.describe());
    Ok(())
}

/// Expands folder arguments to the PDFs directly inside them.
async fn collect_upload_paths(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let is_dir = tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if is_dir {
            let mut found = list_pdf_files(path)
                .await
                .with_context(|| format!("Failed to list {}", path.display()))?;
            found.sort();
            tracing::info!("{} PDF(s) found in {}", found.len(), path.display());
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

async fn run_upload(args: UploadArgs, timeout: Duration) -> anyhow::Result<()> {
    let files = collect_upload_paths(&args.paths).await?;
    if args.name.is_some() && files.len() != 1 {
        bail!("--name can only be used when uploading exactly one file");
    }

    let client = GoogleDriveClient::new(authenticator(&args.auth).await?, timeout)
        .context("Failed to build the Drive client")?;
    let service = DriveService::new(client);

    let (mut uploaded, mut skipped) = (0usize, 0usize);
    let mut failures = Vec::new();
    for local_path in files {
        let request = UploadRequest {
            local_path,
            folder_id: args.drive_folder_id.clone(),
            name: args.name.clone(),
            overwrite_existing: args.overwrite_existing,
        };

        match service.upload(&request).await {
            UploadOutcome::Uploaded(file) => {
                uploaded += 1;
                // One line per upload on stdout so links can be piped elsewhere.
                println!(
                    "{}\t{}\t{}",
                    file.name,
                    file.id,
                    file.web_view_link.unwrap_or_default()
                );
            }
            UploadOutcome::Skipped { name } => {
                skipped += 1;
                tracing::debug!("Skipped {}", name);
            }
            UploadOutcome::Failed { reason } => {
                failures.push((request.local_path, reason));
            }
        }
    }

    tracing::info!(
        "Upload finished: {} uploaded, {} skipped, {} failed",
        uploaded,
        skipped,
        failures.len()
    );
    for (path, reason) in &failures {
        tracing::error!("  {}: {}", path.display(), reason);
    }
    Ok(())
}

async fn run_summarize(args: SummarizeArgs, timeout: Duration) -> anyhow::Result<()> {
    let prompt = match &args.prompt_file {
        Some(path) => SummaryPrompt::from_file(path)
            .await
            .with_context(|| format!("Failed to read prompt file {}", path.display()))?,
        None => SummaryPrompt::builtin(),
    };

    let store = CsvSummaryStore::open(&args.output_table).with_context(|| {
        format!(
            "Failed to open summary table {}",
            args.output_table.display()
        )
    })?;

    let gemini = GeminiClient::new(args.api_key.clone(), args.model_name.clone(), timeout)
        .context("Failed to build the Gemini client")?
        .with_generation_config(GenerationConfig {
            temperature: args.temperature,
            max_output_tokens: args.max_output_tokens,
        });

    tracing::info!("Summarizing with model {}", args.model_name);
    let service = SummaryService::new(gemini, store, prompt, args.summary_format());

    service
        .run_batch(&args.input_folder)
        .await
        .with_context(|| format!("Failed to read input folder {}", args.input_folder.display()))?;

    let rows = service.store().records().await?.len();
    tracing::info!(
        "{} now holds {} summary row(s)",
        args.output_table.display(),
        rows
    );
    Ok(())
}
