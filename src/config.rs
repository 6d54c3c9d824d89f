// Command line and environment configuration.
//
// Every option can come from a flag or an environment variable; `main` loads a
// `.env` file first so the variables can live next to the binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::summaries::SummaryFormat;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Summarize course-evaluation PDFs with Gemini and archive them to Google Drive.
#[derive(Debug, Parser)]
#[command(name = "course-eval-digest", version)]
pub struct Cli {
    /// Per-request timeout for Drive and Gemini calls, in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120, global = true)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Obtain or refresh the Google Drive session and store the token.
    Auth(DriveAuthArgs),
    /// Upload PDFs to a Drive folder, skipping names that already exist there.
    Upload(UploadArgs),
    /// Summarize every PDF in the input folder that is not yet in the output table.
    Summarize(SummarizeArgs),
}

#[derive(Debug, Args)]
pub struct DriveAuthArgs {
    /// OAuth client-secret file (installed or web application).
    #[arg(long = "credentials", env = "GOOGLE_CREDENTIALS_PATH", default_value = "credentials.json")]
    pub credentials_path: PathBuf,

    /// Where the user token is persisted between runs.
    #[arg(long = "token", env = "GOOGLE_TOKEN_PATH", default_value = "token.json")]
    pub token_path: PathBuf,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// PDF files, or folders whose `.pdf` files should be uploaded.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Target Drive folder ID.
    #[arg(long = "folder-id", env = "DRIVE_FOLDER_ID")]
    pub drive_folder_id: String,

    /// Name to use in Drive (single file only); defaults to the local file name.
    #[arg(long)]
    pub name: Option<String>,

    /// Upload even if a file with the same name is already in the folder.
    #[arg(long = "overwrite", env = "OVERWRITE_EXISTING")]
    pub overwrite_existing: bool,

    #[command(flatten)]
    pub auth: DriveAuthArgs,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    /// Folder holding the evaluation PDFs.
    #[arg(long, env = "INPUT_FOLDER")]
    pub input_folder: PathBuf,

    /// CSV table with `file_path,summary` rows.
    #[arg(long = "output", env = "OUTPUT_TABLE", default_value = "course_eval_summaries.csv")]
    pub output_table: PathBuf,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long = "model", env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model_name: String,

    /// Replace the built-in prompt with the contents of this file.
    #[arg(long, env = "PROMPT_FILE")]
    pub prompt_file: Option<PathBuf>,

    /// Sampling temperature passed to the model.
    #[arg(long, env = "GEMINI_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens per summary.
    #[arg(long, env = "GEMINI_MAX_OUTPUT_TOKENS")]
    pub max_output_tokens: Option<u32>,

    /// Write summaries in the older single-line format (`\r` line breaks, quoted).
    #[arg(long, env = "SUMMARY_LEGACY_FORMAT")]
    pub legacy_format: bool,
}

impl SummarizeArgs {
    pub fn summary_format(&self) -> SummaryFormat {
        if self.legacy_format {
            SummaryFormat::LegacyCarriageReturn
        } else {
            SummaryFormat::Multiline
        }
    }
}
