use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Run(RunArgs),
    Inspect(InspectArgs),
    Score(ScoreArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Input list of event page URLs (one per line, percent-encoding allowed).
    #[arg(long, default_value = "sampled_url.txt")]
    pub urls: String,

    /// Result table (CSV). Rows are appended; the header is written only for a new file.
    #[arg(long, default_value = "analysis_results.csv")]
    pub out: String,

    /// Chat model identifier.
    #[arg(long, default_value = "gpt-4")]
    pub model: String,

    /// Base URL for the OpenAI API (e.g. https://api.openai.com/v1).
    #[arg(long, default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// Page fetch timeout. Unset leaves the HTTP client default (no timeout).
    #[arg(long)]
    pub fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Event page URL to fetch and extract (no model call).
    #[arg(long)]
    pub url: String,

    /// Page fetch timeout. Unset leaves the HTTP client default (no timeout).
    #[arg(long)]
    pub fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ScoreArgs {
    /// File holding a saved model answer.
    #[arg(long)]
    pub answer: String,

    /// JSON file holding a gold-standard object (as written to the result table).
    #[arg(long)]
    pub gold: String,
}
