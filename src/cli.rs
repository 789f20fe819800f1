use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chexdash::analysis::DEFAULT_TOP_K;
use chexdash::ReportVariant;

#[derive(Parser, Debug)]
#[command(
    name = "chexdash",
    version,
    about = "Chest X-ray analysis client: classify, merge and report"
)]
pub(crate) struct Args {
    /// Backend base URL; overrides CHEXDASH_API_BASE_URL.
    #[arg(long, global = true)]
    pub(crate) base_url: Option<String>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Run both classifiers on an image and print the merged result.
    Analyze {
        file: PathBuf,
        #[arg(long, default_value_t = 0.5)]
        threshold: f64,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: u32,
        #[arg(long, default_value_t = 0.45)]
        alpha: f64,
        #[arg(long)]
        no_heatmap: bool,
        /// Also generate a report: standard, v2 or glm4v-rag.
        #[arg(long)]
        report: Option<ReportVariant>,
        #[arg(long, requires = "report")]
        prompt: Option<String>,
    },
    /// Print the labels supported by the pathology classifier.
    Labels,
    /// Print previously stored analyses.
    History,
}
