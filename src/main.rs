mod cli;

use anyhow::Context;
use clap::Parser;
use serde_json::json;

use chexdash::analysis::{fetch_history, fetch_pathology_labels, AnalyzeOptions, ImageUpload};
use chexdash::config::BackendConfig;
use chexdash::{generate_report, Aggregator, HttpBackend};

use crate::cli::{Args, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    chexdash::init_tracing();

    let mut config = BackendConfig::from_env();
    if let Some(base_url) = args.base_url.as_deref() {
        config = config.with_base_url(base_url);
    }
    tracing::debug!(base_url = %config.base_url, "Using backend");
    let backend = HttpBackend::new(config).context("failed to build HTTP client")?;

    match args.command {
        Command::Analyze {
            file,
            threshold,
            top_k,
            alpha,
            no_heatmap,
            report,
            prompt,
        } => {
            let image = ImageUpload::from_path(&file)
                .await
                .with_context(|| format!("failed to load image {}", file.display()))?;
            let options = AnalyzeOptions {
                generate_heatmap: !no_heatmap,
                threshold,
                alpha,
                return_top_k: Some(top_k),
            };
            let result = Aggregator::new(&backend)
                .with_options(options)
                .aggregate(&image)
                .await?;

            let generated = match report {
                Some(variant) => match generate_report(&backend, &result, variant, prompt).await {
                    Ok(generated) => Some(generated),
                    Err(e) => {
                        tracing::warn!(error = %e, %variant, "Report generation failed");
                        None
                    }
                },
                None => None,
            };

            let output = match generated {
                Some(generated) => json!({ "analysis": result, "report": generated }),
                None => serde_json::to_value(&result)?,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Labels => {
            let labels = fetch_pathology_labels(&backend).await;
            println!("{}", serde_json::to_string_pretty(&labels)?);
        }
        Command::History => {
            let items = fetch_history(&backend).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }

    Ok(())
}
