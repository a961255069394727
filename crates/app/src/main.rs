use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tillslip_core::PipelineConfig;
use tillslip_extract::PayloadCheck;

#[derive(Parser)]
#[command(name = "tillslip")]
#[command(about = "Turn a photographed receipt into structured JSON")]
#[command(version)]
struct Cli {
    /// Receipt image to process (defaults to the configured input path)
    image: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "TILLSLIP_CONFIG")]
    config: Option<PathBuf>,

    /// Reject model output that is not a single well-formed receipt object
    #[arg(long)]
    strict_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::resolve(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level.0)),
        )
        .init();

    let check = if cli.strict_json { PayloadCheck::Strict } else { PayloadCheck::Lenient };
    let pipeline = tillslip::build_pipeline(&config, check)?;
    let input = cli.image.unwrap_or_else(|| config.paths.input.clone());

    // The failing stage has already logged its diagnostic; anyhow prints the
    // top-level report once on exit.
    let outcome = pipeline.run(&input).await?;
    info!(path = %outcome.output_path.display(), "Receipt processed");
    Ok(())
}
