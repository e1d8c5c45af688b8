use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use yardage_predictor::tables::SourcePaths;
use yardage_predictor::{PipelineConfig, QueryService, ServeConfig, run_batch_scoring, run_training, server};

#[derive(Parser, Debug)]
#[command(name = "yardage-predictor", about = "Predict yards gained from at-snap tracking data", version)]
struct Cli {
    /// JSON pipeline configuration; missing keys keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding plays, games, player_play, players and tracking_week_N parquet files
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    /// Directory for the model, schema, history and prediction table
    #[arg(long = "output-dir", global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the model and write model.json, model_columns.json and training_history.csv
    Train,
    /// Score every play and write plays_with_predictions.parquet
    Predict,
    /// Serve /filters, /search and /plays over the prediction table
    Serve {
        #[arg(long, default_value_t = 5001)]
        port: u16,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load(cli.config.as_deref()).context("reading --config")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    match cli.command {
        Command::Train => {
            let summary = run_training(&config).context("training failed")?;
            match summary.valid_mae {
                Some(mae) => println!(
                    "trained on {} rows ({} validation), {} trees, validation MAE {:.3}",
                    summary.train_rows, summary.valid_rows, summary.best_iteration, mae
                ),
                None => println!(
                    "trained on {} rows, {} trees, no validation split",
                    summary.train_rows, summary.best_iteration
                ),
            }
        }
        Command::Predict => {
            let summary = run_batch_scoring(&config).context("batch scoring failed")?;
            println!(
                "scored {} of {} plays",
                summary.scored_plays, summary.raw_plays
            );
        }
        Command::Serve { port } => {
            let serve_config = ServeConfig {
                port,
                ..Default::default()
            };
            let service = QueryService::load(SourcePaths::new(&config.data_dir, &config.output_dir));
            let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
            runtime
                .block_on(server::serve(service, &serve_config))
                .context("query service stopped")?;
        }
    }

    Ok(())
}
