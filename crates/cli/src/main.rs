//! FormCheck CLI - dataset assembly, diagnostics and offline inference

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use formcheck_common::FormCheckConfig;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::analyze::AnalyzeCommand;
use commands::dataset::{AssembleCommand, CheckCommand, ExtractCommand, MergeCommand, NormalizeCommand};
use commands::evaluate::EvaluateCommand;

#[derive(Parser)]
#[command(
    name = "formcheck",
    version,
    about = "Exercise form assessment from body landmarks",
    after_help = "EXAMPLES:\n  \
                  # Build the training table from stored landmark vectors\n  \
                  formcheck assemble --root Squat_Data --output Dataset/squat_dataset.csv\n\n  \
                  # Extract landmarks from labeled videos, merging with the existing table\n  \
                  formcheck extract --root Videos --pose-model models/pose_landmark_full.onnx\n\n  \
                  # Inspect a dataset\n  \
                  formcheck check Dataset/squat_dataset.csv --json\n\n  \
                  # Score a classifier and assess a single frame\n  \
                  formcheck evaluate Dataset/squat_dataset.csv --model models/squat_classifier.onnx\n  \
                  formcheck analyze frame.jpg --exercise squats"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (YAML); defaults to $FORMCHECK_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a dataset from stored landmark vectors
    Assemble(AssembleCommand),

    /// Build a dataset from labeled videos
    Extract(ExtractCommand),

    /// Concatenate dataset files and drop duplicate rows
    Merge(MergeCommand),

    /// Rewrite a 132-feature dataset with the 99-feature schema
    Normalize(NormalizeCommand),

    /// Print quality diagnostics for a dataset
    Check(CheckCommand),

    /// Score a classifier on a labeled dataset
    Evaluate(EvaluateCommand),

    /// Assess form in a single image
    Analyze(AnalyzeCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = FormCheckConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Assemble(cmd) => cmd.execute(config),
        Commands::Extract(cmd) => cmd.execute(config),
        Commands::Merge(cmd) => cmd.execute(config),
        Commands::Normalize(cmd) => cmd.execute(),
        Commands::Check(cmd) => cmd.execute(config),
        Commands::Evaluate(cmd) => cmd.execute(config),
        Commands::Analyze(cmd) => cmd.execute(config),
    }
}
