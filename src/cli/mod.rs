// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Four commands are supported:
//   1. `generate` - synthetic data, splits and semantic ids
//   2. `split`    - split an existing interaction file
//   3. `train`    - train the model, checkpoint every epoch
//   4. `test`     - evaluate the best checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, GenerateArgs, SplitArgs, TestArgs, TrainArgs};

use crate::application::config::RunConfig;

#[derive(Parser, Debug)]
#[command(
    name = "rpg-pipeline",
    version,
    about = "Prepare interaction data, then train and test a semantic-id recommender."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Generate(args) => run_generate(args),
            Commands::Split(args)    => run_split(args),
            Commands::Train(args)    => run_train(args),
            Commands::Test(args)     => run_test(args),
        }
    }
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    use crate::application::prepare_use_case::PrepareUseCase;

    let cfg = RunConfig::try_from(&args)?;
    let size = args.synthetic_size(cfg.training.seed);
    let summary = PrepareUseCase::new(cfg.clone())?.generate(size)?;

    println!(
        "Generated '{}': {} interactions → train={} valid={} test={} ({} users dropped)",
        cfg.dataset, summary.n_interactions, summary.train, summary.valid, summary.test,
        summary.dropped_users,
    );
    Ok(())
}

fn run_split(args: SplitArgs) -> Result<()> {
    use crate::application::prepare_use_case::PrepareUseCase;

    let cfg = RunConfig::try_from(args)?;
    let summary = PrepareUseCase::new(cfg.clone())?.split_existing()?;

    println!(
        "Split '{}': train={} valid={} test={} ({} users dropped)",
        cfg.dataset, summary.train, summary.valid, summary.test, summary.dropped_users,
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let cfg = RunConfig::try_from(args)?;
    tracing::info!("Starting training on dataset '{}'", cfg.dataset);

    let summary = TrainUseCase::new(cfg.clone()).execute()?;
    match summary.best_epoch {
        Some(epoch) => println!(
            "Training complete. Best epoch {} (val_loss={:.4}), checkpoints in '{}'.",
            epoch, summary.best_val_loss, cfg.checkpoint_dir
        ),
        None => println!(
            "Training complete. No validation data; latest checkpoint in '{}'.",
            cfg.checkpoint_dir
        ),
    }
    Ok(())
}

fn run_test(args: TestArgs) -> Result<()> {
    use crate::application::test_use_case::TestUseCase;

    let cfg = RunConfig::try_from(args)?;
    let report = TestUseCase::new(cfg.clone()).execute()?;

    println!(
        "Test '{}' (epoch {}): n={} loss={:.4} rmse={:.4} mae={:.4}",
        report.dataset, report.epoch, report.n_samples, report.loss, report.rmse, report.mae,
    );
    println!("Results written to '{}'", cfg.results_path().display());
    Ok(())
}
