// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and all their flags:
//
//   generate  synthetic interactions + splits + semantic ids
//   split     split an existing {data_dir}/{dataset}.csv
//   train     train and checkpoint the model
//   test      evaluate the best checkpoint on the test split
//
// Every flag is optional. A run config is built as
//   defaults → --config file → flags given on the command line
// so a flag only overrides what it names. `test` without --config
// starts from the run_config.json saved by `train` instead of the
// defaults, so it sees the same semantic id shape and model size.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::config::RunConfig;
use crate::data::synthetic::SyntheticConfig;
use crate::infra::checkpoint::CheckpointManager;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a synthetic dataset, split it and create semantic ids
    Generate(GenerateArgs),

    /// Split an existing interaction file per user by time
    Split(SplitArgs),

    /// Train the recommender and save a checkpoint per epoch
    Train(TrainArgs),

    /// Evaluate a trained checkpoint on the test split
    Test(TestArgs),
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// JSON run configuration; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Dataset name, e.g. ml-100k or ml-1m
    #[arg(long)]
    pub dataset: Option<String>,

    /// Directory holding interaction, split and semantic id files
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Directory for checkpoints and metrics
    #[arg(long)]
    pub checkpoint_dir: Option<String>,

    /// Random seed for data generation and shuffling
    #[arg(long)]
    pub seed: Option<u64>,
}

impl CommonArgs {
    fn run_config(&self) -> Result<RunConfig> {
        let mut cfg = RunConfig::from_optional_file(self.config.as_deref())?;
        self.apply(&mut cfg);
        Ok(cfg)
    }

    /// Base config for evaluating a trained model: the --config file if
    /// given, else the run config saved in the checkpoint directory.
    fn trained_run_config(&self) -> Result<RunConfig> {
        if self.config.is_some() {
            return self.run_config();
        }
        let dir = match &self.checkpoint_dir {
            Some(dir) => dir.clone(),
            None => RunConfig::default().checkpoint_dir,
        };
        let mut cfg = match CheckpointManager::new(&dir)?.saved_run_config()? {
            Some(saved) => {
                tracing::info!("Using run config saved in '{}'", dir);
                saved
            }
            None => RunConfig::default(),
        };
        self.apply(&mut cfg);
        Ok(cfg)
    }

    fn apply(&self, cfg: &mut RunConfig) {
        if let Some(v) = &self.dataset        { cfg.dataset = v.clone(); }
        if let Some(v) = &self.data_dir       { cfg.data_dir = v.clone(); }
        if let Some(v) = &self.checkpoint_dir { cfg.checkpoint_dir = v.clone(); }
        if let Some(v) = self.seed            { cfg.training.seed = v; }
    }
}

// ─── generate ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Codes per semantic id
    #[arg(long)]
    pub semantic_id_length: Option<usize>,

    /// Number of users; with --n-items and --n-interactions replaces the preset
    #[arg(long, requires_all = ["n_items", "n_interactions"])]
    pub n_users: Option<usize>,

    #[arg(long, requires_all = ["n_users", "n_interactions"])]
    pub n_items: Option<usize>,

    #[arg(long, requires_all = ["n_users", "n_items"])]
    pub n_interactions: Option<usize>,
}

impl GenerateArgs {
    /// Explicit sizes, if all three were given.
    pub fn synthetic_size(&self, seed: u64) -> Option<SyntheticConfig> {
        Some(SyntheticConfig {
            n_users:        self.n_users?,
            n_items:        self.n_items?,
            n_interactions: self.n_interactions?,
            seed,
        })
    }
}

impl TryFrom<&GenerateArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(a: &GenerateArgs) -> Result<Self> {
        let mut cfg = a.common.run_config()?;
        if let Some(v) = a.semantic_id_length { cfg.semantic_id.length = v; }
        Ok(cfg)
    }
}

// ─── split ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct SplitArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl TryFrom<SplitArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(a: SplitArgs) -> Result<Self> {
        a.common.run_config()
    }
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of full passes through the training data
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Number of examples processed together in one step
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Adam learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Codes per semantic id; must match the semantic id file
    #[arg(long)]
    pub semantic_id_length: Option<usize>,

    /// History items fed to the model per example
    #[arg(long)]
    pub history_len: Option<usize>,

    /// Embedding width
    #[arg(long)]
    pub d_model: Option<usize>,
}

/// Convert CLI TrainArgs into the application-layer RunConfig.
/// The application layer never sees clap types.
impl TryFrom<TrainArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(a: TrainArgs) -> Result<Self> {
        let mut cfg = a.common.run_config()?;
        if let Some(v) = a.epochs             { cfg.training.epochs = v; }
        if let Some(v) = a.batch_size         { cfg.training.batch_size = v; }
        if let Some(v) = a.learning_rate      { cfg.training.learning_rate = v; }
        if let Some(v) = a.semantic_id_length { cfg.semantic_id.length = v; }
        if let Some(v) = a.history_len        { cfg.history_len = v; }
        if let Some(v) = a.d_model            { cfg.model.d_model = v; }
        Ok(cfg)
    }
}

// ─── test ─────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TestArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Directory for the results JSON
    #[arg(long)]
    pub results_dir: Option<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Codes per semantic id; defaults to what the model was trained with
    #[arg(long)]
    pub semantic_id_length: Option<usize>,
}

impl TryFrom<TestArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(a: TestArgs) -> Result<Self> {
        let mut cfg = a.common.trained_run_config()?;
        if let Some(v) = a.results_dir        { cfg.results_dir = v; }
        if let Some(v) = a.batch_size         { cfg.training.batch_size = v; }
        if let Some(v) = a.semantic_id_length { cfg.semantic_id.length = v; }
        Ok(cfg)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("rpg-pipeline").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_train_flags_override_defaults() {
        let Commands::Train(args) = parse(&["train", "--dataset", "ml-1m", "--epochs", "3", "--seed", "9"]) else {
            panic!("expected train");
        };
        let cfg = RunConfig::try_from(args).unwrap();
        assert_eq!(cfg.dataset, "ml-1m");
        assert_eq!(cfg.training.epochs, 3);
        assert_eq!(cfg.training.seed, 9);
        assert_eq!(cfg.training.batch_size, RunConfig::default().training.batch_size);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"dataset": "ml-1m", "history_len": 5}"#).unwrap();

        let path_arg = path.to_string_lossy().into_owned();
        let Commands::Train(args) = parse(&["train", "--config", &path_arg, "--history-len", "7"]) else {
            panic!("expected train");
        };
        let cfg = RunConfig::try_from(args).unwrap();
        assert_eq!(cfg.dataset, "ml-1m");
        assert_eq!(cfg.history_len, 7);
    }

    #[test]
    fn test_generate_sizes_come_together() {
        let Commands::Generate(args) = parse(&[
            "generate", "--n-users", "4", "--n-items", "9", "--n-interactions", "50",
        ]) else {
            panic!("expected generate");
        };
        let size = args.synthetic_size(1).unwrap();
        assert_eq!((size.n_users, size.n_items, size.n_interactions), (4, 9, 50));

        let lone = Cli::try_parse_from(["rpg-pipeline", "generate", "--n-users", "4"]);
        assert!(lone.is_err());
    }

    #[test]
    fn test_generate_without_sizes_uses_preset() {
        let Commands::Generate(args) = parse(&["generate", "--semantic-id-length", "8"]) else {
            panic!("expected generate");
        };
        assert!(args.synthetic_size(1).is_none());
        assert_eq!(RunConfig::try_from(&args).unwrap().semantic_id.length, 8);
    }

    #[test]
    fn test_test_reuses_trained_semantic_id_shape() {
        use crate::application::{
            prepare_use_case::PrepareUseCase, test_use_case::TestUseCase, train_use_case::TrainUseCase,
        };
        use crate::data::semantic_ids::SemanticIdConfig;

        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data").to_string_lossy().into_owned();
        let ckpt_dir = dir.path().join("ckpt").to_string_lossy().into_owned();
        let results_dir = dir.path().join("results").to_string_lossy().into_owned();

        let mut trained = RunConfig::default();
        trained.dataset = "small".to_string();
        trained.data_dir = data_dir.clone();
        trained.checkpoint_dir = ckpt_dir.clone();
        trained.results_dir = results_dir.clone();
        trained.semantic_id = SemanticIdConfig { length: 3, codebook_size: 8 };
        trained.history_len = 3;
        trained.training.epochs = 1;
        trained.training.batch_size = 16;
        trained.model.d_model = 4;

        let size = SyntheticConfig { n_users: 5, n_items: 12, n_interactions: 200, seed: 3 };
        PrepareUseCase::new(trained.clone()).unwrap().generate(Some(size)).unwrap();
        TrainUseCase::new(trained.clone()).execute().unwrap();

        let Commands::Test(args) = parse(&[
            "test", "--dataset", "small", "--data-dir", &data_dir, "--checkpoint-dir", &ckpt_dir,
        ]) else {
            panic!("expected test");
        };
        let cfg = RunConfig::try_from(args).unwrap();
        assert_eq!(cfg.semantic_id, trained.semantic_id);
        assert_eq!(cfg.history_len, 3);
        assert_eq!(cfg.results_dir, results_dir);

        let report = TestUseCase::new(cfg).execute().unwrap();
        assert!(report.n_samples > 0);
    }

    #[test]
    fn test_test_flags_override_saved_config() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt_dir = dir.path().to_string_lossy().into_owned();
        let mut saved = RunConfig::default();
        saved.dataset = "ml-1m".to_string();
        saved.checkpoint_dir = ckpt_dir.clone();
        CheckpointManager::new(&ckpt_dir).unwrap().save_run_config(&saved).unwrap();

        let Commands::Test(args) = parse(&[
            "test", "--checkpoint-dir", &ckpt_dir, "--semantic-id-length", "5", "--batch-size", "8",
        ]) else {
            panic!("expected test");
        };
        let cfg = RunConfig::try_from(args).unwrap();
        assert_eq!(cfg.dataset, "ml-1m");
        assert_eq!(cfg.semantic_id.length, 5);
        assert_eq!(cfg.training.batch_size, 8);
    }
}
