use std::path::PathBuf;

use adv_prep::commands::{
    check_command, inspect_command, resolve_attack_config, stage_command, ConfigOverrides,
};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use sample_core::sample::InitializationMethod;

/// Batch front end for preparing adversarial PE samples.
///
/// This CLI is a thin wrapper around `sample-core` (exposed in code as
/// `sample_core`). All substantive logic lives in the library.
#[derive(Parser, Debug)]
#[command(
    name = "adv-prep",
    version,
    about = "Validate, fingerprint and stage PE samples for adversarial runs",
    long_about = None
)]
struct Cli {
    /// Log lifecycle details (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by the batch commands.
#[derive(Args, Debug)]
struct BatchArgs {
    /// Input samples.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Directory for `<stem>.adv<suffixes>` outputs. Defaults to the current directory.
    #[arg(long, short)]
    output_dir: Option<PathBuf>,

    /// Attack config file (.yaml, .yml or .json). Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Inputs are benign (the target becomes the malicious label).
    #[arg(long, default_value_t = false)]
    benign: bool,

    /// Overwrite existing output files.
    #[arg(long, short, default_value_t = false)]
    force: bool,

    /// Optimizer iteration budget.
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Payload size budget in bytes.
    #[arg(long)]
    payload_size: Option<usize>,

    /// Payload initialization strategy (weighted, random, zeros).
    #[arg(long)]
    init: Option<InitializationMethod>,

    /// Optimizer tolerance / step parameter.
    #[arg(long)]
    epsilon: Option<f64>,

    /// Emit JSON instead of human-readable text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl BatchArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            output_dir: self.output_dir.clone(),
            max_iterations: self.max_iterations,
            payload_size: self.payload_size,
            initialization_method: self.init,
            epsilon: self.epsilon,
            benign: self.benign,
            force: self.force,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate samples and report one line per sample.
    ///
    /// Invalid samples are reported and skipped; the batch never aborts.
    Check(BatchArgs),

    /// Print size, SHA-256 and code-section fingerprint of one binary.
    Inspect {
        /// Binary to inspect.
        path: PathBuf,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Read each valid sample, write an unmodified copy to its output path and
    /// report the recorded fingerprints.
    Stage(BatchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    adv_prep::init_logging(cli.verbose);

    match cli.command {
        Command::Check(args) => {
            let config = resolve_attack_config(args.config.as_deref(), &args.overrides())?;
            check_command(&args.paths, &config, args.json)?
        }
        Command::Inspect { path, json } => inspect_command(&path, json)?,
        Command::Stage(args) => {
            let config = resolve_attack_config(args.config.as_deref(), &args.overrides())?;
            stage_command(&args.paths, &config, args.json)?
        }
    }

    Ok(())
}
