use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use model_tar::{BuildConfig, HubSource, LocalSource, ModelBuilder, Notifier};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum SourceKind {
    Hub,
    Local,
}

#[derive(Subcommand)]
enum Command {
    /// Print the path the model archive is written to
    Path,
    /// Fetch the model and package it as model.tar.gz
    Build {
        #[arg(
            short,
            long,
            value_enum,
            default_value = "hub",
            help = "Where to take the model files from"
        )]
        source: SourceKind,

        #[arg(
            long,
            help = "Model directory to package with --source local (defaults to HF_REPO_ID)"
        )]
        model_dir: Option<PathBuf>,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also switches to plain log output"
    )]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BuildConfig::from_env()?;

    match cli.command {
        Command::Path => {
            println!("{}", config.model_tar_file().display());
        }
        Command::Build { source, model_dir } => {
            let notifier = Notifier::new(cli.verbose);
            let report = match source {
                SourceKind::Hub => {
                    if model_dir.is_some() {
                        bail!("--model-dir only applies to --source local");
                    }
                    let source = HubSource::with_settings(config.hub())?;
                    ModelBuilder::new(source, notifier).build(&config)?
                }
                SourceKind::Local => {
                    let config = match model_dir {
                        Some(dir) => config.with_model_id(dir.to_string_lossy()),
                        None => config,
                    };
                    ModelBuilder::new(LocalSource::with_root(config.source_dir()), notifier)
                        .build(&config)?
                }
            };
            println!("{}", report.model_tar_file.display());
        }
    }

    Ok(())
}
