mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "judge-cli")]
#[command(about = "Judge CLI - Run, screen and queue untrusted code submissions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a submission locally against Docker and print the result
    Run {
        /// Language identifier (javascript, python, java)
        #[arg(short, long)]
        language: String,

        /// File holding the solution code
        #[arg(short, long)]
        code: PathBuf,

        /// JSON file with an array of {input, expected_output} test cases
        #[arg(short, long)]
        tests: PathBuf,

        /// Sandbox config file (defaults to $SANDBOX_CONFIG or config/sandbox.json)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Screen a submission without running it
    Validate {
        /// Language identifier
        #[arg(short, long)]
        language: String,

        /// File holding the solution code
        #[arg(short, long)]
        code: PathBuf,
    },

    /// Print the harness generated for a submission
    Wrap {
        /// Language identifier
        #[arg(short, long)]
        language: String,

        /// File holding the solution code
        #[arg(short, long)]
        code: PathBuf,
    },

    /// Push a submission to the worker queue and wait for its result
    Submit {
        /// Language identifier
        #[arg(short, long)]
        language: String,

        /// File holding the solution code
        #[arg(short, long)]
        code: PathBuf,

        /// JSON file with test cases
        #[arg(short, long)]
        tests: PathBuf,

        /// Redis connection URL
        #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
        redis_url: String,

        /// Seconds to wait for the result (0 = enqueue only)
        #[arg(long, default_value = "60")]
        wait_secs: u64,
    },

    /// List supported languages with their starter templates
    Languages {
        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Write the default sandbox configuration
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "config/sandbox.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            language,
            code,
            tests,
            config,
        } => {
            commands::run(&language, &code, &tests, config.as_deref()).await?;
        }
        Commands::Validate { language, code } => {
            commands::validate(&language, &code)?;
        }
        Commands::Wrap { language, code } => {
            commands::wrap(&language, &code)?;
        }
        Commands::Submit {
            language,
            code,
            tests,
            redis_url,
            wait_secs,
        } => {
            commands::submit(&language, &code, &tests, &redis_url, wait_secs).await?;
        }
        Commands::Languages { json } => {
            commands::languages(json)?;
        }
        Commands::InitConfig { path, force } => {
            commands::init_config(&path, force)?;
        }
    }

    Ok(())
}
