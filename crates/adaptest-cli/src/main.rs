//! adaptest CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

use commands::{LearnerAction, OutputFormat, ResponseOutcomeArg};

#[derive(Parser)]
#[command(name = "adaptest", version, about = "Computerized adaptive testing engine")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config and example item bank
    Init,

    /// Validate item-bank TOML files
    Validate {
        /// Path to item-bank file or directory
        #[arg(long)]
        item_bank: PathBuf,
    },

    /// Start an assessment session
    Start {
        /// Learner identifier
        #[arg(long)]
        learner: String,

        /// Session kind: pre or post
        #[arg(long, default_value = "pre")]
        kind: String,

        /// Initial theta (defaults to the learner's stored ability)
        #[arg(long, allow_hyphen_values = true)]
        theta: Option<f64>,

        /// Item-bank override
        #[arg(long)]
        item_bank: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Get the next item, or the completion summary
    Next {
        #[arg(long)]
        session: Uuid,

        #[arg(long)]
        item_bank: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Record a response to an item
    Answer {
        #[arg(long)]
        session: Uuid,

        /// Item identifier
        #[arg(long)]
        item: String,

        /// correct or incorrect
        #[arg(long, value_enum)]
        outcome: ResponseOutcomeArg,

        #[arg(long)]
        item_bank: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Finish a session early
    Complete {
        #[arg(long)]
        session: Uuid,

        #[arg(long)]
        item_bank: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write a session report
    Report {
        #[arg(long)]
        session: Uuid,

        /// Output directory (defaults to the configured output_dir)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: text, json, html, all
        #[arg(long, default_value = "text")]
        format: String,

        #[arg(long)]
        item_bank: Option<PathBuf>,
    },

    /// Estimate ability from a JSON response history
    Estimate {
        /// JSON array of {"is_correct", "a", "b", "c"}
        #[arg(long)]
        responses: PathBuf,

        /// Starting theta
        #[arg(long, allow_hyphen_values = true)]
        initial_theta: Option<f64>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run simulated learners through whole sessions
    Simulate {
        #[arg(long)]
        item_bank: Option<PathBuf>,

        /// Number of simulated learners
        #[arg(long, default_value = "20")]
        learners: usize,

        /// Lowest true ability
        #[arg(long, default_value = "-2.0", allow_hyphen_values = true)]
        theta_min: f64,

        /// Highest true ability
        #[arg(long, default_value = "2.0", allow_hyphen_values = true)]
        theta_max: f64,

        /// Max concurrent sessions
        #[arg(long, default_value = "4")]
        parallelism: usize,

        /// Seed for selection and simulated answers
        #[arg(long)]
        seed: Option<u64>,

        /// Write the simulation results as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Compare two session reports (pre vs post)
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Theta drop treated as a decline
        #[arg(long, default_value = "0.0")]
        threshold: f64,

        /// Exit code 1 if ability declined
        #[arg(long)]
        fail_on_decline: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Inspect or adjust a learner's stored ability
    Learner {
        #[arg(long)]
        learner: String,

        #[command(subcommand)]
        action: LearnerAction,
    },
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("adaptest=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { item_bank } => commands::validate::execute(item_bank),
        Commands::Start {
            learner,
            kind,
            theta,
            item_bank,
            format,
        } => commands::session::start(config, item_bank, learner, kind, theta, format).await,
        Commands::Next {
            session,
            item_bank,
            format,
        } => commands::session::next(config, item_bank, session, format).await,
        Commands::Answer {
            session,
            item,
            outcome,
            item_bank,
            format,
        } => commands::session::answer(config, item_bank, session, item, outcome, format).await,
        Commands::Complete {
            session,
            item_bank,
            format,
        } => commands::session::complete(config, item_bank, session, format).await,
        Commands::Report {
            session,
            output,
            format,
            item_bank,
        } => commands::report::execute(config, item_bank, session, output, format).await,
        Commands::Estimate {
            responses,
            initial_theta,
            format,
        } => commands::estimate::execute(responses, initial_theta, format),
        Commands::Simulate {
            item_bank,
            learners,
            theta_min,
            theta_max,
            parallelism,
            seed,
            output,
        } => {
            commands::simulate::execute(
                config,
                item_bank,
                learners,
                theta_min,
                theta_max,
                parallelism,
                seed,
                output,
            )
            .await
        }
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_decline,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_decline, format),
        Commands::Learner { learner, action } => {
            commands::learner::execute(config, learner, action).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
