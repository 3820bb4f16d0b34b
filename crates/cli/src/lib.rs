pub mod commands;

use clap::{Parser, Subcommand};
use outreach_core::config::{AppConfig, LoadOptions, LogFormat};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use commands::outreach::OutreachArgs;
use commands::research::ResearchArgs;

#[derive(Debug, Parser)]
#[command(
    name = "outreach",
    about = "Research-backed outreach with human approval and lead memory",
    long_about = "Research a lead, draft personalized outreach, review drafts before anything is sent, and keep a durable per-lead memory you can question later.",
    after_help = "Examples:\n  outreach doctor --json\n  outreach outreach --name \"Jane Doe\" --email jane@example.com --career-field \"Data Engineering\"\n  outreach research \"lead:jane doe\" --name \"Jane Doe\"\n  outreach ask \"lead:jane doe\" \"What company does she work for?\"\n  outreach search \"data platform\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model client readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Research a subject and store the findings in a memory session")]
    Research(ResearchArgs),
    #[command(about = "Ask a follow-up question answered from a session's stored research")]
    Ask {
        session: String,
        question: String,
    },
    #[command(about = "List memory sessions in creation order")]
    Sessions,
    #[command(about = "Find sessions whose research or questions mention a phrase")]
    Search { query: String },
    #[command(about = "Show a memory session's research and question history")]
    Inspect { session: String },
    #[command(about = "Draft outreach interactively: approve, reject with feedback, or edit")]
    Outreach(OutreachArgs),
}

/// Logs go to stderr so command payloads on stdout stay machine-readable.
fn init_logging() {
    let Ok(config) = AppConfig::load(LoadOptions::default()) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Research(args) => commands::research::run(args),
        Command::Ask { session, question } => commands::ask::run(&session, &question),
        Command::Sessions => commands::sessions::run(),
        Command::Search { query } => commands::search::run(&query),
        Command::Inspect { session } => commands::inspect::run(&session),
        Command::Outreach(args) => commands::outreach::run(args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
