pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "joblab",
    about = "JobLab operator CLI",
    long_about = "Inspect JobLab configuration, check service readiness, prepare the CV store, and run single assistant turns.",
    after_help = "Examples:\n  joblab doctor --json\n  joblab config\n  joblab ask --prompt \"How many remote jobs are there in Germany?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending CV store migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, CV store connectivity, and external service settings")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one assistant turn against the configured services")]
    Ask {
        #[arg(long, help = "Question to send to the assistant")]
        prompt: String,
        #[arg(long, help = "Conversation to continue; a new one is started when omitted")]
        conversation_id: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { prompt, conversation_id } => {
            commands::ask::run(&prompt, conversation_id.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
