//! DevTeam CLI
//!
//! Mode selector for the crew: the dashboard API (default), the pull
//! request review workflow, standalone code analysis and a one-shot
//! development cycle. Exits with 1 on any failure, after recording it.

mod analyze;
mod api;
mod logging;
#[cfg(test)]
mod test_support;
mod workflow;

use clap::{Parser, Subcommand};
use devteam_core::config::Settings;
use devteam_core::crew::DevTeamCrew;
use devteam_core::errors::ErrorStore;
use devteam_core::guard::{guarded, ClassifiedError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "DevTeam - a crew of language-model agents for software development")]
struct Args {
    /// Settings file (defaults to config/devteam.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum CliCommand {
    /// Serve the dashboard API (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Review a pull request and post the result as a comment
    Workflow {
        /// Pull request number
        #[arg(long)]
        pr: u64,
        /// Repository name (defaults to settings, then GITHUB_REPOSITORY)
        #[arg(long)]
        repo: Option<String>,
        /// Repository owner
        #[arg(long)]
        owner: Option<String>,
        /// Language of the code under review
        #[arg(long)]
        language: Option<String>,
    },
    /// Run the static analysis heuristics on a file
    Analyze {
        #[arg(long)]
        code_file: PathBuf,
        #[arg(long, default_value = "Java")]
        language: String,
        #[arg(long, default_value = "text", value_parser = analyze::FORMATS)]
        format: String,
        #[arg(long = "type", default_value = "all", value_parser = analyze::ANALYSIS_TYPES)]
        analysis_type: String,
    },
    /// Run a full development cycle and print the four outputs
    Run {
        #[arg(long)]
        requirements: String,
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        constraints: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },
}

impl CliCommand {
    fn operation(&self) -> &'static str {
        match self {
            CliCommand::Serve { .. } => "cli.serve",
            CliCommand::Workflow { .. } => "cli.workflow",
            CliCommand::Analyze { .. } => "cli.analyze",
            CliCommand::Run { .. } => "cli.run",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    if args.json {
        logging::init_json(logging::DEFAULT_DIRECTIVE);
    } else {
        logging::init(logging::DEFAULT_DIRECTIVE);
    }

    let store = ErrorStore::new();
    match run(args, &store).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            for suggestion in err.record().suggestions() {
                eprintln!("  - {}", suggestion);
            }
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args, store: &ErrorStore) -> Result<(), ClassifiedError> {
    let command = args
        .command
        .unwrap_or(CliCommand::Serve { port: 8080 });
    let config = args.config;

    guarded(store, command.operation(), async {
        let settings = Settings::load(config.as_deref())?;
        settings.validate(store);
        execute(command, settings, store).await
    })
    .await
}

async fn execute(command: CliCommand, mut settings: Settings, store: &ErrorStore) -> anyhow::Result<()> {
    match command {
        CliCommand::Serve { port } => {
            let state = api::AppState::new(settings, store.clone());
            api::serve(Arc::new(state), port).await
        }
        CliCommand::Workflow {
            pr,
            repo,
            owner,
            language,
        } => {
            let options = workflow::WorkflowOptions {
                pr,
                repo,
                owner,
                language,
            };
            workflow::run_review_workflow(&settings, store, &options).await?;
            println!("Posted review on pull request #{}", pr);
            Ok(())
        }
        CliCommand::Analyze {
            code_file,
            language,
            format,
            analysis_type,
        } => {
            let report = analyze::analyze_file(&code_file, &language, &format, &analysis_type).await?;
            println!("{}", report);
            Ok(())
        }
        CliCommand::Run {
            requirements,
            context,
            constraints,
            language,
        } => {
            if let Some(language) = language {
                settings.language = language;
            }
            let mut crew = DevTeamCrew::builder_from_settings(&settings)
                .with_store(store.clone())
                .build()?;
            let result = crew
                .run_full_cycle(&requirements, context.as_deref(), constraints.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}
