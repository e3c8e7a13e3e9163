use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value, json};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gen_forge::orchestrator::valid_commands;
use gen_forge::profiles::{create_profile, profile_keys};
use gen_forge::providers::{provider_keys, provider_metadata};
use gen_forge::standards::register_standards_provider;
use gen_forge::{
    EngineConfig, FileBundleStandardsProvider, ProviderAssignments, ReviewOverride, Session,
    StderrEventObserver, WorkflowOrchestrator, register_builtins,
};

/// gen-forge: iterative AI code generation with approval gates
#[derive(Parser, Debug)]
#[command(name = "gen-forge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root directory for session storage
    #[arg(long, global = true)]
    sessions_root: Option<PathBuf>,

    /// Emit a structured JSON result on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a session for a profile and context
    New {
        #[command(flatten)]
        args: NewArgs,
    },

    /// Start the workflow for a session
    Init { session_id: String },

    /// Approve the pending content and advance
    Approve {
        session_id: String,

        /// Force completion when disagreeing with the review verdict
        #[arg(long, conflicts_with = "revise")]
        complete: bool,

        /// Force another revision cycle when disagreeing with the verdict
        #[arg(long)]
        revise: bool,
    },

    /// Reject the pending content with feedback
    Reject {
        session_id: String,

        /// Why the content was rejected
        #[arg(short, long)]
        feedback: String,
    },

    /// Cancel the session
    Cancel { session_id: String },

    /// Show the session state
    Status { session_id: String },

    /// List sessions under the sessions root
    Sessions,

    /// List registered profiles, or show one in detail
    Profiles { key: Option<String> },

    /// List registered providers, or show one in detail
    Providers { key: Option<String> },
}

#[derive(Args, Debug)]
struct NewArgs {
    /// Profile key (see `gen-forge profiles`)
    #[arg(short, long)]
    profile: String,

    /// Provider for every role (planner, generator, reviewer, reviser)
    #[arg(long, default_value = "manual")]
    provider: String,

    /// Override the planner provider
    #[arg(long)]
    planner: Option<String>,

    /// Override the generator provider
    #[arg(long)]
    generator: Option<String>,

    /// Override the reviewer provider
    #[arg(long)]
    reviewer: Option<String>,

    /// Override the reviser provider
    #[arg(long)]
    reviser: Option<String>,

    /// Standards provider key (defaults to the profile's choice)
    #[arg(long)]
    standards_provider: Option<String>,

    /// Context file (JSON object)
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Context entries as key=value (values parsed as JSON when possible)
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("gen_forge=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    register_builtins();
    register_standards_from_env()?;

    let mut config = EngineConfig::load_with_env(cli.config.as_ref())?;
    if let Some(root) = cli.sessions_root.clone() {
        config.sessions_root = root;
    }

    let mut orchestrator =
        WorkflowOrchestrator::new(config.sessions_root.clone()).with_approval_config(config.approvals);
    orchestrator.subscribe(Arc::new(StderrEventObserver));

    let json_mode = cli.json;
    match cli.command {
        Command::New { args } => {
            let context = build_context(&args)?;
            let providers = ProviderAssignments {
                planner: args.planner.unwrap_or_else(|| args.provider.clone()),
                generator: args.generator.unwrap_or_else(|| args.provider.clone()),
                reviewer: args.reviewer.unwrap_or_else(|| args.provider.clone()),
                reviser: args.reviser.unwrap_or_else(|| args.provider.clone()),
            };
            let session_id = orchestrator
                .initialize_run(&args.profile, providers, context, args.standards_provider)
                .await?;
            if json_mode {
                print_json("new", json!({ "session_id": session_id }));
            } else {
                println!("{session_id}");
            }
        }
        Command::Init { session_id } => {
            let session = orchestrator.init(&session_id).await?;
            report_session("init", &session, json_mode);
        }
        Command::Approve {
            session_id,
            complete,
            revise,
        } => {
            let review_override = if complete {
                Some(ReviewOverride::Complete)
            } else if revise {
                Some(ReviewOverride::Revise)
            } else {
                None
            };
            let session = orchestrator.approve(&session_id, review_override).await?;
            report_session("approve", &session, json_mode);
        }
        Command::Reject {
            session_id,
            feedback,
        } => {
            let session = orchestrator.reject(&session_id, &feedback).await?;
            report_session("reject", &session, json_mode);
        }
        Command::Cancel { session_id } => {
            let session = orchestrator.cancel(&session_id).await?;
            report_session("cancel", &session, json_mode);
        }
        Command::Status { session_id } => {
            let session = orchestrator.status(&session_id)?;
            report_session("status", &session, json_mode);
        }
        Command::Sessions => {
            let store = gen_forge::SessionStore::new(config.sessions_root.clone());
            let ids = store.list()?;
            if json_mode {
                print_json("sessions", json!({ "sessions": ids }));
            } else {
                for id in ids {
                    println!("{id}");
                }
            }
        }
        Command::Profiles { key } => match key {
            None => {
                if json_mode {
                    print_json("profiles", json!({ "profiles": profile_keys() }));
                } else {
                    for key in profile_keys() {
                        println!("{key}");
                    }
                }
            }
            Some(key) => {
                let profile = create_profile(&key)?;
                let metadata = profile.metadata();
                if json_mode {
                    print_json("profiles", serde_json::to_value(&metadata)?);
                } else {
                    println!("{}: {}", metadata.name, metadata.description);
                    for (field, rules) in &metadata.context_schema {
                        println!(
                            "  {field}: {:?}{}",
                            rules.field_type,
                            if rules.required { " (required)" } else { "" }
                        );
                    }
                }
            }
        },
        Command::Providers { key } => match key {
            None => {
                if json_mode {
                    print_json("providers", json!({ "providers": provider_keys() }));
                } else {
                    for key in provider_keys() {
                        println!("{key}");
                    }
                }
            }
            Some(key) => {
                let metadata = provider_metadata(&key)?;
                if json_mode {
                    print_json("providers", serde_json::to_value(&metadata)?);
                } else {
                    println!("{}: {}", metadata.name, metadata.description);
                }
            }
        },
    }

    Ok(())
}

/// Register a `file-bundle` standards provider from STANDARDS_DIR when set.
fn register_standards_from_env() -> Result<()> {
    if let Ok(dir) = std::env::var("STANDARDS_DIR")
        && !dir.is_empty()
    {
        let provider = FileBundleStandardsProvider::from_dir(&PathBuf::from(&dir))
            .with_context(|| format!("cannot read STANDARDS_DIR '{dir}'"))?;
        register_standards_provider("file-bundle", Arc::new(provider));
    }
    Ok(())
}

fn build_context(args: &NewArgs) -> Result<Map<String, Value>> {
    let mut context = match &args.context_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read context file {}", path.display()))?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                _ => return Err(anyhow!("context file must contain a JSON object")),
            }
        }
        None => Map::new(),
    };

    for entry in &args.set {
        let (key, raw) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("--set expects KEY=VALUE, got '{entry}'"))?;
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| json!(raw));
        context.insert(key.to_string(), value);
    }

    Ok(context)
}

fn report_session(command: &str, session: &Session, json_mode: bool) {
    if json_mode {
        print_json(
            command,
            json!({
                "session_id": session.session_id,
                "phase": session.phase,
                "stage": session.stage,
                "status": session.status,
                "iteration": session.current_iteration,
                "pending_approval": session.approval.pending,
                "last_error": session.last_error,
                "artifacts": session.artifacts,
                "valid_commands": valid_commands(session.phase, session.stage)
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>(),
            }),
        );
        return;
    }

    println!(
        "{}  {}  status={:?}  iteration={}",
        session.session_id,
        session.state_label(),
        session.status,
        session.current_iteration
    );
    if session.approval.pending {
        println!("  approval pending");
        if let Some(feedback) = &session.approval.feedback {
            println!("  feedback: {feedback}");
        }
    }
    if let Some(error) = &session.last_error {
        println!("  last error: {error}");
    }
    for artifact in &session.artifacts {
        println!("  artifact: {} ({})", artifact.relative_path, artifact.sha256);
    }
    if let Some(message) = session.messages.last() {
        println!("  last message: {}", message.text);
    }
}

fn print_json(command: &str, payload: Value) {
    let mut envelope = json!({
        "exit_code": 0,
        "command": command,
    });
    if let (Value::Object(envelope_map), Value::Object(payload_map)) = (&mut envelope, payload) {
        for (key, value) in payload_map {
            envelope_map.insert(key, value);
        }
    }
    println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
}
