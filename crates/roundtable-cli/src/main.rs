//! CLI entry point for Roundtable.
//!
//! This binary provides the `roundtable` command: an interactive REPL that
//! runs one multi-agent conversation per input line, and a one-shot `ask`
//! mode for scripting.

mod input;
mod profile;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use roundtable_agent::{
    Agent, AssistantAgent, HttpCompletionClient, HttpCompletionConfig, UserProxyAgent,
};
use roundtable_core::{Calculator, TerminationCondition, ToolRegistry, WebSearch};
use roundtable_team::{ChatConfig, ConsoleSink, GroupChat, RoundRobin};

use input::ConsoleInput;
use profile::Profile;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Roundtable — multi-agent conversations from your terminal.
#[derive(Parser)]
#[command(
    name = "roundtable",
    version,
    about = "Roundtable — multi-agent conversation runner",
    long_about = "Runs a team of agents (assistant plus human proxy) against your tasks, \
                  with tool calling and deterministic termination conditions."
)]
struct Cli {
    #[command(flatten)]
    opts: ModelOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive REPL (one conversation per input line).
    Run,

    /// Run a single conversation for the given task and exit.
    Ask {
        /// The task to hand to the team.
        task: String,
    },
}

/// Flags shared by all subcommands.  Every flag overrides the profile.
#[derive(Args)]
struct ModelOpts {
    /// Path to a TOML profile.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Completion provider: openai or anthropic.
    #[arg(long)]
    provider: Option<String>,

    /// Model identifier.
    #[arg(long)]
    model: Option<String>,

    /// Base URL for OpenAI-compatible endpoints (e.g. http://localhost:11434/v1).
    #[arg(long)]
    base_url: Option<String>,

    /// Step budget per conversation.
    #[arg(long)]
    max_steps: Option<usize>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let profile = resolve_profile(&cli.opts)?;

    match cli.command {
        Commands::Run => cmd_run(&profile).await,
        Commands::Ask { task } => cmd_ask(&profile, &task).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the profile (if any) and fold the flag overrides into it.
fn resolve_profile(opts: &ModelOpts) -> Result<Profile> {
    let mut profile = match &opts.profile {
        Some(path) => Profile::load(path)?,
        None => Profile::default(),
    };

    if let Some(provider) = &opts.provider {
        profile.provider = provider.clone();
    }
    if let Some(model) = &opts.model {
        profile.model = model.clone();
    }
    if let Some(base_url) = &opts.base_url {
        profile.base_url = Some(base_url.clone());
    }
    if let Some(max_steps) = opts.max_steps {
        profile.max_steps = max_steps;
    }

    Ok(profile)
}

// ---------------------------------------------------------------------------
// Team assembly
// ---------------------------------------------------------------------------

/// Resolve the API key for the configured provider.
///
/// `ROUNDTABLE_API_KEY` wins; the provider-conventional variable is the
/// fallback.
fn resolve_api_key(provider: &str) -> Result<String> {
    if let Ok(key) = std::env::var("ROUNDTABLE_API_KEY") {
        return Ok(key);
    }
    let conventional = match provider {
        "openai" => "OPENAI_API_KEY",
        "anthropic" => "ANTHROPIC_API_KEY",
        other => bail!("unknown provider `{other}` (expected openai or anthropic)"),
    };
    std::env::var(conventional)
        .with_context(|| format!("set ROUNDTABLE_API_KEY or {conventional}"))
}

fn completion_config(profile: &Profile, api_key: String) -> Result<HttpCompletionConfig> {
    let config = match (profile.provider.as_str(), &profile.base_url) {
        ("openai", Some(base_url)) => {
            HttpCompletionConfig::openai_compatible(api_key, &profile.model, base_url)
        }
        ("openai", None) => HttpCompletionConfig::openai(api_key, &profile.model),
        ("anthropic", _) => HttpCompletionConfig::anthropic(api_key, &profile.model),
        (other, _) => bail!("unknown provider `{other}` (expected openai or anthropic)"),
    };
    Ok(config)
}

/// Build the default team: one tool-equipped assistant and one human proxy
/// over round-robin selection.
fn build_team(profile: &Profile) -> Result<GroupChat> {
    let api_key = resolve_api_key(&profile.provider)?;
    let completion = Arc::new(HttpCompletionClient::new(completion_config(
        profile, api_key,
    )?)?);

    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(Calculator::new()))?;
    registry.register(Arc::new(WebSearch::new()))?;

    let assistant: Arc<dyn Agent> = Arc::new(
        AssistantAgent::new(
            "assistant",
            "an assistant that solves tasks, using tools where they help",
            completion,
        )
        .with_system_prompt(
            "You are a helpful assistant. Use the available tools when they help. \
             When the task is fully solved, end your reply with TERMINATE.",
        )
        .with_tools(registry.schemas()),
    );

    let proxy: Arc<dyn Agent> = Arc::new(UserProxyAgent::new(
        "user_proxy",
        "the human user, consulted for feedback between assistant turns",
        Arc::new(ConsoleInput::new()),
    ));

    let termination = TerminationCondition::max_messages(profile.max_messages)
        .or(TerminationCondition::text_mention(&profile.mention));

    info!(
        provider = %profile.provider,
        model = %profile.model,
        max_steps = profile.max_steps,
        "team assembled"
    );

    Ok(GroupChat::new(
        vec![assistant, proxy],
        Box::new(RoundRobin::new()),
    )
    .with_registry(registry)
    .with_termination(termination)
    .with_sink(Box::new(ConsoleSink::new()))
    .with_config(ChatConfig {
        max_steps: profile.max_steps,
        ..ChatConfig::default()
    }))
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_run(profile: &Profile) -> Result<()> {
    let mut team = build_team(profile)?;

    let stdin = io::stdin();
    loop {
        print!("Enter a message (type 'exit' to leave): ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let task = line.trim();
        if task.eq_ignore_ascii_case("exit") {
            break;
        }
        if task.is_empty() {
            continue;
        }

        let outcome = team.run(task).await?;
        println!("-- {} --", outcome.stop);
    }

    Ok(())
}

async fn cmd_ask(profile: &Profile, task: &str) -> Result<()> {
    let mut team = build_team(profile)?;
    let outcome = team.run(task).await?;
    println!("-- {} --", outcome.stop);
    println!("{}", outcome.final_message);
    Ok(())
}
