use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use maestro::agents::AgentRegistry;
use maestro::config::Config;
use maestro::core::RawPlan;
use maestro::orchestration::{Orchestrator, OrchestratorConfig};
use maestro::{mlog, mlog_error, mlog_warn, Error, Result};

/// Exit code for plans rejected before execution.
const EXIT_PLANNING_ERROR: u8 = 2;

/// Maestro - runs decomposed task plans against capability agents
#[derive(Parser, Debug)]
#[command(name = "maestro")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    MAESTRO_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.maestro/maestro.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Execute a plan, streaming progress events as JSON lines
    Run {
        /// Plan file (JSON), or `-` for stdin
        plan: PathBuf,

        /// Maximum agent calls in flight at once
        #[arg(short = 'c', long)]
        concurrency: Option<usize>,

        /// Per-task timeout in seconds
        #[arg(short = 't', long)]
        timeout: Option<u64>,

        /// Reject plans naming unregistered capabilities
        #[arg(long)]
        strict: bool,
    },

    /// Validate a plan and print its execution layers
    Validate {
        /// Plan file (JSON), or `-` for stdin
        plan: PathBuf,

        /// Reject plans naming unregistered capabilities
        #[arg(long)]
        strict: bool,
    },

    /// List registered capabilities and their aliases
    Capabilities,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    maestro::log::init(cli.debug);

    if cli.debug {
        mlog!("Maestro starting (debug mode enabled)");
    } else {
        mlog!("Maestro starting");
    }

    match dispatch(cli.command) {
        Ok(code) => code,
        Err(Error::Planning(e)) => {
            mlog_error!("Plan rejected: {}", e);
            eprintln!("maestro: {}", e);
            ExitCode::from(EXIT_PLANNING_ERROR)
        }
        Err(e) => {
            mlog_error!("Fatal: {}", e);
            eprintln!("maestro: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Command) -> Result<ExitCode> {
    let mut config = Config::load()?;
    match command {
        Command::Run {
            plan,
            concurrency,
            timeout,
            strict,
        } => {
            if concurrency.is_some() {
                config.max_concurrency = concurrency;
            }
            if timeout.is_some() {
                config.task_timeout_secs = timeout;
            }
            config.strict_capabilities |= strict;
            config.validate()?;
            run_plan(&plan, &config)
        }
        Command::Validate { plan, strict } => {
            config.strict_capabilities |= strict;
            validate_plan(&plan, &config)
        }
        Command::Capabilities => list_capabilities(&config),
    }
}

fn orchestrator(config: &Config) -> Result<Orchestrator> {
    let registry = AgentRegistry::builtin(&config.knowledge_dir()?)?;
    Ok(Orchestrator::new(
        Arc::new(registry),
        OrchestratorConfig::from(config),
    ))
}

/// Read raw plan text from `path`, or stdin when `path` is `-`.
fn read_plan(path: &Path) -> Result<RawPlan> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(RawPlan::from_planner_output(&text)?)
}

fn run_plan(path: &Path, config: &Config) -> Result<ExitCode> {
    let raw = read_plan(path)?;
    let orchestrator = orchestrator(config)?;
    mlog!(
        "Run command: plan={}, tasks={}, config={:?}",
        path.display(),
        raw.tasks.len(),
        orchestrator.config()
    );

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let (mut events, completion) = orchestrator.spawn(raw).split();

        let cancel = completion.cancellation_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                mlog_warn!("Interrupted, cancelling run");
                eprintln!("maestro: interrupted, waiting for running tasks");
                cancel.cancel();
            }
        });

        while let Some(event) = events.recv().await {
            match event.to_json_line() {
                Ok(line) => println!("{}", line),
                Err(e) => mlog_error!("Failed to encode {} event: {}", event.kind(), e),
            }
        }
        let report = completion.wait().await;
        interrupt.abort();
        report
    })?;

    eprintln!("maestro: {}", report.summary());
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn validate_plan(path: &Path, config: &Config) -> Result<ExitCode> {
    let raw = read_plan(path)?;
    let plan = orchestrator(config)?.validate(raw)?;
    let output = serde_json::json!({
        "tasks": plan.len(),
        "dependencies": plan.graph().dependency_count(),
        "layers": plan.layer_ids(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

fn list_capabilities(config: &Config) -> Result<ExitCode> {
    let orchestrator = orchestrator(config)?;
    for line in capability_lines(orchestrator.registry()) {
        println!("{}", line);
    }
    Ok(ExitCode::SUCCESS)
}

/// One line per capability, with the aliases that resolve to it.
fn capability_lines(registry: &AgentRegistry) -> Vec<String> {
    let aliases = registry.aliases();
    registry
        .capabilities()
        .into_iter()
        .map(|capability| {
            let names: Vec<&str> = aliases
                .iter()
                .filter(|&(_, &target)| target == capability)
                .map(|(&alias, _)| alias)
                .collect();
            if names.is_empty() {
                capability.to_string()
            } else {
                format!("{} (aliases: {})", capability, names.join(", "))
            }
        })
        .collect()
}
