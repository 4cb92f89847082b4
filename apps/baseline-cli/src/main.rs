use anyhow::Context;
use baseline_common::{ActorId, ActorKind, Transform};
use baseline_reset::{
    FixedMode, ResetConfig, ResetRequest, RuntimeMode, RuntimeModeProvider,
};
use baseline_world::{Sandbox, World, demo_world};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "baseline-cli", about = "Run world resets against a sandbox world")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perturb a seeded sandbox world, reset it, and report the outcome
    Reset {
        /// all | players | eater | kind:NAME | ids:A,B
        #[arg(short, long, default_value = "all")]
        target: Target,
        /// Correlation signature (empty for none)
        #[arg(short, long, default_value = "")]
        signature: String,
        #[arg(short, long, default_value = "cli")]
        reason: String,
        /// Force strict runtime mode
        #[arg(long)]
        strict: bool,
        /// World seed
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Ticks to simulate before the reset
        #[arg(long, default_value = "10")]
        ticks: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as YAML
    Config,
}

#[derive(Debug, Clone)]
enum Target {
    All,
    Players,
    Eater,
    Kind(ActorKind),
    Ids(Vec<ActorId>),
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(Self::All),
            "players" => Ok(Self::Players),
            "eater" => Ok(Self::Eater),
            other => {
                if let Some(kind) = other.strip_prefix("kind:") {
                    return kind.parse().map(Self::Kind).map_err(|e| e.to_string());
                }
                if let Some(ids) = other.strip_prefix("ids:") {
                    return Ok(Self::Ids(
                        ids.split(',')
                            .map(str::trim)
                            .filter(|id| !id.is_empty())
                            .map(ActorId::from)
                            .collect(),
                    ));
                }
                Err(format!("unknown target '{other}'"))
            }
        }
    }
}

impl Target {
    fn request(&self, reason: &str) -> ResetRequest {
        match self {
            Self::All => ResetRequest::all_actors(reason),
            Self::Players => ResetRequest::players_only(reason),
            Self::Eater => ResetRequest::eater_only(reason),
            Self::Kind(kind) => ResetRequest::by_kind(*kind, reason),
            Self::Ids(ids) => ResetRequest::actor_ids(ids.iter().cloned(), reason),
        }
    }
}

#[derive(Serialize)]
struct RunSummary {
    outcome: String,
    success: bool,
    error: Option<String>,
    targets: Vec<ActorId>,
    spawned: Vec<ActorKind>,
    invocations: usize,
    failures: usize,
    fallback_used: bool,
    degraded_reports: u64,
    tick: u64,
    seed: u64,
    actors: usize,
    hash_before: String,
    hash_after: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => ResetConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ResetConfig::default(),
    };

    match cli.command {
        Commands::Config => print!("{}", config.to_yaml()?),
        Commands::Reset {
            target,
            signature,
            reason,
            strict,
            seed,
            ticks,
            json,
        } => {
            let mode: Arc<dyn RuntimeModeProvider> = if strict {
                Arc::new(FixedMode(RuntimeMode::Strict))
            } else {
                Arc::new(config.mode_provider())
            };
            let world = demo_world(seed);
            let sandbox = Sandbox::new(config, world.clone(), mode);
            perturb(&world, ticks);

            let request = target.request(&reason).with_signature(signature);
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let summary = runtime.block_on(run_reset(&sandbox, request));

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            if !summary.success {
                anyhow::bail!("reset finished with outcome {}", summary.outcome);
            }
        }
    }

    Ok(())
}

/// Move the world away from its baseline so the reset has work to do.
fn perturb(world: &World, ticks: u64) {
    for _ in 0..ticks {
        world.step();
    }
    let player = ActorId::from("player-1");
    let eater = ActorId::from("eater");
    world.damage(&player, 25);
    world.start_timer(&player, "invulnerable");
    world.move_actor(&eater, Transform::at(glam::Vec3::new(3.0, 0.0, 4.0)));
    world.bind(&eater, Some(ActorId::from("player-2")));
    info!(tick = world.tick(), hash = world.state_hash(), "sandbox perturbed");
}

async fn run_reset(sandbox: &Sandbox, request: ResetRequest) -> RunSummary {
    let hash_before = sandbox.world.state_hash();
    let result = sandbox.service.execute(request).await;
    let degraded_reports = sandbox.reporter.summary().total;
    sandbox.reporter.flush_summary();

    let world = &sandbox.world;
    let mut summary = RunSummary {
        outcome: "failed".to_string(),
        success: false,
        error: None,
        targets: Vec::new(),
        spawned: Vec::new(),
        invocations: 0,
        failures: 0,
        fallback_used: false,
        degraded_reports,
        tick: world.tick(),
        seed: world.seed(),
        actors: world.actor_count(),
        hash_before: format!("{hash_before:#018x}"),
        hash_after: format!("{:#018x}", world.state_hash()),
    };
    match result {
        Ok(run) => {
            summary.outcome = run.outcome.to_string();
            summary.success = run.outcome.is_success();
            if let Some(report) = run.report {
                summary.failures = report.failures();
                summary.targets = report.targets;
                summary.spawned = report.spawned;
                summary.invocations = report.invocations;
                summary.fallback_used = report.fallback_used;
            }
        }
        Err(e) => summary.error = Some(e.to_string()),
    }
    summary
}

fn print_summary(s: &RunSummary) {
    println!("Outcome: {} (success={})", s.outcome, s.success);
    if let Some(error) = &s.error {
        println!("Error: {error}");
    }
    let targets: Vec<&str> = s.targets.iter().map(ActorId::as_str).collect();
    println!("Targets: [{}]", targets.join(", "));
    if !s.spawned.is_empty() {
        let spawned: Vec<String> = s.spawned.iter().map(ToString::to_string).collect();
        println!("Respawned: [{}]", spawned.join(", "));
    }
    println!(
        "Participant calls: {}, failures: {}, scene-scan fallback: {}",
        s.invocations, s.failures, s.fallback_used
    );
    println!("Degraded reports: {}", s.degraded_reports);
    println!(
        "World: tick={}, seed={}, actors={}",
        s.tick, s.seed, s.actors
    );
    println!("Hash: {} -> {}", s.hash_before, s.hash_after);
}
