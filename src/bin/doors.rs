//! voxel-doors-server binary
//!
//! Runs the door engine against an in-memory world seeded from a JSON file
//! of structures, and optionally toggles some of them on startup.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                        | Default   | Description                         |
//! |----------------------------|-----------|-------------------------------------|
//! | `DOORS_CONFIG`             | –         | Optional TOML configuration file    |
//! | `DOORS_SESSION`            | `default` | Session stamped on outbound events  |
//! | `DOORS_TICK_RATE_HZ`       | `20`      | Animation tick rate                 |
//! | `DOORS_STRUCTURES`         | –         | JSON array of structures to load    |

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use voxel_doors::{
    activity::ActivityRegistry,
    archetype::ArchetypeRegistry,
    autoclose::AutoCloseScheduler,
    block::BlockState,
    bus::{DoorAgent, DoorAgentConfig, Outbound},
    config,
    events::EventBus,
    orchestrator::{Collaborators, ToggleOrchestrator},
    request::{StructureSelector, ToggleAction, ToggleCause, ToggleRequest},
    service::DoorService,
    structure::{MemoryStore, Structure},
    types::StructureId,
    world::{AllowAll, DefaultClassifier, MemoryWorld},
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "voxel-doors-server", about = "Voxel Doors engine", version)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "DOORS_CONFIG")]
    config: Option<PathBuf>,

    /// Session name (overrides the configuration)
    #[arg(long, env = "DOORS_SESSION")]
    session: Option<String>,

    /// Tick rate in Hz (overrides the configuration)
    #[arg(long, env = "DOORS_TICK_RATE_HZ")]
    tick_rate_hz: Option<f32>,

    /// JSON file holding an array of structures
    #[arg(long, env = "DOORS_STRUCTURES")]
    structures: Option<PathBuf>,

    /// Structure id to toggle once on startup (repeatable)
    #[arg(long = "toggle")]
    toggle: Vec<u64>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voxel_doors=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut service_config = config::load(args.config.as_deref())
        .context("Failed to load door configuration")?;
    if let Some(session) = args.session {
        service_config.session = session;
    }
    if let Some(hz) = args.tick_rate_hz {
        service_config.tick_rate_hz = hz;
    }

    tracing::info!(
        session = %service_config.session,
        tick_rate_hz = service_config.tick_rate_hz,
        "Starting voxel-doors-server"
    );

    // Seed the in-memory world and store
    let world = Arc::new(MemoryWorld::new());
    let store = Arc::new(MemoryStore::new());
    if let Some(path) = &args.structures {
        let raw = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let structures: Vec<Structure> = serde_json::from_slice(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let stone = BlockState::new("stone");
        for structure in structures {
            world.fill(structure.cuboid, &stone);
            store.insert(structure);
        }
        log::info!("Loaded {} structure(s) from {}", store.len(), path.display());
    }

    // Door service (tick-bound) and orchestrator collaborators
    let classifier = Arc::new(DefaultClassifier::from_config(&service_config));
    let service = DoorService::new(service_config.clone(), world.clone(), classifier);
    let movers = service.queue();
    let service = Arc::new(Mutex::new(service));

    let (requests_tx, requests_rx) = mpsc::unbounded_channel();
    let outbound = Outbound::new(service_config.session.clone(), 256);
    let events = Arc::new(EventBus::new());
    events.subscribe(Arc::new(outbound.clone()));

    let orchestrator = Arc::new(ToggleOrchestrator::new(
        service_config.clone(),
        Collaborators {
            archetypes: Arc::new(ArchetypeRegistry::with_builtin()),
            store,
            world,
            authorization: Arc::new(AllowAll),
            events,
            activity: Arc::new(ActivityRegistry::new()),
            auto_close: Arc::new(AutoCloseScheduler::new(requests_tx.clone())),
            movers,
        },
    ));

    if !args.toggle.is_empty() {
        let ids = args.toggle.into_iter().map(StructureId).collect();
        let request = ToggleRequest::new(
            StructureSelector::Many(ids),
            ToggleCause::Server,
            ToggleAction::Toggle,
        );
        requests_tx
            .send(request)
            .context("Request channel closed before startup")?;
    }

    let agent_config = DoorAgentConfig {
        tick_rate_hz: service_config.tick_rate_hz,
    };

    // Run until shutdown
    DoorAgent::new(agent_config, service, orchestrator, requests_rx, outbound)
        .run()
        .await
}
