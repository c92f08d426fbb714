//! Voxel Doors
//!
//! Toggle orchestration and block animation engine for door-like
//! structures in a voxel world.
//!
//! ## Architecture
//!
//! ```text
//! DoorAgent  (bus.rs)                       ← tick loop, request intake
//!   ├── ToggleOrchestrator  (orchestrator.rs) ← validate → lease → animate → commit
//!   │     ├── ArchetypeRegistry  (archetype/) ← destination geometry
//!   │     ├── ActivityRegistry   (activity.rs) ← one toggle per structure
//!   │     ├── EventBus           (events.rs)
//!   │     └── AutoCloseScheduler (autoclose.rs)
//!   └── DoorService  (service.rs)             ← steps Movers once per tick
//!         └── Mover  (mover.rs)               ← capture, animate, commit / restore
//! ```
//!
//! The world, structure storage and protection checks are traits in
//! [`world`] and [`structure`]; in-memory implementations ship with the crate.

// Core library is always available.
pub mod activity;
pub mod archetype;
pub mod autoclose;
pub mod block;
pub mod config;
pub mod error;
pub mod events;
pub mod mover;
pub mod orchestrator;
pub mod protocol;
pub mod request;
pub mod service;
pub mod structure;
pub mod types;
pub mod world;

// Agent loop requires the `server` feature.
#[cfg(feature = "server")]
pub mod bus;

#[cfg(feature = "server")]
pub use bus::{DoorAgent, DoorAgentConfig, Outbound};

pub use activity::{ActivityRegistry, Lease};
pub use archetype::{Archetype, ArchetypeExtension, ArchetypeRegistry};
pub use autoclose::AutoCloseScheduler;
pub use block::{BlockState, Rotation};
pub use error::{GeometryError, MoverError, ToggleError};
pub use events::{EventBus, ToggleListener, Verdict};
pub use mover::Mover;
pub use orchestrator::{Collaborators, ToggleOrchestrator};
pub use request::{Rejection, ToggleAction, ToggleCause, ToggleOutcome, ToggleRequest};
pub use service::{DoorService, MoverQueue};
pub use structure::{MemoryStore, Structure, StructureStore};
pub use types::{Cuboid, Direction, DoorServiceConfig, DoorStats, StructureId, Vec3i};
pub use world::{MemoryWorld, WorldAccess};
