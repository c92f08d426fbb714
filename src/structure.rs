//! Structure subsystem: door-like entities, their owners, and the storage
//! boundary they are loaded from and saved to.

use crate::error::StoreError;
use crate::types::{Cuboid, Direction, PlayerId, StructureId, Vec3i};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Owners
// ---------------------------------------------------------------------------

/// Permission level of the creator of a structure.
pub const PRIME_OWNER: u8 = 0;
pub const ADMIN: u8 = 1;
pub const USER: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub player: PlayerId,
    /// Lower is stronger; [`PRIME_OWNER`] is the creator.
    pub permission: u8,
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// A single animatable structure (door, drawbridge, portcullis, sliding door).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub id: StructureId,
    pub name: String,
    pub cuboid: Cuboid,
    /// Rotation or translation anchor.
    pub engine: Vec3i,
    pub is_open: bool,
    pub is_locked: bool,
    /// Archetype name, resolved through the archetype registry.
    pub archetype: String,
    pub owners: Vec<Owner>,
    pub open_dir: Direction,
    /// Distance for translating archetypes; 0 means the archetype default.
    #[serde(default)]
    pub blocks_to_move: u32,
    /// Seconds after opening before the structure closes itself.
    #[serde(default)]
    pub auto_close: Option<u32>,
}

impl Structure {
    pub fn new(
        id: StructureId,
        archetype: impl Into<String>,
        cuboid: Cuboid,
        engine: Vec3i,
        open_dir: Direction,
        prime_owner: PlayerId,
    ) -> Self {
        Self {
            id,
            name: format!("door-{}", id.0),
            cuboid,
            engine,
            is_open: false,
            is_locked: false,
            archetype: archetype.into(),
            owners: vec![Owner {
                player: prime_owner,
                permission: PRIME_OWNER,
            }],
            open_dir,
            blocks_to_move: 0,
            auto_close: None,
        }
    }

    pub fn with_blocks_to_move(mut self, blocks: u32) -> Self {
        self.blocks_to_move = blocks;
        self
    }

    pub fn with_auto_close(mut self, seconds: u32) -> Self {
        self.auto_close = Some(seconds);
        self
    }

    pub fn owner(&self, player: &PlayerId) -> Option<&Owner> {
        self.owners.iter().find(|o| &o.player == player)
    }

    pub fn prime_owner(&self) -> Option<&Owner> {
        self.owners.iter().find(|o| o.permission == PRIME_OWNER)
    }

    pub fn add_owner(&mut self, player: PlayerId, permission: u8) {
        match self.owners.iter_mut().find(|o| o.player == player) {
            Some(existing) => existing.permission = permission,
            None => self.owners.push(Owner { player, permission }),
        }
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.is_locked = locked;
    }

    /// Auto-close delay, if enabled.
    pub fn auto_close_delay(&self) -> Option<Duration> {
        self.auto_close
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs as u64))
    }
}

// ---------------------------------------------------------------------------
// Storage boundary
// ---------------------------------------------------------------------------

/// Persistence collaborator. The engine only loads and saves whole structures;
/// schema and query execution belong to the implementation.
pub trait StructureStore: Send + Sync {
    fn load_structure(&self, id: StructureId) -> Result<Structure, StoreError>;
    fn save_structure(&self, structure: &Structure) -> Result<(), StoreError>;
}

/// Holds structures in memory. Used by the standalone server and by tests.
pub struct MemoryStore {
    structures: RwLock<HashMap<StructureId, Structure>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            structures: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, structure: Structure) {
        self.structures.write().insert(structure.id, structure);
    }

    pub fn get(&self, id: StructureId) -> Option<Structure> {
        self.structures.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.structures.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.read().is_empty()
    }

    pub fn ids(&self) -> Vec<StructureId> {
        let mut ids: Vec<_> = self.structures.read().keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureStore for MemoryStore {
    fn load_structure(&self, id: StructureId) -> Result<Structure, StoreError> {
        self.get(id).ok_or(StoreError::NotFound(id))
    }

    fn save_structure(&self, structure: &Structure) -> Result<(), StoreError> {
        self.insert(structure.clone());
        Ok(())
    }
}
