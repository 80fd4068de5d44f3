mod ant;
mod behavior;
mod building;
mod colony;
mod job;
mod map;
mod resources;
mod sim;
mod tasks;
mod timer;

// Re-export key types for easier imports
pub use ant::{Ant, AntKey, AntRef, FightOpponent};
pub use behavior::{Activity, AntStateMachine, CombatModifier, TerrainModifier};
pub use building::{Building, BuildingKey, BuildingKind};
pub use colony::Colony;
pub use job::Job;
pub use map::{Terrain, Tile, WorldMap};
pub use resources::{ResourceKind, ResourceManager, Stockpile};
pub use sim::Simulation;
pub use tasks::{Task, TaskId, TaskKind, TaskManager, TaskPriority, TaskState};
pub use timer::Timer;

// Map size defaults
pub const DEFAULT_MAP_WIDTH: u32 = 360;
pub const DEFAULT_MAP_HEIGHT: u32 = 200;

// Simulation constants
pub const MAX_COLONIES: usize = 5;
pub const NEST_SIZE: f32 = 8.0;
pub const DEFAULT_RESOURCE_AMOUNT: u32 = 50;
pub const ANT_SPAWN_INTERVAL: f32 = 0.3;

// Ant behavior constants
pub const ANT_SPEED: f32 = 4.0; // cells per second at 1x speed
pub const ANT_LENGTH: f32 = 1.0;
pub const THINK_INTERVAL: f32 = 1.5 / ANT_SPEED; // one decision per ~1.5 cells travelled
pub const MAX_ANT_LONGEVITY: f32 = 300.0; // seconds
pub const ANT_ATTACK_DAMAGE: f32 = 5.0;
pub const ARRIVE_RADIUS: f32 = 0.75;
pub const WANDER_TURN: f32 = 0.9; // max random heading change per think tick (radians)
pub const PATROL_RADIUS: f32 = 10.0;
pub const HAULING_SLOWDOWN: f32 = 0.9; // ants are 10% slower with cargo

// Colony economy constants
pub const NEST_DISCOVERY_RADIUS: f32 = 12.0;
pub const OUTPOST_DISCOVERY_RADIUS: f32 = 8.0;
pub const DISCOVERY_INTERVAL: f32 = 2.0;
pub const SURVEY_SENSE_RADIUS: f32 = 6.0;
pub const MAX_SURVEY_TASKS: usize = 4;
pub const LOW_FOOD_THRESHOLD: u32 = 20;
pub const BUILD_WORK_PER_THINK: f32 = 1.0;
