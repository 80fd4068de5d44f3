use tracing::warn;

use super::HAULING_SLOWDOWN;

/// Primary activity of an ant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    /// Travelling to a resource tile.
    Foraging,
    /// Extracting resources at a tile.
    Harvesting,
    /// Carrying cargo to a drop-off point.
    Hauling,
    /// Working a construction site.
    Building,
    /// Travelling to survey a point.
    Scouting,
}

impl Activity {
    pub fn label(&self) -> &'static str {
        match self {
            Activity::Idle => "Idle",
            Activity::Foraging => "Foraging",
            Activity::Harvesting => "Harvesting",
            Activity::Hauling => "Hauling",
            Activity::Building => "Building",
            Activity::Scouting => "Scouting",
        }
    }

    /// Work activities are the ones that act on the world in place, as
    /// opposed to travelling. They are gated by combat and deep water.
    pub fn is_work(&self) -> bool {
        matches!(self, Activity::Harvesting | Activity::Building)
    }
}

/// Combat overlay on top of the primary activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatModifier {
    Calm,
    Fighting,
    Fleeing,
}

impl CombatModifier {
    pub fn label(&self) -> &'static str {
        match self {
            CombatModifier::Calm => "Calm",
            CombatModifier::Fighting => "Fighting",
            CombatModifier::Fleeing => "Fleeing",
        }
    }

    fn speed_factor(&self) -> f32 {
        match self {
            CombatModifier::Calm => 1.0,
            // A fighting ant is rooted in place until the fight resolves.
            CombatModifier::Fighting => 0.0,
            CombatModifier::Fleeing => 1.25,
        }
    }
}

/// Terrain overlay, derived from the tile under the ant every think tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainModifier {
    Ground,
    Mud,
    Water,
}

impl TerrainModifier {
    pub fn label(&self) -> &'static str {
        match self {
            TerrainModifier::Ground => "Ground",
            TerrainModifier::Mud => "Mud",
            TerrainModifier::Water => "Water",
        }
    }

    fn speed_factor(&self) -> f32 {
        match self {
            TerrainModifier::Ground => 1.0,
            TerrainModifier::Mud => 0.55,
            TerrainModifier::Water => 0.35,
        }
    }
}

/// Compound ant state: activity x combat x terrain.
///
/// The three axes are stored independently but coupled through transition
/// gates: no reachable compound state has an ant working while fighting,
/// fleeing or swimming. Invalid transitions are refused with a warning and
/// leave the state untouched; callers branch on the returned `bool`.
#[derive(Debug, Clone)]
pub struct AntStateMachine {
    activity: Activity,
    combat: CombatModifier,
    terrain: TerrainModifier,
}

impl AntStateMachine {
    pub fn new() -> Self {
        Self {
            activity: Activity::Idle,
            combat: CombatModifier::Calm,
            terrain: TerrainModifier::Ground,
        }
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn combat(&self) -> CombatModifier {
        self.combat
    }

    pub fn terrain(&self) -> TerrainModifier {
        self.terrain
    }

    /// The only state in which a task may be claimed.
    pub fn is_available(&self) -> bool {
        self.activity == Activity::Idle && self.combat == CombatModifier::Calm
    }

    /// Attempt an activity transition. Refusals warn, keep the current
    /// state and return false.
    pub fn set_activity(&mut self, next: Activity) -> bool {
        if next == self.activity {
            return true;
        }
        // Idle is reachable from everywhere; it is how work is abandoned.
        if next == Activity::Idle {
            self.activity = Activity::Idle;
            return true;
        }
        if self.combat != CombatModifier::Calm {
            warn!(
                from = self.activity.label(),
                to = next.label(),
                combat = self.combat.label(),
                "refused activity transition while in combat"
            );
            return false;
        }
        if self.terrain == TerrainModifier::Water && next.is_work() {
            warn!(
                from = self.activity.label(),
                to = next.label(),
                "refused work activity while swimming"
            );
            return false;
        }
        let legal = matches!(
            (self.activity, next),
            (
                Activity::Idle,
                Activity::Foraging | Activity::Building | Activity::Scouting | Activity::Hauling
            ) | (Activity::Foraging, Activity::Harvesting)
                | (Activity::Harvesting, Activity::Hauling)
                | (Activity::Hauling, Activity::Foraging)
        );
        if legal {
            self.activity = next;
            true
        } else {
            warn!(
                from = self.activity.label(),
                to = next.label(),
                "refused invalid activity transition"
            );
            false
        }
    }

    /// Attempt a combat transition. Entering `Fighting` or `Fleeing`
    /// interrupts the current activity.
    pub fn set_combat(&mut self, next: CombatModifier) -> bool {
        if next == self.combat {
            return true;
        }
        // A routed ant does not rejoin the fight.
        if self.combat == CombatModifier::Fleeing && next == CombatModifier::Fighting {
            warn!("refused combat transition Fleeing -> Fighting");
            return false;
        }
        self.combat = next;
        if next != CombatModifier::Calm && self.activity != Activity::Idle {
            self.activity = Activity::Idle;
        }
        true
    }

    /// Track the tile under the ant. Always legal; wading into deep water
    /// cancels any in-place work.
    pub fn set_terrain(&mut self, next: TerrainModifier) {
        if next == self.terrain {
            return;
        }
        self.terrain = next;
        if next == TerrainModifier::Water && self.activity.is_work() {
            self.activity = Activity::Idle;
        }
    }

    /// Multiplicative speed factor from the compound state.
    pub fn speed_factor(&self) -> f32 {
        let load = if self.activity == Activity::Hauling {
            HAULING_SLOWDOWN
        } else {
            1.0
        };
        self.terrain.speed_factor() * self.combat.speed_factor() * load
    }
}

impl Default for AntStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
