use std::collections::HashMap;
use std::f32;

use glam::Vec2;
use rand::Rng;
use rand::rngs::StdRng;
use slotmap::{Key, new_key_type};
use tracing::{debug, warn};

use super::behavior::{Activity, AntStateMachine, CombatModifier};
use super::colony::{Colony, ColonyContext};
use super::job::Job;
use super::map::WorldMap;
use super::resources::ResourceManager;
use super::tasks::{TaskId, TaskKind};
use super::timer::Timer;
use super::{
    ANT_ATTACK_DAMAGE, ANT_LENGTH, ANT_SPEED, ARRIVE_RADIUS, BUILD_WORK_PER_THINK,
    MAX_ANT_LONGEVITY, PATROL_RADIUS, SURVEY_SENSE_RADIUS, THINK_INTERVAL, WANDER_TURN,
};

new_key_type! {
    /// Key for the colony ant slotmap.
    pub struct AntKey;
}

/// Reference to an ant: slotmap key plus owning colony.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AntRef {
    pub key: AntKey,
    pub colony_id: u32,
}

/// Opponent ant in a fight.
#[derive(Debug, Clone)]
pub struct FightOpponent {
    pub ant_ref: AntRef,
    pub heading: f32,
}

/// A single ant: kinematics, compound behavior state, cargo and combat.
pub struct Ant {
    pub ant_ref: AntRef,

    pub pos: Vec2,
    pub heading: f32,
    pub base_speed: f32,
    pub longevity: f32,
    pub job: Job,
    pub state: AntStateMachine,
    pub cargo: ResourceManager,
    pub task: Option<TaskId>,
    pub target: Option<Vec2>,
    pub fight_opponents: Vec<FightOpponent>,

    think_timer: Timer,
}

impl Ant {
    pub fn new(pos: Vec2, colony_id: u32, job: Job, rng: &mut StdRng) -> Self {
        let ant_ref = AntRef {
            key: AntKey::null(),
            colony_id,
        };

        // Stagger think ticks so a colony does not decide in lockstep.
        let think_timer = Timer::starting_at(THINK_INTERVAL, rng.random_range(0.0..THINK_INTERVAL));

        Self {
            ant_ref,
            pos,
            heading: rng.random_range(0.0..f32::consts::TAU),
            base_speed: ANT_SPEED,
            longevity: MAX_ANT_LONGEVITY,
            job,
            state: AntStateMachine::new(),
            cargo: ResourceManager::new(job.carry_capacity()),
            task: None,
            target: None,
            fight_opponents: Vec::new(),
            think_timer,
        }
    }

    pub fn tile(&self) -> (usize, usize) {
        (
            self.pos.x.floor().max(0.0) as usize,
            self.pos.y.floor().max(0.0) as usize,
        )
    }

    pub fn is_dead(&self) -> bool {
        self.longevity <= 0.0
    }

    pub fn take_damage(&mut self, damage: f32) {
        self.longevity = (self.longevity - damage).max(0.0);
    }

    /// Restore longevity to its maximum.
    pub fn rejuvenate(&mut self) {
        self.longevity = MAX_ANT_LONGEVITY;
    }

    fn rejuvenate_by(&mut self, amount: f32) {
        self.longevity = (self.longevity + amount).min(MAX_ANT_LONGEVITY);
    }

    pub fn is_fighting(&self) -> bool {
        !self.fight_opponents.is_empty()
    }

    /// Update ant state and behavior for one frame.
    pub(crate) fn update(
        &mut self,
        ctx: &mut ColonyContext<'_>,
        map: &mut WorldMap,
        other_colonies: &mut HashMap<u32, Colony>,
        rng: &mut StdRng,
        dt: f32,
    ) {
        if self.is_dead() {
            return;
        }

        self.think_timer.advance(dt);
        if self.think_timer.is_ready() {
            self.think_timer.wrap();
            self.think(ctx, map, other_colonies, rng);
        }

        self.update_position(map, dt);
    }

    /// One decision tick: refresh terrain, resolve combat, drive the task.
    fn think(
        &mut self,
        ctx: &mut ColonyContext<'_>,
        map: &mut WorldMap,
        other_colonies: &mut HashMap<u32, Colony>,
        rng: &mut StdRng,
    ) {
        let (x, y) = self.tile();
        self.state.set_terrain(map.terrain_modifier_at(x, y));

        self.update_combat(ctx, map, other_colonies);
        match self.state.combat() {
            CombatModifier::Fighting => {
                self.strike_opponents(other_colonies);
                return;
            }
            CombatModifier::Fleeing => {
                self.steer(rng);
                return;
            }
            CombatModifier::Calm => {}
        }

        self.drive_task(ctx, map);
        self.steer(rng);
    }

    // ---- combat -------------------------------------------------------

    fn update_combat(
        &mut self,
        ctx: &mut ColonyContext<'_>,
        map: &WorldMap,
        other_colonies: &mut HashMap<u32, Colony>,
    ) {
        let (x, y) = self.tile();
        let enemy = map.enemy_ant_near(x, y, self.ant_ref.colony_id);

        match self.state.combat() {
            CombatModifier::Calm => {
                let Some(enemy_ref) = enemy else { return };
                if self.job == Job::Soldier {
                    if !self.engage(&enemy_ref, other_colonies) {
                        // Out of reach: close the distance.
                        if let Some(enemy_pos) = ant_pos(&enemy_ref, other_colonies) {
                            self.target = Some(enemy_pos);
                        }
                    }
                } else if self.state.set_combat(CombatModifier::Fleeing) {
                    self.abandon_task(ctx);
                    self.target = Some(ctx.nest_pos);
                }
            }
            CombatModifier::Fighting => {
                if self.fight_opponents.is_empty() {
                    self.state.set_combat(CombatModifier::Calm);
                    self.target = None;
                }
            }
            CombatModifier::Fleeing => {
                if enemy.is_none() {
                    self.state.set_combat(CombatModifier::Calm);
                    self.fight_opponents.clear();
                    self.target = None;
                } else {
                    self.target = Some(ctx.nest_pos);
                }
            }
        }
    }

    /// Start a fight with an enemy in reach. Both sides register each
    /// other as opponents so the engagement is mutual.
    fn engage(&mut self, enemy_ref: &AntRef, other_colonies: &mut HashMap<u32, Colony>) -> bool {
        let Some(opponent) = get_ant_mut(enemy_ref, other_colonies) else {
            return false;
        };

        let delta = opponent.pos - self.pos;
        if delta.length_squared() > ANT_LENGTH * ANT_LENGTH {
            return false;
        }
        let heading_to_opponent = delta.y.atan2(delta.x);

        if !self.try_add_opponent(enemy_ref, heading_to_opponent) {
            return false;
        }
        opponent.on_attacked(&self.ant_ref, heading_to_opponent + f32::consts::PI);
        self.state.set_combat(CombatModifier::Fighting)
    }

    /// Reaction to being struck at: soldiers turn and fight, everyone
    /// else routs.
    fn on_attacked(&mut self, attacker: &AntRef, heading_to_attacker: f32) {
        self.try_add_opponent(attacker, heading_to_attacker);
        if self.job == Job::Soldier {
            self.state.set_combat(CombatModifier::Fighting);
        } else {
            self.state.set_combat(CombatModifier::Fleeing);
        }
    }

    fn try_add_opponent(&mut self, opponent_ref: &AntRef, heading: f32) -> bool {
        if self
            .fight_opponents
            .iter()
            .any(|fo| fo.ant_ref == *opponent_ref)
        {
            return false;
        }
        self.fight_opponents.push(FightOpponent {
            ant_ref: opponent_ref.clone(),
            heading,
        });
        true
    }

    pub fn remove_opponent(&mut self, opponent_key: AntKey) {
        self.fight_opponents
            .retain(|fo| fo.ant_ref.key != opponent_key);
    }

    /// Attack opponents until a hit lands or none remain in reach.
    fn strike_opponents(&mut self, other_colonies: &mut HashMap<u32, Colony>) {
        while !self.fight_opponents.is_empty() {
            let opponent = self.fight_opponents[0].clone();
            if self.try_strike(&opponent, other_colonies) {
                return;
            }
        }
    }

    /// Strike one opponent if it is still alive and in reach. Stale or
    /// escaped opponents are dropped from the list.
    fn try_strike(
        &mut self,
        opponent: &FightOpponent,
        other_colonies: &mut HashMap<u32, Colony>,
    ) -> bool {
        self.heading = opponent.heading;

        let mut hit = false;
        let mut target_in_reach = false;

        if let Some(target) = get_ant_mut(&opponent.ant_ref, other_colonies) {
            if self.pos.distance_squared(target.pos) <= ANT_LENGTH * ANT_LENGTH {
                target_in_reach = true;
                target.take_damage(ANT_ATTACK_DAMAGE);
                hit = true;
                if target.is_dead() {
                    debug!(victor = ?self.ant_ref, victim = ?opponent.ant_ref, "ant killed in combat");
                    // A kill restores half of the victor's lost longevity.
                    self.rejuvenate_by((MAX_ANT_LONGEVITY - self.longevity) * 0.5);
                    self.remove_opponent(opponent.ant_ref.key);
                }
            }
        }

        if !target_in_reach {
            self.remove_opponent(opponent.ant_ref.key);
        }
        hit
    }

    // ---- task execution -----------------------------------------------

    fn drive_task(&mut self, ctx: &mut ColonyContext<'_>, map: &mut WorldMap) {
        match self.state.activity() {
            Activity::Idle => self.drive_idle(ctx),
            Activity::Foraging => self.drive_foraging(ctx, map),
            Activity::Harvesting => self.drive_harvesting(ctx, map),
            Activity::Hauling => self.drive_hauling(ctx, map),
            Activity::Building => self.drive_building(ctx),
            Activity::Scouting => self.drive_scouting(ctx, map),
        }
    }

    fn drive_idle(&mut self, ctx: &mut ColonyContext<'_>) {
        // Leftover cargo from an interruption gets delivered first.
        if !self.cargo.is_empty() {
            if self.state.set_activity(Activity::Hauling) {
                self.target = Some(ctx.drop_off_point(self.pos));
            }
            return;
        }

        if let Some(id) = self.task {
            // Interrupted while claimed: resume, or drop a vanished task.
            match ctx.tasks.get(id).map(|t| t.kind.clone()) {
                Some(kind) => self.start_task(kind, ctx),
                None => self.task = None,
            }
        } else if self.state.is_available() {
            if let Some((id, kind)) = ctx.tasks.claim(self.job, self.ant_ref.key) {
                self.task = Some(id);
                self.start_task(kind, ctx);
            } else if self.job == Job::Soldier {
                // Patrol: drift back toward the nest when wandering far.
                if self.pos.distance_squared(ctx.nest_pos) > PATROL_RADIUS * PATROL_RADIUS {
                    self.target = Some(ctx.nest_pos);
                } else {
                    self.target = None;
                }
            } else {
                self.target = None;
            }
        }
    }

    /// Enter the activity for a claimed task. A refused transition
    /// (swimming, combat flicker) keeps the claim; the ant retries on a
    /// later think tick.
    fn start_task(&mut self, kind: TaskKind, ctx: &mut ColonyContext<'_>) {
        match kind {
            TaskKind::Gather { tile, .. } => {
                if self.state.set_activity(Activity::Foraging) {
                    self.target = Some(tile_center(tile));
                }
            }
            TaskKind::Construct { building } => {
                let Some(site) = ctx.buildings.get(building) else {
                    self.reset_idle();
                    return;
                };
                let site_pos = site.pos();
                if self.state.set_activity(Activity::Building) {
                    self.target = Some(site_pos);
                }
            }
            TaskKind::Survey { target } => {
                if self.state.set_activity(Activity::Scouting) {
                    self.target = Some(target);
                }
            }
        }
    }

    fn drive_foraging(&mut self, ctx: &mut ColonyContext<'_>, map: &WorldMap) {
        let Some(TaskKind::Gather { tile, .. }) = self.task_kind(ctx) else {
            self.reset_idle();
            return;
        };
        if !map.has_resource_at(tile) {
            // Someone exhausted the deposit while we travelled.
            self.finish_task(ctx);
            if !self.cargo.is_empty() && self.state.set_activity(Activity::Hauling) {
                self.target = Some(ctx.drop_off_point(self.pos));
            }
            return;
        }
        let destination = tile_center(tile);
        self.target = Some(destination);
        if self.arrived(destination) && self.state.set_activity(Activity::Harvesting) {
            self.target = None;
        }
    }

    fn drive_harvesting(&mut self, ctx: &mut ColonyContext<'_>, map: &mut WorldMap) {
        let Some(TaskKind::Gather { tile, .. }) = self.task_kind(ctx) else {
            if self.cargo.is_empty() {
                self.reset_idle();
            } else if self.state.set_activity(Activity::Hauling) {
                self.task = None;
                self.target = Some(ctx.drop_off_point(self.pos));
            }
            return;
        };

        if self.cargo.is_full() {
            if self.state.set_activity(Activity::Hauling) {
                self.target = Some(ctx.drop_off_point(self.pos));
            }
            return;
        }

        match map.take_resource_at(tile.0, tile.1) {
            Some(kind) => {
                if !self.cargo.try_load(kind) {
                    // Full after all; put the unit back and go deliver.
                    map.deposit_resource_at(tile.0, tile.1, kind);
                    if self.state.set_activity(Activity::Hauling) {
                        self.target = Some(ctx.drop_off_point(self.pos));
                    }
                }
            }
            None => {
                // Deposit exhausted under us.
                self.finish_task(ctx);
                if !self.cargo.is_empty() && self.state.set_activity(Activity::Hauling) {
                    self.target = Some(ctx.drop_off_point(self.pos));
                }
            }
        }
    }

    fn drive_hauling(&mut self, ctx: &mut ColonyContext<'_>, map: &WorldMap) {
        let drop_off = ctx.drop_off_point(self.pos);
        self.target = Some(drop_off);
        if !self.arrived(drop_off) {
            return;
        }

        for kind in self.cargo.drain() {
            ctx.stockpile.deposit(kind, 1);
        }

        match self.task_kind(ctx) {
            Some(TaskKind::Gather { tile, .. }) if map.has_resource_at(tile) => {
                // Deposit still stocked: head back for another trip.
                if self.state.set_activity(Activity::Foraging) {
                    self.target = Some(tile_center(tile));
                }
            }
            Some(TaskKind::Gather { .. }) => self.finish_task(ctx),
            _ => self.reset_idle(),
        }
    }

    fn drive_building(&mut self, ctx: &mut ColonyContext<'_>) {
        let Some(TaskKind::Construct { building }) = self.task_kind(ctx) else {
            self.reset_idle();
            return;
        };
        let Some(site) = ctx.buildings.get_mut(building) else {
            self.reset_idle();
            return;
        };
        if site.is_complete() {
            self.finish_task(ctx);
            return;
        }
        let site_pos = site.pos();
        if self.arrived(site_pos) {
            self.target = None;
            if site.advance(BUILD_WORK_PER_THINK) {
                debug!(kind = site.kind.label(), tile = ?site.tile, "construction complete");
                self.finish_task(ctx);
            }
        } else {
            self.target = Some(site_pos);
        }
    }

    fn drive_scouting(&mut self, ctx: &mut ColonyContext<'_>, map: &WorldMap) {
        let Some(TaskKind::Survey { target }) = self.task_kind(ctx) else {
            self.reset_idle();
            return;
        };
        // Survey as we travel, not just at the destination.
        self.discover_around(map, ctx);
        if self.arrived(target) {
            self.finish_task(ctx);
        } else {
            self.target = Some(target);
        }
    }

    /// Record resource tiles near the ant into the colony's known set.
    fn discover_around(&self, map: &WorldMap, ctx: &mut ColonyContext<'_>) {
        let radius = SURVEY_SENSE_RADIUS;
        let min_x = (self.pos.x - radius).floor().max(0.0) as usize;
        let min_y = (self.pos.y - radius).floor().max(0.0) as usize;
        let max_x = ((self.pos.x + radius).ceil() as usize).min(map.width as usize);
        let max_y = ((self.pos.y + radius).ceil() as usize).min(map.height as usize);
        for y in min_y..max_y {
            for x in min_x..max_x {
                if map.has_resource_at((x, y))
                    && tile_center((x, y)).distance_squared(self.pos) <= radius * radius
                {
                    ctx.discovered.insert((x, y));
                }
            }
        }
    }

    fn task_kind(&self, ctx: &ColonyContext<'_>) -> Option<TaskKind> {
        self.task
            .and_then(|id| ctx.tasks.get(id))
            .map(|t| t.kind.clone())
    }

    fn finish_task(&mut self, ctx: &mut ColonyContext<'_>) {
        if let Some(id) = self.task.take() {
            ctx.tasks.complete(id);
        }
        self.state.set_activity(Activity::Idle);
        self.target = None;
    }

    /// Give up the claim without completing; another ant may take over.
    fn abandon_task(&mut self, ctx: &mut ColonyContext<'_>) {
        if let Some(id) = self.task.take() {
            ctx.tasks.release(id);
        }
        self.target = None;
    }

    fn reset_idle(&mut self) {
        self.task = None;
        self.state.set_activity(Activity::Idle);
        self.target = None;
    }

    fn arrived(&self, point: Vec2) -> bool {
        self.pos.distance_squared(point) <= ARRIVE_RADIUS * ARRIVE_RADIUS
    }

    // ---- movement -----------------------------------------------------

    /// Point the heading at the target with a little jitter, or wander.
    fn steer(&mut self, rng: &mut StdRng) {
        match self.target {
            Some(target) => {
                let delta = target - self.pos;
                if delta.length_squared() > f32::EPSILON {
                    let jitter = rng.random_range(-0.1..0.1);
                    self.heading = delta.y.atan2(delta.x) + jitter;
                }
            }
            None => {
                self.heading = (self.heading + rng.random_range(-WANDER_TURN..WANDER_TURN))
                    .rem_euclid(f32::consts::TAU);
            }
        }
    }

    fn update_position(&mut self, map: &mut WorldMap, dt: f32) {
        // Working in place: rooted at the site until the activity ends.
        if self.state.activity().is_work() && self.target.is_none() {
            return;
        }
        let factor = self.state.speed_factor() * self.job.speed_modifier();
        if factor <= 0.0 {
            return;
        }
        let speed = self.base_speed * factor;
        let (dy, dx) = self.heading.sin_cos();
        let next_x = self.pos.x + dx * speed * dt;
        let next_y = self.pos.y + dy * speed * dt;

        if next_x.is_nan() || next_y.is_nan() {
            warn!(
                ant = ?self.ant_ref,
                heading = self.heading,
                "computed NaN next position, movement skipped"
            );
            return;
        }

        let blocked = map.is_blocked(next_x.floor() as isize, next_y.floor() as isize);
        if !blocked {
            self.move_to_pos(map, Vec2::new(next_x, next_y));
            return;
        }

        // Collision: probe 45 degrees either way, prefer clockwise, turn
        // around when boxed in.
        let try_heading = |angle: f32| -> bool {
            let (py, px) = (self.heading + angle).sin_cos();
            let tx = self.pos.x + px * speed * dt;
            let ty = self.pos.y + py * speed * dt;
            !map.is_blocked(tx.floor() as isize, ty.floor() as isize)
        };

        let cw_clear = try_heading(f32::consts::FRAC_PI_4);
        let ccw_clear = try_heading(-f32::consts::FRAC_PI_4);

        let turn = if cw_clear {
            f32::consts::FRAC_PI_4
        } else if ccw_clear {
            -f32::consts::FRAC_PI_4
        } else {
            f32::consts::PI
        };
        self.heading = (self.heading + turn).rem_euclid(f32::consts::TAU);
    }

    /// Moves the ant and keeps its registration in the spatial grid in
    /// sync across cell boundaries.
    pub(crate) fn move_to_pos(&mut self, map: &mut WorldMap, new_pos: Vec2) {
        let old_pos = self.pos;
        let old_cell = (old_pos.x.floor() as isize, old_pos.y.floor() as isize);
        let new_cell = (new_pos.x.floor() as isize, new_pos.y.floor() as isize);

        self.pos = new_pos;
        if old_cell != new_cell {
            if !map.unregister_ant_from_cell(&self.ant_ref, old_pos) {
                warn!(
                    ant = ?self.ant_ref,
                    cell = ?old_cell,
                    "ant missing from its expected cell during move"
                );
            }
            map.register_ant_in_cell(&self.ant_ref, self.pos);
        }
    }
}

fn tile_center(tile: (usize, usize)) -> Vec2 {
    Vec2::new(tile.0 as f32 + 0.5, tile.1 as f32 + 0.5)
}

fn get_ant_mut<'a>(
    ant_ref: &AntRef,
    other_colonies: &'a mut HashMap<u32, Colony>,
) -> Option<&'a mut Ant> {
    let colony = other_colonies.get_mut(&ant_ref.colony_id)?;
    let ant = colony.ants.get_mut(ant_ref.key)?;
    if ant.is_dead() { None } else { Some(ant) }
}

fn ant_pos(ant_ref: &AntRef, other_colonies: &HashMap<u32, Colony>) -> Option<Vec2> {
    other_colonies
        .get(&ant_ref.colony_id)
        .and_then(|colony| colony.ants.get(ant_ref.key))
        .map(|ant| ant.pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn new_ant_starts_idle_with_job_capacity() {
        let ant = Ant::new(Vec2::new(5.0, 5.0), 0, Job::Worker, &mut rng());
        assert_eq!(ant.state.activity(), Activity::Idle);
        assert_eq!(ant.cargo.capacity(), Job::Worker.carry_capacity());
        assert!(!ant.is_dead());
    }

    #[test]
    fn damage_kills_at_zero_longevity() {
        let mut ant = Ant::new(Vec2::new(5.0, 5.0), 0, Job::Soldier, &mut rng());
        ant.take_damage(MAX_ANT_LONGEVITY * 2.0);
        assert!(ant.is_dead());
        assert_eq!(ant.longevity, 0.0);
    }

    #[test]
    fn kill_reward_restores_half_the_missing_longevity() {
        let mut ant = Ant::new(Vec2::new(5.0, 5.0), 0, Job::Soldier, &mut rng());
        ant.take_damage(100.0);
        ant.rejuvenate_by((MAX_ANT_LONGEVITY - ant.longevity) * 0.5);
        assert!((ant.longevity - (MAX_ANT_LONGEVITY - 50.0)).abs() < 0.01);
    }

    #[test]
    fn opponents_are_registered_once() {
        let mut ant = Ant::new(Vec2::new(5.0, 5.0), 0, Job::Soldier, &mut rng());
        let enemy = AntRef {
            key: AntKey::null(),
            colony_id: 1,
        };
        assert!(ant.try_add_opponent(&enemy, 0.0));
        assert!(!ant.try_add_opponent(&enemy, 1.0));
        assert!(ant.is_fighting());
        ant.remove_opponent(enemy.key);
        assert!(!ant.is_fighting());
    }

    #[test]
    fn move_to_pos_keeps_spatial_registry_in_sync() {
        let mut map = WorldMap::new(16, 16);
        let mut ant = Ant::new(Vec2::new(2.5, 2.5), 0, Job::Worker, &mut rng());
        map.register_ant_in_cell(&ant.ant_ref, ant.pos);

        ant.move_to_pos(&mut map, Vec2::new(3.5, 2.5));
        assert!(map.ants_at(2, 2).unwrap().is_empty());
        assert_eq!(map.ants_at(3, 2).unwrap().len(), 1);

        // Moving within a cell leaves the registration untouched.
        ant.move_to_pos(&mut map, Vec2::new(3.9, 2.9));
        assert_eq!(map.ants_at(3, 2).unwrap().len(), 1);
    }

    #[test]
    fn blocked_ant_turns_instead_of_moving() {
        let mut map = WorldMap::new(8, 8);
        for y in 0..8 {
            map.place_rock_at(4, y);
        }
        let mut ant = Ant::new(Vec2::new(3.9, 4.5), 0, Job::Worker, &mut rng());
        map.register_ant_in_cell(&ant.ant_ref, ant.pos);
        ant.heading = 0.0; // straight at the wall
        let before = ant.pos;
        ant.update_position(&mut map, 0.2);
        assert_eq!(ant.pos, before);
        assert!(ant.heading != 0.0);
    }
}
