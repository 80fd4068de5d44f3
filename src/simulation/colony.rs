use std::collections::{HashMap, HashSet};

use glam::Vec2;
use rand::Rng;
use rand::rngs::StdRng;
use slotmap::SlotMap;
use tracing::{debug, warn};

use super::ant::{Ant, AntKey};
use super::building::{Building, BuildingKey, BuildingKind};
use super::job::Job;
use super::map::{Terrain, WorldMap};
use super::resources::{ResourceKind, Stockpile};
use super::tasks::{TaskKind, TaskManager, TaskPriority};
use super::timer::Timer;
use super::{
    ANT_SPAWN_INTERVAL, DISCOVERY_INTERVAL, LOW_FOOD_THRESHOLD, MAX_SURVEY_TASKS,
    NEST_DISCOVERY_RADIUS, OUTPOST_DISCOVERY_RADIUS,
};
use crate::config::{JobWeights, SimulationConfig};

/// Colony-owned state an ant needs while thinking, split out so the ant
/// loop can borrow it alongside the ant storage.
pub struct ColonyContext<'a> {
    pub colony_id: u32,
    pub nest_pos: Vec2,
    pub tasks: &'a mut TaskManager,
    pub stockpile: &'a mut Stockpile,
    pub buildings: &'a mut SlotMap<BuildingKey, Building>,
    pub discovered: &'a mut HashSet<(usize, usize)>,
}

impl ColonyContext<'_> {
    /// Nearest place cargo can be delivered: the nest or any complete
    /// storehouse.
    pub fn drop_off_point(&self, from: Vec2) -> Vec2 {
        let mut best = self.nest_pos;
        let mut best_dist = from.distance_squared(self.nest_pos);
        for site in self.buildings.values() {
            if site.kind == BuildingKind::Storehouse && site.is_complete() {
                let dist = from.distance_squared(site.pos());
                if dist < best_dist {
                    best = site.pos();
                    best_dist = dist;
                }
            }
        }
        best
    }
}

pub struct Colony {
    pub colony_id: u32,
    pub pos: Vec2,
    pub ants: SlotMap<AntKey, Ant>,
    pub buildings: SlotMap<BuildingKey, Building>,
    pub stockpile: Stockpile,
    pub tasks: TaskManager,
    discovered: HashSet<(usize, usize)>,
    spawn_timer: f32,
    discovery_timer: Timer,
    spawn_food_cost: u32,
    job_weights: JobWeights,
}

impl Colony {
    pub fn new(colony_id: u32, pos: Vec2, config: &SimulationConfig) -> Self {
        Self {
            colony_id,
            pos,
            ants: SlotMap::with_capacity_and_key(config.colony_initial_population as usize),
            buildings: SlotMap::with_key(),
            stockpile: Stockpile::new(),
            tasks: TaskManager::new(),
            discovered: HashSet::new(),
            spawn_timer: 0.0,
            discovery_timer: Timer::new(DISCOVERY_INTERVAL),
            spawn_food_cost: config.spawn_food_cost,
            job_weights: config.job_weights.clone(),
        }
    }

    pub fn population(&self) -> usize {
        self.ants.len()
    }

    pub fn is_defeated(&self) -> bool {
        self.ants.is_empty()
    }

    pub fn count_job(&self, job: Job) -> usize {
        self.ants.values().filter(|ant| ant.job == job).count()
    }

    pub(crate) fn update(
        &mut self,
        map: &mut WorldMap,
        other_colonies: &mut HashMap<u32, Colony>,
        rng: &mut StdRng,
        dt: f32,
    ) {
        let mut dead: Vec<AntKey> = Vec::new();
        {
            let Colony {
                colony_id,
                pos,
                ants,
                buildings,
                stockpile,
                tasks,
                discovered,
                ..
            } = self;
            let mut ctx = ColonyContext {
                colony_id: *colony_id,
                nest_pos: *pos,
                tasks,
                stockpile,
                buildings,
                discovered,
            };

            for (key, ant) in ants.iter_mut() {
                // Aging
                ant.longevity = (ant.longevity - dt).max(0.0);
                if ant.is_dead() {
                    dead.push(key);
                    continue;
                }
                ant.update(&mut ctx, map, other_colonies, rng, dt);
            }
        }

        for key in dead {
            self.despawn_ant(key, map);
        }

        self.discovery_timer.advance(dt);
        if self.discovery_timer.is_ready() {
            self.discovery_timer.wrap();
            self.run_discovery(map);
        }

        self.generate_tasks(map, rng);

        self.spawn_timer += dt;
        while self.spawn_timer >= ANT_SPAWN_INTERVAL {
            if !self
                .stockpile
                .try_withdraw(ResourceKind::Food, self.spawn_food_cost)
            {
                // Not enough food banked; keep the elapsed time and wait.
                break;
            }
            self.spawn_timer -= ANT_SPAWN_INTERVAL;
            self.spawn_ant(map, rng);
        }
    }

    /// Passive survey of the ground around the nest and complete outposts.
    fn run_discovery(&mut self, map: &WorldMap) {
        // Forget tiles whose deposit is gone.
        self.discovered.retain(|&tile| map.has_resource_at(tile));

        let mut centers = vec![(self.pos, NEST_DISCOVERY_RADIUS)];
        for site in self.buildings.values() {
            if site.kind == BuildingKind::Outpost && site.is_complete() {
                centers.push((site.pos(), OUTPOST_DISCOVERY_RADIUS));
            }
        }

        for (center, radius) in centers {
            let min_x = (center.x - radius).floor().max(0.0) as usize;
            let min_y = (center.y - radius).floor().max(0.0) as usize;
            let max_x = ((center.x + radius).ceil() as usize).min(map.width as usize);
            let max_y = ((center.y + radius).ceil() as usize).min(map.height as usize);
            for y in min_y..max_y {
                for x in min_x..max_x {
                    let tile_center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    if map.has_resource_at((x, y))
                        && tile_center.distance_squared(center) <= radius * radius
                    {
                        self.discovered.insert((x, y));
                    }
                }
            }
        }
    }

    /// Keep the queue stocked: gathers for known deposits, constructs for
    /// unfinished sites, surveys topped up for the scouts.
    fn generate_tasks(&mut self, map: &WorldMap, rng: &mut StdRng) {
        let buildings = &self.buildings;
        self.tasks.sweep(|task| match &task.kind {
            TaskKind::Gather { tile, .. } => map.has_resource_at(*tile),
            TaskKind::Construct { building } => buildings
                .get(*building)
                .is_some_and(|site| !site.is_complete()),
            TaskKind::Survey { .. } => true,
        });

        let food_is_low = self.stockpile.total(ResourceKind::Food) < LOW_FOOD_THRESHOLD;
        for &tile in &self.discovered {
            if let Some(Terrain::Resource { kind, .. }) = map.terrain_at(tile.0, tile.1) {
                let priority = if kind == ResourceKind::Food && food_is_low {
                    TaskPriority::High
                } else {
                    TaskPriority::Normal
                };
                self.tasks.add(
                    TaskKind::Gather {
                        tile,
                        resource: kind,
                    },
                    priority,
                );
            }
        }

        let unfinished: Vec<BuildingKey> = self
            .buildings
            .iter()
            .filter(|(_, site)| !site.is_complete())
            .map(|(key, _)| key)
            .collect();
        for building in unfinished {
            self.tasks
                .add(TaskKind::Construct { building }, TaskPriority::High);
        }

        let scouts = self.count_job(Job::Scout);
        if scouts > 0 {
            let open_surveys = self
                .tasks
                .iter()
                .filter(|t| matches!(t.kind, TaskKind::Survey { .. }))
                .count();
            let wanted = MAX_SURVEY_TASKS.min(scouts);
            for _ in open_surveys..wanted {
                let tile = map.random_open_tile(rng);
                self.tasks.add(
                    TaskKind::Survey {
                        target: Vec2::new(tile.0 as f32 + 0.5, tile.1 as f32 + 0.5),
                    },
                    TaskPriority::Low,
                );
            }
        }
    }

    /// Queue a building. The leaf cost is withdrawn up front; refusal
    /// leaves the stockpile untouched.
    pub fn try_place_building(
        &mut self,
        kind: BuildingKind,
        tile: (usize, usize),
        map: &WorldMap,
    ) -> anyhow::Result<BuildingKey> {
        if !matches!(map.terrain_at(tile.0, tile.1), Some(Terrain::Soil)) {
            anyhow::bail!("building site ({}, {}) is not open ground", tile.0, tile.1);
        }
        if !self
            .stockpile
            .try_withdraw(ResourceKind::Leaf, kind.leaf_cost())
        {
            anyhow::bail!(
                "colony {} cannot afford a {} ({} leaves needed)",
                self.colony_id,
                kind.label(),
                kind.leaf_cost()
            );
        }
        let key = self.buildings.insert(Building::new(kind, tile));
        self.tasks
            .add(TaskKind::Construct { building: key }, TaskPriority::High);
        debug!(colony = self.colony_id, kind = kind.label(), ?tile, "building placed");
        Ok(key)
    }

    pub(crate) fn spawn_ants(&mut self, map: &mut WorldMap, count: u32, rng: &mut StdRng) {
        for _ in 0..count {
            self.spawn_ant(map, rng);
        }
    }

    pub(crate) fn spawn_ant(&mut self, map: &mut WorldMap, rng: &mut StdRng) {
        let job = self.draw_job(rng);
        let mut ant = Ant::new(self.pos, self.colony_id, job, rng);
        let key = self.ants.insert_with_key(|k| {
            ant.ant_ref.key = k;
            ant
        });

        if let Some(new_ant) = self.ants.get(key) {
            map.register_ant_in_cell(&new_ant.ant_ref, new_ant.pos);
        }
    }

    /// Weighted job draw for a newborn ant.
    fn draw_job(&self, rng: &mut StdRng) -> Job {
        let weights = &self.job_weights;
        let total = weights.total();
        if total == 0 {
            return Job::Worker;
        }
        let mut roll = rng.random_range(0..total);
        for (job, weight) in [
            (Job::Worker, weights.worker),
            (Job::Builder, weights.builder),
            (Job::Scout, weights.scout),
            (Job::Soldier, weights.soldier),
        ] {
            if roll < weight {
                return job;
            }
            roll -= weight;
        }
        Job::Worker
    }

    pub fn despawn_ant(&mut self, key: AntKey, map: &mut WorldMap) {
        let Some(mut ant) = self.ants.remove(key) else {
            warn!(
                ?key,
                colony = self.colony_id,
                "despawn requested for an ant not in this colony"
            );
            return;
        };

        // Carried cargo is dropped where the ant fell.
        let (x, y) = ant.tile();
        for kind in ant.cargo.drain() {
            map.deposit_resource_at(x, y, kind);
        }
        if let Some(id) = ant.task.take() {
            self.tasks.release(id);
        }
        if !map.unregister_ant_from_cell(&ant.ant_ref, ant.pos) {
            warn!(
                ant = ?ant.ant_ref,
                x = ant.pos.x,
                y = ant.pos.y,
                "despawned ant was not registered in its cell"
            );
        }
    }

    /// Replace an ant with a fresh one at the nest. Used when terrain
    /// edits bury the cell an ant stood on.
    pub(crate) fn respawn_ant(&mut self, key: AntKey, map: &mut WorldMap, rng: &mut StdRng) {
        if self.ants.contains_key(key) {
            self.despawn_ant(key, map);
            self.spawn_ant(map, rng);
        } else {
            warn!(
                ?key,
                colony = self.colony_id,
                "respawn requested for an unknown ant"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn setup() -> (Colony, WorldMap, StdRng) {
        let config = SimulationConfig::default();
        let colony = Colony::new(0, Vec2::new(8.5, 8.5), &config);
        let map = WorldMap::new(32, 32);
        let rng = StdRng::seed_from_u64(11);
        (colony, map, rng)
    }

    #[test]
    fn spawned_ants_are_registered_on_the_map() {
        let (mut colony, mut map, mut rng) = setup();
        colony.spawn_ants(&mut map, 5, &mut rng);
        assert_eq!(colony.population(), 5);
        assert_eq!(map.ants_at(8, 8).unwrap().len(), 5);
    }

    #[test]
    fn despawn_drops_cargo_on_the_tile() {
        let (mut colony, mut map, mut rng) = setup();
        colony.spawn_ant(&mut map, &mut rng);
        let key = colony.ants.keys().next().unwrap();
        let ant = colony.ants.get_mut(key).unwrap();
        ant.cargo.try_load(ResourceKind::Food);
        ant.cargo.try_load(ResourceKind::Food);

        colony.despawn_ant(key, &mut map);
        assert!(colony.is_defeated());
        assert_eq!(
            map.terrain_at(8, 8),
            Some(Terrain::Resource {
                kind: ResourceKind::Food,
                amount: 2
            })
        );
    }

    #[test]
    fn discovery_finds_deposits_near_the_nest_only() {
        let (mut colony, mut map, _) = setup();
        map.place_resource_at(10, 10, ResourceKind::Food, 5);
        map.place_resource_at(30, 30, ResourceKind::Food, 5);
        colony.run_discovery(&map);
        assert!(colony.discovered.contains(&(10, 10)));
        assert!(!colony.discovered.contains(&(30, 30)));
    }

    #[test]
    fn known_deposits_become_gather_tasks() {
        let (mut colony, mut map, mut rng) = setup();
        map.place_resource_at(10, 10, ResourceKind::Leaf, 5);
        colony.run_discovery(&map);
        colony.generate_tasks(&map, &mut rng);
        assert!(colony.tasks.iter().any(|t| matches!(
            t.kind,
            TaskKind::Gather {
                tile: (10, 10),
                resource: ResourceKind::Leaf
            }
        )));
    }

    #[test]
    fn gather_priority_rises_when_food_is_low() {
        let (mut colony, mut map, mut rng) = setup();
        map.place_resource_at(10, 10, ResourceKind::Food, 5);
        colony.run_discovery(&map);
        colony.generate_tasks(&map, &mut rng);
        let task = colony.tasks.iter().next().unwrap();
        assert_eq!(task.priority, TaskPriority::High);
    }

    #[test]
    fn building_placement_is_all_or_nothing() {
        let (mut colony, map, _) = setup();
        assert!(
            colony
                .try_place_building(BuildingKind::Storehouse, (12, 12), &map)
                .is_err()
        );
        assert_eq!(colony.stockpile.total(ResourceKind::Leaf), 0);

        colony.stockpile.deposit(ResourceKind::Leaf, 10);
        let key = colony
            .try_place_building(BuildingKind::Storehouse, (12, 12), &map)
            .unwrap();
        assert_eq!(colony.stockpile.total(ResourceKind::Leaf), 0);
        assert!(colony.buildings.contains_key(key));
        assert!(colony.tasks.iter().any(|t| matches!(
            t.kind,
            TaskKind::Construct { building } if building == key
        )));
    }

    #[test]
    fn spawning_burns_stockpiled_food() {
        let (mut colony, mut map, mut rng) = setup();
        let cost = colony.spawn_food_cost;
        colony.stockpile.deposit(ResourceKind::Food, cost * 2);
        let mut others = HashMap::new();

        // Plenty of elapsed time, but only food for two ants.
        for _ in 0..40 {
            colony.update(&mut map, &mut others, &mut rng, 0.1);
        }
        assert_eq!(colony.population(), 2);
        assert_eq!(colony.stockpile.total(ResourceKind::Food), 0);
    }

    #[test]
    fn drop_off_prefers_a_closer_complete_storehouse() {
        let (mut colony, _, _) = setup();
        colony.stockpile.deposit(ResourceKind::Leaf, 20);
        let map = WorldMap::new(32, 32);
        let key = colony
            .try_place_building(BuildingKind::Storehouse, (20, 20), &map)
            .unwrap();

        let Colony {
            colony_id,
            pos,
            buildings,
            stockpile,
            tasks,
            discovered,
            ..
        } = &mut colony;
        let mut ctx = ColonyContext {
            colony_id: *colony_id,
            nest_pos: *pos,
            tasks,
            stockpile,
            buildings,
            discovered,
        };
        // Unfinished storehouse does not receive cargo.
        assert_eq!(ctx.drop_off_point(Vec2::new(20.0, 20.0)), Vec2::new(8.5, 8.5));

        ctx.buildings.get_mut(key).unwrap().advance(1000.0);
        assert_eq!(
            ctx.drop_off_point(Vec2::new(20.0, 20.0)),
            Vec2::new(20.5, 20.5)
        );
    }
}
