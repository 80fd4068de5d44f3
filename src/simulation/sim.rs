use std::collections::HashMap;

use anyhow::{Result, bail};
use glam::Vec2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use super::ant::{Ant, AntRef};
use super::building::{BuildingKey, BuildingKind};
use super::colony::Colony;
use super::map::{Terrain, WorldMap};
use super::resources::ResourceKind;
use crate::config::SimulationConfig;

/// The whole world: terrain, colonies and the shared RNG.
///
/// Everything an external shell (renderer, editor, UI) does to the world
/// goes through this type's mutation and query methods.
pub struct Simulation {
    pub tick: u64,
    pub map: WorldMap,
    pub colonies: HashMap<u32, Colony>,
    pub is_paused: bool,
    pub config: SimulationConfig,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            tick: 0,
            map: WorldMap::new(config.map_width, config.map_height),
            colonies: HashMap::with_capacity(config.max_colonies),
            is_paused: true,
            config: config.clone(),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    pub fn update(&mut self, dt: f32) {
        if self.is_paused {
            return;
        }
        self.step(dt);
        self.tick += 1;
    }

    fn step(&mut self, dt: f32) {
        // Shuffle the processing order so no colony always moves first.
        let mut colony_ids: Vec<u32> = self.colonies.keys().copied().collect();
        colony_ids.shuffle(&mut self.rng);

        for colony_id in colony_ids {
            // Remove the colony so the rest can be passed as opponents.
            if let Some(mut colony) = self.colonies.remove(&colony_id) {
                colony.update(&mut self.map, &mut self.colonies, &mut self.rng, dt);
                self.colonies.insert(colony_id, colony);
            }
        }
    }

    /// Found a colony at a world position. Fails when the colony cap is
    /// reached or the nest tile is not open ground.
    pub fn spawn_colony(&mut self, pos: Vec2) -> Result<u32> {
        if self.colonies.len() >= self.config.max_colonies {
            bail!("max colonies ({}) reached", self.config.max_colonies);
        }
        let x = pos.x.floor() as usize;
        let y = pos.y.floor() as usize;
        if !matches!(self.map.terrain_at(x, y), Some(Terrain::Soil)) {
            bail!("nest position ({}, {}) is not open ground", x, y);
        }

        // Reuse the lowest freed id.
        let Some(colony_id) =
            (0..self.config.max_colonies as u32).find(|id| !self.colonies.contains_key(id))
        else {
            bail!("no free colony id below the cap");
        };

        self.map.place_nest_at(x, y, colony_id);
        let mut colony = Colony::new(colony_id, pos, &self.config);
        colony.spawn_ants(
            &mut self.map,
            self.config.colony_initial_population,
            &mut self.rng,
        );
        info!(
            colony = colony_id,
            x = pos.x,
            y = pos.y,
            population = colony.population(),
            "colony founded"
        );
        self.colonies.insert(colony_id, colony);
        Ok(colony_id)
    }

    pub fn remove_colony(&mut self, colony_id: u32) -> bool {
        let Some(colony) = self.colonies.remove(&colony_id) else {
            return false;
        };
        self.map.remove_colony_ants(colony_id);
        let x = colony.pos.x.floor() as usize;
        let y = colony.pos.y.floor() as usize;
        if let Some(Terrain::Nest(id)) = self.map.terrain_at(x, y) {
            if id == colony_id {
                self.map.clear_terrain_at(x, y);
            }
        }
        true
    }

    // ---- editor surface ------------------------------------------------

    /// Place impassable rock. Ants standing on the cell are relocated to
    /// their nest rather than entombed.
    pub fn place_rock_at(&mut self, x: usize, y: usize) {
        let buried: Vec<AntRef> = self
            .map
            .ants_at(x, y)
            .map(|ants| ants.iter().cloned().collect())
            .unwrap_or_default();

        if !self.map.place_rock_at(x, y) {
            return;
        }

        for ant_ref in buried {
            if let Some(colony) = self.colonies.get_mut(&ant_ref.colony_id) {
                colony.respawn_ant(ant_ref.key, &mut self.map, &mut self.rng);
            } else {
                warn!(
                    ?ant_ref,
                    x, y, "colony missing for ant buried by rock; ant lost"
                );
            }
        }
    }

    pub fn place_resource_at(&mut self, x: usize, y: usize, kind: ResourceKind, amount: u32) {
        self.map.place_resource_at(x, y, kind, amount);
    }

    pub fn place_water_at(&mut self, x: usize, y: usize) {
        self.map.place_water_at(x, y);
    }

    pub fn place_mud_at(&mut self, x: usize, y: usize) {
        self.map.place_mud_at(x, y);
    }

    pub fn clear_terrain_at(&mut self, x: usize, y: usize) {
        self.map.clear_terrain_at(x, y);
    }

    pub fn terrain_at(&self, x: usize, y: usize) -> Option<Terrain> {
        self.map.terrain_at(x, y)
    }

    /// Queue a building for a colony through the editor surface.
    pub fn place_building(
        &mut self,
        colony_id: u32,
        kind: BuildingKind,
        tile: (usize, usize),
    ) -> Result<BuildingKey> {
        let Some(colony) = self.colonies.get_mut(&colony_id) else {
            bail!("no colony with id {}", colony_id);
        };
        colony.try_place_building(kind, tile, &self.map)
    }

    // ---- queries for the UI shell -------------------------------------

    pub fn get_ant(&self, ant_ref: &AntRef) -> Option<&Ant> {
        self.colonies
            .get(&ant_ref.colony_id)
            .and_then(|colony| colony.ants.get(ant_ref.key))
    }

    /// Closest ant within `click_radius` of a world position, scanning
    /// the 3x3 cell neighbourhood. Selection queries from the UI shell.
    pub fn get_ant_at_world_pos(&self, world_pos: Vec2, click_radius: f32) -> Option<AntRef> {
        let cell_x = world_pos.x.floor() as isize;
        let cell_y = world_pos.y.floor() as isize;

        let mut closest: Option<AntRef> = None;
        let mut min_dist_sq = click_radius * click_radius;

        for dy in -1..=1 {
            for dx in -1..=1 {
                let x = cell_x + dx;
                let y = cell_y + dy;
                if x < 0 || y < 0 {
                    continue;
                }
                let Some(ants) = self.map.ants_at(x as usize, y as usize) else {
                    continue;
                };
                for ant_ref in ants {
                    if let Some(ant) = self.get_ant(ant_ref) {
                        let dist_sq = ant.pos.distance_squared(world_pos);
                        if dist_sq < min_dist_sq {
                            min_dist_sq = dist_sq;
                            closest = Some(ant_ref.clone());
                        }
                    }
                }
            }
        }
        closest
    }

    pub fn total_ant_count(&self) -> usize {
        self.colonies.values().map(|colony| colony.population()).sum()
    }

    // ---- run control ---------------------------------------------------

    pub fn pause(&mut self) {
        self.is_paused = true;
    }

    pub fn unpause(&mut self) {
        self.is_paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.is_paused = !self.is_paused;
    }

    /// Restart every colony in place with its initial population. Terrain
    /// edits survive the reset; ants, tasks and stockpiles do not.
    pub fn reset(&mut self) {
        self.pause();
        self.tick = 0;

        let spawn_points: Vec<Vec2> = self.colonies.values().map(|colony| colony.pos).collect();
        self.colonies.clear();
        self.map.soft_reset();

        for pos in spawn_points {
            let x = pos.x.floor() as usize;
            let y = pos.y.floor() as usize;
            // The nest tile is still marked from the first founding.
            self.map.clear_terrain_at(x, y);
            if let Err(e) = self.spawn_colony(pos) {
                warn!(x = pos.x, y = pos.y, error = %e, "failed to respawn colony during reset");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            seed: 5,
            map_width: 32,
            map_height: 32,
            colony_initial_population: 4,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn paused_simulation_does_not_advance() {
        let mut sim = Simulation::new(&small_config());
        sim.spawn_colony(Vec2::new(16.5, 16.5)).unwrap();
        sim.update(0.1);
        assert_eq!(sim.tick, 0);
        sim.unpause();
        sim.update(0.1);
        assert_eq!(sim.tick, 1);
    }

    #[test]
    fn colony_ids_are_reused_after_removal() {
        let mut sim = Simulation::new(&small_config());
        let a = sim.spawn_colony(Vec2::new(8.5, 8.5)).unwrap();
        let b = sim.spawn_colony(Vec2::new(24.5, 24.5)).unwrap();
        assert_eq!((a, b), (0, 1));

        assert!(sim.remove_colony(a));
        assert_eq!(sim.map.terrain_at(8, 8), Some(Terrain::Soil));
        let c = sim.spawn_colony(Vec2::new(8.5, 8.5)).unwrap();
        assert_eq!(c, 0);
    }

    #[test]
    fn colony_cap_is_enforced() {
        let mut config = small_config();
        config.max_colonies = 1;
        let mut sim = Simulation::new(&config);
        sim.spawn_colony(Vec2::new(8.5, 8.5)).unwrap();
        assert!(sim.spawn_colony(Vec2::new(24.5, 24.5)).is_err());
    }

    #[test]
    fn nests_require_open_ground() {
        let mut sim = Simulation::new(&small_config());
        sim.place_water_at(4, 4);
        assert!(sim.spawn_colony(Vec2::new(4.5, 4.5)).is_err());
    }

    #[test]
    fn rock_relocates_buried_ants_to_the_nest() {
        let mut sim = Simulation::new(&small_config());
        let id = sim.spawn_colony(Vec2::new(16.5, 16.5)).unwrap();

        // March one ant onto a distant cell.
        let colony = sim.colonies.get_mut(&id).unwrap();
        let key = colony.ants.keys().next().unwrap();
        let ant = colony.ants.get_mut(key).unwrap();
        let ant_ref = ant.ant_ref.clone();
        assert!(sim.map.unregister_ant_from_cell(&ant_ref, ant.pos));
        ant.pos = Vec2::new(5.5, 5.5);
        sim.map.register_ant_in_cell(&ant_ref, Vec2::new(5.5, 5.5));

        sim.place_rock_at(5, 5);
        assert_eq!(sim.terrain_at(5, 5), Some(Terrain::Rock));
        assert!(sim.map.ants_at(5, 5).unwrap().is_empty());
        // Population is preserved, the replacement stands at the nest.
        assert_eq!(sim.total_ant_count(), 4);
        assert!(!sim.map.ants_at(16, 16).unwrap().is_empty());
    }

    #[test]
    fn selection_finds_the_closest_ant() {
        let mut sim = Simulation::new(&small_config());
        sim.spawn_colony(Vec2::new(16.5, 16.5)).unwrap();
        let found = sim.get_ant_at_world_pos(Vec2::new(16.4, 16.4), 2.0);
        assert!(found.is_some());
        assert!(sim.get_ant_at_world_pos(Vec2::new(2.0, 2.0), 2.0).is_none());
    }

    #[test]
    fn reset_restores_initial_populations_in_place() {
        let mut sim = Simulation::new(&small_config());
        let id = sim.spawn_colony(Vec2::new(16.5, 16.5)).unwrap();
        sim.unpause();
        for _ in 0..50 {
            sim.update(0.05);
        }
        // Kill an ant so the population differs from the initial one.
        let colony = sim.colonies.get_mut(&id).unwrap();
        let key = colony.ants.keys().next().unwrap();
        colony.despawn_ant(key, &mut sim.map);
        assert_eq!(sim.total_ant_count(), 3);

        sim.reset();
        assert!(sim.is_paused);
        assert_eq!(sim.tick, 0);
        assert_eq!(sim.total_ant_count(), 4);
        assert_eq!(sim.terrain_at(16, 16), Some(Terrain::Nest(0)));
    }
}
