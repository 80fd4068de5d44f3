use std::collections::HashSet;

use glam::Vec2;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::warn;

use super::ant::AntRef;
use super::behavior::TerrainModifier;
use super::resources::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terrain {
    /// Open ground: walkable and workable.
    Soil,
    /// Blocks movement.
    Rock,
    /// Walkable but very slow; work is impossible here.
    Water,
    /// Walkable but slow.
    Mud,
    /// A deposit ants can harvest.
    Resource { kind: ResourceKind, amount: u32 },
    /// Colony nest entrance.
    Nest(u32),
}

impl Terrain {
    pub fn blocks_movement(&self) -> bool {
        matches!(self, Terrain::Rock)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tile {
    pub terrain: Terrain,
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            terrain: Terrain::Soil,
        }
    }
}

/// The world grid: terrain tiles plus a per-cell registry of ants, used
/// for enemy lookups and selection queries.
pub struct WorldMap {
    pub width: u32,
    pub height: u32,
    tiles: Vec<Tile>,
    ants_in_cell: Vec<HashSet<AntRef>>,
}

impl WorldMap {
    pub fn new(width: u32, height: u32) -> Self {
        let cells = (width as usize) * (height as usize);
        Self {
            width,
            height,
            tiles: vec![Tile::default(); cells],
            ants_in_cell: vec![HashSet::new(); cells],
        }
    }

    #[inline(always)]
    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width as usize + x
    }

    #[inline(always)]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width as usize && y < self.height as usize
    }

    #[inline(always)]
    pub fn terrain_at(&self, x: usize, y: usize) -> Option<Terrain> {
        if self.in_bounds(x, y) {
            Some(self.tiles[self.idx(x, y)].terrain)
        } else {
            None
        }
    }

    /// True when the tile is out of bounds or impassable. Signed
    /// coordinates so movement code can probe past the map edge.
    pub fn is_blocked(&self, x: isize, y: isize) -> bool {
        if x < 0 || y < 0 {
            return true;
        }
        match self.terrain_at(x as usize, y as usize) {
            Some(terrain) => terrain.blocks_movement(),
            None => true,
        }
    }

    /// The movement overlay an ant picks up from standing on this tile.
    pub fn terrain_modifier_at(&self, x: usize, y: usize) -> TerrainModifier {
        match self.terrain_at(x, y) {
            Some(Terrain::Water) => TerrainModifier::Water,
            Some(Terrain::Mud) => TerrainModifier::Mud,
            _ => TerrainModifier::Ground,
        }
    }

    fn set_terrain(&mut self, x: usize, y: usize, terrain: Terrain) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        // Nest tiles are owned by the colony lifecycle, not the painters.
        if matches!(self.tiles[self.idx(x, y)].terrain, Terrain::Nest(_))
            && !matches!(terrain, Terrain::Nest(_) | Terrain::Soil)
        {
            warn!(x, y, "refused to paint over a nest tile");
            return false;
        }
        let at = self.idx(x, y);
        self.tiles[at].terrain = terrain;
        true
    }

    pub fn place_resource_at(&mut self, x: usize, y: usize, kind: ResourceKind, amount: u32) {
        if amount > 0 {
            self.set_terrain(x, y, Terrain::Resource { kind, amount });
        }
    }

    pub fn place_rock_at(&mut self, x: usize, y: usize) -> bool {
        self.set_terrain(x, y, Terrain::Rock)
    }

    pub fn place_water_at(&mut self, x: usize, y: usize) {
        self.set_terrain(x, y, Terrain::Water);
    }

    pub fn place_mud_at(&mut self, x: usize, y: usize) {
        self.set_terrain(x, y, Terrain::Mud);
    }

    pub fn place_nest_at(&mut self, x: usize, y: usize, colony_id: u32) {
        if !self.set_terrain(x, y, Terrain::Nest(colony_id)) {
            warn!(x, y, colony_id, "failed to place nest terrain");
        }
    }

    pub fn clear_terrain_at(&mut self, x: usize, y: usize) {
        self.set_terrain(x, y, Terrain::Soil);
    }

    pub fn has_resource_at(&self, tile: (usize, usize)) -> bool {
        matches!(
            self.terrain_at(tile.0, tile.1),
            Some(Terrain::Resource { .. })
        )
    }

    /// Take one unit from a resource tile. The tile reverts to soil once
    /// the deposit is exhausted.
    pub fn take_resource_at(&mut self, x: usize, y: usize) -> Option<ResourceKind> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let at = self.idx(x, y);
        if let Terrain::Resource { kind, amount } = &mut self.tiles[at].terrain {
            let taken = *kind;
            *amount = amount.saturating_sub(1);
            if *amount == 0 {
                self.tiles[at].terrain = Terrain::Soil;
            }
            Some(taken)
        } else {
            None
        }
    }

    /// Drop a unit of resource onto a tile, stacking onto an existing
    /// deposit of the same kind. Anything else swallows the drop.
    pub fn deposit_resource_at(&mut self, x: usize, y: usize, kind: ResourceKind) {
        match self.terrain_at(x, y) {
            Some(Terrain::Soil) => {
                self.set_terrain(x, y, Terrain::Resource { kind, amount: 1 });
            }
            Some(Terrain::Resource {
                kind: existing,
                amount,
            }) if existing == kind => {
                self.set_terrain(
                    x,
                    y,
                    Terrain::Resource {
                        kind,
                        amount: amount + 1,
                    },
                );
            }
            _ => {}
        }
    }

    /// Registers an ant in the spatial grid for a specific cell.
    pub fn register_ant_in_cell(&mut self, ant_ref: &AntRef, pos: Vec2) {
        let cell_x = pos.x.floor() as isize;
        let cell_y = pos.y.floor() as isize;
        if cell_x >= 0 && cell_y >= 0 && self.in_bounds(cell_x as usize, cell_y as usize) {
            let at = self.idx(cell_x as usize, cell_y as usize);
            self.ants_in_cell[at].insert(ant_ref.clone());
        } else {
            warn!(
                ?ant_ref,
                x = pos.x,
                y = pos.y,
                "ant attempted to register at out-of-bounds position"
            );
        }
    }

    /// Unregisters an ant from the spatial grid. Returns false when the
    /// ant was not where it claimed to be, which indicates a desync.
    pub fn unregister_ant_from_cell(&mut self, ant_ref: &AntRef, pos: Vec2) -> bool {
        let cell_x = pos.x.floor() as isize;
        let cell_y = pos.y.floor() as isize;
        if cell_x >= 0 && cell_y >= 0 && self.in_bounds(cell_x as usize, cell_y as usize) {
            let at = self.idx(cell_x as usize, cell_y as usize);
            return self.ants_in_cell[at].remove(ant_ref);
        }
        warn!(
            ?ant_ref,
            x = pos.x,
            y = pos.y,
            "ant attempted to unregister from out-of-bounds position"
        );
        false
    }

    pub fn ants_at(&self, x: usize, y: usize) -> Option<&HashSet<AntRef>> {
        if self.in_bounds(x, y) {
            Some(&self.ants_in_cell[self.idx(x, y)])
        } else {
            None
        }
    }

    /// First ant of a different colony in the 3x3 neighbourhood of a cell.
    pub fn enemy_ant_near(&self, x: usize, y: usize, friendly_colony_id: u32) -> Option<AntRef> {
        for dy in -1..=1isize {
            for dx in -1..=1isize {
                let cx = x as isize + dx;
                let cy = y as isize + dy;
                if cx < 0 || cy < 0 {
                    continue;
                }
                if let Some(ants) = self.ants_at(cx as usize, cy as usize) {
                    for ant_ref in ants {
                        if ant_ref.colony_id != friendly_colony_id {
                            return Some(ant_ref.clone());
                        }
                    }
                }
            }
        }
        None
    }

    /// Clear the ant registry only, leaving terrain intact.
    pub fn soft_reset(&mut self) {
        for cell in &mut self.ants_in_cell {
            cell.clear();
        }
    }

    /// Remove every ant of a colony from the registry.
    pub fn remove_colony_ants(&mut self, colony_id: u32) {
        for cell in &mut self.ants_in_cell {
            cell.retain(|ant_ref| ant_ref.colony_id != colony_id);
        }
    }

    /// A uniformly random unblocked soil tile. Rejection-samples, then
    /// falls back to scanning so a crowded map still answers.
    pub fn random_open_tile(&self, rng: &mut StdRng) -> (usize, usize) {
        for _ in 0..64 {
            let x = rng.random_range(0..self.width as usize);
            let y = rng.random_range(0..self.height as usize);
            if matches!(self.terrain_at(x, y), Some(Terrain::Soil)) {
                return (x, y);
            }
        }
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                if matches!(self.terrain_at(x, y), Some(Terrain::Soil)) {
                    return (x, y);
                }
            }
        }
        (0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::ant::AntKey;
    use slotmap::KeyData;

    fn ant_ref(n: u64, colony_id: u32) -> AntRef {
        AntRef {
            key: AntKey::from(KeyData::from_ffi(n | (1 << 32))),
            colony_id,
        }
    }

    #[test]
    fn accessors_are_bounds_checked() {
        let mut map = WorldMap::new(4, 3);
        assert!(map.terrain_at(4, 0).is_none());
        assert!(map.terrain_at(0, 3).is_none());
        map.place_rock_at(10, 10); // silently ignored
        assert!(map.is_blocked(-1, 0));
        assert!(map.is_blocked(0, 3));
        assert!(!map.is_blocked(0, 0));
    }

    #[test]
    fn resource_tile_reverts_to_soil_when_exhausted() {
        let mut map = WorldMap::new(4, 4);
        map.place_resource_at(1, 1, ResourceKind::Food, 2);
        assert_eq!(map.take_resource_at(1, 1), Some(ResourceKind::Food));
        assert!(map.has_resource_at((1, 1)));
        assert_eq!(map.take_resource_at(1, 1), Some(ResourceKind::Food));
        assert!(!map.has_resource_at((1, 1)));
        assert_eq!(map.take_resource_at(1, 1), None);
        assert_eq!(map.terrain_at(1, 1), Some(Terrain::Soil));
    }

    #[test]
    fn deposits_stack_only_on_matching_kind() {
        let mut map = WorldMap::new(4, 4);
        map.deposit_resource_at(2, 2, ResourceKind::Leaf);
        map.deposit_resource_at(2, 2, ResourceKind::Leaf);
        assert_eq!(
            map.terrain_at(2, 2),
            Some(Terrain::Resource {
                kind: ResourceKind::Leaf,
                amount: 2
            })
        );
        // A different kind is swallowed rather than mixed in.
        map.deposit_resource_at(2, 2, ResourceKind::Food);
        assert_eq!(
            map.terrain_at(2, 2),
            Some(Terrain::Resource {
                kind: ResourceKind::Leaf,
                amount: 2
            })
        );
    }

    #[test]
    fn painting_over_a_nest_is_refused() {
        let mut map = WorldMap::new(4, 4);
        map.place_nest_at(1, 1, 0);
        map.place_rock_at(1, 1);
        map.place_water_at(1, 1);
        assert_eq!(map.terrain_at(1, 1), Some(Terrain::Nest(0)));
        // Clearing is allowed: colony teardown uses it.
        map.clear_terrain_at(1, 1);
        assert_eq!(map.terrain_at(1, 1), Some(Terrain::Soil));
    }

    #[test]
    fn spatial_registry_tracks_registration() {
        let mut map = WorldMap::new(8, 8);
        let ant = ant_ref(1, 0);
        let pos = Vec2::new(3.4, 2.7);
        map.register_ant_in_cell(&ant, pos);
        assert_eq!(map.ants_at(3, 2).unwrap().len(), 1);
        assert!(map.unregister_ant_from_cell(&ant, pos));
        // Second removal reports the desync.
        assert!(!map.unregister_ant_from_cell(&ant, pos));
    }

    #[test]
    fn enemy_lookup_ignores_friends_and_scans_neighbourhood() {
        let mut map = WorldMap::new(8, 8);
        map.register_ant_in_cell(&ant_ref(1, 0), Vec2::new(4.5, 4.5));
        assert!(map.enemy_ant_near(4, 4, 0).is_none());

        // Enemy in an adjacent cell is seen.
        map.register_ant_in_cell(&ant_ref(2, 1), Vec2::new(5.5, 5.5));
        let found = map.enemy_ant_near(4, 4, 0).unwrap();
        assert_eq!(found.colony_id, 1);

        // Two cells away is out of the neighbourhood.
        assert!(map.enemy_ant_near(2, 2, 0).is_none());
    }

    #[test]
    fn remove_colony_ants_clears_only_that_colony() {
        let mut map = WorldMap::new(8, 8);
        map.register_ant_in_cell(&ant_ref(1, 0), Vec2::new(1.5, 1.5));
        map.register_ant_in_cell(&ant_ref(2, 1), Vec2::new(1.5, 1.5));
        map.remove_colony_ants(0);
        let remaining = map.ants_at(1, 1).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining.iter().next().unwrap().colony_id, 1);
    }
}
