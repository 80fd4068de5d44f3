use glam::Vec2;
use slotmap::new_key_type;

new_key_type! {
    /// Key for the colony building slotmap.
    pub struct BuildingKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildingKind {
    /// Extra drop-off point for hauled cargo once complete.
    Storehouse,
    /// Extends the colony's passive resource-discovery range.
    Outpost,
}

impl BuildingKind {
    pub fn all() -> &'static [BuildingKind] {
        &[BuildingKind::Storehouse, BuildingKind::Outpost]
    }

    pub fn label(&self) -> &'static str {
        match self {
            BuildingKind::Storehouse => "Storehouse",
            BuildingKind::Outpost => "Outpost",
        }
    }

    /// Builder work units until completion.
    pub fn work_cost(&self) -> f32 {
        match self {
            BuildingKind::Storehouse => 20.0,
            BuildingKind::Outpost => 10.0,
        }
    }

    /// Leaves withdrawn from the stockpile at placement.
    pub fn leaf_cost(&self) -> u32 {
        match self {
            BuildingKind::Storehouse => 10,
            BuildingKind::Outpost => 5,
        }
    }
}

/// A colony structure under construction or complete.
#[derive(Debug, Clone)]
pub struct Building {
    pub kind: BuildingKind,
    pub tile: (usize, usize),
    progress: f32,
}

impl Building {
    pub fn new(kind: BuildingKind, tile: (usize, usize)) -> Self {
        Self {
            kind,
            tile,
            progress: 0.0,
        }
    }

    /// World position of the tile center.
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.tile.0 as f32 + 0.5, self.tile.1 as f32 + 0.5)
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.kind.work_cost()
    }

    /// Apply builder work. Progress clamps at the work cost; returns true
    /// on the tick that completes the building.
    pub fn advance(&mut self, work: f32) -> bool {
        if self.is_complete() {
            return false;
        }
        self.progress = (self.progress + work).min(self.kind.work_cost());
        self.is_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_to_completion_once() {
        let mut site = Building::new(BuildingKind::Outpost, (2, 2));
        let cost = BuildingKind::Outpost.work_cost() as usize;
        for _ in 0..cost - 1 {
            assert!(!site.advance(1.0));
        }
        assert!(site.advance(1.0));
        assert!(site.is_complete());
        // Further work is a no-op, not a second completion.
        assert!(!site.advance(1.0));
    }

    #[test]
    fn progress_clamps_at_cost() {
        let mut site = Building::new(BuildingKind::Storehouse, (0, 0));
        site.advance(1000.0);
        assert_eq!(site.progress(), BuildingKind::Storehouse.work_cost());
    }

    #[test]
    fn pos_is_tile_center() {
        let site = Building::new(BuildingKind::Storehouse, (4, 7));
        assert_eq!(site.pos(), Vec2::new(4.5, 7.5));
    }
}
