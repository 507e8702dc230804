//! Uniform-grid spatial index for ground-plane proximity queries.
//!
//! The grid is a coarse accelerator: `query_radius` returns the union of
//! every cell overlapping the query circle, which includes false positives
//! near the circle's corners. Callers always finish with a precise
//! squared-distance check. Lifecycle operations on unknown ids are benign
//! no-ops because entities are added and removed out of order constantly.

use crate::math::Vec3;
use std::collections::{HashMap, HashSet};

type CellKey = (i32, i32);

pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<CellKey, HashSet<String>>,
    /// Reverse lookup so `update`/`remove` never scan. An entity occupies
    /// exactly one cell at a time.
    entity_cells: HashMap<String, CellKey>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "grid cell size must be positive");
        Self {
            cell_size,
            cells: HashMap::new(),
            entity_cells: HashMap::new(),
        }
    }

    fn cell_for(&self, pos: &Vec3) -> CellKey {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, id: &str, pos: &Vec3) {
        // Double-insert degrades to an update rather than leaving a ghost
        // membership in the old cell.
        if self.entity_cells.contains_key(id) {
            self.update(id, pos);
            return;
        }
        let key = self.cell_for(pos);
        self.cells.entry(key).or_default().insert(id.to_string());
        self.entity_cells.insert(id.to_string(), key);
    }

    pub fn update(&mut self, id: &str, pos: &Vec3) {
        let new_key = self.cell_for(pos);
        match self.entity_cells.get(id) {
            Some(&old_key) if old_key == new_key => {}
            Some(&old_key) => {
                if let Some(members) = self.cells.get_mut(&old_key) {
                    members.remove(id);
                    if members.is_empty() {
                        self.cells.remove(&old_key);
                    }
                }
                self.cells.entry(new_key).or_default().insert(id.to_string());
                self.entity_cells.insert(id.to_string(), new_key);
            }
            None => self.insert(id, pos),
        }
    }

    pub fn remove(&mut self, id: &str) {
        if let Some(key) = self.entity_cells.remove(id) {
            if let Some(members) = self.cells.get_mut(&key) {
                members.remove(id);
                if members.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
    }

    /// Coarse candidates near `center`. Includes everything in any cell the
    /// circle touches; the caller filters with a squared-distance check.
    pub fn query_radius(&self, center: &Vec3, radius: f32) -> Vec<String> {
        let min_cx = ((center.x - radius) / self.cell_size).floor() as i32;
        let max_cx = ((center.x + radius) / self.cell_size).floor() as i32;
        let min_cz = ((center.z - radius) / self.cell_size).floor() as i32;
        let max_cz = ((center.z + radius) / self.cell_size).floor() as i32;

        let mut results = Vec::new();
        for cx in min_cx..=max_cx {
            for cz in min_cz..=max_cz {
                if let Some(members) = self.cells.get(&(cx, cz)) {
                    results.extend(members.iter().cloned());
                }
            }
        }
        results
    }

    pub fn len(&self) -> usize {
        self.entity_cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_cells.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entity_cells.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_insert_and_query() {
        let mut grid = SpatialGrid::new(20.0);
        grid.insert("a", &Vec3::new(5.0, 0.0, 5.0));
        grid.insert("b", &Vec3::new(100.0, 0.0, 100.0));

        let near = grid.query_radius(&Vec3::new(0.0, 0.0, 0.0), 10.0);
        assert!(near.contains(&"a".to_string()));
        assert!(!near.contains(&"b".to_string()));
    }

    #[test]
    fn test_update_moves_between_cells_without_ghosts() {
        let mut grid = SpatialGrid::new(20.0);
        grid.insert("a", &Vec3::new(5.0, 0.0, 5.0));
        grid.update("a", &Vec3::new(205.0, 0.0, 205.0));

        let old_cell = grid.query_radius(&Vec3::new(5.0, 0.0, 5.0), 1.0);
        assert!(old_cell.is_empty());
        let new_cell = grid.query_radius(&Vec3::new(205.0, 0.0, 205.0), 1.0);
        assert_eq!(new_cell, vec!["a".to_string()]);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_update_same_cell_is_noop() {
        let mut grid = SpatialGrid::new(20.0);
        grid.insert("a", &Vec3::new(5.0, 0.0, 5.0));
        grid.update("a", &Vec3::new(6.0, 0.0, 6.0));
        assert_eq!(grid.len(), 1);
        assert!(grid.contains("a"));
    }

    #[test]
    fn test_unknown_id_operations_are_noops() {
        let mut grid = SpatialGrid::new(20.0);
        grid.remove("ghost");
        grid.update("ghost", &Vec3::new(1.0, 0.0, 1.0));
        // update-of-unknown behaves like insert so the entity is tracked
        assert!(grid.contains("ghost"));
        grid.remove("ghost");
        assert!(grid.is_empty());
        grid.remove("ghost");
    }

    #[test]
    fn test_double_insert_does_not_duplicate() {
        let mut grid = SpatialGrid::new(20.0);
        grid.insert("a", &Vec3::new(5.0, 0.0, 5.0));
        grid.insert("a", &Vec3::new(45.0, 0.0, 5.0));
        assert_eq!(grid.len(), 1);
        assert!(grid.query_radius(&Vec3::new(5.0, 0.0, 5.0), 1.0).is_empty());
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = SpatialGrid::new(20.0);
        grid.insert("a", &Vec3::new(-5.0, 0.0, -5.0));
        let near = grid.query_radius(&Vec3::new(-3.0, 0.0, -3.0), 5.0);
        assert!(near.contains(&"a".to_string()));
    }

    /// Candidates plus exact filtering must equal a brute-force scan for
    /// random entity layouts and query circles.
    #[test]
    fn test_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut grid = SpatialGrid::new(20.0);
        let mut entities: Vec<(String, Vec3)> = Vec::new();

        for i in 0..200 {
            let pos = Vec3::new(
                rng.gen_range(-300.0..300.0),
                0.0,
                rng.gen_range(-300.0..300.0),
            );
            let id = format!("e{}", i);
            grid.insert(&id, &pos);
            entities.push((id, pos));
        }

        for _ in 0..50 {
            let center = Vec3::new(
                rng.gen_range(-300.0..300.0),
                0.0,
                rng.gen_range(-300.0..300.0),
            );
            let radius = rng.gen_range(1.0..120.0);
            let radius_sq = radius * radius;

            let mut from_grid: Vec<String> = grid
                .query_radius(&center, radius)
                .into_iter()
                .filter(|id| {
                    let (_, pos) = entities.iter().find(|(eid, _)| eid == id).unwrap();
                    pos.planar_distance_sq(&center) <= radius_sq
                })
                .collect();
            let mut brute: Vec<String> = entities
                .iter()
                .filter(|(_, pos)| pos.planar_distance_sq(&center) <= radius_sq)
                .map(|(id, _)| id.clone())
                .collect();

            from_grid.sort();
            brute.sort();
            assert_eq!(from_grid, brute);
        }
    }
}
