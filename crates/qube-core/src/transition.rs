//! Bit-transition routing table over hypercube vertices.
//!
//! The table precomputes the Hamming-1 adjacency of a [`Hypercube`] into an
//! explicit map so routing code can look up legal single-bit transitions
//! without recomputing them, and so the persisted form can be diffed and
//! validated against the topology it claims to describe.
//!
//! Persistence is plain JSON (`{n, adjacency}`) and round-trips losslessly:
//! `save` followed by `load` reproduces an equal adjacency map.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::topology::Hypercube;

/// Precomputed adjacency over hypercube vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitTransitionTable {
    cube: Hypercube,
    adjacency: BTreeMap<u32, Vec<u32>>,
}

/// On-disk form of the table.
#[derive(Serialize, Deserialize)]
struct TableFile {
    n: usize,
    adjacency: BTreeMap<u32, Vec<u32>>,
}

impl BitTransitionTable {
    /// Build the table by copying `neighbors(v)` for every vertex.
    pub fn from_hypercube(cube: &Hypercube) -> Self {
        let adjacency = cube
            .all_vertices()
            .into_iter()
            .map(|v| (v, cube.neighbors(v)))
            .collect();
        BitTransitionTable {
            cube: cube.clone(),
            adjacency,
        }
    }

    /// Dimension of the underlying hypercube.
    pub fn dimension(&self) -> usize {
        self.cube.dimension()
    }

    /// Neighbors of `vid` according to the table (empty if absent).
    pub fn neighbors(&self, vid: u32) -> &[u32] {
        self.adjacency.get(&vid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The full adjacency map.
    pub fn adjacency(&self) -> &BTreeMap<u32, Vec<u32>> {
        &self.adjacency
    }

    /// Undirected edges, each exactly once, canonicalized `u < v`.
    pub fn edge_list(&self) -> Vec<(u32, u32)> {
        let mut edges = Vec::new();
        for (&u, neighs) in &self.adjacency {
            for &v in neighs {
                if u < v {
                    edges.push((u, v));
                }
            }
        }
        edges
    }

    /// Check that the table's adjacency exactly matches `cube.neighbors(v)`
    /// for every vertex of `cube`. The table doubles as a validator for
    /// persisted routing state.
    pub fn validate(&self, cube: &Hypercube) -> bool {
        if self.adjacency.len() as u32 != cube.vertex_count() {
            return false;
        }
        cube.all_vertices()
            .into_iter()
            .all(|v| self.adjacency.get(&v).map(Vec::as_slice) == Some(cube.neighbors(v).as_slice()))
    }

    /// Shortest vertex route from `a` to `b`, delegated to the topology.
    pub fn shortest_route(&self, a: u32, b: u32) -> Vec<u32> {
        self.cube.shortest_path(a, b)
    }

    /// Persist as JSON `{n, adjacency}`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {:?}", parent))?;
        }
        let file = TableFile {
            n: self.cube.dimension(),
            adjacency: self.adjacency.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(path, json).with_context(|| format!("failed to write {:?}", path))?;
        Ok(())
    }

    /// Load a previously saved table.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not a valid table; the
    /// table is derived data, so callers that can rebuild should prefer
    /// [`load_or_rebuild`](Self::load_or_rebuild).
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
        let file: TableFile = serde_json::from_str(&raw)
            .with_context(|| format!("invalid transition table in {:?}", path))?;
        anyhow::ensure!(
            (1..=30).contains(&file.n),
            "invalid dimension {} in {:?}",
            file.n,
            path
        );
        Ok(BitTransitionTable {
            cube: Hypercube::new(file.n),
            adjacency: file.adjacency,
        })
    }

    /// Load from `path` when present and valid for dimension `n`, otherwise
    /// rebuild from the topology (and report which happened).
    pub fn load_or_rebuild(path: &Path, n: usize) -> (Self, bool) {
        if let Ok(table) = Self::load(path) {
            if table.dimension() == n && table.validate(&Hypercube::new(n)) {
                return (table, true);
            }
        }
        (Self::from_hypercube(&Hypercube::new(n)), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacency_matches_topology() {
        let cube = Hypercube::new(4);
        let table = BitTransitionTable::from_hypercube(&cube);
        assert!(table.validate(&cube));
        assert_eq!(table.adjacency().len(), 16);
        for v in cube.all_vertices() {
            assert_eq!(table.neighbors(v), cube.neighbors(v).as_slice());
        }
    }

    #[test]
    fn test_edge_list_canonical_and_complete() {
        let cube = Hypercube::new(3);
        let table = BitTransitionTable::from_hypercube(&cube);
        let edges = table.edge_list();
        // n * 2^n / 2 undirected edges
        assert_eq!(edges.len(), 3 * 8 / 2);
        for (u, v) in &edges {
            assert!(u < v);
            assert_eq!(cube.hamming(*u, *v), 1);
        }
        let mut dedup = edges.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), edges.len());
    }

    #[test]
    fn test_tampered_table_fails_validation() {
        let cube = Hypercube::new(3);
        let mut table = BitTransitionTable::from_hypercube(&cube);
        table.adjacency.get_mut(&0).unwrap()[0] = 7; // 0 -> 7 is a 3-bit jump
        assert!(!table.validate(&cube));
    }

    #[test]
    fn test_shortest_route_delegates() {
        let table = BitTransitionTable::from_hypercube(&Hypercube::new(4));
        let route = table.shortest_route(0b0000, 0b1011);
        assert_eq!(route.len(), 4);
        assert_eq!(route[0], 0b0000);
        assert_eq!(*route.last().unwrap(), 0b1011);
    }
}
