use rayon::prelude::*;
use stemcell_common::{SimParams, Vec2};

use crate::population::{AgentKind, Population};

/// Uniform spatial hash over the domain, rebuilt from a position snapshot.
///
/// Agents are bucketed with a counting sort: `cell_counts` per hash cell,
/// `cell_starts` as its prefix sum, and `cell_agent_indices` holding agent
/// slots grouped by cell.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    inv_cell_size: f64,
    dim: u32,
    positions: Vec<Vec2>,
    cell_counts: Vec<u32>,
    cell_starts: Vec<u32>,
    cell_agent_indices: Vec<u32>,
}

impl SpatialIndex {
    pub fn build(positions: Vec<Vec2>, params: &SimParams) -> Self {
        let dim = params.hash_dim.max(1);
        let num_cells = (dim * dim) as usize;
        let inv_cell_size = params.inv_hash_cell_size;

        // Phase 1: hash cell of each agent
        let agent_cells: Vec<u32> = positions.iter().map(|&p| cell_index(p, inv_cell_size, dim)).collect();

        // Phase 2: count agents per cell
        let mut cell_counts = vec![0u32; num_cells];
        for &cell in &agent_cells {
            cell_counts[cell as usize] += 1;
        }

        // Phase 3: prefix sum gives each cell's start offset
        let mut cell_starts = vec![0u32; num_cells];
        let mut total = 0;
        for (start, &count) in cell_starts.iter_mut().zip(&cell_counts) {
            *start = total;
            total += count;
        }

        // Phase 4: scatter agent slots into their cell blocks
        let mut write_offsets = cell_starts.clone();
        let mut cell_agent_indices = vec![0u32; positions.len()];
        for (agent_idx, &cell) in agent_cells.iter().enumerate() {
            let slot = &mut write_offsets[cell as usize];
            cell_agent_indices[*slot as usize] = agent_idx as u32;
            *slot += 1;
        }

        Self {
            cell_size: params.hash_cell_size,
            inv_cell_size,
            dim,
            positions,
            cell_counts,
            cell_starts,
            cell_agent_indices,
        }
    }

    /// Calls `f` for every agent slot whose centre lies within `radius` of `point`.
    /// Returning `false` from `f` stops the search.
    pub fn for_each_within<F>(&self, point: Vec2, radius: f64, mut f: F)
    where
        F: FnMut(usize) -> bool,
    {
        let radius_sq = radius * radius;
        let reach = (radius / self.cell_size).ceil().max(1.0) as i64;
        let center_x = (point.x * self.inv_cell_size).floor() as i64;
        let center_y = (point.y * self.inv_cell_size).floor() as i64;
        let dim = self.dim as i64;

        for gy in (center_y - reach).max(0)..=(center_y + reach).min(dim - 1) {
            for gx in (center_x - reach).max(0)..=(center_x + reach).min(dim - 1) {
                let cell = (gy * dim + gx) as usize;
                let start = self.cell_starts[cell] as usize;
                let end = start + self.cell_counts[cell] as usize;
                for &agent in &self.cell_agent_indices[start..end] {
                    let agent = agent as usize;
                    if self.positions[agent].distance_squared(point) <= radius_sq && !f(agent) {
                        return;
                    }
                }
            }
        }
    }

    /// Agent slots within `radius` of `point`, in ascending order.
    pub fn neighbors_within(&self, point: Vec2, radius: f64) -> Vec<usize> {
        let mut found = Vec::new();
        self.for_each_within(point, radius, |idx| {
            found.push(idx);
            true
        });
        found.sort_unstable();
        found
    }
}

/// Hash cell of a position; positions outside the domain clamp to the edge cells.
#[inline(always)]
fn cell_index(pos: Vec2, inv_cell_size: f64, dim: u32) -> u32 {
    let gx = (pos.x * inv_cell_size).floor().max(0.0) as u32;
    let gy = (pos.y * inv_cell_size).floor().max(0.0) as u32;
    gy.min(dim - 1) * dim + gx.min(dim - 1)
}

/// Per-tick undirected "currently touching" relation, keyed by agent slot.
#[derive(Debug, Clone, Default)]
pub struct ContactGraph {
    adjacency: Vec<Vec<usize>>,
}

impl ContactGraph {
    /// Rebuilds the graph from scratch: two agents touch when their centres
    /// are no further apart than the sum of their radii.
    pub fn build(population: &Population, index: &SpatialIndex, max_radius: f64) -> Self {
        let agents = population.agents();
        let adjacency = agents
            .par_iter()
            .enumerate()
            .map(|(idx, agent)| {
                let mut touching = Vec::new();
                index.for_each_within(agent.position, agent.radius + max_radius, |other| {
                    if other != idx && agent.is_touching(&agents[other]) {
                        touching.push(other);
                    }
                    true
                });
                touching.sort_unstable();
                touching
            })
            .collect();
        Self { adjacency }
    }

    pub fn neighbors(&self, idx: usize) -> &[usize] {
        self.adjacency.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn touches(&self, a: usize, b: usize) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    /// Registers a newly spawned agent with no contacts until the next rebuild.
    pub fn register(&mut self, idx: usize) {
        if self.adjacency.len() <= idx {
            self.adjacency.resize_with(idx + 1, Vec::new);
        }
    }

    /// Touching neighbours of `idx` that are of `kind`.
    pub fn neighbors_of_kind<'a>(
        &'a self,
        population: &'a Population,
        idx: usize,
        kind: AgentKind,
    ) -> impl Iterator<Item = usize> + 'a {
        self.neighbors(idx)
            .iter()
            .copied()
            .filter(move |&other| population.agents()[other].kind() == kind)
    }

    /// Number of undirected touching pairs.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}
