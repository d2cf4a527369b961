//! Track-graph analysis.
//!
//! Links are edges and points are vertices; each connected component of that
//! graph is a track graph. Traversal runs over a dense point -> link CSR built
//! from the board, so a full pass is linear in points plus links.

use std::collections::{HashMap, HashSet};

use fixedbitset::FixedBitSet;
use smallvec::SmallVec;

use crate::graph::adjacency::Csr;
use crate::graph::{Board, GraphError, LinkId, PointId, TrackGraphId};
use crate::registry::IdKind;

/// How many links a point has, as used by visibility heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Isolated,
    SingleLink,
    MultiLink,
}

impl Connectivity {
    pub fn from_degree(degree: usize) -> Self {
        match degree {
            0 => Connectivity::Isolated,
            1 => Connectivity::SingleLink,
            _ => Connectivity::MultiLink,
        }
    }
}

/// One connected group of links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackGraph {
    /// The id every link in the group carries, or `None` when they disagree
    /// or have never been assigned one.
    pub id: Option<TrackGraphId>,
    /// Sorted by id.
    pub links: Vec<LinkId>,
    /// Sorted by id.
    pub points: Vec<PointId>,
}

impl TrackGraph {
    pub fn contains(&self, link: LinkId) -> bool {
        self.links.binary_search(&link).is_ok()
    }
}

/// Partition the board's links into connected groups. Groups come out ordered
/// by their smallest link id; the partition itself is deterministic.
pub fn partition(board: &Board) -> Vec<TrackGraph> {
    let link_ids: Vec<LinkId> = board.links().map(|l| l.id()).collect();
    let point_ids: Vec<PointId> = board.points().map(|p| p.id()).collect();
    let point_index: HashMap<PointId, u32> = point_ids
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i as u32))
        .collect();

    // link index -> dense endpoint indices
    let mut ends: Vec<SmallVec<[u32; 2]>> = Vec::with_capacity(link_ids.len());
    let mut pairs: Vec<(u32, u32)> = Vec::with_capacity(link_ids.len() * 2);
    for (li, link) in board.links().enumerate() {
        let row: SmallVec<[u32; 2]> = link
            .endpoints()
            .filter_map(|p| point_index.get(&p).copied())
            .collect();
        for &pi in &row {
            pairs.push((pi, li as u32));
        }
        ends.push(row);
    }
    let point_links = Csr::from_pairs(point_ids.len(), &pairs);

    let mut seen_links = FixedBitSet::with_capacity(link_ids.len());
    let mut seen_points = FixedBitSet::with_capacity(point_ids.len());
    let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
    let mut groups = Vec::new();

    for start in 0..link_ids.len() {
        if seen_links.contains(start) {
            continue;
        }
        seen_links.insert(start);
        stack.push(start as u32);

        let mut links = Vec::new();
        let mut points = Vec::new();
        while let Some(li) = stack.pop() {
            links.push(link_ids[li as usize]);
            for &pi in &ends[li as usize] {
                if seen_points.put(pi as usize) {
                    continue;
                }
                points.push(point_ids[pi as usize]);
                for &next in point_links.row(pi as usize).unwrap_or(&[]) {
                    if !seen_links.put(next as usize) {
                        stack.push(next);
                    }
                }
            }
        }

        links.sort_unstable();
        points.sort_unstable();
        let id = shared_id(board, &links);
        groups.push(TrackGraph { id, links, points });
    }

    groups
}

fn shared_id(board: &Board, links: &[LinkId]) -> Option<TrackGraphId> {
    let mut ids = links
        .iter()
        .map(|&l| board.link(l).and_then(|l| l.graph_id()));
    let first = ids.next()??;
    ids.all(|id| id == Some(first)).then_some(first)
}

impl Board {
    pub fn connectivity(&self, point: PointId) -> Option<Connectivity> {
        self.point(point).map(|p| Connectivity::from_degree(p.degree()))
    }

    /// Recompute the partition and stamp a group id on every link.
    ///
    /// A group whose links already agree on a non-negative id keeps it, as
    /// long as no other group agrees on the same one. Every other group draws
    /// a fresh id from the track-graph counter, skipping ids that were kept.
    pub fn recompute_track_graphs(&mut self) -> Result<Vec<TrackGraph>, GraphError> {
        let mut groups = partition(self);

        let mut claims: HashMap<TrackGraphId, usize> = HashMap::new();
        for id in groups.iter().filter_map(|g| g.id) {
            if id.0 >= 0 {
                *claims.entry(id).or_default() += 1;
            }
        }
        for group in &mut groups {
            group.id = group.id.filter(|id| claims.get(id) == Some(&1));
        }

        let kept: HashSet<TrackGraphId> = groups.iter().filter_map(|g| g.id).collect();
        let mut fresh = 0;
        for group in &mut groups {
            if group.id.is_some() {
                continue;
            }
            let id = loop {
                let candidate = TrackGraphId(self.registry_mut().generate(IdKind::TrackGraph));
                if !kept.contains(&candidate) {
                    break candidate;
                }
            };
            group.id = Some(id);
            fresh += 1;
        }

        for group in &groups {
            for &link in &group.links {
                self.set_graph_id(link, group.id)?;
            }
        }

        log::info!(
            "Recomputed {} track graph(s), {} kept, {} new",
            groups.len(),
            groups.len() - fresh,
            fresh
        );
        Ok(groups)
    }
}
