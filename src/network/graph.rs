//! Pedestrian street graph built from OSM ways.

use geo::{BoundingRect, Coord, Intersects, MultiPolygon, Point};
use hashbrown::{HashMap, HashSet};
use petgraph::algo::kosaraju_scc;
use petgraph::graphmap::UnGraphMap;
use tracing::{debug, info};

/// Street network: node coordinates (lon/lat) plus the ways linking them.
///
/// Edges are the consecutive node pairs of every way.
#[derive(Debug, Clone, Default)]
pub struct StreetGraph {
    nodes: HashMap<i64, Coord<f64>>,
    ways: Vec<Vec<i64>>,
}

impl StreetGraph {
    /// Build a graph from raw node coordinates and way node lists.
    ///
    /// Way references to unknown nodes split the way there, and nodes no way
    /// references are dropped.
    pub fn from_ways(nodes: HashMap<i64, Coord<f64>>, ways: Vec<Vec<i64>>) -> Self {
        let mut graph = Self {
            nodes,
            ways: Vec::with_capacity(ways.len()),
        };
        for way in ways {
            graph.push_split(&way, |g, id| g.nodes.contains_key(id));
        }
        graph.prune_unreferenced();
        graph
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.ways.iter().map(|w| w.len().saturating_sub(1)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn coord(&self, id: i64) -> Option<Coord<f64>> {
        self.nodes.get(&id).copied()
    }

    /// Coordinates of every node, in no particular order
    pub fn points(&self) -> Vec<Coord<f64>> {
        self.nodes.values().copied().collect()
    }

    /// Iterate over (from, to) node id pairs
    pub fn edges(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.ways
            .iter()
            .flat_map(|w| w.windows(2).map(|pair| (pair[0], pair[1])))
    }

    /// Push the runs of `way` whose nodes satisfy `keep`; runs shorter than
    /// two nodes carry no edge and are discarded.
    fn push_split<F>(&mut self, way: &[i64], keep: F)
    where
        F: Fn(&Self, &i64) -> bool,
    {
        let mut run: Vec<i64> = Vec::new();
        for id in way {
            if keep(self, id) {
                run.push(*id);
            } else {
                if run.len() >= 2 {
                    self.ways.push(std::mem::take(&mut run));
                }
                run.clear();
            }
        }
        if run.len() >= 2 {
            self.ways.push(run);
        }
    }

    fn prune_unreferenced(&mut self) {
        let referenced: HashSet<i64> = self.ways.iter().flatten().copied().collect();
        self.nodes.retain(|id, _| referenced.contains(id));
    }

    /// Drop nodes outside `boundary`, splitting ways where they leave it
    pub fn clip_to(self, boundary: &MultiPolygon<f64>) -> Self {
        let before = self.nodes.len();
        let Some(rect) = boundary.bounding_rect() else {
            return Self::default();
        };

        let inside: HashMap<i64, Coord<f64>> = self
            .nodes
            .into_iter()
            .filter(|(_, c)| {
                let p = Point::from(*c);
                rect.intersects(&p) && boundary.intersects(&p)
            })
            .collect();

        let graph = Self::from_ways(inside, self.ways);
        debug!(
            "Clipped to boundary: kept {} of {} nodes",
            graph.nodes.len(),
            before
        );
        graph
    }

    /// Undirected topology of the graph; self-loops are left out
    fn topology(&self) -> UnGraphMap<i64, ()> {
        let mut graph = UnGraphMap::with_capacity(self.nodes.len(), self.edge_count());
        for id in self.nodes.keys() {
            graph.add_node(*id);
        }
        for (a, b) in self.edges() {
            if a != b {
                graph.add_edge(a, b, ());
            }
        }
        graph
    }

    /// Keep only the largest connected component
    pub fn largest_component(self) -> Self {
        if self.nodes.is_empty() {
            return self;
        }

        let components = kosaraju_scc(&self.topology());
        let count = components.len();
        // Ties go to the component holding the smallest node id
        let Some(largest) = components.into_iter().max_by(|a, b| {
            a.len()
                .cmp(&b.len())
                .then_with(|| b.iter().min().cmp(&a.iter().min()))
        }) else {
            return self;
        };
        let keep: HashSet<i64> = largest.into_iter().collect();

        let Self { nodes, ways } = self;
        let nodes: HashMap<i64, Coord<f64>> = nodes
            .into_iter()
            .filter(|(id, _)| keep.contains(id))
            .collect();
        let ways = ways
            .into_iter()
            .filter(|w| w.first().is_some_and(|id| keep.contains(id)))
            .collect();

        info!(
            "Kept largest of {} connected components ({} nodes)",
            count,
            nodes.len()
        );
        Self { nodes, ways }
    }

    /// Remove interstitial nodes.
    ///
    /// A node is kept when it ends a way, appears in more than one way, or
    /// does not have exactly two distinct neighbours. Every other node only
    /// shapes the street between two kept nodes.
    pub fn simplify(self) -> Self {
        let topology = self.topology();
        let mut way_count: HashMap<i64, usize> = HashMap::new();
        let mut endpoints: HashSet<i64> = HashSet::new();

        for way in &self.ways {
            if let (Some(first), Some(last)) = (way.first(), way.last()) {
                endpoints.insert(*first);
                endpoints.insert(*last);
            }
            let distinct: HashSet<i64> = way.iter().copied().collect();
            for id in distinct {
                *way_count.entry(id).or_default() += 1;
            }
            for pair in way.windows(2) {
                if pair[0] == pair[1] {
                    endpoints.insert(pair[0]);
                }
            }
        }

        for id in topology.nodes() {
            let degree = topology.neighbors(id).count();
            if degree != 2 || way_count.get(&id).copied().unwrap_or(0) > 1 {
                endpoints.insert(id);
            }
        }

        let before = self.nodes.len();
        let ways: Vec<Vec<i64>> = self
            .ways
            .iter()
            .flat_map(|way| {
                let kept: Vec<i64> = way
                    .iter()
                    .copied()
                    .filter(|id| endpoints.contains(id))
                    .collect();
                kept.windows(2)
                    .map(|pair| vec![pair[0], pair[1]])
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut graph = Self {
            nodes: self.nodes,
            ways,
        };
        graph.prune_unreferenced();
        debug!(
            "Simplified graph from {} to {} nodes",
            before,
            graph.nodes.len()
        );
        graph
    }
}
