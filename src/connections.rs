//! Connection lines between nearby stars.
//!
//! Two stars are linked when they are closer than the connection radius.
//! Line opacity and width fade with distance, so links appear softly as stars
//! approach each other and vanish as they drift apart.
//!
//! Finding the links is an all-pairs test and dominates the frame cost. In
//! [`ConnectionMode::Cached`] the membership of the graph is only recomputed
//! a few times per second, while the opacity of every cached link is still
//! recomputed from current positions each frame.

use serde::{Deserialize, Serialize};

use crate::math::distance;
use crate::star::Star;
use crate::time::Interval;

/// Connection refresh cadence used when none is configured.
pub const DEFAULT_REFRESH_RATE: f32 = 10.0;

/// How link opacity fades with distance.
///
/// With `t = distance / radius`:
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Falloff {
    /// `1 - t`
    #[default]
    Linear,
    /// `1 - t²`, links stay bright for longer and drop off near the radius.
    Squared,
}

impl Falloff {
    /// Falloff factor in `[0, 1]`; zero at or beyond `radius`.
    #[inline]
    pub fn factor(&self, distance: f32, radius: f32) -> f32 {
        if radius <= 0.0 {
            return 0.0;
        }
        let t = distance / radius;
        let f = match self {
            Falloff::Linear => 1.0 - t,
            Falloff::Squared => 1.0 - t * t,
        };
        f.clamp(0.0, 1.0)
    }
}

/// When the link graph is recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConnectionMode {
    /// Test every pair every frame.
    PerFrame,
    /// Recompute membership `refresh_rate` times per second; restyle every frame.
    Cached { refresh_rate: f32 },
}

impl Default for ConnectionMode {
    fn default() -> Self {
        ConnectionMode::Cached {
            refresh_rate: DEFAULT_REFRESH_RATE,
        }
    }
}

/// A link ready to be drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Lower star index.
    pub from: usize,
    /// Higher star index.
    pub to: usize,
    pub distance: f32,
    pub opacity: f32,
    pub width: f32,
}

/// Radius and stroke parameters shared by every link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeStyle {
    pub radius: f32,
    pub base_width: f32,
    pub falloff: Falloff,
}

impl EdgeStyle {
    /// Style the link between two stars `distance` apart.
    ///
    /// Returns `None` when the link would be fully transparent.
    #[inline]
    pub fn edge(&self, from: usize, to: usize, distance: f32) -> Option<Edge> {
        let f = self.falloff.factor(distance, self.radius);
        if f <= 0.0 {
            return None;
        }
        Some(Edge {
            from,
            to,
            distance,
            opacity: f,
            width: self.base_width + f,
        })
    }
}

/// Undirected link graph stored as `source -> ascending targets`.
///
/// Every link is keyed by `(min, max)` and stored once under the lower index.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    adjacency: Vec<Vec<usize>>,
    edge_count: usize,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: usize, b: usize) -> (usize, usize) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Add the link between `a` and `b`. Returns `false` if it already existed.
    pub fn insert(&mut self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        let (from, to) = Self::key(a, b);
        if self.adjacency.len() <= from {
            self.adjacency.resize_with(from + 1, Vec::new);
        }
        let targets = &mut self.adjacency[from];
        match targets.binary_search(&to) {
            Ok(_) => false,
            Err(pos) => {
                targets.insert(pos, to);
                self.edge_count += 1;
                true
            }
        }
    }

    /// Remove the link between `a` and `b`. Returns `false` if it was absent.
    pub fn remove(&mut self, a: usize, b: usize) -> bool {
        let (from, to) = Self::key(a, b);
        let Some(targets) = self.adjacency.get_mut(from) else {
            return false;
        };
        match targets.binary_search(&to) {
            Ok(pos) => {
                targets.remove(pos);
                self.edge_count -= 1;
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, a: usize, b: usize) -> bool {
        let (from, to) = Self::key(a, b);
        self.adjacency
            .get(from)
            .is_some_and(|targets| targets.binary_search(&to).is_ok())
    }

    /// Targets linked from `source`, ascending.
    pub fn targets(&self, source: usize) -> &[usize] {
        self.adjacency.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }

    pub fn clear(&mut self) {
        self.adjacency.clear();
        self.edge_count = 0;
    }

    /// All links as `(from, to)` pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(from, targets)| targets.iter().map(move |&to| (from, to)))
    }

    /// Forget every link touching an index `>= len`.
    pub fn truncate(&mut self, len: usize) {
        self.adjacency.truncate(len);
        for targets in &mut self.adjacency {
            let keep = targets.partition_point(|&t| t < len);
            targets.truncate(keep);
        }
        self.edge_count = self.adjacency.iter().map(Vec::len).sum();
    }

    /// Bring membership in line with the current positions.
    ///
    /// Every pair closer than `radius` is linked, every other pair unlinked.
    /// Returns `(added, removed)`.
    pub fn refresh(&mut self, stars: &[Star], radius: f32) -> (usize, usize) {
        self.truncate(stars.len());

        let mut added = 0;
        let mut removed = 0;
        for (i, a) in stars.iter().enumerate() {
            for (j, b) in stars.iter().enumerate().skip(i + 1) {
                if distance(a.position, b.position) < radius {
                    added += self.insert(i, j) as usize;
                } else {
                    removed += self.remove(i, j) as usize;
                }
            }
        }
        (added, removed)
    }
}

/// Test every pair once and style the links that are in range.
///
/// Edges are appended to `out` ordered by `(from, to)`.
pub fn connect_all(stars: &[Star], style: &EdgeStyle, out: &mut Vec<Edge>) {
    out.clear();
    for (i, a) in stars.iter().enumerate() {
        for (j, b) in stars.iter().enumerate().skip(i + 1) {
            let d = distance(a.position, b.position);
            if d < style.radius {
                out.extend(style.edge(i, j, d));
            }
        }
    }
}

/// Style the cached links of `graph` using current star positions.
///
/// Links whose stars have since moved out of range are skipped until the
/// next refresh removes them.
pub fn style_cached(graph: &ConnectionGraph, stars: &[Star], style: &EdgeStyle, out: &mut Vec<Edge>) {
    out.clear();
    for (from, to) in graph.iter() {
        let (Some(a), Some(b)) = (stars.get(from), stars.get(to)) else {
            continue;
        };
        let d = distance(a.position, b.position);
        out.extend(style.edge(from, to, d));
    }
}

/// Link graph plus the cadence it is maintained at.
#[derive(Debug)]
pub struct Connections {
    mode: ConnectionMode,
    graph: ConnectionGraph,
    refresh: Interval,
    edges: Vec<Edge>,
}

impl Connections {
    pub fn new(mode: ConnectionMode) -> Self {
        let period_ms = match mode {
            ConnectionMode::Cached { refresh_rate } if refresh_rate.is_finite() && refresh_rate > 0.0 => {
                1000.0 / refresh_rate as f64
            }
            _ => 0.0,
        };
        Self {
            mode,
            graph: ConnectionGraph::new(),
            refresh: Interval::new(period_ms),
            edges: Vec::new(),
        }
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    pub fn graph(&self) -> &ConnectionGraph {
        &self.graph
    }

    /// Edges produced by the last [`Connections::update`].
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Drop the cached graph and rebuild it on the next update.
    pub fn invalidate(&mut self) {
        self.graph.clear();
        self.edges.clear();
        self.refresh.reset();
    }

    /// Forget links to stars that no longer exist.
    pub fn truncate(&mut self, len: usize) {
        self.graph.truncate(len);
        self.edges.retain(|e| e.to < len);
    }

    /// Compute this frame's edges.
    pub fn update(&mut self, now_ms: f64, stars: &[Star], style: &EdgeStyle) -> &[Edge] {
        match self.mode {
            ConnectionMode::PerFrame => connect_all(stars, style, &mut self.edges),
            ConnectionMode::Cached { .. } => {
                if self.refresh.poll(now_ms) {
                    let (added, removed) = self.graph.refresh(stars, style.radius);
                    log::trace!(
                        "connection graph refreshed: +{} -{} ({} links)",
                        added,
                        removed,
                        self.graph.edge_count()
                    );
                }
                style_cached(&self.graph, stars, style, &mut self.edges);
            }
        }
        &self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn at(x: f32, y: f32) -> Star {
        Star::new(Vec2::new(x, y), 2.0, Vec2::ZERO)
    }

    fn style(radius: f32) -> EdgeStyle {
        EdgeStyle {
            radius,
            base_width: 0.5,
            falloff: Falloff::Linear,
        }
    }

    #[test]
    fn test_two_star_opacity() {
        let stars = [at(0.0, 0.0), at(10.0, 10.0)];
        let mut edges = Vec::new();
        connect_all(&stars, &style(50.0), &mut edges);

        assert_eq!(edges.len(), 1);
        let expected = 1.0 - 200.0_f32.sqrt() / 50.0;
        assert!((edges[0].opacity - expected).abs() < 1e-6);
        assert!((edges[0].opacity - 0.717).abs() < 1e-3);
        assert!((edges[0].width - (0.5 + expected)).abs() < 1e-6);
        assert_eq!((edges[0].from, edges[0].to), (0, 1));
    }

    #[test]
    fn test_squared_falloff() {
        let f = Falloff::Squared.factor(25.0, 50.0);
        assert!((f - 0.75).abs() < 1e-6);
        assert_eq!(Falloff::Linear.factor(60.0, 50.0), 0.0);
        assert_eq!(Falloff::Linear.factor(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_zero_radius_no_edges() {
        let stars: Vec<Star> = (0..50).map(|i| at(i as f32, 0.0)).collect();
        let mut edges = Vec::new();
        connect_all(&stars, &style(0.0), &mut edges);
        assert!(edges.is_empty());

        let mut graph = ConnectionGraph::new();
        graph.refresh(&stars, 0.0);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_edges_unique_and_ordered() {
        let stars: Vec<Star> = (0..20).map(|i| at((i % 5) as f32 * 3.0, (i / 5) as f32 * 3.0)).collect();
        let mut edges = Vec::new();
        connect_all(&stars, &style(100.0), &mut edges);
        assert_eq!(edges.len(), 20 * 19 / 2);
        for e in &edges {
            assert!(e.from < e.to);
        }
        for w in edges.windows(2) {
            assert!((w[0].from, w[0].to) < (w[1].from, w[1].to));
        }
    }

    #[test]
    fn test_insert_remove_noops() {
        let mut graph = ConnectionGraph::new();
        assert!(graph.insert(3, 1));
        assert!(!graph.insert(1, 3));
        assert!(graph.contains(3, 1));
        assert_eq!(graph.targets(1), &[3]);
        assert!(graph.targets(3).is_empty());
        assert_eq!(graph.edge_count(), 1);

        assert!(!graph.remove(0, 2));
        assert!(graph.remove(3, 1));
        assert!(!graph.remove(1, 3));
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.insert(4, 4));
    }

    #[test]
    fn test_refresh_matches_threshold() {
        let mut stars = vec![at(0.0, 0.0), at(5.0, 0.0), at(100.0, 0.0)];
        let mut graph = ConnectionGraph::new();

        assert_eq!(graph.refresh(&stars, 10.0), (1, 0));
        assert!(graph.contains(0, 1));

        stars[1].position.x = 98.0;
        assert_eq!(graph.refresh(&stars, 10.0), (1, 1));
        assert!(!graph.contains(0, 1));
        assert!(graph.contains(1, 2));
        assert_eq!(graph.iter().collect::<Vec<_>>(), vec![(1, 2)]);
    }

    #[test]
    fn test_truncate_prunes_removed_indices() {
        let stars: Vec<Star> = (0..4).map(|i| at(i as f32, 0.0)).collect();
        let mut graph = ConnectionGraph::new();
        graph.refresh(&stars, 10.0);
        assert_eq!(graph.edge_count(), 6);

        graph.truncate(2);
        assert_eq!(graph.iter().collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_cached_membership_is_stale_between_refreshes() {
        let mut stars = vec![at(0.0, 0.0), at(10.0, 0.0)];
        let mut conns = Connections::new(ConnectionMode::Cached { refresh_rate: 10.0 });
        let style = style(50.0);

        assert_eq!(conns.update(0.0, &stars, &style).len(), 1);

        // Out of range, but the graph is not due for another 100ms
        stars[1].position.x = 80.0;
        assert!(conns.update(16.0, &stars, &style).is_empty());
        assert!(conns.graph().contains(0, 1));

        // Back in range: the cached link is drawn with fresh opacity
        stars[1].position.x = 25.0;
        let edges = conns.update(32.0, &stars, &style);
        assert_eq!(edges.len(), 1);
        assert!((edges[0].opacity - 0.5).abs() < 1e-6);

        // New link formed between refreshes is not drawn yet
        stars.push(at(0.0, 5.0));
        assert_eq!(conns.update(48.0, &stars, &style).len(), 1);

        // Refresh picks it up
        assert_eq!(conns.update(100.0, &stars, &style).len(), 3);
    }

    #[test]
    fn test_per_frame_mode_tracks_positions() {
        let mut stars = vec![at(0.0, 0.0), at(10.0, 0.0)];
        let mut conns = Connections::new(ConnectionMode::PerFrame);
        let style = style(50.0);
        assert_eq!(conns.update(0.0, &stars, &style).len(), 1);
        stars[1].position.x = 80.0;
        assert!(conns.update(1.0, &stars, &style).is_empty());
    }

    #[test]
    fn test_invalidate_forces_refresh() {
        let stars = vec![at(0.0, 0.0), at(10.0, 0.0)];
        let mut conns = Connections::new(ConnectionMode::Cached { refresh_rate: 1.0 });
        let style = style(50.0);
        conns.update(0.0, &stars, &style);
        conns.invalidate();
        assert!(conns.graph().is_empty());
        assert_eq!(conns.update(1.0, &stars, &style).len(), 1);
    }
}
