//! Lifespan index: which entity incarnations hold a position at a given time.
//!
//! Each incarnation contributes the interval `[first_fix, removed_at)`. The index keeps the
//! interval edges sorted by time plus periodic checkpoints of the active set. A lookup starts
//! from the nearest checkpoint and replays the short run of edges after it, so the candidate
//! set stays within the live entities plus one checkpoint stride, however many entities
//! lived and died earlier in the recording.

use hashbrown::HashSet;

use crate::ids::EntityKey;

/// Minimum number of edges between two checkpoints.
pub const MIN_CHECKPOINT_STRIDE: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq)]
struct Edge {
    time: f64,
    key: EntityKey,
    opens: bool,
}

#[derive(Clone, Debug)]
struct Checkpoint {
    /// Edges `[..at]` are folded into `active`.
    at: usize,
    active: Vec<EntityKey>,
}

#[derive(Clone, Debug)]
pub struct LifespanIndex {
    edges: Vec<Edge>,
    checkpoints: Vec<Checkpoint>,
}

impl Default for LifespanIndex {
    fn default() -> Self {
        Self {
            edges: Vec::new(),
            checkpoints: vec![Checkpoint {
                at: 0,
                active: Vec::new(),
            }],
        }
    }
}

impl LifespanIndex {
    /// Build from `(key, start, end)` intervals. Empty intervals (`end <= start`) are skipped.
    pub fn build<I>(spans: I) -> Self
    where
        I: IntoIterator<Item = (EntityKey, f64, Option<f64>)>,
    {
        let mut edges = Vec::new();
        for (key, start, end) in spans {
            if end.is_some_and(|e| e <= start) {
                continue;
            }
            edges.push(Edge {
                time: start,
                key,
                opens: true,
            });
            if let Some(end) = end {
                edges.push(Edge {
                    time: end,
                    key,
                    opens: false,
                });
            }
        }
        edges.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.key.cmp(&b.key)));

        // Checkpoint spacing grows with the active set so stored keys stay linear in edges.
        let mut checkpoints = Vec::new();
        let mut active: HashSet<EntityKey> = HashSet::new();
        let mut since = 0usize;
        for (i, edge) in edges.iter().enumerate() {
            if i == 0 || since >= MIN_CHECKPOINT_STRIDE.max(active.len()) {
                let mut keys: Vec<EntityKey> = active.iter().copied().collect();
                keys.sort_unstable();
                checkpoints.push(Checkpoint { at: i, active: keys });
                since = 0;
            }
            if edge.opens {
                active.insert(edge.key);
            } else {
                active.remove(&edge.key);
            }
            since += 1;
        }
        if checkpoints.is_empty() {
            return Self::default();
        }
        log::debug!(
            "lifespan index: {} edges, {} checkpoints",
            edges.len(),
            checkpoints.len()
        );
        Self { edges, checkpoints }
    }

    /// Incarnations that may be live at `t`: a superset of the live ones, bounded by them
    /// plus the edges since the nearest checkpoint. Callers filter with the exact lifespan.
    pub fn candidates(&self, t: f64) -> impl Iterator<Item = EntityKey> + '_ {
        let n = self.edges.partition_point(|e| e.time <= t);
        let c = self
            .checkpoints
            .partition_point(|cp| cp.at <= n)
            .saturating_sub(1);
        let cp = &self.checkpoints[c];
        cp.active.iter().copied().chain(
            self.edges[cp.at..n.max(cp.at)]
                .iter()
                .filter(|e| e.opens)
                .map(|e| e.key),
        )
    }

    /// Number of interval edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(idx: &LifespanIndex, t: f64) -> Vec<u32> {
        let mut v: Vec<u32> = idx.candidates(t).map(|k| k.0).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn empty_index_has_no_candidates() {
        let idx = LifespanIndex::build(std::iter::empty());
        assert!(idx.is_empty());
        assert_eq!(idx.candidates(3.0).count(), 0);
    }

    #[test]
    fn candidates_cover_live_intervals() {
        let idx = LifespanIndex::build(vec![
            (EntityKey(0), 0.0, None),
            (EntityKey(1), 1.0, Some(3.0)),
            (EntityKey(2), 2.0, Some(2.0)),
        ]);
        assert_eq!(idx.len(), 3);
        assert_eq!(live(&idx, -1.0), Vec::<u32>::new());
        assert_eq!(live(&idx, 0.0), vec![0]);
        assert!(live(&idx, 2.5).starts_with(&[0, 1]));
        assert!(!live(&idx, 2.0).contains(&2));
    }

    #[test]
    fn short_lived_entities_do_not_accumulate() {
        let mut spans = vec![(EntityKey(0), 0.0, None)];
        for i in 1..5_000u32 {
            let t = i as f64;
            spans.push((EntityKey(i), t, Some(t + 0.5)));
        }
        let idx = LifespanIndex::build(spans);
        for t in [10.0, 2_500.25, 4_999.0, 10_000.0] {
            let n = idx.candidates(t).count();
            assert!(n <= 2 + 2 * MIN_CHECKPOINT_STRIDE, "t={t} candidates={n}");
            assert!(idx.candidates(t).any(|k| k == EntityKey(0)));
        }
    }
}
