// Per-archetype nearest-neighbor search over standardized feature vectors.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::features::Mode;
use crate::model::{Archetype, PlayerId};

/// One comparable player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityNeighbor {
    pub player_id: PlayerId,
    /// `1 / (1 + distance)`, in (0, 1].
    pub similarity: f64,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Hitters,
    Pitchers,
}

impl PoolKind {
    pub fn mode(self) -> Mode {
        match self {
            PoolKind::Hitters => Mode::Hitting,
            PoolKind::Pitchers => Mode::Pitching,
        }
    }

    /// Whether players of `archetype` are members of this pool. Two-way
    /// players belong to both.
    pub fn admits(self, archetype: Archetype) -> bool {
        match self {
            PoolKind::Hitters => archetype.hits(),
            PoolKind::Pitchers => archetype.pitches(),
        }
    }

    /// Pool a player of `archetype` is compared against.
    pub fn for_archetype(archetype: Archetype) -> PoolKind {
        match archetype {
            Archetype::Pitcher => PoolKind::Pitchers,
            Archetype::PositionPlayer | Archetype::TwoWay => PoolKind::Hitters,
        }
    }
}

// ---------------------------------------------------------------------------
// StandardScaler
// ---------------------------------------------------------------------------

/// Per-column centering and scaling by population standard deviation.
/// Constant columns are scaled by 1.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Option<Self> {
        let first = rows.first()?;
        let dims = first.len();
        if rows.iter().any(|r| r.len() != dims) {
            return None;
        }

        let n = rows.len() as f64;
        let mean: Vec<f64> = (0..dims)
            .map(|c| rows.iter().map(|r| r[c]).sum::<f64>() / n)
            .collect();
        let scale: Vec<f64> = (0..dims)
            .map(|c| {
                let var = rows.iter().map(|r| (r[c] - mean[c]).powi(2)).sum::<f64>() / n;
                let sd = var.sqrt();
                if sd.is_finite() && sd > f64::EPSILON {
                    sd
                } else {
                    1.0
                }
            })
            .collect();

        Some(Self { mean, scale })
    }

    pub fn dims(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// A fitted pool: the scaler plus every member's standardized vector.
#[derive(Debug, Clone)]
pub struct SimilarityPool {
    kind: PoolKind,
    scaler: StandardScaler,
    members: Vec<(PlayerId, Vec<f64>)>,
}

impl SimilarityPool {
    /// Fit a pool from normalized member vectors. Returns `None` when the
    /// pool is smaller than `min_size` or the vectors disagree in length.
    pub fn fit(kind: PoolKind, entries: Vec<(PlayerId, Vec<f64>)>, min_size: usize) -> Option<Self> {
        if entries.len() < min_size {
            debug!(
                "{:?} pool has {} members (< {}); leaving unfit",
                kind,
                entries.len(),
                min_size
            );
            return None;
        }
        let rows: Vec<Vec<f64>> = entries.iter().map(|(_, v)| v.clone()).collect();
        let scaler = StandardScaler::fit(&rows)?;
        let members = entries
            .into_iter()
            .map(|(id, v)| (id, scaler.transform(&v)))
            .collect();
        Some(Self {
            kind,
            scaler,
            members,
        })
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.members.iter().any(|(id, _)| *id == player_id)
    }

    /// Up to `k` nearest members to `vector`, excluding `player_id`, in
    /// increasing distance order with ties broken by player id.
    pub fn query(&self, player_id: PlayerId, vector: &[f64], k: usize) -> Vec<SimilarityNeighbor> {
        if k == 0 || vector.len() != self.scaler.dims() || vector.iter().all(|v| *v == 0.0) {
            return Vec::new();
        }
        let query = self.scaler.transform(vector);

        let mut scored: Vec<(PlayerId, f64)> = self
            .members
            .iter()
            .map(|(id, point)| (*id, euclidean(&query, point)))
            .collect();
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        scored
            .into_iter()
            .take(k + 1)
            .filter(|(id, _)| *id != player_id)
            .take(k)
            .map(|(id, distance)| SimilarityNeighbor {
                player_id: id,
                similarity: 1.0 / (1.0 + distance),
                distance,
            })
            .collect()
    }
}

/// Both fitted pools. An absent pool is unfit.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    pub hitters: Option<SimilarityPool>,
    pub pitchers: Option<SimilarityPool>,
}

impl SimilarityIndex {
    pub fn pool(&self, kind: PoolKind) -> Option<&SimilarityPool> {
        match kind {
            PoolKind::Hitters => self.hitters.as_ref(),
            PoolKind::Pitchers => self.pitchers.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Twelve members spread along a line, with a second noisy column.
    fn line_pool(n: usize) -> Vec<(PlayerId, Vec<f64>)> {
        (1..=n as i64)
            .map(|id| (id, vec![id as f64 * 5.0, (id % 3) as f64 * 10.0, 50.0]))
            .collect()
    }

    #[test]
    fn scaler_centers_and_scales_with_constant_columns() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let t = scaler.transform(&[3.0, 5.0]);
        assert!(approx_eq(t[0], 1.0));
        assert!(approx_eq(t[1], 0.0));
        assert!(StandardScaler::fit(&[]).is_none());
        assert!(StandardScaler::fit(&[vec![1.0], vec![1.0, 2.0]]).is_none());
    }

    #[test]
    fn small_pool_is_unfit() {
        assert!(SimilarityPool::fit(PoolKind::Hitters, line_pool(9), 10).is_none());
        assert!(SimilarityPool::fit(PoolKind::Hitters, line_pool(10), 10).is_some());
    }

    #[test]
    fn query_excludes_self_and_respects_k() {
        let pool = SimilarityPool::fit(PoolKind::Pitchers, line_pool(12), 10).unwrap();
        let me = line_pool(12)[5].clone();

        for k in [1, 5, 11, 20] {
            let result = pool.query(me.0, &me.1, k);
            assert_eq!(result.len(), k.min(pool.len() - 1), "k = {k}");
            assert!(result.iter().all(|n| n.player_id != me.0));
        }
    }

    #[test]
    fn outsider_query_returns_k_members() {
        let pool = SimilarityPool::fit(PoolKind::Hitters, line_pool(12), 10).unwrap();
        let result = pool.query(999, &[31.0, 10.0, 50.0], 5);
        assert_eq!(result.len(), 5);
        assert_eq!(result[0].player_id, 7);
    }

    #[test]
    fn results_are_sorted_by_distance_with_similarity_from_distance() {
        let pool = SimilarityPool::fit(PoolKind::Hitters, line_pool(12), 10).unwrap();
        let result = pool.query(6, &[30.0, 0.0, 50.0], 8);
        for pair in result.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        for n in &result {
            assert!(approx_eq(n.similarity, 1.0 / (1.0 + n.distance)));
            assert!(n.similarity > 0.0 && n.similarity <= 1.0);
        }
    }

    #[test]
    fn ties_break_by_player_id() {
        let entries: Vec<(PlayerId, Vec<f64>)> = (1..=10)
            .map(|id| (id, vec![if id % 2 == 0 { 10.0 } else { 20.0 }]))
            .collect();
        let pool = SimilarityPool::fit(PoolKind::Hitters, entries, 10).unwrap();
        let result = pool.query(100, &[10.0], 3);
        let ids: Vec<PlayerId> = result.iter().map(|n| n.player_id).collect();
        assert_eq!(ids, vec![2, 4, 6]);
    }

    #[test]
    fn zero_or_mismatched_query_is_empty() {
        let pool = SimilarityPool::fit(PoolKind::Hitters, line_pool(12), 10).unwrap();
        assert!(pool.query(1, &[0.0, 0.0, 0.0], 5).is_empty());
        assert!(pool.query(1, &[1.0, 2.0], 5).is_empty());
        assert!(pool.query(1, &[5.0, 10.0, 50.0], 0).is_empty());
    }

    #[test]
    fn pool_membership_by_archetype() {
        assert!(PoolKind::Hitters.admits(Archetype::TwoWay));
        assert!(PoolKind::Pitchers.admits(Archetype::TwoWay));
        assert!(!PoolKind::Pitchers.admits(Archetype::PositionPlayer));
        assert_eq!(PoolKind::for_archetype(Archetype::TwoWay), PoolKind::Hitters);
        assert_eq!(PoolKind::for_archetype(Archetype::Pitcher).mode(), Mode::Pitching);
    }
}
