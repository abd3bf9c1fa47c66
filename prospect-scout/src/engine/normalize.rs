// Normalization of level-adjusted features onto a common 0-100 scale.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::config::NormalizationConfig;
use crate::engine::features::{Feature, Mode, RawFeatures};

/// Guard below which an anchor range counts as degenerate.
const RANGE_EPSILON: f64 = 1e-12;

/// Lower and upper anchor for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub min: f64,
    pub max: f64,
    /// `true` when fit from population percentiles, `false` for the static
    /// fallback range.
    pub data_driven: bool,
}

/// Per-feature anchors. Every feature always has one.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchors {
    by_feature: BTreeMap<Feature, Anchor>,
}

impl Default for Anchors {
    fn default() -> Self {
        Self::fallback()
    }
}

impl Anchors {
    /// Static fallback ranges for every feature.
    pub fn fallback() -> Self {
        let by_feature = Feature::ALL
            .into_iter()
            .map(|f| (f, fallback_anchor(f)))
            .collect();
        Self { by_feature }
    }

    /// Fit anchors from the population's `all`-mode raw vectors.
    ///
    /// A feature with fewer than `min_samples` non-zero values keeps its
    /// fallback range.
    pub fn fit(population: &[RawFeatures], cfg: &NormalizationConfig) -> Self {
        let mut by_feature = BTreeMap::new();
        let mut data_driven = 0usize;

        for feature in Feature::ALL {
            let mut samples: Vec<f64> = population
                .iter()
                .filter(|raw| raw.mode == Mode::All)
                .filter_map(|raw| raw.value(feature))
                .filter(|v| v.is_finite() && *v != 0.0)
                .collect();

            let anchor = if samples.len() >= cfg.min_samples {
                samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                data_driven += 1;
                // Coinciding percentiles stay as fit; `scale` maps them to 0.
                Anchor {
                    min: percentile(&samples, cfg.lower_percentile),
                    max: percentile(&samples, cfg.upper_percentile),
                    data_driven: true,
                }
            } else {
                fallback_anchor(feature)
            };
            by_feature.insert(feature, anchor);
        }

        debug!(
            "Fit normalization anchors over {} players ({} data-driven, {} fallback)",
            population.len(),
            data_driven,
            Feature::ALL.len() - data_driven
        );
        Self { by_feature }
    }

    pub fn anchor(&self, feature: Feature) -> Anchor {
        self.by_feature
            .get(&feature)
            .copied()
            .unwrap_or_else(|| fallback_anchor(feature))
    }

    pub fn normalize(&self, feature: Feature, value: f64) -> f64 {
        let a = self.anchor(feature);
        scale(value, a.min, a.max)
    }

    pub fn data_driven_count(&self) -> usize {
        self.by_feature.values().filter(|a| a.data_driven).count()
    }
}

fn fallback_anchor(feature: Feature) -> Anchor {
    let (min, max) = feature.def().fallback;
    Anchor {
        min,
        max,
        data_driven: false,
    }
}

/// Map `x` from [min, max] to [0, 100], clipping. A degenerate range or a
/// non-finite result maps to 0.
pub fn scale(x: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if !range.is_finite() || range.abs() <= RANGE_EPSILON {
        return 0.0;
    }
    let scaled = (x - min) / range * 100.0;
    if scaled.is_finite() {
        scaled.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Percentile of sorted data with linear interpolation between closest
/// ranks. `p` is in [0, 100].
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}
