// Scouting engine: classification, calibration, features, normalization,
// similarity, ratings, and career projection.

pub mod batch;
pub mod calibration;
pub mod classifier;
pub mod context;
pub mod features;
pub mod normalize;
pub mod projection;
pub mod ratings;
pub mod session;
pub mod similarity;
pub mod tables;

#[cfg(test)]
pub(crate) mod fixtures;
