// Domain records supplied by the storage layer.

pub mod player;
pub mod stats;

pub use player::{Archetype, Level, PlayerId, PlayerRecord};
pub use stats::{StatBlock, StatCategory, StatLine};
