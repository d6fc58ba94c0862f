//! Exchange core services.

pub mod admission;
pub mod audit;
pub mod escrow;
pub mod locks;
pub mod market;
pub mod matching;
pub mod resolution;
pub mod settlement;
