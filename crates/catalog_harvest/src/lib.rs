//! Harvests the University of Alberta's public course catalogue into
//! faculty, subject, course and class-schedule record sets.

pub mod harvest;
pub mod snapshot;

pub use harvest::{HarvestConfig, HarvestError, Harvester, RateLimitedFetcher, Stage};
pub use snapshot::{JsonSnapshotStore, SnapshotStore};
