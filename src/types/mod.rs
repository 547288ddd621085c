//! Shared data structures for the store proximity engine
//!
//! - Geo: Coordinate, LocationSample, great-circle distance
//! - Stores: Store (validated identity), StoreRecord (raw directory shape)
//! - Recommendation: the generated number set and its invariants
//! - Notification: delivery requests, outcomes, authorization signal

mod geo;
mod store;
mod recommendation;
mod notification;

pub use geo::*;
pub use store::*;
pub use recommendation::*;
pub use notification::*;
