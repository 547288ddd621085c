//! Recommendation Generation
//!
//! Draws validated lotto number sets for proximity notifications and for
//! user-initiated "new numbers" requests on history entries.

mod generator;

pub use generator::RecommendationGenerator;
