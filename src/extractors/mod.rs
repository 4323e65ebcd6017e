//! Request extractors.

pub mod bearer;
pub mod payload;
pub mod query;

pub use bearer::BearerToken;
pub use query::QueryPairs;
