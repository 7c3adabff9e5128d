/// Persistence boundary for the match events of a fixture.
pub mod fixture_store;
/// Storage-side representation of match events.
pub mod models;
/// Storage errors shared by every backend.
pub mod storage;
