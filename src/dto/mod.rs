pub mod health;
pub mod matches;
pub mod sse;
pub mod validation;
