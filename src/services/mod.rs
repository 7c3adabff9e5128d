/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Referee operations on the match being officiated.
pub mod match_service;
/// Relay of store changes and sync outcomes onto the SSE stream.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage connection supervisor with reconnection backoff.
pub mod storage_supervisor;
/// Single-flight, throttled push of dirty entities to storage.
pub mod sync_coordinator;
/// Periodic, debounced and explicit sync triggers.
pub mod sync_service;
