/// Development token issuing.
pub mod auth_service;
/// Room creation, lookup and eviction.
pub mod contest_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Save-results delivery with retries.
pub mod persistence_service;
/// Per-room task owning the contest state.
pub mod room_actor;
/// Background eviction of finished and idle rooms.
pub mod room_reaper;
/// Points for a correct answer.
pub mod scoring;
/// Bearer token verification.
pub mod token_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
