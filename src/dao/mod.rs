/// Shared HTTP client plumbing.
pub mod http;
/// Wire models exchanged with the external stores.
pub mod models;
/// Question bank sources consulted at room creation.
pub mod question_bank;
/// Destinations for finished contest results.
pub mod results_sink;
/// Error types shared by every store.
pub mod storage;
