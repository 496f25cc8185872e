//! Shared `PartitionStore` contract tests.
//!
//! The same test functions run against the in-memory store and against a
//! real MySQL server, so the engine's unit tests can trust the memory store
//! to refuse what MySQL refuses:
//!
//! - **Memory**: run with every `cargo test`
//! - **MySQL**: testcontainers-based, run with `cargo test -- --ignored`
//!
//! ```bash
//! cargo test                       # memory store only
//! cargo test -- --ignored          # MySQL integration tests (requires Docker)
//! cargo test -- --include-ignored  # everything
//! ```
