//! Database layer for the Podium dashboard.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode
//! initialization, and embedded SQL migrations. Every table Podium uses
//! is created through versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: the dashboard runs as a single server
//!   process with many readers and comparatively few writers; WAL gives
//!   concurrent readers alongside a single writer without an external
//!   database process.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema ships with the server and cannot
//!   drift from the code that depends on it.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
