//! # obward
//!
//! Data layer for an obstetrics ward assistant.
//!
//! This library provides:
//!
//! - **Schema sync** from a SQLite dataset into PostgreSQL or SQLite, with
//!   canonical type remapping and dependency-ordered loading
//! - **Circular foreign keys** resolved by nulling deferred columns during
//!   load and patching them afterwards
//! - **Ward write operations** (bed assignment, discharge prediction,
//!   alerts, medical orders), each atomic in one transaction
//! - **Result formatting** of ad-hoc SELECT queries as Markdown tables
//!
//! ## Example
//!
//! ```rust,no_run
//! use obward::{ward, Config, SqliteSession};
//!
//! #[tokio::main]
//! async fn main() -> obward::Result<()> {
//!     let config = Config::load("obward.yaml")?;
//!     let summary = obward::sync::run_from_config(&config).await?;
//!     println!("Synced {} rows", summary.total_rows());
//!
//!     let session = SqliteSession::connect("ward.db").await?;
//!     let outcome = ward::assign_bed(&session, "A001", "B01").await?;
//!     println!("{}", outcome.message);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod format;
pub mod sync;
pub mod ward;

// Re-exports for convenient access
pub use config::{Config, PostgresConfig, SourceConfig, SqliteConfig, SyncConfig, TargetConfig};
pub use crate::core::{Row, Session, SourceReader, SqlValue, Table, Transaction, TypeMapper};
pub use dialect::{CanonicalType, SqliteToCanonicalMapper};
pub use drivers::{PostgresSession, SqliteReader, SqliteSession, SslMode};
pub use error::{ErrorKind, Result, SyncPhase, WardError};
pub use format::{ensure_select_query, execute_and_format, format_rows};
pub use sync::{DeferredEdge, SyncEngine, SyncPlan, SyncSummary};
pub use ward::WriteOutcome;
