//! # storage-adapters
//!
//! Document stores and outbound transports behind the `domains` ports.
//! The in-memory store is always built; Postgres sits behind `db-postgres`.

pub mod mailer;
pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use mailer::LogMailer;
pub use memory::MemoryStore;
#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
