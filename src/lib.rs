//! Time-range partition maintenance for append-only MySQL monitoring tables.
//!
//! Replaces row-by-row housekeeping deletes on tables such as Zabbix
//! `history*` and `trends*` with partition drops. Each run:
//!
//! 1. checks that the table can be range-partitioned on its timestamp column
//! 2. reads the live partitions from the server catalog
//! 3. initializes unpartitioned tables, or creates partitions ahead of now
//!    and drops those past retention
//! 4. reports every action taken, skipped or failed
//!
//! The run is idempotent: it is recomputed from the live catalog each time.

pub mod catalog;
pub mod config;
pub mod db;
pub mod init;
pub mod maintenance;
pub mod monitoring;
pub mod mutator;
#[cfg(feature = "cli")]
pub mod observability;
pub mod period;
pub mod report;
pub mod schema;
