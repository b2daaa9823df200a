//! washline workflow server.
//!
//! This crate exposes the workflow engine over an HTTP API and stores
//! workflows and their execution history in PostgreSQL.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
