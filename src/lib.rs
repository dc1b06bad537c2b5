//! budgeteer: per-user household budget tracking over JSON documents
//!
//! Small stack: budget documents (months, fixed/variable expenses) stored as
//! pretty-printed JSON files, bcrypt+JWT authentication, and an Axum REST
//! surface for every operation.
//!
//! This lib exposes the document model, storage and export layers.

pub mod auth;
pub mod book;
pub mod export;
pub mod models;
// REST API module: Axum router and handlers for the full request surface
pub mod rest;
pub mod storage;
