//! Client-side core of the video engagement dashboard: session handling
//! against the REST API plus the filter, grouping and table engines every
//! view runs its data through.

pub mod aggregate;
pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod jwt;
pub mod models;
pub mod report;
pub mod search;
pub mod state;
pub mod table;
pub mod token_store;
pub mod transport;
pub mod views;

#[cfg(test)]
mod testing;
