//! Natural-language movie and TV discovery on top of TMDB.
//!
//! [`query::parse`] turns a line of text into a [`query::ParsedQuery`];
//! [`discovery::run_search`] maps it onto discover calls and falls back to
//! title search and broadened filters when nothing comes back.

pub mod app;
pub mod cache;
pub mod config;
pub mod discovery;
pub mod models;
pub mod query;
pub mod tmdb;
