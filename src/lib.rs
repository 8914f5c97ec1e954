//! blogdesk - client core of a blog administration front end
//!
//! This library owns session handling, admin authorization caching and
//! binary resource caching for a client of the blog API.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod models;
pub mod services;
pub mod storage;

pub use app::App;
