//! Geocache service
//!
//! A JSON backend where users create, find and favorite location caches.
//! Handlers in [`routes`] validate input with the [`models`], persist through a
//! [`repositories::GeocacheRepository`] and answer through [`response`].

pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod repositories;
pub mod response;
pub mod routes;
pub mod state;
