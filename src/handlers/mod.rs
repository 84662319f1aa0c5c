//! HTTP request handlers.

pub mod assets;
pub mod auth;
pub mod health;
pub mod permissions;
pub mod reservations;
