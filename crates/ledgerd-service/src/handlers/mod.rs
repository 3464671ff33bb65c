//! HTTP request handlers.

pub mod admin;
pub mod credits;
pub mod grants;
pub mod health;
pub mod reservations;
pub mod subscriptions;
