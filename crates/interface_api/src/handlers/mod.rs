//! Request handlers

pub mod bordereaux;
pub mod corbeille;
pub mod escalations;
pub mod health;
pub mod teams;
