// src/utils/mod.rs
pub mod precision;
pub mod retry;
pub mod throttle;
