//! Wire and domain types shared by the keepsake crates.

pub mod api;
pub mod models;
