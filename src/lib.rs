// Vélo'v forecast map: prediction-driven coloring of bike-share station markers

pub mod client;
pub mod color;
pub mod config;
pub mod error;
pub mod fleet;
pub mod marker;
pub mod models;
pub mod ratio;
pub mod server;
pub mod state;
pub mod time;

#[cfg(test)]
mod test_utils;
