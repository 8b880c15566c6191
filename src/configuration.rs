pub mod config;

pub use config::{Args, Config};
