pub mod config;
pub mod envs;
pub mod error;
pub mod mdps;
pub mod persistence;

pub use error::{Error, Result};
