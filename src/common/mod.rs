pub mod activations;
pub mod config;
pub(crate) mod dropout;
pub mod error;
pub(crate) mod kind;
pub mod resources;

pub use activations::Activation;
pub use config::Config;
