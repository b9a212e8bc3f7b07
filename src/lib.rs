//! Shepherd: a multi-environment workload controller on top of an external
//! container-composition engine.
//!
//! The crate is organized leaf-first, mirroring the data flow: the value
//! store feeds the config tree, the config manager owns and persists it,
//! environment/service operations build on the manager, and the renderer
//! plus probe runtime plus engine driver turn declarative config into
//! running containers.

pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod probe;
pub mod render;
pub mod service;
pub mod values;

pub use config::ConfigManager;
pub use engine::EngineDriver;
pub use error::{ShepherdError, ShepherdResult};
