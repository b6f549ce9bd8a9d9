//! # Kernel
//!
//! Wiring and lifecycle of the plugin core.
//!
//! - [`Application`](bootstrap::Application) builds the plugin registry and the
//!   plugin manager around an injected host and settings store, then drives
//!   their [`KernelComponent`](component::KernelComponent) lifecycle.
//! - [`CoreConfig`](config::CoreConfig) holds the tunables, loadable from
//!   JSON, TOML or YAML.
//! - [`Error`](error::Error) aggregates every subsystem error.
pub mod bootstrap;
pub mod component;
pub mod config;
pub mod constants;
pub mod error;

pub use bootstrap::Application;
pub use component::{DependencyRegistry, KernelComponent};
pub use config::CoreConfig;
pub use error::{Error, KernelLifecyclePhase, Result};
