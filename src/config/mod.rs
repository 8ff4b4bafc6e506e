// src/config/mod.rs

//! Configuration loading and validation for dlqueue.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate values and convert them to runtime types (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, DownloadConfig, MetadataConfig, RawConfigFile, RawDownloadSection,
    RawMetadataSection, ToolsSection,
};
