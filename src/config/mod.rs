//! Configuration module for the integrity engine
//!
//! This module handles:
//! - Engine target configuration (engine_target.toml)
//! - Surface declarations and cross-surface allow rules
//! - Triangulation defaults

mod project_config;

pub use project_config::{
    load_engine_target, AllowRule, CrossSurfaceConfig, EngineTargetConfig, SourceFilter,
    SurfaceConfig, TriangulationConfig, CONFIG_TEMPLATE, DEFAULT_PERIPHERY,
    DEFAULT_SOURCE_EXTENSIONS,
};
