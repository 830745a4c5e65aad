//! Bell Common - Shared configuration and logging for the opening-bell services.
//!
//! This crate provides:
//! - Configuration types and loading (`~/.bell/config.json` plus env overrides)
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;

pub use config::{
    BotConfig, Config, DataSourcesConfig, DestinationConfig, HolidayApiConfig, MarketConfig,
    ObservabilityConfig, ReliabilityConfig,
};
