//! Common functionality for riskmap, a flood impact engine.
//!
//! Hazard data are joined to exposure features, each feature is classified into a building
//! type, and losses are estimated from a vulnerability table.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod aggregate;
pub mod buffer;
pub mod category;
pub mod classify;
pub mod cli;
pub mod crs;
pub mod definitions;
pub mod error;
pub mod feature;
pub mod hazard;
pub mod id;
pub mod impact;
pub mod input;
pub mod join;
pub mod log;
pub mod observation;
pub mod output;
pub mod project;
pub mod settings;
pub mod units;
pub mod vulnerability;

#[cfg(test)]
mod fixture;

/// Get the directory in which riskmap reads its configuration files
pub fn get_riskmap_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config dir on this platform, so look in the working directory
        return PathBuf::new();
    };

    config_dir.push("riskmap");
    config_dir
}
