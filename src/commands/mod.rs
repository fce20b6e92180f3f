pub mod chunk;
pub mod claims;
pub mod decide;
pub mod run;

use anyhow::Result;
use std::path::Path;

use canon::config::{self, RunConfig};

/// Load the run config, defaulting to `canon.toml` in the working directory
pub fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    let path = path.unwrap_or_else(|| Path::new(config::CONFIG_FILE));
    config::load(path)
}
