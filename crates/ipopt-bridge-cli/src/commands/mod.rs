use std::path::Path;

use anyhow::{Context, Result};
use ipopt_bridge::SolverOptions;
use tracing::debug;

pub mod hs071;
pub mod status;
pub mod version;

/// Read `path`, or the default options file when none is given.
pub fn load_options(path: Option<&Path>) -> Result<SolverOptions> {
    let options = match path {
        Some(path) => SolverOptions::load_from(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => SolverOptions::load().context("loading default options file")?,
    };
    debug!(count = options.len(), "loaded options file");
    Ok(options)
}
