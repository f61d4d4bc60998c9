pub mod daemon;
pub mod init;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use shelfsync_core::{config, Config};

/// Home directory plus the fully resolved configuration.
pub(crate) fn load_config() -> Result<(PathBuf, Config)> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config = config::resolve_at(&home).with_context(|| {
        format!(
            "failed to load {}",
            config::config_path_at(&home).display()
        )
    })?;
    Ok((home, config))
}
