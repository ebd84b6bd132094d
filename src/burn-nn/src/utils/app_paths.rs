use chrono::Local;
use color_eyre::{Result, eyre::WrapErr};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Directory layout of one training run:
///
/// ```text
/// <output>/<YYYYMMDDHH>/
///     <config file>
///     log/log.csv
///     model/<epoch>.mpk
/// ```
#[derive(Clone, Debug)]
pub struct AppPaths {
    pub run_dir: PathBuf,
    pub model_dir: PathBuf,
    pub log_dir: PathBuf,
    pub csv_log: PathBuf,
}

impl AppPaths {
    pub fn new(output_root: &Path, timestamp: &str) -> Self {
        let run_dir = output_root.join(timestamp);
        let log_dir = run_dir.join("log");
        Self {
            model_dir: run_dir.join("model"),
            csv_log: log_dir.join("log.csv"),
            log_dir,
            run_dir,
        }
    }

    /// Run directory keyed by the current local hour.
    pub fn for_now(output_root: &Path) -> Self {
        Self::new(output_root, &run_timestamp())
    }

    /// Creates the run directory and its sub-folders; existing ones are kept.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [&self.model_dir, &self.log_dir] {
            fs::create_dir_all(dir)
                .wrap_err_with(|| format!("Failed to create output directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Copies the configuration file next to the run outputs.
    pub fn copy_config(&self, config_path: &Path) -> Result<PathBuf> {
        let name = config_path
            .file_name()
            .map(|name| name.to_owned())
            .unwrap_or_else(|| "config.json".into());
        let dest = self.run_dir.join(name);
        fs::copy(config_path, &dest).wrap_err_with(|| {
            format!(
                "Failed to copy config {} to {}",
                config_path.display(),
                dest.display()
            )
        })?;
        Ok(dest)
    }
}

pub fn run_timestamp() -> String {
    Local::now().format("%Y%m%d%H").to_string()
}
