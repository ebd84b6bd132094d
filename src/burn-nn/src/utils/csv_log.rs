use color_eyre::{Result, eyre::WrapErr};
use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
};

pub const HEADER: [&str; 5] = ["Epoch", "Train Loss", "Train Acc", "Val Loss", "Val Acc"];

/// One row of the training log. Missing values are written as empty cells.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpochRow {
    pub epoch: usize,
    pub train_loss: Option<f64>,
    pub train_acc: Option<f64>,
    pub val_loss: Option<f64>,
    pub val_acc: Option<f64>,
}

impl EpochRow {
    fn cells(&self) -> [String; 5] {
        let cell = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
        [
            self.epoch.to_string(),
            cell(self.train_loss),
            cell(self.train_acc),
            cell(self.val_loss),
            cell(self.val_acc),
        ]
    }
}

/// Append-only CSV log of per-epoch results.
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    /// Opens the log at `path`, writing the header only when the file does
    /// not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            let mut writer = csv::Writer::from_path(path)
                .wrap_err_with(|| format!("Failed to create CSV log {}", path.display()))?;
            writer.write_record(HEADER)?;
            writer.flush()?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn append(&self, row: &EpochRow) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .wrap_err_with(|| format!("Failed to open CSV log {}", self.path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(row.cells())?;
        writer.flush()?;
        Ok(())
    }
}
