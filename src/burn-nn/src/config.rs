use burn::prelude::*;
use color_eyre::{Result, eyre::eyre};
use std::{fmt, path::Path, str::FromStr};
use thiserror::Error;

/// Hyper-parameters and paths of one training run, read from a JSON file.
#[derive(Config)]
pub struct TrainingConfig {
    pub epoch: usize,

    pub batch_size: usize,

    pub lr: f64,

    pub img_size: usize,

    /// Dataset label, one of `cifar10` or `cifar100`.
    pub dataset: String,

    #[config(default = 8)]
    pub num_workers: usize,

    #[config(default = 42)]
    pub seed: u64,

    /// Enables dynamic loss scaling.
    #[config(default = true)]
    pub amp: bool,

    #[config(default = true)]
    pub download: bool,

    /// PyTorch ResNet-18 state dict used to initialise the backbone. When
    /// unset, the torchvision ImageNet weights are fetched into `data_dir`.
    pub pretrained: Option<String>,

    /// Skips backbone weights and trains from random initialisation.
    #[config(default = false)]
    pub from_scratch: bool,

    pub data_dir: Option<String>,

    pub output_dir: Option<String>,
}

impl TrainingConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        TrainingConfig::load(path)
            .map_err(|err| eyre!("Failed to read training config {}: {err}", path.display()))
    }

    pub fn dataset_kind(&self) -> Result<DatasetKind, UnsupportedDataset> {
        self.dataset.parse()
    }

    pub fn data_root(&self) -> &str {
        self.data_dir.as_deref().unwrap_or("./data")
    }

    pub fn output_root(&self) -> &str {
        self.output_dir.as_deref().unwrap_or("./output")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatasetKind {
    Cifar10,
    Cifar100,
}

#[derive(Debug, Error)]
#[error("unsupported dataset `{0}` (expected `cifar10` or `cifar100`)")]
pub struct UnsupportedDataset(pub String);

impl DatasetKind {
    pub fn num_classes(self) -> usize {
        match self {
            DatasetKind::Cifar10 => 10,
            DatasetKind::Cifar100 => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DatasetKind::Cifar10 => "cifar10",
            DatasetKind::Cifar100 => "cifar100",
        }
    }
}

impl FromStr for DatasetKind {
    type Err = UnsupportedDataset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cifar10" => Ok(DatasetKind::Cifar10),
            "cifar100" => Ok(DatasetKind::Cifar100),
            other => Err(UnsupportedDataset(other.to_string())),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
