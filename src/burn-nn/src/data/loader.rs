use crate::{
    config::DatasetKind,
    data::cifar::{CifarDataset, Split, ensure_available},
};
use burn::data::dataset::Dataset;
use color_eyre::{
    Result,
    eyre::{WrapErr, bail},
};
use std::path::Path;

pub fn load_dataset(kind: DatasetKind, root: &str, split: Split) -> Result<CifarDataset> {
    let root = Path::new(root);
    if !root.exists() {
        bail!("Dataset directory not found: {}", root.display());
    }
    CifarDataset::load(kind, root, split)
        .wrap_err_with(|| format!("Failed to load {kind} {split:?} split from {}", root.display()))
}

/// Loads the train and test splits of `kind`, fetching the archive first
/// when it is missing and `download` is set.
pub fn load_train_val_datasets(
    kind: DatasetKind,
    root: &str,
    download: bool,
) -> Result<(CifarDataset, CifarDataset)> {
    ensure_available(kind, Path::new(root), download)?;

    let train = load_dataset(kind, root, Split::Train)?;
    let val = load_dataset(kind, root, Split::Test)?;
    if train.is_empty() {
        bail!("Loaded training split is empty");
    }
    Ok((train, val))
}
