use crate::model::resnet::{ResNet18, ResNet18Record};
use burn::{
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, PrecisionSettings, Record, Recorder},
    tensor::backend::AutodiffBackend,
};
use color_eyre::{Result, eyre::WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model weights, optimizer state and the zero-based epoch they were taken
/// after, stored as a single record file.
pub struct Checkpoint<B: Backend, O> {
    pub model: ResNet18Record<B>,
    pub optimizer: O,
    pub epoch: usize,
}

#[derive(Serialize, Deserialize)]
pub struct CheckpointItem<M, O> {
    model: M,
    optimizer: O,
    epoch: usize,
}

impl<B: Backend, O: Record<B>> Record<B> for Checkpoint<B, O> {
    type Item<S: PrecisionSettings> =
        CheckpointItem<<ResNet18Record<B> as Record<B>>::Item<S>, O::Item<S>>;

    fn into_item<S: PrecisionSettings>(self) -> Self::Item<S> {
        CheckpointItem {
            model: self.model.into_item(),
            optimizer: self.optimizer.into_item(),
            epoch: self.epoch,
        }
    }

    fn from_item<S: PrecisionSettings>(item: Self::Item<S>, device: &B::Device) -> Self {
        Self {
            model: ResNet18Record::<B>::from_item(item.model, device),
            optimizer: O::from_item(item.optimizer, device),
            epoch: item.epoch,
        }
    }
}

/// `<model_dir>/<epoch + 1>`; the recorder appends the `.mpk` extension.
pub fn checkpoint_path(model_dir: &Path, epoch: usize) -> PathBuf {
    model_dir.join((epoch + 1).to_string())
}

pub fn save_checkpoint<B, O>(
    model_dir: &Path,
    epoch: usize,
    model: &ResNet18<B>,
    optim: &O,
) -> Result<PathBuf>
where
    B: AutodiffBackend,
    O: Optimizer<ResNet18<B>, B>,
{
    let path = checkpoint_path(model_dir, epoch);
    let checkpoint = Checkpoint::<B, O::Record> {
        model: model.clone().into_record(),
        optimizer: optim.to_record(),
        epoch,
    };
    Recorder::<B>::record(&CompactRecorder::new(), checkpoint, path.clone())
        .wrap_err_with(|| format!("Failed saving checkpoint for epoch {}", epoch + 1))?;
    Ok(path.with_extension("mpk"))
}

pub fn load_checkpoint<B, O>(path: &Path, device: &B::Device) -> Result<Checkpoint<B, O>>
where
    B: Backend,
    O: Record<B>,
{
    Recorder::<B>::load(&CompactRecorder::new(), path.to_path_buf(), device)
        .wrap_err_with(|| format!("Failed loading checkpoint {}", path.display()))
}
