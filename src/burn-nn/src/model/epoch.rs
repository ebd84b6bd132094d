use crate::{
    data::batch::ImageBatch,
    model::{resnet::ResNet18, scaler::GradScaler},
    utils::metrics::correct_predictions,
};
use burn::{
    data::dataloader::DataLoader,
    nn::loss::CrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use color_eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::sync::Arc;

/// Raw sums over one pass of a data loader. Normalisation is left to the
/// caller: loss by `batches`, accuracy by the dataset size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpochTotals {
    pub loss_sum: f64,
    pub correct: usize,
    pub batches: usize,
    pub items: usize,
    /// Optimizer steps skipped because of non-finite gradients.
    pub skipped_steps: usize,
}

impl EpochTotals {
    fn add_batch(&mut self, loss: f64, correct: usize, items: usize) {
        self.loss_sum += loss;
        self.correct += correct;
        self.batches += 1;
        self.items += items;
    }
}

fn progress_bar(len: usize, prefix: String) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_prefix(prefix);
    pb
}

/// Regroups the short batches a multi-worker loader emits at the end of each
/// worker partition into full ones. Whatever is left after the last batch is
/// dropped, so a pass yields `num_items / size` batches.
struct FullBatches<B: Backend> {
    size: usize,
    pending: Option<ImageBatch<B>>,
}

impl<B: Backend> FullBatches<B> {
    fn new(size: usize) -> Self {
        Self {
            size,
            pending: None,
        }
    }

    fn push(&mut self, batch: ImageBatch<B>) -> Option<ImageBatch<B>> {
        if batch.len() >= self.size {
            return Some(batch);
        }
        let merged = match self.pending.take() {
            Some(pending) => pending.concat(batch),
            None => batch,
        };
        if merged.len() < self.size {
            self.pending = Some(merged);
            return None;
        }
        let (full, rest) = merged.split_first(self.size);
        self.pending = rest;
        Some(full)
    }

    fn dropped(&self) -> usize {
        self.pending.as_ref().map_or(0, ImageBatch::len)
    }
}

/// One optimisation pass over `dataloader`.
///
/// With `drop_last` set to the loader's batch size, every step sees a full
/// batch and the `num_items % size` leftover items are skipped.
pub fn train_epoch<B, O>(
    mut model: ResNet18<B>,
    optim: &mut O,
    scaler: &mut GradScaler,
    dataloader: &Arc<dyn DataLoader<B, ImageBatch<B>>>,
    lr: f64,
    drop_last: Option<usize>,
    epoch: usize,
) -> Result<(ResNet18<B>, EpochTotals)>
where
    B: AutodiffBackend,
    O: Optimizer<ResNet18<B>, B>,
{
    let mut totals = EpochTotals::default();
    let pb = progress_bar(dataloader.num_items(), format!("train {epoch}"));

    let mut regroup = drop_last.map(FullBatches::new);
    let mut iteration = 0;
    for batch in dataloader.iter() {
        let batch = match regroup.as_mut() {
            Some(regroup) => match regroup.push(batch) {
                Some(full) => full,
                None => continue,
            },
            None => batch,
        };
        let batch_len = batch.len();

        let output = model.forward(batch.images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), batch.labels.clone());
        let loss_value = loss.clone().into_scalar().elem::<f64>();
        let correct = correct_predictions(output, batch.labels);

        let grads = scaler.scale(loss).backward();
        let mut grads = GradientsParams::from_grads(grads, &model);
        let finite = scaler.unscale(&model, &mut grads);
        if finite {
            model = optim.step(lr, model, grads);
        } else {
            totals.skipped_steps += 1;
        }
        scaler.update(!finite);

        totals.add_batch(loss_value, correct, batch_len);
        pb.inc(batch_len as u64);
        if iteration % 75 == 0 {
            pb.set_message(format!("loss {loss_value:.4}"));
            debug!(
                "[Train - Epoch {} - Iteration {}] Loss {:.4} | Scale {}",
                epoch,
                iteration,
                loss_value,
                scaler.scale_factor()
            );
        }
        iteration += 1;
    }

    if let Some(dropped) = regroup.as_ref().map(FullBatches::dropped) {
        pb.inc(dropped as u64);
    }
    pb.finish_and_clear();
    Ok((model, totals))
}

/// Forward-only pass; `model` is expected to be the inference copy
/// obtained from `AutodiffModule::valid`.
pub fn validate_epoch<B: Backend>(
    model: &ResNet18<B>,
    dataloader: &Arc<dyn DataLoader<B, ImageBatch<B>>>,
    epoch: usize,
) -> Result<EpochTotals> {
    let mut totals = EpochTotals::default();
    let pb = progress_bar(dataloader.num_items(), format!("valid {epoch}"));

    for batch in dataloader.iter() {
        let batch_len = batch.len();
        let output = model.forward(batch.images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), batch.labels.clone());
        let correct = correct_predictions(output, batch.labels);

        totals.add_batch(loss.into_scalar().elem::<f64>(), correct, batch_len);
        pb.inc(batch_len as u64);
    }

    pb.finish_and_clear();
    Ok(totals)
}
