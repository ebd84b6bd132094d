use crate::{
    config::{DatasetKind, TrainingConfig},
    data::{
        batch::{ImageBatch, ImageBatcher},
        loader::load_train_val_datasets,
    },
    model::{
        checkpoint::save_checkpoint,
        epoch::{EpochTotals, train_epoch, validate_epoch},
        resnet::{ResNet18, ensure_pretrained},
        scaler::GradScaler,
    },
    utils::{
        app_paths::AppPaths,
        csv_log::{CsvLog, EpochRow},
    },
};

use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::AutodiffModule,
    optim::AdamConfig,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use color_eyre::{
    Result,
    eyre::{WrapErr, bail},
};
use log::{info, warn};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// What a finished run left behind.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub paths: AppPaths,
    pub rows: Vec<EpochRow>,
}

/// Loads the configuration at `config_path` and trains into a fresh
/// `<output>/<YYYYMMDDHH>` directory.
pub fn training_loop<B: AutodiffBackend>(config_path: &Path, device: B::Device) -> Result<RunSummary> {
    let config = TrainingConfig::from_file(config_path)?;
    let kind = config.dataset_kind()?;
    let paths = AppPaths::for_now(Path::new(config.output_root()));

    train::<B>(config_path, &config, kind, &paths, device)
}

fn ratio(numerator: f64, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator / denominator as f64)
}

fn epoch_row(
    epoch: usize,
    train: &EpochTotals,
    val: &EpochTotals,
    num_train: usize,
    num_val: usize,
) -> EpochRow {
    EpochRow {
        epoch,
        train_loss: ratio(train.loss_sum, train.batches),
        train_acc: ratio(train.correct as f64, num_train),
        val_loss: ratio(val.loss_sum, val.batches),
        val_acc: ratio(val.correct as f64, num_val),
    }
}

fn fmt_metric(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".into())
}

pub fn train<B: AutodiffBackend>(
    config_path: &Path,
    config: &TrainingConfig,
    kind: DatasetKind,
    paths: &AppPaths,
    device: B::Device,
) -> Result<RunSummary> {
    if config.batch_size == 0 || config.img_size == 0 {
        bail!("`batch_size` and `img_size` must be positive");
    }

    paths.create_dirs()?;
    let csv_log = CsvLog::open(&paths.csv_log)?;
    paths.copy_config(config_path)?;

    B::seed(config.seed);

    let (train_ds, val_ds) = load_train_val_datasets(kind, config.data_root(), config.download)
        .wrap_err("Failed to load datasets")?;
    let classes = train_ds.classes().to_vec();
    info!("Class Names: {:?}", classes);
    info!("Number Of Class: {}", classes.len());

    let num_train = train_ds.len();
    let num_val = val_ds.len();
    if num_train < config.batch_size {
        bail!(
            "Training split has {num_train} images, fewer than one batch of {}",
            config.batch_size
        );
    }

    let dataloader_train: Arc<dyn DataLoader<B, ImageBatch<B>>> =
        DataLoaderBuilder::new(ImageBatcher::train(config.img_size))
            .batch_size(config.batch_size)
            .shuffle(config.seed)
            .num_workers(config.num_workers)
            .build(train_ds);

    let dataloader_val: Arc<dyn DataLoader<B::InnerBackend, ImageBatch<B::InnerBackend>>> =
        DataLoaderBuilder::new(ImageBatcher::eval(config.img_size))
            .batch_size(config.batch_size)
            .num_workers(config.num_workers)
            .build(val_ds);

    let mut model = ResNet18::<B>::resnet18(classes.len(), &device);
    if config.from_scratch {
        warn!("`from_scratch` set, training from random initialisation");
    } else {
        let weights = match &config.pretrained {
            Some(weights) => PathBuf::from(weights),
            None => ensure_pretrained(Path::new(config.data_root()), config.download)?,
        };
        model = model
            .load_pretrained(&weights, classes.len(), &device)
            .wrap_err("Failed to initialise backbone from pretrained weights")?;
        info!("Model loaded from {}", weights.display());
    }

    let mut optim = AdamConfig::new().init();
    let mut scaler = GradScaler::new(config.amp);
    info!("Total number of trainable parameters: {}", model.num_params());
    info!(
        "Starting training for {} epochs on {kind} ({num_train} train / {num_val} val images)",
        config.epoch
    );

    let mut rows = Vec::with_capacity(config.epoch);
    for epoch in 0..config.epoch {
        let (trained, train_totals) = train_epoch(
            model,
            &mut optim,
            &mut scaler,
            &dataloader_train,
            config.lr,
            Some(config.batch_size),
            epoch + 1,
        )
        .wrap_err_with(|| format!("Training epoch {} failed", epoch + 1))?;
        model = trained;
        if train_totals.skipped_steps > 0 {
            warn!(
                "Epoch {}: skipped {} optimizer steps with non-finite gradients",
                epoch + 1,
                train_totals.skipped_steps
            );
        }

        let model_valid = model.valid();
        let val_totals = validate_epoch(&model_valid, &dataloader_val, epoch + 1)
            .wrap_err("Validation epoch failed")?;

        let row = epoch_row(epoch, &train_totals, &val_totals, num_train, num_val);
        info!(
            "Epoch [{}/{}], Training Loss: {}",
            epoch + 1,
            config.epoch,
            fmt_metric(row.train_loss)
        );
        info!(
            "Epoch [{}/{}], Validation Loss: {}",
            epoch + 1,
            config.epoch,
            fmt_metric(row.val_loss)
        );
        info!(
            "Epoch [{}/{}], Training Acc: {}, Validation Acc: {}",
            epoch + 1,
            config.epoch,
            fmt_metric(row.train_acc),
            fmt_metric(row.val_acc)
        );

        csv_log.append(&row)?;
        let saved = save_checkpoint(&paths.model_dir, epoch, &model, &optim)?;
        info!("Saved checkpoint {}", saved.display());
        rows.push(row);
    }

    Ok(RunSummary {
        paths: paths.clone(),
        rows,
    })
}
