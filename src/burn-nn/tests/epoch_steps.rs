use burn::{
    backend::{Autodiff, NdArray},
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::AdamConfig,
};
use image::{Rgb, RgbImage};
use learning_curves::{
    data::{
        batch::{ImageBatch, ImageBatcher},
        cifar::{CifarDataset, CifarItem},
    },
    model::{
        epoch::{train_epoch, validate_epoch},
        resnet::ResNet18,
        scaler::GradScaler,
    },
};
use std::sync::Arc;

type B = Autodiff<NdArray<f32>>;

const IMG_SIZE: usize = 32;

fn dataset(len: usize) -> CifarDataset {
    let items = (0..len)
        .map(|i| CifarItem {
            image: RgbImage::from_pixel(32, 32, Rgb([(i * 40) as u8, 128, 255 - (i * 40) as u8])),
            label: i % 3,
        })
        .collect();
    CifarDataset::from_items(items, vec!["a".into(), "b".into(), "c".into()])
}

#[test]
fn train_epoch_drops_the_short_batch() {
    let device = Default::default();
    let loader: Arc<dyn DataLoader<B, ImageBatch<B>>> =
        DataLoaderBuilder::new(ImageBatcher::train(IMG_SIZE))
            .batch_size(2)
            .build(dataset(5));

    let model = ResNet18::<B>::resnet18(3, &device);
    let mut optim = AdamConfig::new().init();
    let mut scaler = GradScaler::new(true);

    let (_, totals) =
        train_epoch(model, &mut optim, &mut scaler, &loader, 1e-3, Some(2), 1).unwrap();
    assert_eq!(totals.batches, 2);
    assert_eq!(totals.items, 4);
    assert!(totals.correct <= 4);
    assert!(totals.loss_sum.is_finite());
}

#[test]
fn train_epoch_drops_at_most_one_batch_across_workers() {
    let device = Default::default();
    // Two workers each end their half of the data on a short batch of 2.
    let loader: Arc<dyn DataLoader<B, ImageBatch<B>>> =
        DataLoaderBuilder::new(ImageBatcher::train(IMG_SIZE))
            .batch_size(4)
            .shuffle(42)
            .num_workers(2)
            .build(dataset(12));

    let model = ResNet18::<B>::resnet18(3, &device);
    let mut optim = AdamConfig::new().init();
    let mut scaler = GradScaler::new(true);

    let (_, totals) =
        train_epoch(model, &mut optim, &mut scaler, &loader, 1e-3, Some(4), 1).unwrap();
    assert_eq!(totals.batches, 3);
    assert_eq!(totals.items, 12);
}

#[test]
fn validate_epoch_keeps_the_short_batch() {
    let device = Default::default();
    let model = ResNet18::<B>::resnet18(3, &device).valid();
    let loader = DataLoaderBuilder::new(ImageBatcher::eval(IMG_SIZE))
        .batch_size(2)
        .build(dataset(5));

    let totals = validate_epoch(&model, &loader, 1).unwrap();
    assert_eq!(totals.batches, 3);
    assert_eq!(totals.items, 5);
    assert!(totals.correct <= 5);
    assert!(totals.loss_sum > 0.0);
    assert_eq!(totals.skipped_steps, 0);
}
