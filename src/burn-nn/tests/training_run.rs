use burn::{
    backend::{Autodiff, NdArray},
    optim::{AdamConfig, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use learning_curves::{
    common::{CIFAR_PIXELS, CIFAR_SIDE},
    config::TrainingConfig,
    model::{
        checkpoint::{Checkpoint, load_checkpoint},
        resnet::ResNet18,
        training::train,
    },
    utils::{app_paths::AppPaths, csv_log::HEADER},
    viewer::logs::{LogEntry, Metrics},
};
use std::{fs, path::Path};

type B = Autodiff<NdArray<f32>>;

const CLASSES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

fn write_batch(path: &Path, labels: &[u8]) {
    let mut bytes = Vec::with_capacity(labels.len() * (CIFAR_PIXELS + 1));
    for (i, &label) in labels.iter().enumerate() {
        bytes.push(label);
        bytes.extend((0..CIFAR_PIXELS).map(|p| ((p * 7 + i * 31) % 256) as u8));
    }
    fs::write(path, bytes).unwrap();
}

/// A tiny CIFAR-10 binary archive: five training batches of two images and a
/// test batch of three.
fn write_cifar10(root: &Path) {
    let dir = root.join("cifar-10-batches-bin");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("batches.meta.txt"), CLASSES.join("\n") + "\n\n").unwrap();
    for batch in 1..=5u8 {
        write_batch(
            &dir.join(format!("data_batch_{batch}.bin")),
            &[batch, 9 - batch],
        );
    }
    write_batch(&dir.join("test_batch.bin"), &[0, 1, 2]);
}

fn write_config(dir: &Path, data_dir: &Path, output_dir: &Path) -> std::path::PathBuf {
    let path = dir.join("cifar10.json");
    let config = format!(
        r#"{{
            "epoch": 2,
            "batch_size": 4,
            "lr": 0.001,
            "img_size": {CIFAR_SIDE},
            "dataset": "cifar10",
            "num_workers": 1,
            "download": false,
            "from_scratch": true,
            "data_dir": "{}",
            "output_dir": "{}"
        }}"#,
        data_dir.display(),
        output_dir.display()
    );
    fs::write(&path, config).unwrap();
    path
}

fn load_with_record_of<BK, O>(_optim: &O, path: &Path) -> Checkpoint<BK, O::Record>
where
    BK: AutodiffBackend,
    O: Optimizer<ResNet18<BK>, BK>,
{
    load_checkpoint::<BK, O::Record>(path, &Default::default()).unwrap()
}

#[test]
fn two_epochs_leave_two_checkpoints_and_two_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    let output_dir = tmp.path().join("output");
    write_cifar10(&data_dir);
    let config_path = write_config(tmp.path(), &data_dir, &output_dir);

    let config = TrainingConfig::from_file(&config_path).unwrap();
    let kind = config.dataset_kind().unwrap();
    let paths = AppPaths::new(&output_dir, "2026101812");
    let summary = train::<B>(&config_path, &config, kind, &paths, Default::default()).unwrap();

    assert_eq!(summary.rows.len(), 2);
    assert!(paths.run_dir.join("cifar10.json").exists());

    let mut checkpoints: Vec<String> = fs::read_dir(&paths.model_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    checkpoints.sort();
    assert_eq!(checkpoints, ["1.mpk", "2.mpk"]);

    let csv = fs::read_to_string(&paths.csv_log).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], HEADER.join(","));
    assert!(lines[1].starts_with("0,"));
    assert!(lines[2].starts_with("1,"));

    // 10 training images in batches of 4: the trailing 2 are dropped.
    for row in &summary.rows {
        let acc = row.train_acc.unwrap();
        assert!((0.0..=0.8).contains(&acc), "train acc {acc}");
        let val_acc = row.val_acc.unwrap();
        assert!((0.0..=1.0).contains(&val_acc));
        assert!(row.train_loss.unwrap().is_finite());
    }

    let optim = AdamConfig::new().init::<B, ResNet18<B>>();
    let checkpoint = load_with_record_of(&optim, &paths.model_dir.join("2.mpk"));
    assert_eq!(checkpoint.epoch, 1);
    let device = Default::default();
    let restored = ResNet18::<B>::resnet18(CLASSES.len(), &device).load_record(checkpoint.model);
    let logits = restored.forward(Tensor::zeros([1, 3, CIFAR_SIDE, CIFAR_SIDE], &device));
    assert_eq!(logits.dims(), [1, CLASSES.len()]);
}

#[test]
fn the_viewer_reads_a_training_log() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("log.csv");
    fs::write(
        &path,
        format!("{}\n0,2.1,0.2,2.0,0.25\n1,1.7,0.4,,\n", HEADER.join(",")),
    )
    .unwrap();

    let log = LogEntry::load(&path).unwrap();
    let metrics = Metrics::detect(std::slice::from_ref(&log));
    assert_eq!(
        metrics.names(),
        &["Train Acc", "Train Loss", "Val Acc", "Val Loss"]
    );
    let val_loss = log.table.column("Val Loss").unwrap();
    assert_eq!(val_loss[0], 2.0);
    assert!(val_loss[1].is_nan());
}

#[test]
fn missing_backbone_weights_stop_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    let output_dir = tmp.path().join("output");
    write_cifar10(&data_dir);
    let config_path = write_config(tmp.path(), &data_dir, &output_dir);
    let text = fs::read_to_string(&config_path)
        .unwrap()
        .replace(r#""from_scratch": true"#, r#""from_scratch": false"#);
    fs::write(&config_path, text).unwrap();

    let config = TrainingConfig::from_file(&config_path).unwrap();
    let kind = config.dataset_kind().unwrap();
    let paths = AppPaths::new(&output_dir, "2026101812");
    let err = train::<B>(&config_path, &config, kind, &paths, Default::default()).unwrap_err();
    assert!(format!("{err:?}").contains("Missing weights file"));
    assert!(!paths.model_dir.join("1.mpk").exists());
}

#[test]
fn unsupported_dataset_aborts_before_any_output() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join("bad.json");
    let output_dir = tmp.path().join("output");
    fs::write(
        &config_path,
        format!(
            r#"{{"epoch": 1, "batch_size": 2, "lr": 0.01, "img_size": 32, "dataset": "mnist", "output_dir": "{}"}}"#,
            output_dir.display()
        ),
    )
    .unwrap();

    let err = learning_curves::model::training::training_loop::<B>(&config_path, Default::default())
        .unwrap_err();
    assert!(err.to_string().contains("mnist"));
    assert!(!output_dir.exists());
}
