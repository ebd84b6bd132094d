use crate::model::blocks::LayerBlock;
use burn::{
    nn::{
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use color_eyre::{
    Result,
    eyre::{WrapErr, bail},
};
use log::info;
use std::{
    fs,
    path::{Path, PathBuf},
};

const FEATURES: usize = 512;

/// torchvision ImageNet ResNet-18 weights.
pub const RESNET18_WEIGHTS_URL: &str = "https://download.pytorch.org/models/resnet18-f37072fd.pth";

/// Returns the cached torchvision weights under `root`, fetching them first
/// when allowed.
pub fn ensure_pretrained(root: &Path, download: bool) -> Result<PathBuf> {
    let file_name = RESNET18_WEIGHTS_URL
        .rsplit('/')
        .next()
        .unwrap_or("resnet18.pth");
    let path = root.join(file_name);
    if path.exists() {
        return Ok(path);
    }
    if !download {
        bail!(
            "Missing weights file: {}. Enable `download`, set `pretrained` or `from_scratch`.",
            path.display()
        );
    }

    fs::create_dir_all(root)
        .wrap_err_with(|| format!("Failed to create data directory {}", root.display()))?;
    info!("Downloading ResNet-18 weights from {RESNET18_WEIGHTS_URL}");
    let bytes = reqwest::blocking::get(RESNET18_WEIGHTS_URL)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .wrap_err_with(|| format!("Failed to download {RESNET18_WEIGHTS_URL}"))?;
    fs::write(&path, &bytes)
        .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[derive(Module, Debug)]
pub struct ResNet18<B: Backend> {
    conv1: Conv2d<B>,
    norm1: BatchNorm<B, 2>,
    relu: Relu,
    maxpool: MaxPool2d,
    layer1: LayerBlock<B>,
    layer2: LayerBlock<B>,
    layer3: LayerBlock<B>,
    layer4: LayerBlock<B>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> ResNet18<B> {
    pub fn new(blocks: [usize; 4], num_classes: usize, device: &Device<B>) -> Self {
        let conv1 = Conv2dConfig::new([3, 64], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let norm1 = BatchNormConfig::new(64).init(device);
        let relu = Relu::new();
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        // Initialize Residual blocks
        let layer1 = LayerBlock::new(blocks[0], 64, 64, 1, device);
        let layer2 = LayerBlock::new(blocks[1], 64, 128, 2, device);
        let layer3 = LayerBlock::new(blocks[2], 128, 256, 2, device);
        let layer4 = LayerBlock::new(blocks[3], 256, FEATURES, 2, device);

        let avgpool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(FEATURES, num_classes).init(device);

        ResNet18 {
            conv1,
            norm1,
            relu,
            maxpool,
            layer1,
            layer2,
            layer3,
            layer4,
            avgpool,
            fc,
        }
    }

    pub fn resnet18(num_classes: usize, device: &Device<B>) -> Self {
        Self::new([2, 2, 2, 2], num_classes, device)
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(input);
        let x = self.norm1.forward(x);
        let x = self.relu.forward(x);
        let x = self.maxpool.forward(x);

        let x = self.layer1.forward(x);
        let x = self.layer2.forward(x);
        let x = self.layer3.forward(x);
        let x = self.layer4.forward(x);

        let x = self.avgpool.forward(x);
        let x = x.flatten(1, 3);
        self.fc.forward(x)
    }

    /// Loads the backbone from a torchvision/timm ResNet-18 state dict and
    /// re-initialises the classification head for `num_classes`.
    pub fn load_pretrained(
        self,
        weights_path: &Path,
        num_classes: usize,
        device: &Device<B>,
    ) -> Result<Self> {
        if !weights_path.exists() {
            bail!(
                "Missing weights file: {:?}. Expected pretrained PyTorch ResNet-18 weights.",
                weights_path
            );
        }

        let load_args = LoadArgs::new(weights_path.to_path_buf())
            // Map top-level batchnorm 'bn1' to 'norm1'
            .with_key_remap(r"^bn1\.(.+)$", "norm1.$1")
            // Map layer blocks convolution and batchnorm parameters
            .with_key_remap(
                r"^layer([1-4])\.(\d+)\.conv([12])\.(.+)$",
                "layer$1.blocks.$2.conv$3.$4",
            )
            .with_key_remap(
                r"^layer([1-4])\.(\d+)\.bn([12])\.(.+)$",
                "layer$1.blocks.$2.norm$3.$4",
            )
            // Map downsample projection in blocks
            .with_key_remap(
                r"^layer([1-4])\.(\d+)\.downsample\.0\.(.+)$",
                "layer$1.blocks.$2.downsample.conv.$3",
            )
            .with_key_remap(
                r"^layer([1-4])\.(\d+)\.downsample\.1\.(.+)$",
                "layer$1.blocks.$2.downsample.norm.$3",
            );

        let record: ResNet18Record<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
            .load(load_args, device)
            .wrap_err("Failed to load / map PyTorch ResNet-18 state into Burn record")?;

        let mut model = self.load_record(record);
        model.fc = LinearConfig::new(FEATURES, num_classes).init(device);
        Ok(model)
    }
}
