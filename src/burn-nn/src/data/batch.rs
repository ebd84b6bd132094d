use crate::data::{
    augmentation::{AugmentationConfig, ImageAugmenter},
    cifar::CifarItem,
    conversion::{convert_image_to_tensor, convert_label_to_tensor, resize_image},
    normalize::{NormalizeConfig, normalize},
};

use burn::{data::dataloader::batcher::Batcher, prelude::*, tensor::Tensor};

/// Turns dataset items into normalised image batches.
///
/// Train mode: random horizontal flip, resize, normalise.
/// Eval mode: resize, normalise.
#[derive(Clone)]
pub struct ImageBatcher {
    augmenter: Option<ImageAugmenter>,
    img_size: usize,
    normalize: NormalizeConfig,
}

impl ImageBatcher {
    pub fn train(img_size: usize) -> Self {
        Self {
            augmenter: Some(ImageAugmenter::new(AugmentationConfig::default())),
            img_size,
            normalize: NormalizeConfig::default(),
        }
    }

    pub fn eval(img_size: usize) -> Self {
        Self {
            augmenter: None,
            img_size,
            normalize: NormalizeConfig::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn len(&self) -> usize {
        self.labels.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `other` after the rows of `self`.
    pub fn concat(self, other: Self) -> Self {
        Self {
            images: Tensor::cat(vec![self.images, other.images], 0),
            labels: Tensor::cat(vec![self.labels, other.labels], 0),
        }
    }

    /// Splits off the first `size` rows. The remainder is `None` when
    /// nothing is left over.
    pub fn split_first(self, size: usize) -> (Self, Option<Self>) {
        let len = self.len();
        if size >= len {
            return (self, None);
        }
        let head = Self {
            images: self.images.clone().narrow(0, 0, size),
            labels: self.labels.clone().narrow(0, 0, size),
        };
        let tail = Self {
            images: self.images.narrow(0, size, len - size),
            labels: self.labels.narrow(0, size, len - size),
        };
        (head, Some(tail))
    }
}

impl<B: Backend> Batcher<B, CifarItem, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<CifarItem>, device: &B::Device) -> ImageBatch<B> {
        let images: Vec<Tensor<B, 4>> = items
            .iter()
            .map(|item| match &self.augmenter {
                Some(aug) => aug.augment(&item.image),
                None => item.image.clone(),
            })
            .map(|img| resize_image(&img, self.img_size))
            .map(|img| convert_image_to_tensor::<B>(&img, device))
            .map(|tensor| normalize(tensor, &self.normalize))
            .collect();
        let labels: Vec<Tensor<B, 1, Int>> = items
            .iter()
            .map(|item| convert_label_to_tensor(item.label, device))
            .collect();

        ImageBatch {
            images: Tensor::cat(images, 0),
            labels: Tensor::cat(labels, 0),
        }
    }
}
