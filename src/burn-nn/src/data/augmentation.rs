use image::{RgbImage, imageops};
use rand::prelude::*;

#[derive(Clone)]
pub struct AugmentationConfig {
    /// Probability of flipping
    pub flip_prob: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        AugmentationConfig { flip_prob: 0.5 }
    }
}

#[derive(Clone)]
pub struct ImageAugmenter {
    config: AugmentationConfig,
}

impl ImageAugmenter {
    pub fn new(config: AugmentationConfig) -> Self {
        ImageAugmenter { config }
    }

    pub fn augment(&self, img: &RgbImage) -> RgbImage {
        self.augment_with(img, &mut rand::rng())
    }

    pub fn augment_with<R: Rng>(&self, img: &RgbImage, rng: &mut R) -> RgbImage {
        self.flip_image(img, rng)
    }

    fn flip_image<R: Rng>(&self, img: &RgbImage, rng: &mut R) -> RgbImage {
        if rng.random::<f32>() < self.config.flip_prob {
            imageops::flip_horizontal(img)
        } else {
            img.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::rngs::StdRng;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(4, 2, |x, _| Rgb([x as u8, 0, 0]))
    }

    #[test]
    fn always_flips_with_probability_one() {
        let augmenter = ImageAugmenter::new(AugmentationConfig { flip_prob: 1.0 });
        let out = augmenter.augment_with(&gradient(), &mut StdRng::seed_from_u64(7));
        assert_eq!(out.get_pixel(0, 0), &Rgb([3, 0, 0]));
        assert_eq!(out.get_pixel(3, 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn never_flips_with_probability_zero() {
        let augmenter = ImageAugmenter::new(AugmentationConfig { flip_prob: 0.0 });
        let img = gradient();
        let out = augmenter.augment_with(&img, &mut StdRng::seed_from_u64(7));
        assert_eq!(out, img);
    }
}
