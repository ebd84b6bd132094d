use crate::common::CHANNELS;

use burn::{prelude::*, tensor::Tensor};
use image::{RgbImage, imageops};

/// Bilinear resize to a `size x size` square; a no-op when already that size.
pub fn resize_image(img: &RgbImage, size: usize) -> RgbImage {
    let size = size as u32;
    if img.dimensions() == (size, size) {
        return img.clone();
    }
    imageops::resize(img, size, size, imageops::FilterType::Triangle)
}

/// Converts an RGB image into a `[1, C, H, W]` tensor with values in `[0, 1]`.
pub fn convert_image_to_tensor<B: Backend>(img: &RgbImage, device: &B::Device) -> Tensor<B, 4> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let hw = height * width;
    let mut buf = vec![0f32; CHANNELS * hw];
    for (x, y, pixel) in img.enumerate_pixels() {
        let idx = y as usize * width + x as usize;
        buf[idx] = pixel[0] as f32 / 255.0;
        buf[hw + idx] = pixel[1] as f32 / 255.0;
        buf[2 * hw + idx] = pixel[2] as f32 / 255.0;
    }
    Tensor::<B, 3>::from_data(
        TensorData::new(buf, [CHANNELS, height, width]).convert::<B::FloatElem>(),
        device,
    )
    .reshape([1, CHANNELS, height, width])
}

pub fn convert_label_to_tensor<B: Backend>(label: usize, device: &B::Device) -> Tensor<B, 1, Int> {
    Tensor::from_data(
        TensorData::new(vec![label as i64], [1]).convert::<B::IntElem>(),
        device,
    )
}
