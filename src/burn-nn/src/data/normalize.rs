use crate::common::{CIFAR_MEAN, CIFAR_STD};
use burn::{prelude::*, tensor::Tensor};

#[derive(Clone, Debug)]
pub struct NormalizeConfig {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            mean: CIFAR_MEAN,
            std: CIFAR_STD,
        }
    }
}

pub fn normalize<B: Backend>(tensor: Tensor<B, 4>, config: &NormalizeConfig) -> Tensor<B, 4> {
    let mean = Tensor::from_data(
        TensorData::new(config.mean.to_vec(), [1, 3, 1, 1]).convert::<B::FloatElem>(),
        &tensor.device(),
    );
    let std = Tensor::from_data(
        TensorData::new(config.std.to_vec(), [1, 3, 1, 1]).convert::<B::FloatElem>(),
        &tensor.device(),
    );

    (tensor - mean) / std
}
