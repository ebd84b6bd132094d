//! Dynamic loss scaling for reduced-precision training.
//!
//! The loss is multiplied by a large factor before back-propagation so small
//! gradients survive half-precision arithmetic. Gradients are divided by the
//! same factor before the optimizer sees them. A step whose gradients
//! overflowed is skipped and the factor backs off; after a run of clean
//! steps it grows again.

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use log::debug;
use std::marker::PhantomData;

#[derive(Clone, Debug)]
pub struct GradScaler {
    scale: f32,
    growth_factor: f32,
    backoff_factor: f32,
    growth_interval: usize,
    growth_tracker: usize,
    enabled: bool,
}

impl Default for GradScaler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl GradScaler {
    pub fn new(enabled: bool) -> Self {
        Self {
            scale: 65536.0,
            growth_factor: 2.0,
            backoff_factor: 0.5,
            growth_interval: 2000,
            growth_tracker: 0,
            enabled,
        }
    }

    pub fn with_growth_interval(mut self, interval: usize) -> Self {
        self.growth_interval = interval.max(1);
        self
    }

    /// Current scale factor; always 1 when disabled.
    pub fn scale_factor(&self) -> f32 {
        if self.enabled { self.scale } else { 1.0 }
    }

    pub fn scale<B: Backend>(&self, loss: Tensor<B, 1>) -> Tensor<B, 1> {
        if self.enabled {
            loss.mul_scalar(self.scale)
        } else {
            loss
        }
    }

    /// Divides every gradient of `model` by the scale factor in place.
    ///
    /// Returns `true` when all gradients are finite, i.e. the optimizer step
    /// may proceed.
    pub fn unscale<B, M>(&self, model: &M, grads: &mut GradientsParams) -> bool
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        if !self.enabled {
            return true;
        }
        let mut visitor = Unscaler::<B> {
            grads,
            inv_scale: 1.0 / self.scale,
            found_inf: false,
            backend: PhantomData,
        };
        model.visit(&mut visitor);
        !visitor.found_inf
    }

    /// Adjusts the scale after a step: back off on overflow, grow after
    /// `growth_interval` consecutive clean steps.
    pub fn update(&mut self, found_inf: bool) {
        if !self.enabled {
            return;
        }
        if found_inf {
            self.scale *= self.backoff_factor;
            self.growth_tracker = 0;
            debug!("Non-finite gradients, loss scale reduced to {}", self.scale);
            return;
        }
        self.growth_tracker += 1;
        if self.growth_tracker == self.growth_interval {
            self.scale *= self.growth_factor;
            self.growth_tracker = 0;
        }
    }
}

struct Unscaler<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    inv_scale: f32,
    found_inf: bool,
    backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Unscaler<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) else {
            return;
        };
        let grad = grad.mul_scalar(self.inv_scale);
        let magnitude = grad.clone().abs().sum().into_scalar().elem::<f32>();
        if !magnitude.is_finite() {
            self.found_inf = true;
        }
        self.grads.register::<B::InnerBackend, D>(id, grad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        nn::{Linear, LinearConfig},
    };

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn backs_off_on_overflow_and_grows_after_interval() {
        let mut scaler = GradScaler::new(true).with_growth_interval(2);
        assert_eq!(scaler.scale_factor(), 65536.0);

        scaler.update(true);
        assert_eq!(scaler.scale_factor(), 32768.0);

        scaler.update(false);
        assert_eq!(scaler.scale_factor(), 32768.0);
        scaler.update(false);
        assert_eq!(scaler.scale_factor(), 65536.0);
    }

    #[test]
    fn disabled_scaler_is_identity() {
        let mut scaler = GradScaler::new(false);
        scaler.update(true);
        assert_eq!(scaler.scale_factor(), 1.0);

        let device = Default::default();
        let loss = Tensor::<NdArray<f32>, 1>::from_floats([2.5], &device);
        let scaled = scaler.scale(loss).into_scalar();
        assert_eq!(scaled, 2.5);
    }

    #[test]
    fn overflowing_gradients_block_the_step() {
        let device = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(2, 1).init(&device);
        let input = Tensor::<TestBackend, 2>::from_floats([[1e35, 1e35]], &device);
        let mut scaler = GradScaler::new(true);

        let scaled = scaler.scale(model.forward(input).sum());
        let mut grads = GradientsParams::from_grads(scaled.backward(), &model);
        let finite = scaler.unscale(&model, &mut grads);
        assert!(!finite);

        scaler.update(!finite);
        assert_eq!(scaler.scale_factor(), 32768.0);
    }

    #[test]
    fn unscaled_gradients_match_unscaled_loss() {
        let device = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(2, 1).init(&device);
        let input = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0]], &device);
        let scaler = GradScaler::new(true);

        let plain = model.forward(input.clone()).sum().backward();
        let expected = model.weight.grad(&plain).unwrap();

        let scaled = scaler.scale(model.forward(input).sum());
        let mut grads = GradientsParams::from_grads(scaled.backward(), &model);
        assert!(scaler.unscale(&model, &mut grads));

        let weight_grad = grads
            .remove::<NdArray<f32>, 2>(model.weight.id)
            .unwrap()
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(weight_grad, expected.into_data().to_vec::<f32>().unwrap());
    }
}
