use burn::prelude::*;

/// Number of rows whose top-1 prediction matches the target class.
pub fn correct_predictions<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predictions = output.argmax(1).squeeze(1);
    let num_corrects = predictions.equal(targets).int().sum().into_scalar();

    num_corrects.elem::<i64>() as usize
}
