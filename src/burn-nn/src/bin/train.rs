use clap::Parser;
use color_eyre::Result;
use learning_curves::model::training::training_loop;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Train a ResNet-18 classifier on CIFAR and log learning curves")]
struct Args {
    /// Path to the JSON training configuration
    #[arg(long)]
    config_path: PathBuf,
}

#[cfg(all(feature = "f16", not(any(feature = "cuda", feature = "wgpu"))))]
compile_error!("the `f16` feature needs the `cuda` or `wgpu` backend");

/// Floating point element of the GPU backends; `f16` trains in half
/// precision with the loss scaler guarding against gradient underflow.
#[cfg(feature = "f16")]
#[allow(dead_code)]
type Float = burn::tensor::f16;
#[cfg(not(feature = "f16"))]
#[allow(dead_code)]
type Float = f32;

#[cfg(feature = "cuda")]
mod backend {
    use burn::backend::{Autodiff, cuda::Cuda};

    pub type Backend = Autodiff<Cuda<super::Float, i32>>;
}

#[cfg(all(feature = "wgpu", not(feature = "cuda")))]
mod backend {
    use burn::backend::{Autodiff, Wgpu};

    pub type Backend = Autodiff<Wgpu<super::Float, i32>>;
}

#[cfg(not(any(feature = "cuda", feature = "wgpu")))]
mod backend {
    use burn::backend::{Autodiff, NdArray};

    pub type Backend = Autodiff<NdArray<f32>>;
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let device = Default::default();
    let summary = training_loop::<backend::Backend>(&args.config_path, device)?;

    log::info!(
        "Finished {} epochs, outputs in {}",
        summary.rows.len(),
        summary.paths.run_dir.display()
    );
    Ok(())
}
