pub const CHANNELS: usize = 3;

/// Side length of a raw CIFAR image, in pixels.
pub const CIFAR_SIDE: usize = 32;

pub const CIFAR_PIXELS: usize = CIFAR_SIDE * CIFAR_SIDE * CHANNELS;

/// Per-channel statistics of the CIFAR training split.
pub const CIFAR_MEAN: [f32; 3] = [0.4915, 0.4823, 0.4468];
pub const CIFAR_STD: [f32; 3] = [0.2470, 0.2435, 0.2616];
