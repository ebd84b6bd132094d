pub mod blocks;
pub mod checkpoint;
pub mod epoch;
pub mod resnet;
pub mod scaler;
pub mod training;
