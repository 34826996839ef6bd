pub mod estimator;
pub mod model;

pub use estimator::DepthEstimator;
pub use model::{DepthModel, DepthNet, DepthNetConfig, OutputLayout, RecordedDepthModel};
