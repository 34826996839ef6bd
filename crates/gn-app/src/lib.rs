pub mod config;
pub mod error;
pub mod generator;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use config::GenesisConfig;
pub use generator::GenerationClient;
pub use pipeline::{PipelineOptions, SkyboxPipeline};
