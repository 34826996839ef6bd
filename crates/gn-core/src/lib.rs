pub mod asset;
pub mod depth;
pub mod error;
pub mod job;
pub mod mesh;
pub mod prompt;
pub mod sampler;

pub use asset::{Provenance, SkyboxAsset};
pub use depth::{DepthBuffer, DepthRange};
pub use job::{GenerationJob, JobStatus};
pub use prompt::{PromptSpec, PromptStyle};
pub use sampler::{DepthEncoding, DepthSampler};
