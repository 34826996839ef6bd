use std::sync::Arc;
use std::time::Duration;
use burn::prelude::Backend;
use image::DynamicImage;
use tokio_util::sync::CancellationToken;
use tracing::info;
use gn_core::asset::validate_panorama;
use gn_core::error::{Error, Result};
use gn_core::{PromptSpec, Provenance, SkyboxAsset};
use gn_depth::{DepthEstimator, DepthModel};
use crate::generator::{until_cancelled, GenerationClient};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    pub max_retries: u32,
    pub poll_interval: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_retries: 10,
            poll_interval: Duration::from_millis(5000),
        }
    }
}

/// Prompt to textured, depth-annotated panorama
pub struct SkyboxPipeline<B: Backend, M: DepthModel<B>> {
    client: GenerationClient,
    estimator: Arc<DepthEstimator<B, M>>,
    options: PipelineOptions,
}

impl<B, M> SkyboxPipeline<B, M>
where
    B: Backend,
    M: DepthModel<B> + 'static,
{
    pub fn new(client: GenerationClient, estimator: Arc<DepthEstimator<B, M>>, options: PipelineOptions) -> Self {
        Self { client, estimator, options }
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Submits `prompt`, waits for the panorama and estimates its depth.
    /// Nothing is returned unless every stage succeeds.
    pub async fn generate(&self, prompt: &PromptSpec, cancel: &CancellationToken) -> Result<SkyboxAsset> {
        let mut job = until_cancelled(cancel, self.client.submit(prompt)).await?;

        let completed = self
            .client
            .wait_for_completion(&mut job, self.options.max_retries, self.options.poll_interval, cancel)
            .await?;

        let panorama = until_cancelled(cancel, self.client.download_image(&completed.file_url)).await?;
        self.estimate_asset(panorama, completed.provenance(), cancel).await
    }

    /// Builds an asset from a job that finished earlier
    pub async fn import_by_id(&self, id: &str, cancel: &CancellationToken) -> Result<SkyboxAsset> {
        let completed = until_cancelled(cancel, self.client.fetch_completed(id)).await?;
        let panorama = until_cancelled(cancel, self.client.download_image(&completed.file_url)).await?;
        self.estimate_asset(panorama, completed.provenance(), cancel).await
    }

    /// Estimates depth for an existing equirectangular panorama (2:1 only)
    pub async fn from_panorama(
        &self,
        panorama: DynamicImage,
        provenance: Provenance,
        cancel: &CancellationToken,
    ) -> Result<SkyboxAsset> {
        validate_panorama(&panorama)?;
        self.estimate_asset(panorama, provenance, cancel).await
    }

    /// Depth stage shared by every entry point. Does not check the aspect ratio.
    async fn estimate_asset(
        &self,
        panorama: DynamicImage,
        provenance: Provenance,
        cancel: &CancellationToken,
    ) -> Result<SkyboxAsset> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let estimator = Arc::clone(&self.estimator);
        let token = cancel.clone();

        // Inference is CPU/GPU bound; keep it off the async workers
        let (panorama, estimated) = tokio::task::spawn_blocking(move || {
            let estimated = estimator.estimate(&panorama, &token);
            (panorama, estimated)
        })
        .await
        .map_err(|e| Error::ModelUnavailable(format!("depth task aborted: {}", e)))?;

        let (depth, range) = estimated?;
        let asset = SkyboxAsset::new(panorama, depth, range, provenance);

        info!(
            "Created skybox asset {} ({}) with {}x{} depth",
            asset.local_id(),
            asset.provenance().display_name(),
            asset.depth().width(),
            asset.depth().height()
        );
        Ok(asset)
    }
}
