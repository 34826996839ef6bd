use chrono::{DateTime, Utc};
use image::DynamicImage;
use uuid::Uuid;
use crate::depth::{DepthBuffer, DepthRange};
use crate::error::{Error, Result};
use crate::sampler::DepthSampler;

/// Where a panorama came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    pub job_id: Option<String>,
    pub title: Option<String>,
    pub file_url: Option<String>,
    pub thumb_url: Option<String>,
}

impl Provenance {
    pub fn from_job(job_id: impl Into<String>, file_url: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            file_url: Some(file_url.into()),
            ..Default::default()
        }
    }

    /// Name usable for output files
    pub fn display_name(&self) -> String {
        self.title.clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.job_id.clone())
            .unwrap_or_else(|| "skybox".to_string())
    }
}

/// A finished panorama with its depth
#[derive(Debug, Clone)]
pub struct SkyboxAsset {
    local_id: Uuid,
    panorama: DynamicImage,
    depth: DepthBuffer,
    depth_range: DepthRange,
    provenance: Provenance,
    created_at: DateTime<Utc>,
    generator_version: &'static str,
}

impl SkyboxAsset {
    pub fn new(
        panorama: DynamicImage,
        depth: DepthBuffer,
        depth_range: DepthRange,
        provenance: Provenance,
    ) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            panorama,
            depth,
            depth_range,
            provenance,
            created_at: Utc::now(),
            generator_version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn local_id(&self) -> Uuid {
        self.local_id
    }

    pub fn panorama(&self) -> &DynamicImage {
        &self.panorama
    }

    pub fn depth(&self) -> &DepthBuffer {
        &self.depth
    }

    /// Raw model output range recorded at estimation time
    pub fn depth_range(&self) -> DepthRange {
        self.depth_range
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Version of this crate the asset was created with
    pub fn generator_version(&self) -> &str {
        self.generator_version
    }

    pub fn sampler(&self) -> DepthSampler<'_> {
        DepthSampler::new(&self.depth)
    }
}

/// Checks that `image` is an equirectangular panorama (2:1)
pub fn validate_panorama(image: &DynamicImage) -> Result<()> {
    let (width, height) = (image.width(), image.height());

    if width == 0 || height == 0 {
        return Err(Error::InvalidInput("empty panorama".into()));
    }

    if width != height * 2 {
        return Err(Error::InvalidInput(format!(
            "panorama must be equirectangular with a 2:1 aspect ratio, got {}x{}",
            width, height
        )));
    }

    Ok(())
}
