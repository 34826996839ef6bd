use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use gn_app::error::AppError;
use gn_app::{GenerationClient, GenesisConfig, SkyboxPipeline};
use gn_core::mesh::SphereMesh;
use gn_core::{PromptSpec, PromptStyle, Provenance, SkyboxAsset};
use gn_depth::{DepthEstimator, DepthNetConfig, RecordedDepthModel};

#[cfg(not(feature = "wgpu"))]
type AppBackend = burn_ndarray::NdArray<f32>;
#[cfg(feature = "wgpu")]
type AppBackend = burn_wgpu::Wgpu;

const USAGE: &str = "gn-app [--style <id>] <prompt...> | --id <job id> | --image <path>";

#[derive(Debug, PartialEq)]
enum Command {
    Generate(PromptSpec),
    Import(String),
    Image(PathBuf),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let command = parse_args(std::env::args().skip(1))?;
    let config = GenesisConfig::load()?;

    let device = Default::default();
    let model_config = DepthNetConfig::new()
        .with_input_width(config.model_resolution)
        .with_input_height(config.model_resolution);
    let model = RecordedDepthModel::<AppBackend>::load(&config.model_path, model_config, &device)?;
    let estimator = DepthEstimator::new(model, device)?;

    let client = GenerationClient::new(&config.api_url)?
        .with_api_token(config.api_token.clone())
        .with_request_timeout(config.request_timeout);
    let pipeline = SkyboxPipeline::new(client, Arc::new(estimator), config.pipeline_options());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });

    let asset = match command {
        Command::Generate(prompt) => pipeline.generate(&prompt, &cancel).await?,
        Command::Import(id) => pipeline.import_by_id(&id, &cancel).await?,
        Command::Image(path) => {
            let panorama = image::open(&path)?;
            let provenance = Provenance {
                title: path.file_stem().map(|s| s.to_string_lossy().into_owned()),
                ..Default::default()
            };
            pipeline.from_panorama(panorama, provenance, &cancel).await?
        }
    };

    let mesh = SphereMesh::uv_sphere(32, 64).extrude(&asset.sampler(), 1.0, 50.0);
    info!("Extruded preview mesh with {} vertices", mesh.vertex_count());

    save_asset(&asset, &config.output_dir)?;
    Ok(())
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, AppError> {
    let mut args = args.into_iter();
    let mut style = PromptStyle::default();
    let mut words = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--style" => {
                let id = args.next().ok_or_else(|| AppError::Usage("--style needs a value".into()))?;
                style = id.parse().map_err(|e| AppError::Usage(format!("{}", e)))?;
            }
            "--id" => {
                let id = args.next().ok_or_else(|| AppError::Usage("--id needs a value".into()))?;
                return Ok(Command::Import(id));
            }
            "--image" => {
                let path = args.next().ok_or_else(|| AppError::Usage("--image needs a path".into()))?;
                return Ok(Command::Image(PathBuf::from(path)));
            }
            _ => words.push(arg),
        }
    }

    if words.is_empty() {
        return Err(AppError::Usage(USAGE.into()));
    }

    Ok(Command::Generate(PromptSpec::new(words.join(" "), style)))
}

fn save_asset(asset: &SkyboxAsset, dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let name = file_stem(&asset.provenance().display_name());

    let rgb = dir.join(format!("{}_rgb.png", name));
    let depth = dir.join(format!("{}_depth.png", name));
    asset.panorama().save(&rgb)?;
    asset.depth().to_luma8().save(&depth)?;

    info!(
        "Saved {} and {} (created {})",
        rgb.display(),
        depth.display(),
        asset.created_at().format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if stem.is_empty() { "skybox".to_string() } else { stem }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_prompt() {
        let command = parse_args(args(&["--style", "sci_fi", "orbital", "station"])).unwrap();
        assert_eq!(command, Command::Generate(PromptSpec::new("orbital station", PromptStyle::SciFi)));
    }

    #[test]
    fn test_parse_import_and_image() {
        assert_eq!(parse_args(args(&["--id", "1234"])).unwrap(), Command::Import("1234".into()));
        assert_eq!(
            parse_args(args(&["--image", "pano.png"])).unwrap(),
            Command::Image(PathBuf::from("pano.png"))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["--style"])).is_err());
        assert!(parse_args(args(&["--style", "nope", "x"])).is_err());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Misty Forest #2"), "Misty_Forest__2");
        assert_eq!(file_stem("  "), "skybox");
    }
}
