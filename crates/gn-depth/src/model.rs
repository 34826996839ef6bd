use std::path::Path;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::activation::relu;
use gn_core::error::Error;

/// Spatial layout of the single-channel tensor a model returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLayout {
    /// `[1, 1, H, W]`, rows match image rows
    #[default]
    HeightWidth,
    /// `[1, 1, W, H]` with the horizontal axis mirrored
    TransposedMirrored,
}

/// A monocular depth network.
///
/// Input is `[1, 3, H, W]` RGB in [0, 1] at `input_size()`. Output is relative
/// inverse depth (larger is nearer) laid out as `output_layout()` says.
pub trait DepthModel<B: Backend>: Send {
    /// Fixed `(width, height)` the network runs at
    fn input_size(&self) -> (usize, usize);

    fn output_layout(&self) -> OutputLayout {
        OutputLayout::HeightWidth
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4>;
}

#[derive(Config, Debug)]
pub struct DepthNetConfig {
    #[config(default = 256)]
    pub input_width: usize,
    #[config(default = 256)]
    pub input_height: usize,
    #[config(default = 16)]
    pub hidden_channels: usize,
}

impl DepthNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DepthNet<B> {
        DepthNet {
            encoder: Conv2dConfig::new([3, self.hidden_channels], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            head: Conv2dConfig::new([self.hidden_channels, 1], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
        }
    }
}

/// Small convolutional depth head loadable from a recorded checkpoint
#[derive(Module, Debug)]
pub struct DepthNet<B: Backend> {
    encoder: Conv2d<B>,
    head: Conv2d<B>,
}

impl<B: Backend> DepthNet<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.encoder.forward(input));
        relu(self.head.forward(x))
    }
}

/// `DepthNet` bound to the resolution it was trained at
#[derive(Debug)]
pub struct RecordedDepthModel<B: Backend> {
    net: DepthNet<B>,
    config: DepthNetConfig,
}

impl<B: Backend> RecordedDepthModel<B> {
    /// Loads weights recorded with `NamedMpkFileRecorder`
    pub fn load(path: impl AsRef<Path>, config: DepthNetConfig, device: &B::Device) -> gn_core::error::Result<Self> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(Error::ModelUnavailable(format!("no model file at {}", path.display())));
        }

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let net = config
            .init::<B>(device)
            .load_file(path.to_path_buf(), &recorder, device)
            .map_err(|e| Error::ModelUnavailable(format!("{}: {}", path.display(), e)))?;

        tracing::info!("Loaded depth model from {}", path.display());

        Ok(Self { net, config })
    }

    /// Untrained network, for wiring tests
    pub fn from_config(config: DepthNetConfig, device: &B::Device) -> Self {
        Self {
            net: config.init(device),
            config,
        }
    }
}

impl<B: Backend> DepthModel<B> for RecordedDepthModel<B> {
    fn input_size(&self) -> (usize, usize) {
        (self.config.input_width, self.config.input_height)
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.net.forward(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_missing_model_file() {
        let device = NdArrayDevice::Cpu;
        let result = RecordedDepthModel::<TestBackend>::load(
            "does/not/exist.mpk",
            DepthNetConfig::new(),
            &device,
        );
        assert!(matches!(result, Err(Error::ModelUnavailable(_))));
    }

    #[test]
    fn test_config_survives_save_and_load() {
        let config = DepthNetConfig::new()
            .with_input_width(384)
            .with_input_height(192);
        let path = std::env::temp_dir().join(format!("gn-depth-config-{}.json", std::process::id()));

        config.save(&path).unwrap();
        let loaded = DepthNetConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.input_width, 384);
        assert_eq!(loaded.input_height, 192);
        assert_eq!(loaded.hidden_channels, 16);
    }

    #[test]
    fn test_depth_net_output_shape() {
        let device = NdArrayDevice::Cpu;
        let config = DepthNetConfig::new()
            .with_input_width(8)
            .with_input_height(4)
            .with_hidden_channels(2);
        let model = RecordedDepthModel::<TestBackend>::from_config(config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 8], &device);
        assert_eq!(model.forward(input).dims(), [1, 1, 4, 8]);
        assert_eq!(model.input_size(), (8, 4));
    }
}
