use bytemuck::{Pod, Zeroable};
use image::{ColorType, DynamicImage};
use crate::depth::{DepthBuffer, DEGENERATE_DEPTH};
use crate::error::{Error, Result};

/// Which byte of a packed RGB texel carries the depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RgbChannel {
    #[default]
    Red,
    Green,
    Blue,
}

/// Pixel layout of a depth texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthEncoding {
    /// One 32-bit float per texel
    Float32,
    /// One byte per texel, 255 = 1.0
    Unorm8,
    /// Three bytes per texel, one of them used as depth
    PackedRgb { channel: RgbChannel },
}

impl DepthEncoding {
    pub fn bytes_per_texel(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Unorm8 => 1,
            Self::PackedRgb { .. } => 3,
        }
    }
}

impl TryFrom<ColorType> for DepthEncoding {
    type Error = Error;

    fn try_from(color: ColorType) -> Result<Self> {
        match color {
            ColorType::L8 => Ok(Self::Unorm8),
            ColorType::Rgb8 => Ok(Self::PackedRgb { channel: RgbChannel::Red }),
            other => Err(Error::UnsupportedFormat(format!(
                "sampling depth from {:?} is not supported",
                other
            ))),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgb24 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb24 {
    fn channel(&self, channel: RgbChannel) -> u8 {
        match channel {
            RgbChannel::Red => self.r,
            RgbChannel::Green => self.g,
            RgbChannel::Blue => self.b,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Texels<'a> {
    Float(&'a [f32]),
    /// Native-endian f32 bytes, read without alignment requirements
    FloatBytes(&'a [u8]),
    Unorm(&'a [u8]),
    Packed(&'a [Rgb24], RgbChannel),
}

/// Bilinear sampler over a borrowed depth texture.
///
/// The encoding is resolved once when the sampler is built; every encoding is
/// read through the same `sample_bilinear` call and yields values in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct DepthSampler<'a> {
    width: usize,
    height: usize,
    texels: Texels<'a>,
}

impl<'a> DepthSampler<'a> {
    /// Samples a normalized float buffer
    pub fn new(buffer: &'a DepthBuffer) -> Self {
        Self {
            width: buffer.width() as usize,
            height: buffer.height() as usize,
            texels: Texels::Float(buffer.values()),
        }
    }

    /// Samples raw texture bytes in the given encoding
    pub fn from_bytes(width: u32, height: u32, encoding: DepthEncoding, bytes: &'a [u8]) -> Result<Self> {
        let (width, height) = (width as usize, height as usize);
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!("zero-sized depth texture {}x{}", width, height)));
        }

        let expected = width * height * encoding.bytes_per_texel();
        if bytes.len() != expected {
            return Err(Error::InvalidInput(format!(
                "{:?} texture {}x{} needs {} bytes, got {}",
                encoding, width, height, expected, bytes.len()
            )));
        }

        let texels = match encoding {
            DepthEncoding::Float32 => Texels::FloatBytes(bytes),
            DepthEncoding::Unorm8 => Texels::Unorm(bytes),
            DepthEncoding::PackedRgb { channel } => Texels::Packed(
                bytemuck::try_cast_slice(bytes)
                    .map_err(|e| Error::InvalidInput(format!("packed depth data: {}", e)))?,
                channel,
            ),
        };

        Ok(Self { width, height, texels })
    }

    /// Samples a decoded image, treating grayscale as bytes and RGB as packed red
    pub fn from_image(image: &'a DynamicImage) -> Result<Self> {
        let encoding = DepthEncoding::try_from(image.color())?;
        Self::from_bytes(image.width(), image.height(), encoding, image.as_bytes())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn encoding(&self) -> DepthEncoding {
        match self.texels {
            Texels::Float(_) | Texels::FloatBytes(_) => DepthEncoding::Float32,
            Texels::Unorm(_) => DepthEncoding::Unorm8,
            Texels::Packed(_, channel) => DepthEncoding::PackedRgb { channel },
        }
    }

    /// Interpolates depth at `(u, v)` in [0, 1] x [0, 1]. Edges clamp, never wrap.
    pub fn sample_bilinear(&self, u: f32, v: f32) -> f32 {
        let (i0, i1, dx) = axis_taps(u, self.width);
        let (j0, j1, dy) = axis_taps(v, self.height);

        let q11 = self.tap(i0, j0);
        let q21 = self.tap(i1, j0);
        let q12 = self.tap(i0, j1);
        let q22 = self.tap(i1, j1);

        let v1 = q11 + dx * (q21 - q11);
        let v2 = q12 + dx * (q22 - q12);

        (v1 + dy * (v2 - v1)).clamp(0.0, 1.0)
    }

    fn tap(&self, i: usize, j: usize) -> f32 {
        let index = j * self.width + i;
        let value = match self.texels {
            Texels::Float(data) => data[index],
            Texels::FloatBytes(data) => bytemuck::pod_read_unaligned::<f32>(&data[index * 4..index * 4 + 4]),
            Texels::Unorm(data) => data[index] as f32 / 255.0,
            Texels::Packed(data, channel) => data[index].channel(channel) as f32 / 255.0,
        };

        if value.is_finite() { value } else { DEGENERATE_DEPTH }
    }
}

/// Lower tap, upper tap (clamped to the last index) and blend weight
fn axis_taps(t: f32, len: usize) -> (usize, usize, f32) {
    let last = len - 1;
    let pos = t.clamp(0.0, 1.0) * last as f32;
    let lo = (pos.floor() as usize).min(last);
    let hi = if lo < last { lo + 1 } else { lo };
    (lo, hi, pos - lo as f32)
}
