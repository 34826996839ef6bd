use image::{GrayImage, Luma};
use tracing::{debug, warn};
use crate::error::{Error, Result};

/// Value written everywhere when the raw depth has no spread
pub const DEGENERATE_DEPTH: f32 = 0.0;

/// Raw model output range, recorded before normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    pub min: f32,
    pub max: f32,
}

impl DepthRange {
    /// Single pass over `raw`, skipping non-finite values
    pub fn scan(raw: &[f32]) -> Option<Self> {
        raw.iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| match range {
                None => Some(Self { min: v, max: v }),
                Some(r) => Some(Self { min: r.min.min(v), max: r.max.max(v) }),
            })
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    pub fn is_degenerate(&self) -> bool {
        self.span() <= 0.0
    }

    /// Maps a raw value into [0, 1]
    pub fn normalize(&self, raw: f32) -> f32 {
        if self.is_degenerate() || !raw.is_finite() {
            return DEGENERATE_DEPTH;
        }
        ((raw - self.min) / self.span()).clamp(0.0, 1.0)
    }
}

/// Row-major grid of normalized depth values.
///
/// Values are relative inverse depth as produced by monocular depth networks:
/// 1.0 is the nearest point of the panorama, 0.0 the farthest. Consumers that
/// need a distance divide by the sample (see `SphereMesh::extrude`).
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DepthBuffer {
    /// Wraps already normalized values
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        check_dimensions(width, height, values.len())?;

        if let Some(bad) = values.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(Error::InvalidInput(format!("depth value {} outside [0, 1]", bad)));
        }

        Ok(Self { width, height, values })
    }

    /// Normalizes raw model output, returning the buffer and the raw range
    pub fn normalize(width: u32, height: u32, raw: &[f32]) -> Result<(Self, DepthRange)> {
        Self::normalize_owned(width, height, raw.to_vec())
    }

    /// Like `normalize`, but rewrites `raw` in place and keeps its allocation
    pub fn normalize_owned(width: u32, height: u32, mut raw: Vec<f32>) -> Result<(Self, DepthRange)> {
        check_dimensions(width, height, raw.len())?;

        let range = DepthRange::scan(&raw)
            .ok_or_else(|| Error::InvalidInput("depth output has no finite values".into()))?;

        let non_finite = raw.iter().filter(|v| !v.is_finite()).count();
        if non_finite > 0 {
            warn!("{} non-finite depth values replaced with {}", non_finite, DEGENERATE_DEPTH);
        }
        if range.is_degenerate() {
            debug!("Flat depth output at {}", range.min);
        }

        for value in raw.iter_mut() {
            *value = range.normalize(*value);
        }

        Ok((Self { width, height, values: raw }, range))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get((y * self.width + x) as usize).copied()
    }

    /// 8-bit preview of the buffer
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let v = self.values[(y * self.width + x) as usize];
            Luma([(v * 255.0).round() as u8])
        })
    }
}

fn check_dimensions(width: u32, height: u32, len: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidInput(format!("zero-sized depth buffer {}x{}", width, height)));
    }

    let expected = width as usize * height as usize;
    if len != expected {
        return Err(Error::InvalidInput(format!(
            "depth buffer {}x{} needs {} values, got {}",
            width, height, expected, len
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_two_by_two() {
        let (buffer, range) = DepthBuffer::normalize(2, 2, &[10.0, 20.0, 30.0, 40.0]).unwrap();

        assert_eq!(range, DepthRange { min: 10.0, max: 40.0 });
        let expected = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];
        for (got, want) in buffer.values().iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_degenerate_range_is_constant() {
        let (buffer, range) = DepthBuffer::normalize(3, 1, &[7.5, 7.5, 7.5]).unwrap();

        assert!(range.is_degenerate());
        assert!(buffer.values().iter().all(|&v| v == DEGENERATE_DEPTH));
    }

    #[test]
    fn test_normalized_values_stay_in_unit_range() {
        let raw: Vec<f32> = (0..64).map(|i| ((i * 37) % 11) as f32 * -3.25 + 100.0).collect();
        let (buffer, _) = DepthBuffer::normalize(8, 8, &raw).unwrap();

        assert!(buffer.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_non_finite_raw_values_do_not_leak() {
        let (buffer, range) = DepthBuffer::normalize(2, 2, &[1.0, f32::NAN, 3.0, f32::INFINITY]).unwrap();

        assert_eq!(range, DepthRange { min: 1.0, max: 3.0 });
        assert!(buffer.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_normalize_owned_reuses_allocation() {
        let raw = vec![2.0, 4.0, 6.0];
        let ptr = raw.as_ptr();

        let (buffer, _) = DepthBuffer::normalize_owned(3, 1, raw).unwrap();
        assert_eq!(buffer.values(), &[0.0, 0.5, 1.0]);
        assert_eq!(buffer.values().as_ptr(), ptr);
    }

    #[test]
    fn test_zero_sized_buffer_is_rejected() {
        assert!(matches!(DepthBuffer::normalize(0, 4, &[]), Err(Error::InvalidInput(_))));
        assert!(matches!(DepthBuffer::new(2, 2, vec![0.5; 3]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_luma_preview() {
        let buffer = DepthBuffer::new(2, 1, vec![0.0, 1.0]).unwrap();
        let preview = buffer.to_luma8();
        assert_eq!(preview.get_pixel(0, 0).0, [0]);
        assert_eq!(preview.get_pixel(1, 0).0, [255]);
    }
}
