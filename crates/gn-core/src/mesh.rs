use std::f32::consts::{PI, TAU};
use glam::{Vec2, Vec3};
use crate::sampler::DepthSampler;

/// Triangle mesh of a sphere with equirectangular UVs
#[derive(Debug, Clone, PartialEq)]
pub struct SphereMesh {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl SphereMesh {
    /// Unit sphere with `rings` latitude bands and `segments` longitude bands.
    /// The seam column is duplicated so UVs stay continuous.
    pub fn uv_sphere(rings: u32, segments: u32) -> Self {
        let rings = rings.max(2);
        let segments = segments.max(3);

        let mut positions = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
        let mut uvs = Vec::with_capacity(positions.capacity());

        for ring in 0..=rings {
            let v = ring as f32 / rings as f32;
            let theta = v * PI;
            for segment in 0..=segments {
                let u = segment as f32 / segments as f32;
                let phi = u * TAU;
                positions.push(Vec3::new(
                    theta.sin() * phi.cos(),
                    theta.cos(),
                    theta.sin() * phi.sin(),
                ));
                uvs.push(Vec2::new(u, v));
            }
        }

        let stride = segments + 1;
        let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
        for ring in 0..rings {
            for segment in 0..segments {
                let a = ring * stride + segment;
                let b = a + stride;
                indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }

        Self { positions, uvs, indices }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Pushes every vertex out to the distance encoded in `sampler`.
    ///
    /// Samples are relative inverse depth, so the distance is `scale / sample`,
    /// clamped to `[0, max * scale]`. The sphere is seen from inside, which
    /// mirrors the panorama horizontally.
    pub fn extrude(&self, sampler: &DepthSampler<'_>, scale: f32, max: f32) -> Self {
        let limit = (max * scale).max(0.0);

        let uvs: Vec<Vec2> = self.uvs.iter().map(|uv| Vec2::new(1.0 - uv.x, uv.y)).collect();

        let positions = self.positions.iter()
            .zip(&uvs)
            .map(|(position, uv)| {
                let nearness = sampler.sample_bilinear(uv.x, uv.y);
                let distance = scale / nearness;
                let distance = if distance.is_nan() { limit } else { distance.clamp(0.0, limit) };
                *position * distance
            })
            .collect();

        Self {
            positions,
            uvs,
            indices: self.indices.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depth::DepthBuffer;

    #[test]
    fn test_uv_sphere_layout() {
        let mesh = SphereMesh::uv_sphere(4, 8);
        assert_eq!(mesh.vertex_count(), 5 * 9);
        assert_eq!(mesh.indices.len(), 4 * 8 * 6);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
        assert!(mesh.positions.iter().all(|p| (p.length() - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_extrude_flat_depth_scales_uniformly() {
        let buffer = DepthBuffer::new(2, 2, vec![0.5; 4]).unwrap();
        let sampler = DepthSampler::new(&buffer);
        let mesh = SphereMesh::uv_sphere(3, 6).extrude(&sampler, 2.0, 10.0);

        assert!(mesh.positions.iter().all(|p| (p.length() - 4.0).abs() < 1e-4));
    }

    #[test]
    fn test_extrude_clamps_far_points() {
        let buffer = DepthBuffer::new(1, 1, vec![0.0]).unwrap();
        let sampler = DepthSampler::new(&buffer);
        let mesh = SphereMesh::uv_sphere(2, 3).extrude(&sampler, 1.5, 4.0);

        assert!(mesh.positions.iter().all(|p| (p.length() - 6.0).abs() < 1e-4));
    }

    #[test]
    fn test_extrude_mirrors_uvs() {
        let buffer = DepthBuffer::new(1, 1, vec![1.0]).unwrap();
        let sampler = DepthSampler::new(&buffer);
        let base = SphereMesh::uv_sphere(2, 4);
        let mesh = base.extrude(&sampler, 1.0, 1.0);

        for (a, b) in base.uvs.iter().zip(&mesh.uvs) {
            assert!((a.x + b.x - 1.0).abs() < 1e-6);
            assert_eq!(a.y, b.y);
        }
    }
}
