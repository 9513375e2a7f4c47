use bevy::prelude::*;

/// Trait for signed distance functions
pub trait Sdf: Send + Sync {
    fn distance(&self, point: Vec3) -> f32;
}

/// Numeric tag stored in [`crate::gpu_data::SdfGpuData::kind`].
pub mod kind {
    pub const MESH: u32 = 0;
    pub const SPHERE: u32 = 1;
    pub const CUBOID: u32 = 2;
    pub const TORUS: u32 = 3;
    pub const BOX_FRAME: u32 = 4;
    pub const CYLINDER: u32 = 5;
}

/// Analytic SDF shapes, expressed in the object's local space (centred at the origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SdfPrimitive {
    Sphere { radius: f32 },
    /// Box with optionally rounded edges. `roundness` eats into the half extents.
    Cuboid { half_extents: Vec3, roundness: f32 },
    /// Ring lying in the local XZ plane.
    Torus { major_radius: f32, minor_radius: f32 },
    BoxFrame { half_extents: Vec3, thickness: f32 },
    /// Capped cylinder along local Y.
    Cylinder { radius: f32, height: f32 },
}

impl SdfPrimitive {
    pub fn kind(&self) -> u32 {
        match self {
            SdfPrimitive::Sphere { .. } => kind::SPHERE,
            SdfPrimitive::Cuboid { .. } => kind::CUBOID,
            SdfPrimitive::Torus { .. } => kind::TORUS,
            SdfPrimitive::BoxFrame { .. } => kind::BOX_FRAME,
            SdfPrimitive::Cylinder { .. } => kind::CYLINDER,
        }
    }

    /// Packs the shape parameters into the four floats the shaders read.
    pub fn gpu_params(&self) -> [f32; 4] {
        match *self {
            SdfPrimitive::Sphere { radius } => [radius, 0.0, 0.0, 0.0],
            SdfPrimitive::Cuboid { half_extents, roundness } => {
                [half_extents.x, half_extents.y, half_extents.z, roundness]
            }
            SdfPrimitive::Torus { major_radius, minor_radius } => {
                [major_radius, minor_radius, 0.0, 0.0]
            }
            SdfPrimitive::BoxFrame { half_extents, thickness } => {
                [half_extents.x, half_extents.y, half_extents.z, thickness]
            }
            SdfPrimitive::Cylinder { radius, height } => [radius, height, 0.0, 0.0],
        }
    }

    /// Inverse of [`Self::kind`] + [`Self::gpu_params`]. Returns `None` for mesh records.
    pub fn from_gpu(kind: u32, params: [f32; 4]) -> Option<Self> {
        let [a, b, c, d] = params;
        match kind {
            kind::SPHERE => Some(SdfPrimitive::Sphere { radius: a }),
            kind::CUBOID => Some(SdfPrimitive::Cuboid {
                half_extents: Vec3::new(a, b, c),
                roundness: d,
            }),
            kind::TORUS => Some(SdfPrimitive::Torus { major_radius: a, minor_radius: b }),
            kind::BOX_FRAME => Some(SdfPrimitive::BoxFrame {
                half_extents: Vec3::new(a, b, c),
                thickness: d,
            }),
            kind::CYLINDER => Some(SdfPrimitive::Cylinder { radius: a, height: b }),
            _ => None,
        }
    }
}

impl Sdf for SdfPrimitive {
    fn distance(&self, point: Vec3) -> f32 {
        match *self {
            SdfPrimitive::Sphere { radius } => point.length() - radius,
            SdfPrimitive::Cuboid { half_extents, roundness } => {
                let roundness = roundness.clamp(0.0, half_extents.min_element());
                let d = point.abs() - (half_extents - Vec3::splat(roundness));
                d.max(Vec3::ZERO).length() + d.max_element().min(0.0) - roundness
            }
            SdfPrimitive::Torus { major_radius, minor_radius } => {
                let ring = Vec2::new(point.x, point.z).length() - major_radius;
                Vec2::new(ring, point.y).length() - minor_radius
            }
            SdfPrimitive::BoxFrame { half_extents, thickness } => {
                let p = point.abs() - half_extents;
                let e = Vec3::splat(thickness);
                let q = (p + e).abs() - e;
                let edge = |v: Vec3| v.max(Vec3::ZERO).length() + v.max_element().min(0.0);
                edge(Vec3::new(p.x, q.y, q.z))
                    .min(edge(Vec3::new(q.x, p.y, q.z)))
                    .min(edge(Vec3::new(q.x, q.y, p.z)))
            }
            SdfPrimitive::Cylinder { radius, height } => {
                let xz_dist = Vec2::new(point.x, point.z).length() - radius;
                let y_dist = point.y.abs() - height * 0.5;

                if xz_dist < 0.0 && y_dist < 0.0 {
                    xz_dist.max(y_dist)
                } else {
                    Vec2::new(xz_dist.max(0.0), y_dist.max(0.0)).length()
                }
            }
        }
    }
}

/// Convenience functions for creating common primitives
pub fn sdf_sphere(radius: f32) -> SdfPrimitive {
    SdfPrimitive::Sphere { radius }
}

pub fn sdf_box(half_extents: Vec3) -> SdfPrimitive {
    SdfPrimitive::Cuboid { half_extents, roundness: 0.0 }
}

pub fn sdf_torus(major_radius: f32, minor_radius: f32) -> SdfPrimitive {
    SdfPrimitive::Torus { major_radius, minor_radius }
}

pub fn sdf_cylinder(radius: f32, height: f32) -> SdfPrimitive {
    SdfPrimitive::Cylinder { radius, height }
}
