//! Point and volume queries answered from a CPU mirror.

use bevy::prelude::*;

use crate::mapper::Mapper;

/// Distance field the queries run against.
pub trait SurfaceQuery {
    fn distance(&self, p: Vec3) -> f32;
    fn normal(&self, p: Vec3) -> Vec3;
}

impl SurfaceQuery for Mapper {
    fn distance(&self, p: Vec3) -> f32 {
        self.map(p)
    }

    fn normal(&self, p: Vec3) -> Vec3 {
        self.map_normal(p)
    }
}

/// Projection of a point onto the nearest surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub point: Vec3,
    pub signed_distance: f32,
    /// Unit direction from the query point towards the surface (outside points).
    pub direction: Vec3,
}

pub fn nearest_point_on_surface(sdf: &impl SurfaceQuery, p: Vec3) -> SurfacePoint {
    let signed_distance = sdf.distance(p);
    let direction = -sdf.normal(p);
    SurfacePoint { point: p + signed_distance * direction, signed_distance, direction }
}

pub fn overlap_sphere(sdf: &impl SurfaceQuery, centre: Vec3, radius: f32) -> bool {
    sdf.distance(centre) <= radius
}

/// Approximate box overlap.
///
/// Rejects through the bounding sphere first, then projects the centre and the eight
/// corners onto the surface and accepts if any projection lands inside the box. A thin
/// surface crossing the box between those nine points is missed.
pub fn overlap_box(sdf: &impl SurfaceQuery, centre: Vec3, half_extents: Vec3) -> bool {
    if !overlap_sphere(sdf, centre, half_extents.length()) {
        return false;
    }

    let min_bounds = centre - half_extents;
    let max_bounds = centre + half_extents;
    let inside = |p: Vec3| {
        let surface = nearest_point_on_surface(sdf, p).point;
        surface.cmpge(min_bounds).all() && surface.cmple(max_bounds).all()
    };

    let h = half_extents;
    let points = [
        Vec3::ZERO,
        h,
        -h,
        Vec3::new(h.x, h.y, -h.z),
        Vec3::new(h.x, -h.y, h.z),
        Vec3::new(h.x, -h.y, -h.z),
        Vec3::new(-h.x, h.y, h.z),
        Vec3::new(-h.x, h.y, -h.z),
        Vec3::new(-h.x, -h.y, h.z),
    ];
    points.into_iter().any(|offset| inside(centre + offset))
}
