//! Planar slanted-edge test chart.

use nalgebra::{UnitQuaternion, Vector2, Vector3};

use super::{RayHit, SceneTarget};

/// Square chart split into a light and a dark half by an edge through its center.
///
/// In the chart's local frame the chart lies in the plane `z = 0`, and the edge
/// runs at `angle_deg` from the local +Y axis. The light half is on the +X side.
#[derive(Debug, Clone, PartialEq)]
pub struct SlantedEdgeTarget {
    size: f64,
    angle_deg: f64,
    position: Vector3<f64>,
    orientation: UnitQuaternion<f64>,
    light: [f32; 3],
    dark: [f32; 3],
}

impl SlantedEdgeTarget {
    pub fn new(size: f64, angle_deg: f64) -> Self {
        Self {
            size,
            angle_deg,
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            light: [1.0; 3],
            dark: [0.0; 3],
        }
    }

    pub fn with_colors(mut self, light: [f32; 3], dark: [f32; 3]) -> Self {
        self.light = light;
        self.dark = dark;
        self
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn angle(&self) -> f64 {
        self.angle_deg
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    fn edge_direction(&self) -> Vector2<f64> {
        let a = self.angle_deg.to_radians();
        Vector2::new(a.sin(), a.cos())
    }

    fn to_world(&self, local: Vector3<f64>) -> Vector3<f64> {
        self.position + self.orientation * local
    }
}

impl SceneTarget for SlantedEdgeTarget {
    /// Chart corners, clockwise from the local top-left.
    fn object_points(&self) -> Vec<Vector3<f64>> {
        let h = self.size / 2.0;
        [(-h, -h), (h, -h), (h, h), (-h, h)]
            .iter()
            .map(|(x, y)| self.to_world(Vector3::new(*x, *y, 0.0)))
            .collect()
    }

    fn edge_points(&self) -> [Vector3<f64>; 2] {
        let d = self.edge_direction() * (self.size / 2.0);
        [
            self.to_world(Vector3::new(-d.x, -d.y, 0.0)),
            self.to_world(Vector3::new(d.x, d.y, 0.0)),
        ]
    }

    fn set_euler_angles(&mut self, angles_deg: Vector3<f64>) {
        self.orientation = UnitQuaternion::from_euler_angles(
            angles_deg.x.to_radians(),
            angles_deg.y.to_radians(),
            angles_deg.z.to_radians(),
        );
    }

    fn set_position(&mut self, position: Vector3<f64>) {
        self.position = position;
    }

    fn intersect(&self, origin: &Vector3<f64>, direction: &Vector3<f64>) -> Option<RayHit> {
        let o = self.orientation.inverse_transform_vector(&(origin - self.position));
        let d = self.orientation.inverse_transform_vector(direction);
        if d.z.abs() < 1e-12 {
            return None;
        }
        let t = -o.z / d.z;
        if t <= 0.0 {
            return None;
        }

        let hit = o + d * t;
        let h = self.size / 2.0;
        if hit.x.abs() > h || hit.y.abs() > h {
            return None;
        }

        let e = self.edge_direction();
        // Cross product sign: positive on the +X side of the edge.
        let side = hit.x * e.y - hit.y * e.x;
        let color = if side > 0.0 { self.light } else { self.dark };
        Some(RayHit { distance: t, color })
    }
}
