use crate::Point;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Cell volume must be positive and finite, got {0}")]
    DegenerateVolume(f64),
    #[error("Cell side lengths must be positive and finite, got {0:?}")]
    DegenerateSides(Point),
}

/// How `scale_volume` deforms the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VolumeScalePolicy {
    /// Scale all sides by the cube root of the volume ratio.
    #[default]
    Isotropic,
    /// Scale x and y by the square root of the volume ratio, keeping z.
    #[serde(rename = "xy")]
    IsotropicXY,
    /// Reshape at fixed volume: z scales by the given ratio, x and y
    /// compensate. Used by shape moves.
    Isochoric,
}

/// Cuboid simulation cell with periodic boundaries in all directions,
/// centered on the origin.
///
/// Coordinates of wrapped points lie in `[-L/2, L/2)` per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    sides: Point,
}

impl Cell {
    pub fn cuboid(sides: Point) -> Result<Self, GeometryError> {
        if !sides.iter().all(|l| l.is_finite() && *l > 0.0) {
            return Err(GeometryError::DegenerateSides(sides));
        }
        Ok(Self { sides })
    }

    pub fn cube(side: f64) -> Result<Self, GeometryError> {
        Self::cuboid(Point::new(side, side, side))
    }

    pub fn side_lengths(&self) -> Point {
        self.sides
    }

    pub fn volume(&self) -> f64 {
        self.sides.x * self.sides.y * self.sides.z
    }

    /// Minimum-image displacement vector from `b` to `a`.
    #[inline]
    pub fn vdist(&self, a: &Point, b: &Point) -> Point {
        let mut d = a - b;
        for k in 0..3 {
            d[k] -= self.sides[k] * (d[k] / self.sides[k]).round();
        }
        d
    }

    /// Squared minimum-image distance between `a` and `b`.
    #[inline]
    pub fn sqdist(&self, a: &Point, b: &Point) -> f64 {
        self.vdist(a, b).norm_squared()
    }

    /// Wrap a point back into the cell, in place.
    #[inline]
    pub fn boundary(&self, p: &mut Point) {
        for k in 0..3 {
            p[k] -= self.sides[k] * (p[k] / self.sides[k]).round();
        }
    }

    /// True if `p` lies outside the cell.
    #[inline]
    pub fn collision(&self, p: &Point) -> bool {
        (0..3).any(|k| p[k].abs() > 0.5 * self.sides[k])
    }

    /// Uniform random point inside the cell.
    pub fn random_pos(&self, p: &mut Point, rng: &mut impl Rng) {
        for k in 0..3 {
            p[k] = (rng.gen::<f64>() - 0.5) * self.sides[k];
        }
    }

    /// Resize the cell to `new_volume` under the given policy and return the
    /// per-axis scale factors. Particle positions are *not* scaled here; the
    /// space applies the returned factors itself.
    pub fn scale_volume(
        &mut self,
        new_volume: f64,
        policy: VolumeScalePolicy,
    ) -> Result<Point, GeometryError> {
        if !new_volume.is_finite() || new_volume <= 0.0 {
            return Err(GeometryError::DegenerateVolume(new_volume));
        }
        let ratio = new_volume / self.volume();
        let scale = match policy {
            VolumeScalePolicy::Isotropic => {
                let s = ratio.cbrt();
                Point::new(s, s, s)
            }
            VolumeScalePolicy::IsotropicXY => {
                let s = ratio.sqrt();
                Point::new(s, s, 1.0)
            }
            VolumeScalePolicy::Isochoric => {
                // ratio reinterpreted as z-elongation at constant volume
                let s = ratio;
                Point::new(1.0 / s.sqrt(), 1.0 / s.sqrt(), s)
            }
        };
        self.sides.component_mul_assign(&scale);
        if !self.sides.iter().all(|l| l.is_finite() && *l > 0.0) {
            return Err(GeometryError::DegenerateSides(self.sides));
        }
        Ok(scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn vdist_uses_minimum_image_convention() {
        let cell = Cell::cube(10.0).unwrap();
        let a = Point::new(4.5, 0.0, 0.0);
        let b = Point::new(-4.5, 0.0, 0.0);
        let d = cell.vdist(&a, &b);
        assert!((d.x - (-1.0)).abs() < 1e-12);
        assert!((cell.sqdist(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn boundary_wraps_into_centered_cell() {
        let cell = Cell::cube(10.0).unwrap();
        let mut p = Point::new(6.0, -7.0, 12.0);
        cell.boundary(&mut p);
        assert!(!cell.collision(&p));
        assert!((p.x - (-4.0)).abs() < 1e-12);
        assert!((p.y - 3.0).abs() < 1e-12);
        assert!((p.z - 2.0).abs() < 1e-12);
    }

    #[test]
    fn collision_detects_points_outside_the_cell() {
        let cell = Cell::cuboid(Point::new(10.0, 20.0, 30.0)).unwrap();
        assert!(cell.collision(&Point::new(5.1, 0.0, 0.0)));
        assert!(!cell.collision(&Point::new(4.9, 9.9, -14.9)));
    }

    #[test]
    fn random_pos_samples_inside_the_cell() {
        let cell = Cell::cuboid(Point::new(4.0, 8.0, 16.0)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut p = Point::zeros();
        for _ in 0..1000 {
            cell.random_pos(&mut p, &mut rng);
            assert!(!cell.collision(&p));
        }
    }

    #[test]
    fn isotropic_scaling_reaches_the_requested_volume() {
        let mut cell = Cell::cube(10.0).unwrap();
        let scale = cell
            .scale_volume(2000.0, VolumeScalePolicy::Isotropic)
            .unwrap();
        assert!((cell.volume() - 2000.0).abs() < 1e-9);
        assert!((scale.x - 2.0_f64.cbrt()).abs() < 1e-12);
        assert_eq!(scale.x, scale.y);
        assert_eq!(scale.y, scale.z);
    }

    #[test]
    fn xy_scaling_keeps_z_fixed() {
        let mut cell = Cell::cuboid(Point::new(10.0, 10.0, 20.0)).unwrap();
        let scale = cell
            .scale_volume(4000.0, VolumeScalePolicy::IsotropicXY)
            .unwrap();
        assert!((cell.volume() - 4000.0).abs() < 1e-9);
        assert_eq!(scale.z, 1.0);
        assert!((cell.side_lengths().z - 20.0).abs() < 1e-12);
    }

    #[test]
    fn isochoric_scaling_preserves_volume() {
        let mut cell = Cell::cube(10.0).unwrap();
        let v0 = cell.volume();
        cell.scale_volume(1.5 * v0, VolumeScalePolicy::Isochoric)
            .unwrap();
        // policy reinterprets the ratio as elongation, volume is unchanged
        assert!((cell.volume() - v0).abs() < 1e-9);
        assert!((cell.side_lengths().z - 15.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_volume_is_rejected() {
        let mut cell = Cell::cube(10.0).unwrap();
        assert!(cell.scale_volume(0.0, VolumeScalePolicy::Isotropic).is_err());
        assert!(cell
            .scale_volume(f64::NAN, VolumeScalePolicy::Isotropic)
            .is_err());
        assert!(Cell::cube(-1.0).is_err());
    }
}
