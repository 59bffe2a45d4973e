use crate::Point;
use nalgebra::{Matrix3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Optional anisotropy payload of a particle.
///
/// Modeled as a closed set of variants with explicit rotation rules rather
/// than a trait hierarchy: vector members rotate with the quaternion, tensor
/// members with the rotation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Point dipole with unit direction and scalar moment (eÅ).
    Dipole { mu: Point, mulen: f64 },
    /// Polarizable site: polarizability tensor and induced dipole.
    Polarizable {
        alpha: Matrix3<f64>,
        mui: Point,
        muilen: f64,
    },
    /// Traceless quadrupole tensor (eÅ²).
    Quadrupole { q: Matrix3<f64> },
    /// Sphero-cylinder: unit axis and half-length (Å).
    Cigar { dir: Point, half_length: f64 },
}

impl Shape {
    /// Rotate the orientation-dependent members.
    pub fn rotate(&mut self, quat: &UnitQuaternion<f64>, rot: &Matrix3<f64>) {
        match self {
            Shape::Dipole { mu, .. } => *mu = quat * *mu,
            Shape::Polarizable { alpha, mui, .. } => {
                *mui = quat * *mui;
                *alpha = rot * *alpha * rot.transpose();
            }
            Shape::Quadrupole { q } => *q = rot * *q * rot.transpose(),
            Shape::Cigar { dir, .. } => *dir = quat * *dir,
        }
    }
}

/// A single interaction site.
///
/// The atom kind id indexes the process-wide atom table where static traits
/// (mass, sigma, epsilon, ...) live; only per-instance state is stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Atom kind id into the topology's atom table.
    pub id: usize,
    /// Position inside the cell (Å).
    pub pos: Point,
    /// Charge in units of the elementary charge.
    pub charge: f64,
    /// Anisotropy payload, if any. Always serialized: the binary state
    /// encoding is not self-describing and cannot tolerate absent fields.
    #[serde(default)]
    pub shape: Option<Shape>,
}

impl Particle {
    pub fn new(id: usize, pos: Point) -> Self {
        Self {
            id,
            pos,
            charge: 0.0,
            shape: None,
        }
    }

    /// Rotate the particle's internal degrees of freedom. The position is a
    /// property of the group transform and is not touched here.
    pub fn rotate(&mut self, quat: &UnitQuaternion<f64>, rot: &Matrix3<f64>) {
        if let Some(shape) = &mut self.shape {
            shape.rotate(quat, rot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn z_quarter_turn() -> (UnitQuaternion<f64>, Matrix3<f64>) {
        let q = UnitQuaternion::from_axis_angle(&nalgebra::Vector3::z_axis(), FRAC_PI_2);
        (q, q.to_rotation_matrix().into_inner())
    }

    #[test]
    fn dipole_direction_rotates_with_the_quaternion() {
        let (q, r) = z_quarter_turn();
        let mut p = Particle::new(0, Point::zeros());
        p.shape = Some(Shape::Dipole {
            mu: Point::new(1.0, 0.0, 0.0),
            mulen: 1.5,
        });
        p.rotate(&q, &r);
        match p.shape.unwrap() {
            Shape::Dipole { mu, mulen } => {
                assert!((mu - Point::new(0.0, 1.0, 0.0)).norm() < 1e-12);
                assert_eq!(mulen, 1.5);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn quadrupole_tensor_rotates_by_similarity_transform() {
        let (q, r) = z_quarter_turn();
        let mut tensor = Matrix3::zeros();
        tensor[(0, 0)] = 1.0;
        tensor[(1, 1)] = -1.0;
        let mut p = Particle::new(0, Point::zeros());
        p.shape = Some(Shape::Quadrupole { q: tensor });
        p.rotate(&q, &r);
        match p.shape.unwrap() {
            Shape::Quadrupole { q } => {
                // quarter turn about z swaps the xx and yy entries
                assert!((q[(0, 0)] - (-1.0)).abs() < 1e-12);
                assert!((q[(1, 1)] - 1.0).abs() < 1e-12);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn point_charge_is_unaffected_by_rotation() {
        let (q, r) = z_quarter_turn();
        let mut p = Particle::new(3, Point::new(1.0, 2.0, 3.0));
        p.charge = -1.0;
        let before = p.clone();
        p.rotate(&q, &r);
        assert_eq!(p, before);
    }
}
