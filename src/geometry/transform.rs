use std::ops;
use std::ops::Mul;

use overload::overload;

use crate::{math::SquareMatrix, Float};

use super::{bounds3::Bounds3f, point3::Point3f, ray::Ray, vec3::Vec3f};

/// Represents a 3D transformation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transform {
    m: SquareMatrix<4>,
    m_inv: SquareMatrix<4>,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        m: SquareMatrix::IDENTITY,
        m_inv: SquareMatrix::IDENTITY,
    };

    /// Construct a new transform with the given matrix and inverse.
    ///
    /// The given inverse `m_inv` is assumed to be correct.
    pub fn new(m: SquareMatrix<4>, m_inv: SquareMatrix<4>) -> Self {
        Self { m, m_inv }
    }

    /// Construct a new transform from the given matrix.
    ///
    /// The inverse is calculated from the matrix.
    pub fn new_from_mat(mat: [[Float; 4]; 4]) -> Self {
        let m = SquareMatrix::new(mat);
        let m_inv = m
            .inverse()
            .expect("Supplied matrix should have an inverse (not singular)");

        Self { m, m_inv }
    }

    /// Construct a transform representing a translation.
    pub fn translate(delta: Vec3f) -> Self {
        let m = SquareMatrix::new([
            [1.0, 0.0, 0.0, delta.x],
            [0.0, 1.0, 0.0, delta.y],
            [0.0, 0.0, 1.0, delta.z],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let m_inv = SquareMatrix::new([
            [1.0, 0.0, 0.0, -delta.x],
            [0.0, 1.0, 0.0, -delta.y],
            [0.0, 0.0, 1.0, -delta.z],
            [0.0, 0.0, 0.0, 1.0],
        ]);

        Self { m, m_inv }
    }

    /// Construct a transform representing a scale.
    pub fn scale(x: Float, y: Float, z: Float) -> Self {
        let m = SquareMatrix::new([
            [x, 0.0, 0.0, 0.0],
            [0.0, y, 0.0, 0.0],
            [0.0, 0.0, z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let m_inv = SquareMatrix::new([
            [1.0 / x, 0.0, 0.0, 0.0],
            [0.0, 1.0 / y, 0.0, 0.0],
            [0.0, 0.0, 1.0 / z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);

        Self { m, m_inv }
    }

    /// Construct a transform representing a rotation about the x axis.
    ///
    /// `theta` should be given in degrees.
    pub fn rotate_x(theta: Float) -> Self {
        let (sin_theta, cos_theta) = theta.to_radians().sin_cos();
        let m = SquareMatrix::new([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, cos_theta, -sin_theta, 0.0],
            [0.0, sin_theta, cos_theta, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);

        let m_inv = m.transpose();

        Self { m, m_inv }
    }

    /// Construct the inverse of a transform.
    pub fn inverse(&self) -> Self {
        Self {
            m: self.m_inv.clone(),
            m_inv: self.m.clone(),
        }
    }

    /// Returns `true` if `self` is the identity transformation.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Apply `self` to a ray.
    pub fn apply_ray<'a>(&self, r: &Ray<'a>) -> Ray<'a> {
        Ray {
            o: self * r.o,
            d: self * r.d,
            ..r.clone()
        }
    }

    /// Apply the inverse of `self` to a point.
    pub fn apply_inverse(&self, p: Point3f) -> Point3f {
        apply_to_point(&self.m_inv, p)
    }

    /// Apply the inverse of `self` to a vector.
    pub fn apply_inverse_vec(&self, v: Vec3f) -> Vec3f {
        apply_to_vec(&self.m_inv, v)
    }

    /// Apply the inverse of `self` to a ray.
    ///
    /// The parametric range of the ray is unchanged: both origin and
    /// direction are transformed, so any scaling is carried by the
    /// direction's length.
    pub fn apply_inverse_ray<'a>(&self, r: &Ray<'a>) -> Ray<'a> {
        Ray {
            o: self.apply_inverse(r.o),
            d: self.apply_inverse_vec(r.d),
            ..r.clone()
        }
    }

    /// Get the transform's matrix.
    pub fn matrix(&self) -> &SquareMatrix<4> {
        &self.m
    }

    /// Get the transform's inverse matrix.
    pub fn inverse_matrix(&self) -> &SquareMatrix<4> {
        &self.m_inv
    }
}

fn apply_to_point(m: &SquareMatrix<4>, p: Point3f) -> Point3f {
    let mut x = p.x * m[0][0] + p.y * m[0][1] + p.z * m[0][2] + m[0][3];
    let mut y = p.x * m[1][0] + p.y * m[1][1] + p.z * m[1][2] + m[1][3];
    let mut z = p.x * m[2][0] + p.y * m[2][1] + p.z * m[2][2] + m[2][3];
    let w = p.x * m[3][0] + p.y * m[3][1] + p.z * m[3][2] + m[3][3];

    if w != 1.0 {
        x /= w;
        y /= w;
        z /= w;
    }

    Point3f::new(x, y, z)
}

fn apply_to_vec(m: &SquareMatrix<4>, v: Vec3f) -> Vec3f {
    Vec3f::new(
        v.x * m[0][0] + v.y * m[0][1] + v.z * m[0][2],
        v.x * m[1][0] + v.y * m[1][1] + v.z * m[1][2],
        v.x * m[2][0] + v.y * m[2][1] + v.z * m[2][2],
    )
}

impl Mul for Transform {
    type Output = Self;

    /// Compute the composite of two transformations,
    /// equivalent to applying `rhs` then `self`.
    fn mul(self, rhs: Self) -> Self {
        let m = &self.m * &rhs.m;
        let m_inv = &rhs.m_inv * &self.m_inv;

        Self { m, m_inv }
    }
}

// Apply transform to a point.
overload!((t: ?Transform) * (p: Point3f) -> Point3f {
    apply_to_point(&t.m, p)
});

// Apply transform to a vector.
overload!((t: ?Transform) * (v: Vec3f) -> Vec3f {
    apply_to_vec(&t.m, v)
});

// Apply transform to a bounding box.
overload!((t: ?Transform) * (b: Bounds3f) -> Bounds3f {
    // Transform all eight corners and take their bounds
    let mut ret = Bounds3f::new_with_point(apply_to_point(&t.m, b.p_min));
    for corner in 1..8 {
        let p = Point3f::new(
            if corner & 1 != 0 { b.p_max.x } else { b.p_min.x },
            if corner & 2 != 0 { b.p_max.y } else { b.p_min.y },
            if corner & 4 != 0 { b.p_max.z } else { b.p_min.z },
        );
        ret = ret.union(Bounds3f::new_with_point(apply_to_point(&t.m, p)));
    }
    ret
});

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn inverse_round_trips_points() {
        let t = Transform::translate(Vec3f::new(1.0, -2.0, 0.5))
            * Transform::scale(2.0, 3.0, 4.0)
            * Transform::rotate_x(30.0);

        let p = Point3f::new(0.3, 0.7, -1.2);
        let back = t.apply_inverse(&t * p);
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, p.z, epsilon = 1e-5);
    }

    #[test]
    fn ray_parameterization_is_preserved() {
        let t = Transform::scale(2.0, 2.0, 2.0);
        let r = Ray::new(
            Point3f::new(0.0, 0.0, 0.0),
            Vec3f::new(1.0, 0.0, 0.0),
            0.0,
            None,
        );

        // The same parametric t reaches the transformed point
        let r_medium = t.apply_inverse_ray(&r);
        let p = r.at(1.5);
        let p_medium = r_medium.at(1.5);
        let expected = t.apply_inverse(p);
        assert_relative_eq!(p_medium.x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(p_medium.y, expected.y, epsilon = 1e-6);
        assert_relative_eq!(p_medium.z, expected.z, epsilon = 1e-6);
    }
}
