use num_traits::{Bounded, Num};

use crate::{self as turbid, math::gamma, math::lerp, Float};

use super::{
    point3::{Point3, Point3f},
    vec3::{Vec3, Vec3f},
};

/// A 3D axis-aligned bounding box (AABB).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds3<T> {
    pub p_min: Point3<T>,
    pub p_max: Point3<T>,
}

pub type Bounds3i = Bounds3<i32>;
pub type Bounds3f = Bounds3<turbid::Float>;

impl<T: Num + PartialOrd + Copy> Bounds3<T> {
    /// Construct a new bounding box with two corner points.
    ///
    /// The min and max points are determined by the component-wise mins and maxes
    /// of the given points.
    pub fn new(p1: Point3<T>, p2: Point3<T>) -> Self {
        Self {
            p_min: p1.min(p2),
            p_max: p1.max(p2),
        }
    }

    /// Construct a new bounding box that consists of a single point.
    pub fn new_with_point(p: Point3<T>) -> Self {
        Self { p_min: p, p_max: p }
    }

    /// Obtain the vector from the min to the max point of `self`
    /// (which is along a diagonal line across the box).
    pub fn diagonal(&self) -> Vec3<T> {
        self.p_max - self.p_min
    }

    /// Construct the union of `self` and `other`.
    /// Specifically, a box using the min and max points of the two.
    pub fn union(self, other: Self) -> Self {
        Self {
            p_min: self.p_min.min(other.p_min),
            p_max: self.p_max.max(other.p_max),
        }
    }

    /// Construct a bounding box consisting of the intersection of `self` and `other`.
    pub fn intersect(self, other: Self) -> Self {
        Self {
            p_min: self.p_min.max(other.p_min),
            p_max: self.p_max.min(other.p_max),
        }
    }

    /// Returns `true` if `p` is inside `self`, with all bounds inclusive.
    pub fn contains(&self, p: Point3<T>) -> bool {
        let x_inside = p.x >= self.p_min.x && p.x <= self.p_max.x;
        let y_inside = p.y >= self.p_min.y && p.y <= self.p_max.y;
        let z_inside = p.z >= self.p_min.z && p.z <= self.p_max.z;

        x_inside && y_inside && z_inside
    }

    /// Returns `true` if `p` is inside `self`, with the upper bound exclusive.
    pub fn contains_exclusive(&self, p: Point3<T>) -> bool {
        let x_inside = p.x >= self.p_min.x && p.x < self.p_max.x;
        let y_inside = p.y >= self.p_min.y && p.y < self.p_max.y;
        let z_inside = p.z >= self.p_min.z && p.z < self.p_max.z;

        x_inside && y_inside && z_inside
    }

    /// Returns `true` if the box contains no space at all.
    pub fn is_empty(&self) -> bool {
        self.p_min.x >= self.p_max.x || self.p_min.y >= self.p_max.y || self.p_min.z >= self.p_max.z
    }
}

impl<T: Bounded + Copy> Bounds3<T> {
    /// Construct an empty box.
    ///
    /// This is done by setting the extents to an invalid config,
    /// such that any operations with it would yield the expected result.
    pub fn empty() -> Self {
        let min_val = T::min_value();
        let max_val = T::max_value();

        Self {
            p_min: Point3::new(max_val, max_val, max_val),
            p_max: Point3::new(min_val, min_val, min_val),
        }
    }
}

impl Bounds3f {
    /// Linearly interpolate between the min and max points of `self`, per axis.
    ///
    /// Extrapolates for components of `t` `<0` or `>1`.
    pub fn lerp(&self, t: Point3f) -> Point3f {
        Point3::new(
            lerp(self.p_min.x, self.p_max.x, t.x),
            lerp(self.p_min.y, self.p_max.y, t.y),
            lerp(self.p_min.z, self.p_max.z, t.z),
        )
    }

    /// Returns the position of `p` relative to the box corners:
    /// `(0, 0, 0)` at `p_min`, `(1, 1, 1)` at `p_max`.
    pub fn offset(&self, p: Point3f) -> Vec3f {
        let mut o = p - self.p_min;
        if self.p_max.x > self.p_min.x {
            o.x /= self.p_max.x - self.p_min.x;
        }
        if self.p_max.y > self.p_min.y {
            o.y /= self.p_max.y - self.p_min.y;
        }
        if self.p_max.z > self.p_min.z {
            o.z /= self.p_max.z - self.p_min.z;
        }

        o
    }

    /// Intersect the ray `(o, d)` against the box with the slab method,
    /// over the parametric range `[0, t_max]`.
    ///
    /// Returns the parametric overlap `(t0, t1)` with the box,
    /// or `None` if the ray misses it.
    pub fn intersect_p(&self, o: Point3f, d: Vec3f, t_max: Float) -> Option<(Float, Float)> {
        let mut t0: Float = 0.0;
        let mut t1 = t_max;

        for axis in 0..3 {
            // Update interval for this axis' bounding box slab
            let inv_ray_dir = 1.0 / d[axis];
            let mut t_near = (self.p_min[axis] - o[axis]) * inv_ray_dir;
            let mut t_far = (self.p_max[axis] - o[axis]) * inv_ray_dir;
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }

            // Widen t_far to keep the intersection conservative under rounding
            t_far *= 1.0 + 2.0 * gamma(3);

            t0 = if t_near > t0 { t_near } else { t0 };
            t1 = if t_far < t1 { t_far } else { t1 };
            if t0 > t1 {
                return None;
            }
        }

        Some((t0, t1))
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn offset_maps_corners_to_unit_cube() {
        let b = Bounds3f::new(Point3f::new(-1.0, 0.0, 2.0), Point3f::new(3.0, 2.0, 4.0));

        let at_min = b.offset(b.p_min);
        let at_max = b.offset(b.p_max);
        assert_relative_eq!(at_min.x, 0.0);
        assert_relative_eq!(at_min.y, 0.0);
        assert_relative_eq!(at_min.z, 0.0);
        assert_relative_eq!(at_max.x, 1.0);
        assert_relative_eq!(at_max.y, 1.0);
        assert_relative_eq!(at_max.z, 1.0);
    }

    #[test]
    fn intersect_p_clips_to_box() {
        let b = Bounds3f::new(Point3f::new(0.0, 0.0, 0.0), Point3f::new(1.0, 1.0, 1.0));

        let hit = b
            .intersect_p(
                Point3f::new(-1.0, 0.5, 0.5),
                Vec3f::new(1.0, 0.0, 0.0),
                3.0,
            )
            .unwrap();
        assert_relative_eq!(hit.0, 1.0, max_relative = 1e-5);
        assert_relative_eq!(hit.1, 2.0, max_relative = 1e-4);

        // A ray pointing away misses entirely
        assert!(b
            .intersect_p(
                Point3f::new(-1.0, 0.5, 0.5),
                Vec3f::new(-1.0, 0.0, 0.0),
                3.0,
            )
            .is_none());
    }

    #[test]
    fn union_covers_both() {
        let a = Bounds3f::new(Point3f::new(0.0, 0.0, 0.0), Point3f::new(1.0, 1.0, 1.0));
        let b = Bounds3f::new(Point3f::new(0.5, -1.0, 0.0), Point3f::new(2.0, 0.5, 1.0));
        let u = a.union(b);

        assert_eq!(u.p_min, Point3f::new(0.0, -1.0, 0.0));
        assert_eq!(u.p_max, Point3f::new(2.0, 1.0, 1.0));
    }
}
