use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Sub, SubAssign};

use num_traits::{real::Real, Num};

use crate as turbid;

use super::vec3::Vec3;

/// A 3D point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

pub type Point3i = Point3<i32>;
pub type Point3f = Point3<turbid::Float>;

impl<T> Point3<T> {
    /// Construct a new point with given elements.
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

impl<T: Num + Copy> Point3<T> {
    /// The squared distance between `self` and `p2`.
    pub fn distance_squared(self, p2: Self) -> T {
        (self - p2).length_squared()
    }

    /// Applies floor to each component.
    pub fn floor(self) -> Self
    where
        T: Real,
    {
        Self {
            x: self.x.floor(),
            y: self.y.floor(),
            z: self.z.floor(),
        }
    }

    /// Returns the component-wise minimum of `self` and `other`.
    pub fn min(self, other: Self) -> Self
    where
        T: PartialOrd,
    {
        Self {
            x: if self.x < other.x { self.x } else { other.x },
            y: if self.y < other.y { self.y } else { other.y },
            z: if self.z < other.z { self.z } else { other.z },
        }
    }

    /// Returns the component-wise maximum of `self` and `other`.
    pub fn max(self, other: Self) -> Self
    where
        T: PartialOrd,
    {
        Self {
            x: if self.x > other.x { self.x } else { other.x },
            y: if self.y > other.y { self.y } else { other.y },
            z: if self.z > other.z { self.z } else { other.z },
        }
    }
}

impl Point3f {
    /// The distance between `self` and `p2`.
    pub fn distance(self, p2: Self) -> turbid::Float {
        (self - p2).length()
    }

    /// Returns true if any component is NaN.
    pub fn has_nans(self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }
}

impl<T> Index<usize> for Point3<T> {
    type Output = T;

    /// Index `self`'s elements by 0, 1, 2.
    fn index(&self, index: usize) -> &Self::Output {
        match index {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Index out of bounds for Point3"),
        }
    }
}

impl<T> IndexMut<usize> for Point3<T> {
    /// Index `self`'s elements by 0, 1, 2, mutably.
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        match index {
            0 => &mut self.x,
            1 => &mut self.y,
            2 => &mut self.z,
            _ => panic!("Index out of bounds for Point3"),
        }
    }
}

impl<T: Add<Output = T>> Add<Vec3<T>> for Point3<T> {
    type Output = Self;

    /// Add a vector to `self` to get a new point of same type.
    fn add(self, rhs: Vec3<T>) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl<T> AddAssign<Vec3<T>> for Point3<T>
where
    Self: Add<Vec3<T>, Output = Self> + Copy,
{
    /// Add assign a vector to `self`.
    fn add_assign(&mut self, rhs: Vec3<T>) {
        *self = *self + rhs
    }
}

impl<T: Sub<Output = T>> Sub for Point3<T> {
    type Output = Vec3<T>;

    /// Subtract two points to get the vector between them.
    fn sub(self, rhs: Self) -> Self::Output {
        Self::Output {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl<T: Sub<Output = T>> Sub<Vec3<T>> for Point3<T> {
    type Output = Self;

    /// Subtract a vector from `self` to get a new point.
    fn sub(self, rhs: Vec3<T>) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl<T> SubAssign<Vec3<T>> for Point3<T>
where
    Self: Sub<Vec3<T>, Output = Self> + Copy,
{
    /// Subtract assign a vector from `self`.
    fn sub_assign(&mut self, rhs: Vec3<T>) {
        *self = *self - rhs
    }
}

impl<T, U, V> Mul<U> for Point3<T>
where
    T: Mul<U, Output = V>,
    U: Copy,
{
    type Output = Point3<V>;

    /// Multiply a point by a scalar, returning a point.
    fn mul(self, rhs: U) -> Self::Output {
        Self::Output {
            x: self.x * rhs,
            y: self.y * rhs,
            z: self.z * rhs,
        }
    }
}

impl Mul<Point3f> for turbid::Float {
    type Output = Point3f;

    /// Multiply a point by a float scalar, returning a new
    /// point of same type.
    fn mul(self, rhs: Point3f) -> Point3f {
        rhs * self
    }
}

impl<T, U> Div<U> for Point3<T>
where
    T: Div<U>,
    U: Copy,
{
    type Output = Point3<<T as Div<U>>::Output>;

    /// Divide a point by a scalar, returning a new point.
    fn div(self, rhs: U) -> Self::Output {
        Self::Output {
            x: self.x / rhs,
            y: self.y / rhs,
            z: self.z / rhs,
        }
    }
}

impl<T> From<Vec3<T>> for Point3<T> {
    fn from(value: Vec3<T>) -> Self {
        Self {
            x: value.x,
            y: value.y,
            z: value.z,
        }
    }
}
