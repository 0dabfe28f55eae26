use crate::{media::MediumEnum, Float};

use super::{Point3f, Vec3f};

#[derive(Clone, Debug, Default)]
pub struct Ray<'a> {
    /// Origin of the ray.
    pub o: Point3f,
    /// Direction of the ray. Not necessarily normalized.
    pub d: Vec3f,
    pub time: Float,
    pub medium: Option<&'a MediumEnum>,
}

impl<'a> Ray<'a> {
    pub fn new(o: Point3f, d: Vec3f, time: Float, medium: Option<&'a MediumEnum>) -> Self {
        Self { o, d, time, medium }
    }
}

impl Ray<'_> {
    /// The position along the ray at parametric distance `t`.
    pub fn at(&self, t: Float) -> Point3f {
        self.o + self.d * t
    }
}
