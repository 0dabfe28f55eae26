mod bounds3;
mod point2;
mod point3;
mod ray;
mod transform;
mod vec3;

pub use bounds3::{Bounds3, Bounds3f, Bounds3i};
pub use point2::{Point2, Point2f};
pub use point3::{Point3, Point3f, Point3i};
pub use ray::Ray;
pub use transform::Transform;
pub use vec3::{Vec3, Vec3f, Vec3i};
