mod float_utility;
mod noise;
mod routines;
mod square_matrix;

pub use float_utility::{fast_exp, next_float_down, next_float_up, ONE_MINUS_EPSILON};
pub use noise::{dnoise, noise};
pub use routines::{evaluate_polynomial, find_interval, gamma, lerp, safe_acos, safe_asin, safe_sqrt};
pub use square_matrix::SquareMatrix;
