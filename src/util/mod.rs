mod error;
mod rng;

pub use error::{Error, FileLoc};
pub use rng::Rng;
