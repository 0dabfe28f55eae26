pub mod routines;
pub mod spectrum;

pub use routines::{exponential_pdf, sample_exponential};
