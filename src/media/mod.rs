mod cloud;
mod cuboid;
mod grid;
mod medium;
mod medium_interface;
mod phase_function;
mod preset;
mod sparse;

pub use cloud::CloudMediumProvider;
pub use cuboid::{CuboidMedium, CuboidProvider, ProviderEnum};
pub use grid::{SampledGrid, UniformGridMediumProvider};
pub use medium::{
    create_medium, HomogeneousMedium, MediumDensity, MediumEnum, MediumInteraction,
    MediumProperties, MediumSample,
};
pub use medium_interface::MediumInterface;
pub use phase_function::{
    henyey_greenstein, HGPhaseFunction, PhaseFunction, PhaseFunctionEnum, PhaseFunctionSample,
};
pub use preset::scattering_preset;
pub use sparse::{read_grids, write_grids, SparseFloatGrid, SparseGridMediumProvider};
