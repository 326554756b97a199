//! Two-dimensional cases.

use crate::simulation;

pub const D: usize = 2;

pub type Simulation = simulation::Simulation<D>;

pub type FluidDomain = simulation::FluidDomain<D>;

pub fn run() -> anyhow::Result<()> {
    simulation::run::<D>(false)
}

pub fn run_benchmark() -> anyhow::Result<()> {
    simulation::run::<D>(true)
}
