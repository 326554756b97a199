pub mod advection;
pub mod boundary;
pub mod collider;
pub mod d2;
pub mod d3;
pub mod error;
pub mod fdm;
pub mod field;
pub mod global_variables;
pub mod grid;
pub mod io;
pub mod pressure;
pub mod simulation;
pub mod solver;

pub use global_variables::*;

/// Cell classification used by the pressure systems.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CellMarker {
    #[default]
    Fluid = 0,
    Air = 1,
    Boundary = 2,
}
