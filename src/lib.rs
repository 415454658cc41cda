pub mod cell;
pub mod channels;
pub mod compartments;
pub mod config;
pub mod error;
pub mod morphology;
pub mod parameters;
pub mod simulator;
pub mod swc_reader;

#[cfg(feature = "python")]
mod python;

pub use cell::{Cell, CellBuilder, CellOptions};
pub use config::{ModelConfig, load_config};
pub use error::{CellError, CellResult};
pub use simulator::{SectionRegistry, Simulator};

/// A Python module implemented in Rust.
#[cfg(feature = "python")]
#[pyo3::pymodule]
mod allen_cell_rs {
    #[pymodule_export]
    use crate::python::PyNeuron;
}
