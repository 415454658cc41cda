use std::path::PathBuf;

use pyo3::exceptions::{PyIOError, PyKeyError, PyValueError};
use pyo3::prelude::*;

use crate::cell::{Cell, CellBuilder, CellOptions, MODEL_NAME};
use crate::error::CellError;
use crate::morphology::Offset;
use crate::simulator::{SectionRegistry, Simulator};

impl From<CellError> for PyErr {
    fn from(err: CellError) -> PyErr {
        match err {
            CellError::MorphologyIo { .. } | CellError::ConfigIo { .. } => {
                PyIOError::new_err(err.to_string())
            }
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// The built cell together with the sections it lives in
#[pyclass(name = "Neuron472304539")]
pub struct PyNeuron {
    cell: Cell,
    registry: SectionRegistry,
}

#[pymethods]
impl PyNeuron {
    #[new]
    #[pyo3(signature = (name=Some(MODEL_NAME.to_owned()), x=0.0, y=0.0, z=0.0, morphology=None))]
    fn new(
        name: Option<String>,
        x: f64,
        y: f64,
        z: f64,
        morphology: Option<PathBuf>,
    ) -> PyResult<Self> {
        let options = CellOptions {
            name,
            offset: Offset::new(x, y, z),
            morphology,
        };
        let mut registry = SectionRegistry::new();
        let cell = CellBuilder::default().build(&mut registry, options)?;
        Ok(PyNeuron { cell, registry })
    }

    fn __str__(&self) -> String {
        self.cell.to_string()
    }

    fn section_names(&self) -> Vec<String> {
        self.cell
            .all
            .iter()
            .filter_map(|id| self.registry.section(*id))
            .map(|section| section.name().to_owned())
            .collect()
    }

    fn nseg(&self, section: &str) -> PyResult<u32> {
        let id = self.find(section)?;
        Ok(self.registry.get(id)?.nseg())
    }

    fn parameter(&self, section: &str, name: &str) -> PyResult<f64> {
        let id = self.find(section)?;
        self.registry
            .get(id)?
            .parameter(name)
            .ok_or_else(|| PyKeyError::new_err(format!("{name} is not set on {section}")))
    }
}

impl PyNeuron {
    fn find(&self, section: &str) -> PyResult<crate::compartments::SectionId> {
        self.cell
            .find(&self.registry, section)
            .ok_or_else(|| PyKeyError::new_err(format!("no section named {section}")))
    }
}
