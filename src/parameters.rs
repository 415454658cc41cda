use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::channels::ParameterTarget;
use crate::error::CellResult;
use crate::simulator::Simulator;

/// Which of the cell's section lists a group of values targets
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum RegionSelector {
    All,
    Axon,
    Dend,
    Soma,
}

impl RegionSelector {
    pub const APPLY_ORDER: [RegionSelector; 4] = [
        RegionSelector::All,
        RegionSelector::Axon,
        RegionSelector::Dend,
        RegionSelector::Soma,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterTable {
    pub all: BTreeMap<String, f64>,
    pub axon: BTreeMap<String, f64>,
    pub dend: BTreeMap<String, f64>,
    pub soma: BTreeMap<String, f64>,
}

fn table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(name, value)| ((*name).to_owned(), *value))
        .collect()
}

impl ParameterTable {
    /// Values fitted for Allen Cell Types model 472304539
    pub fn allen_472304539() -> ParameterTable {
        ParameterTable {
            all: table(&[("Ra", 65.22), ("e_pas", -85.15087382)]),
            axon: table(&[("cm", 4.65), ("g_pas", 3.09496515968e-05)]),
            dend: table(&[("cm", 4.65), ("g_pas", 2.90017977354e-06)]),
            soma: table(&[
                ("cm", 4.65),
                ("ena", 53.0),
                ("ek", -107.0),
                ("gbar_Ih", 0.000808783),
                ("gbar_NaV", 0.224945),
                ("gbar_Kd", 0.0),
                ("gbar_Kv2like", 0.634544),
                ("gbar_Kv3_1", 0.566199),
                ("gbar_K_T", 0.056532),
                ("gbar_Im_v2", 0.0186036),
                ("gbar_SK", 0.0),
                ("gbar_Ca_HVA", 0.000225844),
                ("gbar_Ca_LVA", 0.00574873),
                ("gamma_CaDynamics", 0.0249614),
                ("decay_CaDynamics", 465.515),
                ("g_pas", 1.3447e-05),
            ]),
        }
    }

    pub fn region(&self, selector: RegionSelector) -> &BTreeMap<String, f64> {
        match selector {
            RegionSelector::All => &self.all,
            RegionSelector::Axon => &self.axon,
            RegionSelector::Dend => &self.dend,
            RegionSelector::Soma => &self.soma,
        }
    }

    pub fn get(&self, selector: RegionSelector, name: &str) -> Option<f64> {
        self.region(selector).get(name).copied()
    }

    /// Every name must refer to a section property, an ion or a mechanism parameter
    pub fn validate(&self) -> CellResult<()> {
        for selector in RegionSelector::APPLY_ORDER {
            for name in self.region(selector).keys() {
                ParameterTarget::parse(name)?;
            }
        }
        Ok(())
    }

    pub fn apply(&self, cell: &Cell, sim: &mut dyn Simulator) -> CellResult<()> {
        for selector in RegionSelector::APPLY_ORDER {
            let values = self.region(selector);
            let sections = cell.sections(selector);
            for &id in sections {
                for (name, &value) in values {
                    sim.set_parameter(id, name, value)?;
                }
            }
            debug!(
                "Assigned {} parameters on {} sections ({:?})",
                values.len(),
                sections.len(),
                selector
            );
        }
        Ok(())
    }
}
