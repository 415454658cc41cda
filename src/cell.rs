use std::fmt;
use std::path::PathBuf;

use log::{info, warn};

use crate::channels::{Mechanism, ParameterTarget};
use crate::compartments::{Region, SectionId};
use crate::config::ModelConfig;
use crate::error::{CellError, CellResult};
use crate::morphology::{MorphologyLoader, MorphologyRequest, Offset, SwcLoader};
use crate::parameters::{ParameterTable, RegionSelector};
use crate::simulator::Simulator;

pub const MODEL_NAME: &str = "Neuron472304539";
pub const DEFAULT_LABEL: &str = "Neuron472304539_instance";
pub const MORPHOLOGY_FILE: &str = "Sst-IRES-Cre_Ai14_IVSCC_-173191.06.01.01_397902247_m.swc";

pub const AXON_STUB_SECTIONS: usize = 2;
pub const AXON_STUB_LENGTH: f64 = 30.0;
pub const AXON_STUB_DIAM: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct CellOptions {
    pub name: Option<String>,
    pub offset: Offset,
    /// Falls back to the configured morphology
    pub morphology: Option<PathBuf>,
}

impl Default for CellOptions {
    fn default() -> Self {
        CellOptions {
            name: Some(MODEL_NAME.to_owned()),
            offset: Offset::default(),
            morphology: None,
        }
    }
}

impl CellOptions {
    pub fn named(name: impl Into<String>) -> CellOptions {
        CellOptions {
            name: Some(name.into()),
            ..CellOptions::default()
        }
    }

    pub fn at(mut self, x: f64, y: f64, z: f64) -> CellOptions {
        self.offset = Offset::new(x, y, z);
        self
    }
}

/// Section ids of one built cell, grouped by region
#[derive(Debug, Clone)]
pub struct Cell {
    name: Option<String>,
    offset: Offset,
    pub soma: Vec<SectionId>,
    pub dend: Vec<SectionId>,
    pub axon: Vec<SectionId>,
    pub all: Vec<SectionId>,
}

impl Cell {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn sections(&self, selector: RegionSelector) -> &[SectionId] {
        match selector {
            RegionSelector::All => &self.all,
            RegionSelector::Axon => &self.axon,
            RegionSelector::Dend => &self.dend,
            RegionSelector::Soma => &self.soma,
        }
    }

    /// Looks a section up by name among this cell's sections only
    pub fn find(&self, sim: &dyn Simulator, name: &str) -> Option<SectionId> {
        self.all
            .iter()
            .copied()
            .find(|id| sim.section(*id).is_some_and(|section| section.name() == name))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_deref().unwrap_or(DEFAULT_LABEL))
    }
}

pub struct CellBuilder<L = SwcLoader> {
    loader: L,
    config: ModelConfig,
}

impl CellBuilder<SwcLoader> {
    pub fn new(config: ModelConfig) -> CellBuilder<SwcLoader> {
        CellBuilder {
            loader: SwcLoader::default(),
            config,
        }
    }
}

impl Default for CellBuilder<SwcLoader> {
    fn default() -> Self {
        CellBuilder::new(ModelConfig::default())
    }
}

impl<L: MorphologyLoader> CellBuilder<L> {
    pub fn with_loader(loader: L, config: ModelConfig) -> CellBuilder<L> {
        CellBuilder { loader, config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn build(&self, sim: &mut dyn Simulator, options: CellOptions) -> CellResult<Cell> {
        // Nothing is created in the simulator unless every value has somewhere to go
        self.config.parameters.validate()?;
        check_placement(&self.config.parameters)?;

        let request = MorphologyRequest {
            path: options
                .morphology
                .unwrap_or_else(|| self.config.morphology.clone()),
            offset: options.offset,
            use_axon: false,
        };
        let mut lists = self.loader.load(&request, sim)?;
        let soma_root = *lists.soma.first().ok_or(CellError::NoSoma)?;

        if !lists.axon.is_empty() {
            warn!(
                "Discarding {} reconstructed axon sections",
                lists.axon.len()
            );
            let dropped = std::mem::take(&mut lists.axon);
            for &id in &dropped {
                sim.disconnect(id)?;
            }
            lists.all.retain(|id| !dropped.contains(id));
        }

        let mut cell = Cell {
            name: options.name,
            offset: options.offset,
            soma: lists.soma,
            dend: lists.dend,
            axon: Vec::with_capacity(AXON_STUB_SECTIONS),
            all: lists.all,
        };

        self.attach_axon_stub(&mut cell, soma_root, sim)?;
        insert_mechanisms(&cell, soma_root, sim)?;
        self.discretize(&cell, sim)?;
        self.config.parameters.apply(&cell, sim)?;

        info!(
            "Built {} with {} sections ({} soma, {} dend, {} axon)",
            cell,
            cell.all.len(),
            cell.soma.len(),
            cell.dend.len(),
            cell.axon.len()
        );
        Ok(cell)
    }

    fn attach_axon_stub(
        &self,
        cell: &mut Cell,
        soma_root: SectionId,
        sim: &mut dyn Simulator,
    ) -> CellResult<()> {
        for idx in 0..AXON_STUB_SECTIONS {
            let id = sim.create_section(format!("axon[{idx}]"), Region::Axon);
            sim.set_geometry(id, AXON_STUB_LENGTH, AXON_STUB_DIAM)?;
            sim.set_nseg(id, 1)?;
            match cell.axon.last() {
                None => sim.connect(id, soma_root, 0.5)?,
                Some(&previous) => sim.connect(id, previous, 1.0)?,
            }
            cell.axon.push(id);
        }
        cell.all.extend_from_slice(&cell.axon);
        Ok(())
    }

    fn discretize(&self, cell: &Cell, sim: &mut dyn Simulator) -> CellResult<()> {
        let mut total = 0;
        for &id in &cell.all {
            let nseg = self.config.discretization.nseg(sim.get(id)?);
            sim.set_nseg(id, nseg)?;
            total += nseg;
        }
        info!("Discretized {} sections into {} compartments", cell.all.len(), total);
        Ok(())
    }
}

/// Outside the soma only `pas` is inserted, so nothing else may be assigned there
fn check_placement(table: &ParameterTable) -> CellResult<()> {
    for (selector, label) in [
        (RegionSelector::All, "all"),
        (RegionSelector::Axon, "axon"),
        (RegionSelector::Dend, "dend"),
    ] {
        for name in table.region(selector).keys() {
            match ParameterTarget::parse(name)? {
                ParameterTarget::AxialResistance
                | ParameterTarget::Capacitance
                | ParameterTarget::Mechanism(Mechanism::Passive, _) => {}
                ParameterTarget::Mechanism(mechanism, _) => {
                    return Err(CellError::MechanismNotInserted {
                        section: label.to_owned(),
                        mechanism: mechanism.name().to_owned(),
                    });
                }
                ParameterTarget::Reversal(ion) => {
                    return Err(CellError::IonNotPresent {
                        section: label.to_owned(),
                        ion: ion.name().to_owned(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn insert_mechanisms(cell: &Cell, soma_root: SectionId, sim: &mut dyn Simulator) -> CellResult<()> {
    for &id in &cell.all {
        sim.insert(id, Mechanism::Passive)?;
    }
    for mechanism in Mechanism::SOMATIC {
        sim.insert(soma_root, mechanism)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::RegionLists;
    use crate::simulator::SectionRegistry;

    fn builder() -> CellBuilder {
        let config = ModelConfig {
            morphology: PathBuf::from("data/basic.swc"),
            ..ModelConfig::default()
        };
        CellBuilder::new(config)
    }

    #[test]
    fn test_display() {
        let mut registry = SectionRegistry::new();
        let cell = builder().build(&mut registry, CellOptions::default()).unwrap();
        assert_eq!(cell.to_string(), MODEL_NAME);

        let cell = builder()
            .build(&mut registry, CellOptions::named("pyramid"))
            .unwrap();
        assert_eq!(cell.to_string(), "pyramid");

        let unnamed = CellOptions {
            name: None,
            ..CellOptions::default()
        };
        let cell = builder().build(&mut registry, unnamed).unwrap();
        assert_eq!(cell.to_string(), DEFAULT_LABEL);
    }

    #[test]
    fn test_reconstructed_axon_is_replaced() {
        let mut registry = SectionRegistry::new();
        let cell = builder().build(&mut registry, CellOptions::default()).unwrap();
        // basic.swc: soma, two dendrites, one two-point axon
        assert_eq!(cell.soma.len(), 1);
        assert_eq!(cell.dend.len(), 2);
        assert_eq!(cell.axon.len(), 2);
        for &id in &cell.axon {
            let axon = registry.get(id).unwrap();
            assert_eq!(axon.length(), AXON_STUB_LENGTH);
            assert_eq!(axon.diam(), AXON_STUB_DIAM);
        }
        assert_eq!(registry.len(), cell.all.len());
    }

    #[test]
    fn test_missing_morphology_is_fatal() {
        let mut registry = SectionRegistry::new();
        let options = CellOptions {
            morphology: Some(PathBuf::from("data/nope.swc")),
            ..CellOptions::default()
        };
        let err = builder().build(&mut registry, options).unwrap_err();
        assert!(err.is_load_error());
    }

    #[test]
    fn test_misplaced_parameters_rejected_before_building() {
        let mut config = ModelConfig {
            morphology: PathBuf::from("data/basic.swc"),
            ..ModelConfig::default()
        };
        config.parameters.dend.insert("gbar_NaV".to_owned(), 0.1);
        let mut registry = SectionRegistry::new();
        let err = CellBuilder::new(config.clone())
            .build(&mut registry, CellOptions::default())
            .unwrap_err();
        assert!(matches!(err, CellError::MechanismNotInserted { .. }));
        assert!(registry.is_empty());

        config.parameters.dend.clear();
        config.parameters.axon.insert("ena".to_owned(), 50.0);
        let err = CellBuilder::new(config)
            .build(&mut registry, CellOptions::default())
            .unwrap_err();
        assert!(matches!(err, CellError::IonNotPresent { .. }));
        assert!(registry.is_empty());
    }

    /// Loads the reconstructed axon regardless of what the builder asks for
    struct AxonKeepingLoader(SwcLoader);

    impl MorphologyLoader for AxonKeepingLoader {
        fn load(
            &self,
            request: &MorphologyRequest,
            sim: &mut dyn Simulator,
        ) -> CellResult<RegionLists> {
            let request = MorphologyRequest {
                use_axon: true,
                ..request.clone()
            };
            self.0.load(&request, sim)
        }
    }

    #[test]
    fn test_loaded_axon_is_detached() {
        let config = ModelConfig {
            morphology: PathBuf::from("data/neuron.swc"),
            ..ModelConfig::default()
        };
        let mut registry = SectionRegistry::new();
        let cell = CellBuilder::with_loader(AxonKeepingLoader(SwcLoader::default()), config)
            .build(&mut registry, CellOptions::default())
            .unwrap();

        assert_eq!(cell.axon.len(), AXON_STUB_SECTIONS);
        assert_eq!(cell.all.len(), 7);
        // the reconstructed axon stays in the simulator, cut off from the tree
        assert_eq!(registry.len(), 8);
        let stale: Vec<SectionId> = registry
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !cell.all.contains(id))
            .collect();
        assert_eq!(stale.len(), 1);
        let stale = registry.get(stale[0]).unwrap();
        assert_eq!(stale.region(), Region::Axon);
        assert!(stale.parent().is_none());
        for &id in &cell.all {
            if let Some(connection) = registry.get(id).unwrap().parent() {
                assert!(cell.all.contains(&connection.parent));
            }
        }

        let first = cell.find(&registry, "axon[0]").unwrap();
        assert_eq!(first, cell.axon[0]);
        let stub = registry.get(first).unwrap();
        assert_eq!(stub.length(), AXON_STUB_LENGTH);
        assert_eq!(stub.parent().unwrap().parent, cell.soma[0]);
        assert_eq!(stub.parameter("g_pas"), Some(3.09496515968e-05));
        assert_eq!(cell.find(&registry, "axon[2]"), None);
    }
}
