use log::warn;

use crate::channels::Mechanism;
use crate::compartments::{Connection, Point3, Region, Section, SectionId};
use crate::error::{CellError, CellResult};

pub trait Simulator {
    fn create_section(&mut self, name: String, region: Region) -> SectionId;

    fn section(&self, id: SectionId) -> Option<&Section>;

    fn section_mut(&mut self, id: SectionId) -> Option<&mut Section>;

    fn get(&self, id: SectionId) -> CellResult<&Section> {
        self.section(id).ok_or(CellError::UnknownSection(id))
    }

    fn get_mut(&mut self, id: SectionId) -> CellResult<&mut Section> {
        self.section_mut(id).ok_or(CellError::UnknownSection(id))
    }

    /// Attaches the 0 end of `child` to `parent` at `position` along the parent
    fn connect(&mut self, child: SectionId, parent: SectionId, position: f64) -> CellResult<()> {
        if !(0.0..=1.0).contains(&position) {
            return Err(CellError::InvalidPosition(position));
        }
        if child == parent {
            return Err(CellError::UnknownSection(parent));
        }
        self.get(parent)?;
        let section = self.get_mut(child)?;
        if section.parent().is_some() {
            warn!("Reconnecting {} to a new parent", section.name());
        }
        section.set_parent(Connection { parent, position });
        Ok(())
    }

    /// Detaches `id` from its parent; its own subtree stays attached to it
    fn disconnect(&mut self, id: SectionId) -> CellResult<Option<Connection>> {
        Ok(self.get_mut(id)?.clear_parent())
    }

    fn set_points(&mut self, id: SectionId, points: Vec<Point3>) -> CellResult<()> {
        self.get_mut(id)?.set_points(points);
        Ok(())
    }

    fn set_geometry(&mut self, id: SectionId, length: f64, diam: f64) -> CellResult<()> {
        let section = self.get_mut(id)?;
        section.set_length(length);
        section.set_diam(diam);
        Ok(())
    }

    fn set_nseg(&mut self, id: SectionId, nseg: u32) -> CellResult<()> {
        self.get_mut(id)?.set_nseg(nseg);
        Ok(())
    }

    fn insert(&mut self, id: SectionId, mechanism: Mechanism) -> CellResult<()> {
        self.get_mut(id)?.insert(mechanism);
        Ok(())
    }

    fn set_parameter(&mut self, id: SectionId, name: &str, value: f64) -> CellResult<()> {
        self.get_mut(id)?.set_parameter(name, value)
    }
}

/// Flat list of every section created so far
#[derive(Debug, Default, Clone)]
pub struct SectionRegistry {
    sections: Vec<Section>,
}

impl SectionRegistry {
    pub fn new() -> SectionRegistry {
        SectionRegistry::default()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionId, &Section)> {
        self.sections
            .iter()
            .enumerate()
            .map(|(idx, section)| (SectionId(idx), section))
    }

    pub fn find(&self, name: &str) -> Option<SectionId> {
        self.iter()
            .find(|(_, section)| section.name() == name)
            .map(|(id, _)| id)
    }
}

impl Simulator for SectionRegistry {
    fn create_section(&mut self, name: String, region: Region) -> SectionId {
        self.sections.push(Section::new(name, region));
        SectionId(self.sections.len() - 1)
    }

    fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.0)
    }

    fn section_mut(&mut self, id: SectionId) -> Option<&mut Section> {
        self.sections.get_mut(id.0)
    }
}
