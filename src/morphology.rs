use std::collections::HashMap;
use std::path::PathBuf;

use log::{debug, info};

use crate::compartments::{Point3, Region, SectionId};
use crate::error::{CellError, CellResult};
use crate::simulator::Simulator;
use crate::swc_reader::{Node, StructureIdentifier, SwcReaderOptions, SwcTree, swc_reader};

/// Spatial shift applied to every loaded point
#[derive(Debug, Default, PartialEq, Copy, Clone)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Offset {
    pub fn new(x: f64, y: f64, z: f64) -> Offset {
        Offset { x, y, z }
    }

    fn apply(&self, point: Point3) -> Point3 {
        Point3::new(point.x + self.x, point.y + self.y, point.z + self.z, point.diam)
    }
}

#[derive(Debug, Clone)]
pub struct MorphologyRequest {
    pub path: PathBuf,
    pub offset: Offset,
    pub use_axon: bool,
}

/// Sections created by a load, grouped per region
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RegionLists {
    pub soma: Vec<SectionId>,
    pub dend: Vec<SectionId>,
    pub axon: Vec<SectionId>,
    pub all: Vec<SectionId>,
}

impl RegionLists {
    pub fn region(&self, region: Region) -> &[SectionId] {
        match region {
            Region::Soma => &self.soma,
            Region::Dend => &self.dend,
            Region::Axon => &self.axon,
        }
    }

    fn push(&mut self, region: Region, id: SectionId) {
        match region {
            Region::Soma => self.soma.push(id),
            Region::Dend => self.dend.push(id),
            Region::Axon => self.axon.push(id),
        }
        self.all.push(id);
    }

    fn next_name(&self, region: Region) -> String {
        format!("{}[{}]", region.label(), self.region(region).len())
    }
}

pub trait MorphologyLoader {
    fn load(&self, request: &MorphologyRequest, sim: &mut dyn Simulator) -> CellResult<RegionLists>;
}

/// Loads SWC files through [`swc_reader`]
#[derive(Debug, Default, Clone)]
pub struct SwcLoader {
    pub reader: SwcReaderOptions,
}

impl MorphologyLoader for SwcLoader {
    fn load(&self, request: &MorphologyRequest, sim: &mut dyn Simulator) -> CellResult<RegionLists> {
        let tree = swc_reader(&request.path, &self.reader)?;
        let lists = build_sections(&tree, request, sim)?;
        info!(
            "Loaded {}: {} soma, {} dend, {} axon sections",
            request.path.display(),
            lists.soma.len(),
            lists.dend.len(),
            lists.axon.len()
        );
        Ok(lists)
    }
}

fn region_of(kind: StructureIdentifier) -> Region {
    match kind {
        StructureIdentifier::Soma => Region::Soma,
        StructureIdentifier::Axon => Region::Axon,
        _ => Region::Dend,
    }
}

/// Soma points as a cable: single point -> cylinder along y with L = diam,
/// three-point soma -> span between the two outer points, otherwise the chain itself
fn soma_points(tree: &SwcTree, soma: &[&Node]) -> Vec<Point3> {
    match soma {
        [only] => {
            let r = only.radius;
            vec![
                Point3::new(only.x_pos, only.y_pos - r, only.z_pos, 2.0 * r),
                Point3::new(only.x_pos, only.y_pos + r, only.z_pos, 2.0 * r),
            ]
        }
        [center, a, b]
            if tree.parent_of(a).map(|p| p.node_id) == Some(center.node_id)
                && tree.parent_of(b).map(|p| p.node_id) == Some(center.node_id) =>
        {
            let diam = 2.0 * center.radius;
            vec![
                Point3::new(a.x_pos, a.y_pos, a.z_pos, diam),
                Point3::new(b.x_pos, b.y_pos, b.z_pos, diam),
            ]
        }
        _ => soma.iter().map(|node| node.point()).collect(),
    }
}

pub(crate) fn build_sections(
    tree: &SwcTree,
    request: &MorphologyRequest,
    sim: &mut dyn Simulator,
) -> CellResult<RegionLists> {
    let mut lists = RegionLists::default();

    let soma: Vec<&Node> = tree
        .nodes
        .iter()
        .filter(|node| node.structured_identifier == StructureIdentifier::Soma)
        .collect();
    if soma.is_empty() {
        return Err(CellError::NoSoma);
    }
    let soma_id = sim.create_section(lists.next_name(Region::Soma), Region::Soma);
    let points = soma_points(tree, &soma)
        .into_iter()
        .map(|p| request.offset.apply(p))
        .collect();
    sim.set_points(soma_id, points)?;
    lists.push(Region::Soma, soma_id);

    // node id -> section that ends at that node
    let mut section_of: HashMap<u64, SectionId> =
        soma.iter().map(|node| (node.node_id, soma_id)).collect();

    for node in &tree.nodes {
        let region = region_of(node.structured_identifier);
        if region == Region::Soma || section_of.contains_key(&node.node_id) {
            continue;
        }
        if region == Region::Axon && !request.use_axon {
            continue;
        }
        let Some(parent) = tree.parent_of(node) else {
            continue;
        };
        // Parent lives in a skipped subtree
        let Some(&parent_section) = section_of.get(&parent.node_id) else {
            continue;
        };

        // Walk the unbranched run starting here
        let mut run = vec![*node];
        let mut current = *node;
        while let [only_child] = tree.children_of(current.node_id) {
            let child = tree.nodes[*only_child as usize];
            if region_of(child.structured_identifier) != region {
                break;
            }
            run.push(child);
            current = child;
        }

        let mut points = Vec::with_capacity(run.len() + 1);
        let mut start = parent.point();
        start.diam = node.radius * 2.0;
        points.push(request.offset.apply(start));
        points.extend(run.iter().map(|n| request.offset.apply(n.point())));

        let id = sim.create_section(lists.next_name(region), region);
        sim.set_points(id, points)?;
        let position = if parent_section == soma_id { 0.5 } else { 1.0 };
        sim.connect(id, parent_section, position)?;
        lists.push(region, id);

        for member in &run {
            section_of.insert(member.node_id, id);
        }
        debug!(
            "{} covers {} nodes",
            sim.get(id)?.name(),
            run.len()
        );
    }

    Ok(lists)
}
