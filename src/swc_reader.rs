use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::compartments::Point3;
use crate::error::{CellError, CellResult};

/// We use the CNIC spec, as per: http://www.neuronland.org/NLMorphologyConverter/MorphologyFormats/SWC/Spec.html
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub enum StructureIdentifier {
    Undefined,
    Soma,
    Axon,
    BasalDendrite,
    ApicalDendrite,
    ForkPoint,
    EndPoint,
    Custom(u8),
}

impl From<u8> for StructureIdentifier {
    fn from(v: u8) -> Self {
        match v {
            0 => StructureIdentifier::Undefined,
            1 => StructureIdentifier::Soma,
            2 => StructureIdentifier::Axon,
            3 => StructureIdentifier::BasalDendrite,
            4 => StructureIdentifier::ApicalDendrite,
            5 => StructureIdentifier::ForkPoint,
            6 => StructureIdentifier::EndPoint,
            other => StructureIdentifier::Custom(other),
        }
    }
}

impl From<StructureIdentifier> for u8 {
    fn from(v: StructureIdentifier) -> Self {
        match v {
            StructureIdentifier::Undefined => 0,
            StructureIdentifier::Soma => 1,
            StructureIdentifier::Axon => 2,
            StructureIdentifier::BasalDendrite => 3,
            StructureIdentifier::ApicalDendrite => 4,
            StructureIdentifier::ForkPoint => 5,
            StructureIdentifier::EndPoint => 6,
            StructureIdentifier::Custom(other) => other,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Node {
    pub node_id: u64,
    pub structured_identifier: StructureIdentifier,
    pub x_pos: f64,
    pub y_pos: f64,
    pub z_pos: f64,
    pub radius: f64,
    pub parent_id: u64,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_id == self.node_id
    }

    pub fn point(&self) -> Point3 {
        Point3::new(self.x_pos, self.y_pos, self.z_pos, self.radius * 2.0)
    }
}

impl Eq for Node {}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id
    }
}
impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node_id.hash(state);
    }
}

#[derive(Debug, Clone)]
pub struct SwcReaderOptions {
    /// Log zero-radius points
    pub emit_warnings: bool,
    /// Zero-radius points on anything but an endpoint abort the read
    pub strict: bool,
    /// Where to write the processed, sorted file (comments stripped)
    pub write_path: Option<PathBuf>,
}

impl Default for SwcReaderOptions {
    fn default() -> Self {
        SwcReaderOptions {
            emit_warnings: true,
            strict: false,
            write_path: None,
        }
    }
}

/// Sorted skeleton: `nodes[i].node_id == i`, parents always precede children
#[derive(Debug, Clone)]
pub struct SwcTree {
    pub nodes: Vec<Node>,
    /// parent id -> child ids, the root is not its own child
    pub children: HashMap<u64, Vec<u64>>,
}

impl SwcTree {
    pub fn children_of(&self, node_id: u64) -> &[u64] {
        self.children
            .get(&node_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn parent_of(&self, node: &Node) -> Option<&Node> {
        if node.is_root() {
            None
        } else {
            self.nodes.get(node.parent_id as usize)
        }
    }
}

// parent is None for the root (-1 in the file)
struct RawNode {
    node: Node,
    parent: Option<u64>,
}

fn parse_line(line_no: usize, line: &str) -> CellResult<RawNode> {
    let malformed = |reason: String| CellError::MalformedSwc {
        line: line_no,
        reason,
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return Err(malformed(format!("expected 7 fields, found {}", fields.len())));
    }

    let float = |idx: usize, what: &str| {
        fields[idx]
            .parse::<f64>()
            .map_err(|e| malformed(format!("{what} '{}': {e}", fields[idx])))
    };
    let node_id = fields[0]
        .parse::<u64>()
        .map_err(|e| malformed(format!("id '{}': {e}", fields[0])))?;
    let structured_identifier: StructureIdentifier = fields[1]
        .parse::<u8>()
        .map_err(|e| malformed(format!("type '{}': {e}", fields[1])))?
        .into();
    let parent_raw = fields[6]
        .parse::<i64>()
        .map_err(|e| malformed(format!("parent '{}': {e}", fields[6])))?;

    Ok(RawNode {
        node: Node {
            node_id,
            structured_identifier,
            x_pos: float(2, "x")?,
            y_pos: float(3, "y")?,
            z_pos: float(4, "z")?,
            radius: float(5, "radius")?,
            parent_id: 0,
        },
        parent: u64::try_from(parent_raw).ok(),
    })
}

/// Reads in swc from `read_path` and returns the sorted skeleton
///   If `options.write_path` is set, we spit out the processed, sorted, file there,
///   with the comments at the start stripped out
/// Optionally emits warnings for:
///   - zero-radius points
/// Strict mode:
///   - a zero-radius non-endpoint terminates the read
///
/// Based on https://en.wikipedia.org/wiki/Breadth-first_search
/// For Flywire.ai skeletons, seems they only mark out:
/// # 0 = undefined, 1 = soma, 5 = fork point, 6 = end point
pub fn swc_reader(read_path: &Path, options: &SwcReaderOptions) -> CellResult<SwcTree> {
    let content = fs::read_to_string(read_path).map_err(|source| CellError::MorphologyIo {
        path: read_path.to_path_buf(),
        source,
    })?;
    parse_swc(&content, options)
}

pub fn parse_swc(content: &str, options: &SwcReaderOptions) -> CellResult<SwcTree> {
    let raw_nodes: Vec<RawNode> = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            let raw = parse_line(line_no, line)?;
            let node = raw.node;
            if node.radius == 0.0 {
                if options.emit_warnings {
                    warn!(
                        "Zero-radius for section ID: {} of type: {:?}",
                        node.node_id, node.structured_identifier
                    );
                }
                if node.structured_identifier != StructureIdentifier::EndPoint && options.strict {
                    return Err(CellError::ZeroRadius(node.node_id));
                }
            }
            Ok(raw)
        })
        .collect::<CellResult<Vec<RawNode>>>()?;

    // Quick debug logs for the count of the types
    let accum_types: HashMap<StructureIdentifier, usize> = raw_nodes
        .iter()
        .map(|raw| raw.node.structured_identifier)
        .counts();
    for (kind, count) in accum_types.iter().sorted() {
        debug!("{:?} - #{:?}", kind, count);
    }

    let nodes_by_id: HashMap<u64, &RawNode> =
        raw_nodes.iter().map(|raw| (raw.node.node_id, raw)).collect();

    ////////////////////////
    // BFS traversal for topological order
    ////////////////////////
    // Construct mapping from parent to children for the BFS
    let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
    for raw in &raw_nodes {
        if let Some(parent) = raw.parent {
            children.entry(parent).or_default().push(raw.node.node_id);
        }
    }

    let roots: Vec<u64> = raw_nodes
        .iter()
        .filter(|raw| raw.parent.is_none())
        .map(|raw| raw.node.node_id)
        .collect();
    let root = *roots.first().ok_or(CellError::NoRoot)?;
    if roots.len() > 1 {
        warn!(
            "Found {} root nodes, keeping the tree under {}",
            roots.len(),
            root
        );
    }

    let mut sorted_node_ids: Vec<u64> = Vec::new();
    let mut queue: VecDeque<u64> = VecDeque::new();
    queue.push_back(root);
    let mut visited: HashSet<u64> = HashSet::new();

    while let Some(node_id) = queue.pop_front() {
        if !visited.insert(node_id) {
            warn!("Cycle detected at {}", node_id);
            continue;
        }
        sorted_node_ids.push(node_id);

        // Add children to queue
        if let Some(child_ids) = children.get(&node_id) {
            for &child_id in child_ids {
                if !visited.contains(&child_id) && nodes_by_id.contains_key(&child_id) {
                    queue.push_back(child_id);
                }
            }
        }
    }

    if sorted_node_ids.len() < raw_nodes.len() {
        warn!(
            "Dropped {} nodes unreachable from root {}",
            raw_nodes.len() - sorted_node_ids.len(),
            root
        );
    }

    // Create old_id -> new_id mapping (sequential starting at 0)
    let old_to_new_id: HashMap<u64, u64> = sorted_node_ids
        .iter()
        .enumerate()
        .map(|(new_id, old_id)| (*old_id, new_id as u64))
        .collect();

    // Track statistics
    let mut zero_radius_count: HashMap<StructureIdentifier, usize> = HashMap::new();

    // Map forward from the soma -> dendrites
    let mut parent_child_map: HashMap<u64, Vec<u64>> = HashMap::new();
    // Remap nodes with new sequential IDs and fix radii
    let mut remapped_nodes: Vec<Node> = Vec::with_capacity(sorted_node_ids.len());
    for old_id in &sorted_node_ids {
        let raw = nodes_by_id[old_id];
        let mut node = raw.node;
        let new_id = old_to_new_id[old_id];
        node.node_id = new_id;

        // Root node becomes self-referencing
        node.parent_id = match raw.parent.and_then(|p| old_to_new_id.get(&p)) {
            Some(&parent) if old_id != &root => {
                parent_child_map.entry(parent).or_default().push(new_id);
                parent
            }
            _ => new_id,
        };

        if node.radius == 0.0 {
            *zero_radius_count
                .entry(node.structured_identifier)
                .or_insert(0) += 1;
            node.radius = 1.0;
        }

        remapped_nodes.push(node);
    }

    let tree = SwcTree {
        nodes: remapped_nodes,
        children: parent_child_map,
    };

    // Write to file if requested
    if let Some(output_path) = &options.write_path {
        write_swc(output_path, &tree)?;
    }

    // Log summary
    info!("Processed {} nodes", tree.nodes.len());

    if !zero_radius_count.is_empty() {
        info!(
            "SWC Label Convention: 0=undefined, 1=soma, 2=axon, 3=basal dendrite, 4=apical dendrite, 5=fork, 6=end"
        );
        info!("Fixed zero-radius points by type: {:?}", zero_radius_count);
    }

    let label_breakdown: HashMap<StructureIdentifier, usize> = tree
        .nodes
        .iter()
        .map(|node| node.structured_identifier)
        .counts();
    info!("Node type breakdown: {:?}", label_breakdown);

    Ok(tree)
}

/// Writes a sorted tree back out, 1-based as the format expects
pub fn write_swc(output_path: &Path, tree: &SwcTree) -> CellResult<()> {
    let mut output = String::new();
    output.push_str("# Processed SWC file\n");

    for node in &tree.nodes {
        // Root node (self-referencing) should be written as -1
        let parent_id = if node.is_root() {
            -1i64
        } else {
            node.parent_id as i64 + 1
        };

        output.push_str(&format!(
            "{} {} {:.2} {:.2} {:.2} {} {}\n",
            node.node_id + 1,
            u8::from(node.structured_identifier),
            node.x_pos,
            node.y_pos,
            node.z_pos,
            node.radius,
            parent_id
        ));
    }

    fs::write(output_path, output).map_err(|source| CellError::MorphologyIo {
        path: output_path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swc_reader_basic() {
        let options = SwcReaderOptions {
            emit_warnings: true,
            strict: true,
            write_path: None,
        };

        let result = swc_reader(Path::new("data/basic.swc"), &options);
        assert!(result.is_ok());

        let tree = result.unwrap();
        let nodes = &tree.nodes;

        // basic.swc has 5 nodes
        assert_eq!(nodes.len(), 5);

        // Check assigned IDs
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(node.node_id, i as u64);
        }

        // Root node self-referencing check
        assert!(nodes[0].is_root());
        assert_eq!(nodes[0].structured_identifier, StructureIdentifier::Soma);

        // old id 1 (new 0) is root
        // old id 2 (new 1) -> old id 1 (new 0)
        // old id 3 (new 2) -> old id 1 (new 0)
        // old id 4 (new 3) -> old id 1 (new 0)
        // old id 5 (new 4) -> old id 4 (new 3)
        assert_eq!(nodes[1].parent_id, 0);
        assert_eq!(nodes[2].parent_id, 0);
        assert_eq!(nodes[3].parent_id, 0);
        assert_eq!(nodes[4].parent_id, 3);

        // parent 0 -> children 1, 2, 3 (root is not its own child)
        assert_eq!(tree.children_of(0), &[1, 2, 3]);
        assert_eq!(tree.children_of(3), &[4]);
        assert!(tree.children_of(4).is_empty());
        assert_eq!(tree.parent_of(&nodes[4]).unwrap().node_id, 3);
        assert!(tree.parent_of(&nodes[0]).is_none());
    }

    #[test]
    fn test_unsorted_input_is_ordered_breadth_first() {
        let tree = swc_reader(Path::new("data/neuron.swc"), &SwcReaderOptions::default()).unwrap();
        assert_eq!(tree.nodes.len(), 10);
        for node in tree.nodes.iter().skip(1) {
            assert!(node.parent_id < node.node_id);
        }
        let types: Vec<u8> = tree
            .nodes
            .iter()
            .map(|n| n.structured_identifier.into())
            .collect();
        assert_eq!(types, vec![1, 3, 4, 2, 3, 4, 2, 3, 3, 6]);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = swc_reader(
            Path::new("data/does_not_exist.swc"),
            &SwcReaderOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CellError::MorphologyIo { .. }));
        assert!(err.is_load_error());
    }

    #[test]
    fn test_malformed_record_reports_line() {
        let content = "# header\n1 1 0 0 0 5 -1\n2 3 0 ten 0 1 1\n";
        let err = parse_swc(content, &SwcReaderOptions::default()).unwrap_err();
        assert!(matches!(err, CellError::MalformedSwc { line: 3, .. }));

        let err = parse_swc("1 1 0 0 0\n", &SwcReaderOptions::default()).unwrap_err();
        assert!(matches!(err, CellError::MalformedSwc { line: 1, .. }));
    }

    #[test]
    fn test_no_root() {
        let err = parse_swc("1 1 0 0 0 5 2\n2 3 0 1 0 1 1\n", &SwcReaderOptions::default())
            .unwrap_err();
        assert!(matches!(err, CellError::NoRoot));
    }

    #[test]
    fn test_zero_radius_fixed_or_rejected() {
        let content = "1 1 0 0 0 5 -1\n2 3 0 10 0 0 1\n3 6 0 20 0 0 2\n";
        let tree = parse_swc(content, &SwcReaderOptions::default()).unwrap();
        assert_eq!(tree.nodes[1].radius, 1.0);
        assert_eq!(tree.nodes[2].radius, 1.0);

        let strict = SwcReaderOptions {
            strict: true,
            ..SwcReaderOptions::default()
        };
        let err = parse_swc(content, &strict).unwrap_err();
        assert!(matches!(err, CellError::ZeroRadius(2)));
    }

    #[test]
    fn test_unreachable_nodes_dropped() {
        let content = "1 1 0 0 0 5 -1\n2 3 0 10 0 1 1\n3 3 0 20 0 1 42\n";
        let tree = parse_swc(content, &SwcReaderOptions::default()).unwrap();
        assert_eq!(tree.nodes.len(), 2);
    }

    #[test]
    fn test_write_path_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sorted.swc");
        let options = SwcReaderOptions {
            write_path: Some(out.clone()),
            ..SwcReaderOptions::default()
        };
        let tree = swc_reader(Path::new("data/neuron.swc"), &options).unwrap();

        let written = fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("# Processed SWC file\n"));
        assert_eq!(written.lines().nth(1).unwrap(), "1 1 0.00 0.00 0.00 5 -1");

        let reread = swc_reader(&out, &SwcReaderOptions::default()).unwrap();
        assert_eq!(reread.nodes.len(), tree.nodes.len());
        for (a, b) in reread.nodes.iter().zip(&tree.nodes) {
            assert_eq!(a.parent_id, b.parent_id);
            assert_eq!(a.structured_identifier, b.structured_identifier);
        }
    }
}
