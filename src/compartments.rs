use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::channels::{Ion, Mechanism, ParameterTarget};
use crate::error::{CellError, CellResult};

// Defaults a freshly created section gets in the simulator
pub const DEFAULT_LENGTH: f64 = 100.0;
pub const DEFAULT_DIAM: f64 = 500.0;
pub const DEFAULT_RA: f64 = 35.4;
pub const DEFAULT_CM: f64 = 1.0;

/// Index into the simulator's section list
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub struct SectionId(pub usize);

#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Soma,
    Dend,
    Axon,
}

impl Region {
    pub fn label(self) -> &'static str {
        match self {
            Region::Soma => "soma",
            Region::Dend => "dend",
            Region::Axon => "axon",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub diam: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64, diam: f64) -> Point3 {
        Point3 { x, y, z, diam }
    }
}

fn square(x: f64) -> f64 {
    x * x
}

/// Assumes simple direct path between the points
pub fn compute_length(curr: &Point3, other: &Point3) -> f64 {
    let x_diff = square(curr.x - other.x);
    let y_diff = square(curr.y - other.y);
    let z_diff = square(curr.z - other.z);
    (x_diff + y_diff + z_diff).sqrt()
}

/// Where a section hangs off its parent. The child's 0 end always attaches.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Connection {
    pub parent: SectionId,
    pub position: f64,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub(crate) name: String,
    region: Region,
    points: Vec<Point3>,
    length: f64,
    diam: f64,
    nseg: u32,
    ra: f64,
    cm: f64,
    parent: Option<Connection>,
    mechanisms: BTreeMap<Mechanism, BTreeMap<&'static str, f64>>,
    reversals: BTreeMap<Ion, f64>,
}

impl Section {
    pub fn new(name: impl Into<String>, region: Region) -> Section {
        Section {
            name: name.into(),
            region,
            points: Vec::new(),
            length: DEFAULT_LENGTH,
            diam: DEFAULT_DIAM,
            nseg: 1,
            ra: DEFAULT_RA,
            cm: DEFAULT_CM,
            parent: None,
            mechanisms: BTreeMap::new(),
            reversals: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn diam(&self) -> f64 {
        self.diam
    }

    pub fn nseg(&self) -> u32 {
        self.nseg
    }

    pub fn ra(&self) -> f64 {
        self.ra
    }

    pub fn cm(&self) -> f64 {
        self.cm
    }

    pub fn parent(&self) -> Option<Connection> {
        self.parent
    }

    /// Replaces the 3-D points; length becomes the path length and diam the mean diameter
    pub fn set_points(&mut self, points: Vec<Point3>) {
        self.length = points
            .windows(2)
            .map(|pair| compute_length(&pair[0], &pair[1]))
            .sum();
        if !points.is_empty() {
            self.diam = points.iter().map(|p| p.diam).sum::<f64>() / points.len() as f64;
        }
        self.points = points;
    }

    pub fn set_length(&mut self, length: f64) {
        self.length = length;
    }

    pub fn set_diam(&mut self, diam: f64) {
        self.diam = diam;
    }

    pub fn set_nseg(&mut self, nseg: u32) {
        self.nseg = nseg.max(1);
    }

    pub(crate) fn set_parent(&mut self, connection: Connection) {
        self.parent = Some(connection);
    }

    pub(crate) fn clear_parent(&mut self) -> Option<Connection> {
        self.parent.take()
    }

    /// Inserting an already present mechanism keeps its parameters
    pub fn insert(&mut self, mechanism: Mechanism) {
        self.mechanisms.entry(mechanism).or_default();
    }

    pub fn has_mechanism(&self, mechanism: Mechanism) -> bool {
        self.mechanisms.contains_key(&mechanism)
    }

    pub fn mechanisms(&self) -> impl Iterator<Item = Mechanism> + '_ {
        self.mechanisms.keys().copied()
    }

    fn has_ion(&self, ion: Ion) -> bool {
        self.mechanisms.keys().any(|mech| mech.uses_ion(ion))
    }

    pub fn set_parameter(&mut self, name: &str, value: f64) -> CellResult<()> {
        match ParameterTarget::parse(name)? {
            ParameterTarget::AxialResistance => self.ra = value,
            ParameterTarget::Capacitance => self.cm = value,
            ParameterTarget::Reversal(ion) => {
                if !self.has_ion(ion) {
                    return Err(CellError::IonNotPresent {
                        section: self.name.clone(),
                        ion: ion.name().to_owned(),
                    });
                }
                self.reversals.insert(ion, value);
            }
            ParameterTarget::Mechanism(mechanism, param) => {
                let params = self.mechanisms.get_mut(&mechanism).ok_or_else(|| {
                    CellError::MechanismNotInserted {
                        section: self.name.clone(),
                        mechanism: mechanism.name().to_owned(),
                    }
                })?;
                params.insert(param, value);
            }
        }
        Ok(())
    }

    /// Value of an assigned parameter, `None` when it was never set or cannot live here
    pub fn parameter(&self, name: &str) -> Option<f64> {
        match ParameterTarget::parse(name).ok()? {
            ParameterTarget::AxialResistance => Some(self.ra),
            ParameterTarget::Capacitance => Some(self.cm),
            ParameterTarget::Reversal(ion) => self.reversals.get(&ion).copied(),
            ParameterTarget::Mechanism(mechanism, param) => {
                self.mechanisms.get(&mechanism)?.get(param).copied()
            }
        }
    }
}

/// `1 + 2 * floor(length / max_length)`: odd, growing with the section length
pub fn compartment_count(length: f64, max_length: f64) -> u32 {
    1 + 2 * (length.max(0.0) / max_length).floor() as u32
}

/// Rule that picks a section's number of compartments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Discretization {
    FixedLength { max_length: f64 },
    DLambda { frequency: f64, d_lambda: f64 },
}

impl Default for Discretization {
    fn default() -> Self {
        Discretization::FixedLength { max_length: 40.0 }
    }
}

impl Discretization {
    pub fn nseg(&self, section: &Section) -> u32 {
        match *self {
            Discretization::FixedLength { max_length } => {
                compartment_count(section.length(), max_length)
            }
            // d_lambda rule, taken from https://jaxley.readthedocs.io/en/stable/how_to_guide/set_ncomp.html
            Discretization::DLambda {
                frequency,
                d_lambda,
            } => {
                let lambda_f = 1e5
                    * (section.diam() / (4.0 * PI * frequency * section.cm() * section.ra()))
                        .sqrt();
                let ratio = section.length() / (d_lambda * lambda_f);
                ((ratio + 0.9) / 2.0).floor() as u32 * 2 + 1
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match *self {
            Discretization::FixedLength { max_length }
                if max_length.is_nan() || max_length <= 0.0 =>
            {
                Err(format!("max_length must be positive, got {max_length}"))
            }
            Discretization::DLambda {
                frequency,
                d_lambda,
            } if frequency.is_nan()
                || d_lambda.is_nan()
                || frequency <= 0.0
                || d_lambda <= 0.0 =>
            {
                Err(format!(
                    "frequency and d_lambda must be positive, got {frequency} and {d_lambda}"
                ))
            }
            _ => Ok(()),
        }
    }
}
