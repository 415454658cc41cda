use crate::error::{CellError, CellResult};

#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub enum Ion {
    Na,
    K,
    Ca,
}

impl Ion {
    pub fn name(self) -> &'static str {
        match self {
            Ion::Na => "na",
            Ion::K => "k",
            Ion::Ca => "ca",
        }
    }

    /// Name of the reversal potential range variable, e.g. `ena`
    pub fn reversal_name(self) -> &'static str {
        match self {
            Ion::Na => "ena",
            Ion::K => "ek",
            Ion::Ca => "eca",
        }
    }

    fn from_reversal_name(name: &str) -> Option<Ion> {
        [Ion::Na, Ion::K, Ion::Ca]
            .into_iter()
            .find(|ion| ion.reversal_name() == name)
    }
}

///
/// The mechanisms define the membrane dynamics that take place within a section.
/// Kinetics live in the simulator's mechanism files; here we only track which
/// mechanisms exist, which parameters they expose and which ions they touch.
/// Naming follows: https://nrn.readthedocs.io/en/9.0.0/tutorials/scripting-neuron-basics.html#Biophysical-mechanisms
///
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub enum Mechanism {
    Passive,
    CaDynamics,
    CaHva,
    CaLva,
    Ih,
    ImV2,
    KT,
    Kd,
    Kv2like,
    Kv31,
    NaV,
    Sk,
}

impl Mechanism {
    pub const ALL: [Mechanism; 12] = [
        Mechanism::Passive,
        Mechanism::CaDynamics,
        Mechanism::CaHva,
        Mechanism::CaLva,
        Mechanism::Ih,
        Mechanism::ImV2,
        Mechanism::KT,
        Mechanism::Kd,
        Mechanism::Kv2like,
        Mechanism::Kv31,
        Mechanism::NaV,
        Mechanism::Sk,
    ];

    /// Active mechanisms that only go into the soma
    pub const SOMATIC: [Mechanism; 11] = [
        Mechanism::CaDynamics,
        Mechanism::CaHva,
        Mechanism::CaLva,
        Mechanism::Ih,
        Mechanism::ImV2,
        Mechanism::KT,
        Mechanism::Kd,
        Mechanism::Kv2like,
        Mechanism::Kv31,
        Mechanism::NaV,
        Mechanism::Sk,
    ];

    /// Suffix as the simulator knows it
    pub fn name(self) -> &'static str {
        match self {
            Mechanism::Passive => "pas",
            Mechanism::CaDynamics => "CaDynamics",
            Mechanism::CaHva => "Ca_HVA",
            Mechanism::CaLva => "Ca_LVA",
            Mechanism::Ih => "Ih",
            Mechanism::ImV2 => "Im_v2",
            Mechanism::KT => "K_T",
            Mechanism::Kd => "Kd",
            Mechanism::Kv2like => "Kv2like",
            Mechanism::Kv31 => "Kv3_1",
            Mechanism::NaV => "NaV",
            Mechanism::Sk => "SK",
        }
    }

    pub fn from_name(name: &str) -> CellResult<Mechanism> {
        Mechanism::ALL
            .into_iter()
            .find(|mech| mech.name() == name)
            .ok_or_else(|| CellError::UnknownMechanism(name.to_owned()))
    }

    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            Mechanism::Passive => &["g", "e"],
            Mechanism::CaDynamics => &["gamma", "decay", "depth", "minCai"],
            _ => &["gbar"],
        }
    }

    pub fn ions(self) -> &'static [Ion] {
        match self {
            Mechanism::Passive | Mechanism::Ih => &[],
            Mechanism::CaDynamics | Mechanism::CaHva | Mechanism::CaLva => &[Ion::Ca],
            Mechanism::ImV2 | Mechanism::KT | Mechanism::Kd | Mechanism::Kv2like | Mechanism::Kv31 => {
                &[Ion::K]
            }
            Mechanism::NaV => &[Ion::Na],
            Mechanism::Sk => &[Ion::K, Ion::Ca],
        }
    }

    pub fn uses_ion(self, ion: Ion) -> bool {
        self.ions().contains(&ion)
    }
}

/// What a parameter name such as `gbar_NaV`, `ek` or `Ra` refers to on a section
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ParameterTarget {
    AxialResistance,
    Capacitance,
    Reversal(Ion),
    Mechanism(Mechanism, &'static str),
}

impl ParameterTarget {
    pub fn parse(name: &str) -> CellResult<ParameterTarget> {
        match name {
            "Ra" => return Ok(ParameterTarget::AxialResistance),
            "cm" => return Ok(ParameterTarget::Capacitance),
            _ => {}
        }
        if let Some(ion) = Ion::from_reversal_name(name) {
            return Ok(ParameterTarget::Reversal(ion));
        }

        // Mechanism suffixes may contain '_' themselves (Kv3_1), parameter names never do
        let (param, suffix) = name
            .split_once('_')
            .ok_or_else(|| CellError::UnknownParameter(name.to_owned()))?;
        let mechanism =
            Mechanism::from_name(suffix).map_err(|_| CellError::UnknownParameter(name.to_owned()))?;
        let param = mechanism
            .parameters()
            .iter()
            .copied()
            .find(|known| *known == param)
            .ok_or_else(|| CellError::UnknownParameter(name.to_owned()))?;
        Ok(ParameterTarget::Mechanism(mechanism, param))
    }
}
