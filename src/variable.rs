//! Solar-wind variable vocabulary.
//!
//! The monthly OMNI files carry a fixed 46-column sample matrix. [`Variable`]
//! is the closed set of columns this crate knows how to request, each mapping
//! to its column index; [`Quantity`] extends it with the derived quantities of
//! the analysis. Unrecognized names are rejected when the configuration is
//! parsed, before any file is opened.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Width of the sample matrix in every monthly file.
pub const COLUMN_COUNT: usize = 46;

#[derive(Debug, Error)]
#[error("unrecognized variable name {0:?}")]
pub struct UnknownVariable(pub String);

/// A measured OMNI variable, named as in the source dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variable {
    /// `<B>` — field magnitude average.
    BAvg,
    BxGse,
    ByGse,
    BzGse,
    /// Bx is identical in the GSE and GSM frames; this variant reads the
    /// `BxGSE` column.
    BxGsm,
    ByGsm,
    BzGsm,
    Vel,
    VxGse,
    VyGse,
    VzGse,
    Density,
    Temperature,
    Pdyn,
    Ey,
    Beta,
    MachAlfven,
    MachMs,
    Ae,
    Al,
    Au,
    SymD,
    SymH,
    AsyD,
    AsyH,
    PcN,
    ClockAngle,
    Bt,
}

impl Variable {
    /// Column of this variable in the monthly sample matrix.
    ///
    /// Aliases are resolved here, so lookups never see an alias name.
    pub fn column(self) -> usize {
        match self {
            Self::BAvg => 9,
            Self::BxGse => 10,
            Self::ByGse => 11,
            Self::BzGse => 12,
            // Alias: same column as BxGSE.
            Self::BxGsm => 10,
            Self::ByGsm => 13,
            Self::BzGsm => 14,
            Self::Vel => 17,
            Self::VxGse => 18,
            Self::VyGse => 19,
            Self::VzGse => 20,
            Self::Density => 21,
            Self::Temperature => 22,
            Self::Pdyn => 23,
            Self::Ey => 24,
            Self::Beta => 25,
            Self::MachAlfven => 26,
            Self::Ae => 33,
            Self::Al => 34,
            Self::Au => 35,
            Self::SymD => 36,
            Self::SymH => 37,
            Self::AsyD => 38,
            Self::AsyH => 39,
            Self::PcN => 40,
            Self::MachMs => 41,
            Self::ClockAngle => 42,
            Self::Bt => 44,
        }
    }

    /// Source-dataset spelling of the variable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::BAvg => "<B>",
            Self::BxGse => "BxGSE",
            Self::ByGse => "ByGSE",
            Self::BzGse => "BzGSE",
            Self::BxGsm => "BxGSM",
            Self::ByGsm => "ByGSM",
            Self::BzGsm => "BzGSM",
            Self::Vel => "vel",
            Self::VxGse => "vxGSE",
            Self::VyGse => "vyGSE",
            Self::VzGse => "vzGSE",
            Self::Density => "n",
            Self::Temperature => "Temp",
            Self::Pdyn => "Pdyn",
            Self::Ey => "Ey",
            Self::Beta => "beta",
            Self::MachAlfven => "MA",
            Self::MachMs => "Mms",
            Self::Ae => "AE",
            Self::Al => "AL",
            Self::Au => "AU",
            Self::SymD => "SYM/D",
            Self::SymH => "SYM/H",
            Self::AsyD => "ASY/D",
            Self::AsyH => "ASY/H",
            Self::PcN => "PC-N",
            Self::ClockAngle => "clock",
            Self::Bt => "Bt",
        }
    }
}

impl FromStr for Variable {
    type Err = UnknownVariable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let var = match s {
            "<B>" => Self::BAvg,
            "BxGSE" => Self::BxGse,
            "ByGSE" => Self::ByGse,
            "BzGSE" => Self::BzGse,
            "BxGSM" => Self::BxGsm,
            "ByGSM" => Self::ByGsm,
            "BzGSM" => Self::BzGsm,
            "vel" => Self::Vel,
            "vxGSE" => Self::VxGse,
            "vyGSE" => Self::VyGse,
            "vzGSE" => Self::VzGse,
            "n" => Self::Density,
            "Temp" => Self::Temperature,
            "Pdyn" => Self::Pdyn,
            "Ey" => Self::Ey,
            "beta" => Self::Beta,
            "MA" => Self::MachAlfven,
            "Mms" => Self::MachMs,
            "AE" => Self::Ae,
            "AL" => Self::Al,
            "AU" => Self::Au,
            "SYM/D" => Self::SymD,
            "SYM/H" => Self::SymH,
            "ASY/D" => Self::AsyD,
            "ASY/H" => Self::AsyH,
            "PC-N" => Self::PcN,
            "clock" => Self::ClockAngle,
            "Bt" => Self::Bt,
            _ => return Err(UnknownVariable(s.to_string())),
        };
        Ok(var)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Variable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Variable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// An analysis quantity: either a measured variable or one of the derived
/// quantities computed per sample from several columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quantity {
    Measured(Variable),
    /// `BmagGSM` — √(Bx² + By² + Bz²) in the GSM frame.
    FieldMagnitude,
    /// `vB^2` — flow speed times squared field magnitude.
    VBSquared,
}

impl Quantity {
    /// Measured variables that must be loaded to evaluate this quantity.
    pub fn variables(self) -> &'static [Variable] {
        match self {
            Self::Measured(Variable::BAvg) => &[Variable::BAvg],
            Self::Measured(Variable::BxGse) => &[Variable::BxGse],
            Self::Measured(Variable::ByGse) => &[Variable::ByGse],
            Self::Measured(Variable::BzGse) => &[Variable::BzGse],
            Self::Measured(Variable::BxGsm) => &[Variable::BxGsm],
            Self::Measured(Variable::ByGsm) => &[Variable::ByGsm],
            Self::Measured(Variable::BzGsm) => &[Variable::BzGsm],
            Self::Measured(Variable::Vel) => &[Variable::Vel],
            Self::Measured(Variable::VxGse) => &[Variable::VxGse],
            Self::Measured(Variable::VyGse) => &[Variable::VyGse],
            Self::Measured(Variable::VzGse) => &[Variable::VzGse],
            Self::Measured(Variable::Density) => &[Variable::Density],
            Self::Measured(Variable::Temperature) => &[Variable::Temperature],
            Self::Measured(Variable::Pdyn) => &[Variable::Pdyn],
            Self::Measured(Variable::Ey) => &[Variable::Ey],
            Self::Measured(Variable::Beta) => &[Variable::Beta],
            Self::Measured(Variable::MachAlfven) => &[Variable::MachAlfven],
            Self::Measured(Variable::MachMs) => &[Variable::MachMs],
            Self::Measured(Variable::Ae) => &[Variable::Ae],
            Self::Measured(Variable::Al) => &[Variable::Al],
            Self::Measured(Variable::Au) => &[Variable::Au],
            Self::Measured(Variable::SymD) => &[Variable::SymD],
            Self::Measured(Variable::SymH) => &[Variable::SymH],
            Self::Measured(Variable::AsyD) => &[Variable::AsyD],
            Self::Measured(Variable::AsyH) => &[Variable::AsyH],
            Self::Measured(Variable::PcN) => &[Variable::PcN],
            Self::Measured(Variable::ClockAngle) => &[Variable::ClockAngle],
            Self::Measured(Variable::Bt) => &[Variable::Bt],
            Self::FieldMagnitude => &[Variable::BxGsm, Variable::ByGsm, Variable::BzGsm],
            Self::VBSquared => &[
                Variable::Vel,
                Variable::BxGsm,
                Variable::ByGsm,
                Variable::BzGsm,
            ],
        }
    }
}

impl FromStr for Quantity {
    type Err = UnknownVariable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BmagGSM" => Ok(Self::FieldMagnitude),
            "vB^2" => Ok(Self::VBSquared),
            _ => Ok(Self::Measured(s.parse()?)),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured(var) => var.fmt(f),
            Self::FieldMagnitude => f.write_str("BmagGSM"),
            Self::VBSquared => f.write_str("vB^2"),
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
