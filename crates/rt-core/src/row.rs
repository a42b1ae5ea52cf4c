//! Normalized row model
//!
//! A [`Row`] is the fixed-schema form of one record produced by the external
//! rocket engine. Filtering, sorting and rendering only ever see rows through
//! [`Row::cell`], keyed by [`ColumnId`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel used for descriptive fields the engine did not provide
pub const NOT_APPLICABLE: &str = "N/A";

/// Identifier of a column in the canonical row schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnId {
    Engine,
    Diameter,
    WetMass,
    DryMass,
    DeltaVVac,
    DeltaVAsl,
    Twr,
    NumEngines,
    CylLength,
    CylFuselage,
    NoseLength,
    NoseFuselage,
    MaxAltitude,
    MaxVelocity,
    BurnTime,
    Ullage,
    HpFuel,
    Tech,
    Ignitions,
    Gimbal,
    MinThrust,
    Residuals,
    EngineMass,
    Fuel,
}

impl ColumnId {
    /// Every column, in schema order
    pub const ALL: [ColumnId; 24] = [
        ColumnId::Engine,
        ColumnId::Diameter,
        ColumnId::WetMass,
        ColumnId::DryMass,
        ColumnId::DeltaVVac,
        ColumnId::DeltaVAsl,
        ColumnId::Twr,
        ColumnId::NumEngines,
        ColumnId::CylLength,
        ColumnId::CylFuselage,
        ColumnId::NoseLength,
        ColumnId::NoseFuselage,
        ColumnId::MaxAltitude,
        ColumnId::MaxVelocity,
        ColumnId::BurnTime,
        ColumnId::Ullage,
        ColumnId::HpFuel,
        ColumnId::Tech,
        ColumnId::Ignitions,
        ColumnId::Gimbal,
        ColumnId::MinThrust,
        ColumnId::Residuals,
        ColumnId::EngineMass,
        ColumnId::Fuel,
    ];

    /// Stable snake_case name, used in preference keys and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnId::Engine => "engine",
            ColumnId::Diameter => "diameter",
            ColumnId::WetMass => "wet_mass",
            ColumnId::DryMass => "dry_mass",
            ColumnId::DeltaVVac => "delta_v_vac",
            ColumnId::DeltaVAsl => "delta_v_asl",
            ColumnId::Twr => "twr",
            ColumnId::NumEngines => "num_engines",
            ColumnId::CylLength => "cyl_length",
            ColumnId::CylFuselage => "cyl_fuselage",
            ColumnId::NoseLength => "nose_length",
            ColumnId::NoseFuselage => "nose_fuselage",
            ColumnId::MaxAltitude => "max_altitude",
            ColumnId::MaxVelocity => "max_velocity",
            ColumnId::BurnTime => "burn_time",
            ColumnId::Ullage => "ullage",
            ColumnId::HpFuel => "hp_fuel",
            ColumnId::Tech => "tech",
            ColumnId::Ignitions => "ignitions",
            ColumnId::Gimbal => "gimbal",
            ColumnId::MinThrust => "min_thrust",
            ColumnId::Residuals => "residuals",
            ColumnId::EngineMass => "engine_mass",
            ColumnId::Fuel => "fuel",
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnId {
    type Err = UnknownColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColumnId::ALL
            .iter()
            .copied()
            .find(|column| column.as_str() == s)
            .ok_or_else(|| UnknownColumn(s.to_string()))
    }
}

/// Returned when parsing a column name that is not part of the schema
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown column: {0}")]
pub struct UnknownColumn(pub String);

/// Owned cell value, used as an equality target and in option domains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// The `N/A` sentinel
    pub fn not_applicable() -> Self {
        Value::Text(NOT_APPLICABLE.to_string())
    }

    /// Borrow this value as a cell
    pub fn as_cell(&self) -> Cell<'_> {
        match self {
            Value::Number(n) => Cell::Number(*n),
            Value::Text(s) => Cell::Text(s),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    /// Strict equality against a row cell: a number never equals text and
    /// a missing cell never matches anything.
    pub fn matches(&self, cell: Cell<'_>) -> bool {
        match (self, cell) {
            (Value::Number(a), Cell::Number(b)) => *a == b,
            (Value::Text(a), Cell::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_cell().fmt(f)
    }
}

/// Borrowed view of a single row cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Number(f64),
    Text(&'a str),
    Missing,
}

impl<'a> Cell<'a> {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn to_value(&self) -> Option<Value> {
        match self {
            Cell::Number(n) => Some(Value::Number(*n)),
            Cell::Text(s) => Some(Value::Text((*s).to_string())),
            Cell::Missing => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Number(_) => 0,
            Cell::Text(_) => 1,
            Cell::Missing => 2,
        }
    }

    /// Total order over cells: numbers (numerically, `-0.0 == 0.0`), then text
    /// (byte-lexicographic), then missing. NaN falls back to `f64::total_cmp`.
    pub fn total_cmp(&self, other: &Cell<'_>) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => {
                a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b))
            }
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Cell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
            Cell::Missing => Ok(()),
        }
    }
}

fn flag(value: bool) -> Cell<'static> {
    if value {
        Cell::Text("True")
    } else {
        Cell::Text("False")
    }
}

fn optional(value: Option<f64>) -> Cell<'static> {
    value.map(Cell::Number).unwrap_or(Cell::Missing)
}

/// A normalized rocket record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub engine: String,
    pub diameter: f64,
    pub wet_mass: f64,
    pub dry_mass: f64,
    pub delta_v_vac: f64,
    pub delta_v_asl: f64,
    pub twr: f64,
    pub num_engines: f64,

    // Tank and nose geometry, numeric or the `N/A` sentinel
    pub cyl_length: Value,
    pub cyl_fuselage: Value,
    pub nose_length: Value,
    pub nose_fuselage: Value,

    pub max_altitude: Option<f64>,
    pub max_velocity: Option<f64>,

    // Engine metadata
    pub burn_time: Option<f64>,
    pub ullage: bool,
    pub hp_fuel: bool,
    pub tech: String,
    pub ignitions: Option<f64>,
    pub gimbal: bool,
    pub min_thrust: Option<f64>,
    pub residuals: Option<f64>,
    pub engine_mass: Option<f64>,
    pub fuel: String,
}

impl Row {
    /// Accessor used by every column descriptor
    pub fn cell(&self, column: ColumnId) -> Cell<'_> {
        match column {
            ColumnId::Engine => Cell::Text(&self.engine),
            ColumnId::Diameter => Cell::Number(self.diameter),
            ColumnId::WetMass => Cell::Number(self.wet_mass),
            ColumnId::DryMass => Cell::Number(self.dry_mass),
            ColumnId::DeltaVVac => Cell::Number(self.delta_v_vac),
            ColumnId::DeltaVAsl => Cell::Number(self.delta_v_asl),
            ColumnId::Twr => Cell::Number(self.twr),
            ColumnId::NumEngines => Cell::Number(self.num_engines),
            ColumnId::CylLength => self.cyl_length.as_cell(),
            ColumnId::CylFuselage => self.cyl_fuselage.as_cell(),
            ColumnId::NoseLength => self.nose_length.as_cell(),
            ColumnId::NoseFuselage => self.nose_fuselage.as_cell(),
            ColumnId::MaxAltitude => optional(self.max_altitude),
            ColumnId::MaxVelocity => optional(self.max_velocity),
            ColumnId::BurnTime => optional(self.burn_time),
            ColumnId::Ullage => flag(self.ullage),
            ColumnId::HpFuel => flag(self.hp_fuel),
            ColumnId::Tech => Cell::Text(&self.tech),
            ColumnId::Ignitions => optional(self.ignitions),
            ColumnId::Gimbal => flag(self.gimbal),
            ColumnId::MinThrust => optional(self.min_thrust),
            ColumnId::Residuals => optional(self.residuals),
            ColumnId::EngineMass => optional(self.engine_mass),
            ColumnId::Fuel => Cell::Text(&self.fuel),
        }
    }

    /// A row with the given required values and every optional field at its default.
    ///
    /// Mostly useful for hosts and tests building rows without a payload.
    #[allow(clippy::too_many_arguments)]
    pub fn with_required(
        engine: impl Into<String>,
        diameter: f64,
        wet_mass: f64,
        dry_mass: f64,
        delta_v_vac: f64,
        delta_v_asl: f64,
        twr: f64,
        num_engines: f64,
    ) -> Self {
        Self {
            engine: engine.into(),
            diameter,
            wet_mass,
            dry_mass,
            delta_v_vac,
            delta_v_asl,
            twr,
            num_engines,
            cyl_length: Value::not_applicable(),
            cyl_fuselage: Value::not_applicable(),
            nose_length: Value::not_applicable(),
            nose_fuselage: Value::not_applicable(),
            max_altitude: None,
            max_velocity: None,
            burn_time: None,
            ullage: false,
            hp_fuel: false,
            tech: NOT_APPLICABLE.to_string(),
            ignitions: None,
            gimbal: false,
            min_thrust: None,
            residuals: None,
            engine_mass: None,
            fuel: NOT_APPLICABLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names_round_trip() {
        for column in ColumnId::ALL {
            assert_eq!(column.as_str().parse::<ColumnId>().unwrap(), column);
        }
        assert!("numTanks".parse::<ColumnId>().is_err());
    }

    #[test]
    fn test_strict_equality() {
        assert!(Value::Number(0.3).matches(Cell::Number(0.3)));
        assert!(!Value::Text("0.3".into()).matches(Cell::Number(0.3)));
        assert!(!Value::not_applicable().matches(Cell::Missing));
    }

    #[test]
    fn test_cell_order_places_text_after_numbers() {
        let mut cells = vec![Cell::Missing, Cell::Text("N/A"), Cell::Number(2.0), Cell::Number(-1.0)];
        cells.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            cells,
            vec![Cell::Number(-1.0), Cell::Number(2.0), Cell::Text("N/A"), Cell::Missing]
        );
    }

    #[test]
    fn test_flags_render_as_text() {
        let mut row = Row::with_required("RD-107", 1.0, 10.0, 2.0, 3000.0, 2500.0, 1.4, 1.0);
        row.gimbal = true;
        assert_eq!(row.cell(ColumnId::Gimbal), Cell::Text("True"));
        assert_eq!(row.cell(ColumnId::Ullage), Cell::Text("False"));
        assert_eq!(row.cell(ColumnId::BurnTime), Cell::Missing);
    }
}
