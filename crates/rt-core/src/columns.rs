//! Declarative column descriptors
//!
//! The renderer, the filter engine and the sort engine all consult this table
//! instead of carrying their own per-column configuration.

use serde::{Deserialize, Serialize};

use crate::row::{Cell, ColumnId, Row};

/// How a column orders its cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparatorKind {
    Numeric,
    Text,
}

/// Which predicate kind a column accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    Equality,
    Range,
}

/// Description of one table column
#[derive(Debug, Clone, Copy)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub header: &'static str,
    pub comparator: Option<ComparatorKind>,
    pub filter: Option<FilterKind>,
}

impl ColumnDescriptor {
    const fn new(
        id: ColumnId,
        header: &'static str,
        comparator: Option<ComparatorKind>,
        filter: Option<FilterKind>,
    ) -> Self {
        Self { id, header, comparator, filter }
    }

    pub fn accessor<'a>(&self, row: &'a Row) -> Cell<'a> {
        row.cell(self.id)
    }

    pub fn is_sortable(&self) -> bool {
        self.comparator.is_some()
    }
}

use ColumnId as C;
use ComparatorKind::{Numeric, Text};
use FilterKind::{Equality, Range};

/// Every column in display order
pub const COLUMNS: &[ColumnDescriptor] = &[
    ColumnDescriptor::new(C::DeltaVVac, "ΔV (Vac)", Some(Numeric), Some(Range)),
    ColumnDescriptor::new(C::DeltaVAsl, "ΔV (ASL)", Some(Numeric), Some(Range)),
    ColumnDescriptor::new(C::WetMass, "Wet Mass", Some(Numeric), Some(Range)),
    ColumnDescriptor::new(C::DryMass, "Dry Mass", Some(Numeric), Some(Range)),
    ColumnDescriptor::new(C::Diameter, "Diameter", Some(Numeric), Some(Equality)),
    ColumnDescriptor::new(C::Engine, "Engine", Some(Text), Some(Equality)),
    ColumnDescriptor::new(C::NumEngines, "# Engines", Some(Numeric), Some(Equality)),
    ColumnDescriptor::new(C::Twr, "TWR", Some(Numeric), Some(Range)),
    ColumnDescriptor::new(C::CylLength, "Cylinder Length", Some(Numeric), None),
    ColumnDescriptor::new(C::CylFuselage, "Cylinder Fuselage", Some(Text), Some(Equality)),
    ColumnDescriptor::new(C::NoseLength, "Nose Length", Some(Numeric), None),
    ColumnDescriptor::new(C::NoseFuselage, "Nose Fuselage", Some(Text), Some(Equality)),
    ColumnDescriptor::new(C::MaxAltitude, "Max Altitude", Some(Numeric), Some(Range)),
    ColumnDescriptor::new(C::MaxVelocity, "Max Velocity", Some(Numeric), Some(Range)),
    ColumnDescriptor::new(C::BurnTime, "Burn Time", Some(Numeric), Some(Range)),
    ColumnDescriptor::new(C::Ullage, "Ullage", Some(Text), Some(Equality)),
    ColumnDescriptor::new(C::HpFuel, "HP Fuel", Some(Text), Some(Equality)),
    ColumnDescriptor::new(C::Tech, "Tech", Some(Text), Some(Equality)),
    ColumnDescriptor::new(C::Ignitions, "Ignitions", Some(Numeric), None),
    ColumnDescriptor::new(C::Gimbal, "Gimbal", Some(Text), Some(Equality)),
    ColumnDescriptor::new(C::MinThrust, "Min Thrust", Some(Numeric), None),
    ColumnDescriptor::new(C::Residuals, "Residuals", Some(Numeric), None),
    ColumnDescriptor::new(C::EngineMass, "Engine Mass", Some(Numeric), Some(Range)),
    ColumnDescriptor::new(C::Fuel, "Fuel", Some(Text), Some(Equality)),
];

/// Look up the descriptor of a column
pub fn descriptor(id: ColumnId) -> &'static ColumnDescriptor {
    // Every ColumnId has exactly one entry; see test_every_column_described.
    COLUMNS
        .iter()
        .find(|c| c.id == id)
        .unwrap_or(&COLUMNS[0])
}

/// Columns accepting the given filter kind, in display order
pub fn filterable(kind: FilterKind) -> impl Iterator<Item = &'static ColumnDescriptor> {
    COLUMNS.iter().filter(move |c| c.filter == Some(kind))
}
