//! Payload decoding and normalization
//!
//! The engine hands over a JSON array of loosely-typed objects. Each object is
//! mapped onto the fixed [`Row`] schema through [`FIELD_MAPPINGS`]; a record
//! missing a required field is dropped, a payload that is not a JSON array
//! fails as a whole.

use rt_core::{ColumnId, Row, Value, NOT_APPLICABLE};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::DecodeError;

type RawRecord = Map<String, JsonValue>;

/// What a missing (absent or null) source field turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// The record is dropped
    Required,
    /// The `N/A` sentinel
    NotApplicable,
    /// `False` for flags
    False,
    /// Left absent in the row
    Absent,
}

/// Source keys of one row field, first present key wins
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub column: ColumnId,
    pub keys: &'static [&'static str],
    pub fallback: Fallback,
}

const fn map(column: ColumnId, keys: &'static [&'static str], fallback: Fallback) -> FieldMapping {
    FieldMapping { column, keys, fallback }
}

/// RawRecord → Row mapping table
pub const FIELD_MAPPINGS: &[FieldMapping] = &[
    map(ColumnId::Engine, &["engine"], Fallback::Required),
    map(ColumnId::Diameter, &["diameter"], Fallback::Required),
    map(ColumnId::WetMass, &["wetMass", "wet_mass", "mass"], Fallback::Required),
    map(ColumnId::DryMass, &["dryMass", "dry_mass"], Fallback::Required),
    map(ColumnId::DeltaVVac, &["deltaVVac", "delta_v_vac"], Fallback::Required),
    map(ColumnId::DeltaVAsl, &["deltaVAsl", "delta_v_asl"], Fallback::Required),
    map(ColumnId::Twr, &["twr"], Fallback::Required),
    map(
        ColumnId::NumEngines,
        &["numEngines", "num_engines", "numTanks", "num_tanks"],
        Fallback::Required,
    ),
    map(ColumnId::CylLength, &["cylLength", "cyl_length"], Fallback::NotApplicable),
    map(ColumnId::CylFuselage, &["cylFuselage", "cyl_fuselage"], Fallback::NotApplicable),
    map(ColumnId::NoseLength, &["noseLength", "nose_length"], Fallback::NotApplicable),
    map(ColumnId::NoseFuselage, &["noseFuselage", "nose_fuselage"], Fallback::NotApplicable),
    map(ColumnId::MaxAltitude, &["maxAltitude", "max_altitude"], Fallback::Absent),
    map(ColumnId::MaxVelocity, &["maxVelocity", "max_velocity"], Fallback::Absent),
    map(ColumnId::BurnTime, &["burnTime", "burn_time"], Fallback::Absent),
    map(ColumnId::Ullage, &["ullage"], Fallback::False),
    map(ColumnId::HpFuel, &["hpFuel", "hp_fuel"], Fallback::False),
    map(ColumnId::Tech, &["tech"], Fallback::NotApplicable),
    map(ColumnId::Ignitions, &["ignitions"], Fallback::Absent),
    map(ColumnId::Gimbal, &["gimbal"], Fallback::False),
    map(ColumnId::MinThrust, &["minThrust", "min_thrust"], Fallback::Absent),
    map(ColumnId::Residuals, &["residuals"], Fallback::Absent),
    map(ColumnId::EngineMass, &["engineMass", "engine_mass"], Fallback::Absent),
    map(ColumnId::Fuel, &["fuel"], Fallback::NotApplicable),
];

/// Mapping of one column
pub fn mapping(column: ColumnId) -> &'static FieldMapping {
    // Every column has an entry; see test_every_column_mapped.
    FIELD_MAPPINGS
        .iter()
        .find(|m| m.column == column)
        .unwrap_or(&FIELD_MAPPINGS[0])
}

/// Why a record was dropped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    #[error("record is not an object")]
    NotAnObject,

    #[error("missing required field {0}")]
    MissingField(ColumnId),

    #[error("required field {0} has the wrong type")]
    WrongType(ColumnId),
}

/// A record dropped during normalization
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record {index}: {kind}")]
pub struct RecordIssue {
    pub index: usize,
    pub kind: IssueKind,
}

/// Result of a successful decode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub rows: Vec<Row>,
    pub issues: Vec<RecordIssue>,
}

/// Decode a raw payload into normalized rows.
///
/// Pure: the same text always yields the same rows or the same error.
pub fn decode_payload(text: &str) -> Result<Decoded, DecodeError> {
    let records: Vec<JsonValue> =
        serde_json::from_str(text).map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    let mut decoded = Decoded {
        rows: Vec::with_capacity(records.len()),
        issues: Vec::new(),
    };

    for (index, record) in records.iter().enumerate() {
        let normalized = match record {
            JsonValue::Object(fields) => normalize(fields),
            _ => Err(IssueKind::NotAnObject),
        };
        match normalized {
            Ok(row) => decoded.rows.push(row),
            Err(kind) => {
                tracing::debug!("Dropping record {}: {}", index, kind);
                decoded.issues.push(RecordIssue { index, kind });
            }
        }
    }

    if let Some(first) = decoded.issues.first() {
        tracing::warn!(
            "Dropped {} of {} records ({})",
            decoded.issues.len(),
            records.len(),
            first
        );
    }

    Ok(decoded)
}

/// Map one raw record onto the row schema
pub fn normalize(record: &RawRecord) -> Result<Row, IssueKind> {
    let fields = Fields(record);
    Ok(Row {
        engine: fields.required_text(ColumnId::Engine)?,
        diameter: fields.required_number(ColumnId::Diameter)?,
        wet_mass: fields.required_number(ColumnId::WetMass)?,
        dry_mass: fields.required_number(ColumnId::DryMass)?,
        delta_v_vac: fields.required_number(ColumnId::DeltaVVac)?,
        delta_v_asl: fields.required_number(ColumnId::DeltaVAsl)?,
        twr: fields.required_number(ColumnId::Twr)?,
        num_engines: fields.required_number(ColumnId::NumEngines)?,
        cyl_length: fields.value(ColumnId::CylLength),
        cyl_fuselage: fields.value(ColumnId::CylFuselage),
        nose_length: fields.value(ColumnId::NoseLength),
        nose_fuselage: fields.value(ColumnId::NoseFuselage),
        max_altitude: fields.number(ColumnId::MaxAltitude),
        max_velocity: fields.number(ColumnId::MaxVelocity),
        burn_time: fields.number(ColumnId::BurnTime),
        ullage: fields.flag(ColumnId::Ullage),
        hp_fuel: fields.flag(ColumnId::HpFuel),
        tech: fields.text(ColumnId::Tech),
        ignitions: fields.number(ColumnId::Ignitions),
        gimbal: fields.flag(ColumnId::Gimbal),
        min_thrust: fields.number(ColumnId::MinThrust),
        residuals: fields.number(ColumnId::Residuals),
        engine_mass: fields.number(ColumnId::EngineMass),
        fuel: fields.text(ColumnId::Fuel),
    })
}

struct Fields<'a>(&'a RawRecord);

impl<'a> Fields<'a> {
    /// First non-null value under any of the column's source keys
    fn lookup(&self, column: ColumnId) -> Option<&'a JsonValue> {
        mapping(column)
            .keys
            .iter()
            .find_map(|key| self.0.get(*key).filter(|value| !value.is_null()))
    }

    fn required<T>(
        &self,
        column: ColumnId,
        extract: impl FnOnce(&'a JsonValue) -> Option<T>,
    ) -> Result<T, IssueKind> {
        let value = self.lookup(column).ok_or(IssueKind::MissingField(column))?;
        extract(value).ok_or(IssueKind::WrongType(column))
    }

    fn required_number(&self, column: ColumnId) -> Result<f64, IssueKind> {
        self.required(column, |v| v.as_f64().map(unsigned_zero))
    }

    fn required_text(&self, column: ColumnId) -> Result<String, IssueKind> {
        self.required(column, |v| v.as_str().map(str::to_string))
    }

    /// Numeric or textual cell, `N/A` when absent
    fn value(&self, column: ColumnId) -> Value {
        match self.lookup(column) {
            Some(JsonValue::Number(n)) => match n.as_f64() {
                Some(v) => Value::Number(unsigned_zero(v)),
                None => Value::Text(n.to_string()),
            },
            Some(JsonValue::String(s)) => Value::Text(s.clone()),
            Some(other) => Value::Text(other.to_string()),
            None => fallback_value(column),
        }
    }

    /// Cosmetic number, absent when missing or not numeric
    fn number(&self, column: ColumnId) -> Option<f64> {
        self.lookup(column).and_then(JsonValue::as_f64).map(unsigned_zero)
    }

    fn text(&self, column: ColumnId) -> String {
        match self.lookup(column) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => fallback_value(column).to_string(),
        }
    }

    /// Truthiness of the source value
    fn flag(&self, column: ColumnId) -> bool {
        match self.lookup(column) {
            Some(JsonValue::Bool(b)) => *b,
            Some(JsonValue::Number(n)) => n.as_f64().map_or(false, |v| v != 0.0 && !v.is_nan()),
            Some(JsonValue::String(s)) => !s.is_empty(),
            Some(_) => true,
            None => false,
        }
    }
}

/// `-0.0` becomes `0.0` so it displays and filters like every other zero
fn unsigned_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

fn fallback_value(column: ColumnId) -> Value {
    match mapping(column).fallback {
        Fallback::False => Value::from("False"),
        _ => Value::from(NOT_APPLICABLE),
    }
}
