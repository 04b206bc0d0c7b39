//! Session snapshot: the single value handed from the control loop to the
//! presentation layer after every run.
//!
//! Wire format (JSON):
//!
//! ```text
//! {
//!   "measured_data":  { "<type>": { "columns": [..], "index": [..], "data": [[..]] } },
//!   "simulated_data": { "columns": [..], "index": [..], "data": [[..]] },
//!   "params":         { "<name>": { "name", "value", "vary": "True", "min", "max" } }
//! }
//! ```
//!
//! After a failed run all three fields are empty objects (`{}`), never absent.
//! `params` keeps the model's declaration order both in memory and on the wire.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::types::{ParamRow, Table};

/// One entry of the `params` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
    pub name: String,
    pub value: f64,
    /// Stringified boolean, `"True"` or `"False"`.
    pub vary: String,
    pub min: f64,
    pub max: f64,
}

/// Parameter entries keyed by name, in model order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap(Vec<ParamEntry>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing one with the same name in place.
    pub fn insert(&mut self, entry: ParamEntry) {
        match self.0.iter_mut().find(|p| p.name == entry.name) {
            Some(slot) => *slot = entry,
            None => self.0.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamEntry> {
        self.0.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamEntry> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<&str> for ParamMap {
    type Output = ParamEntry;

    fn index(&self, name: &str) -> &ParamEntry {
        match self.get(name) {
            Some(entry) => entry,
            None => panic!("no parameter named `{name}`"),
        }
    }
}

impl FromIterator<ParamEntry> for ParamMap {
    fn from_iter<I: IntoIterator<Item = ParamEntry>>(iter: I) -> Self {
        let mut map = Self::new();
        for entry in iter {
            map.insert(entry);
        }
        map
    }
}

impl Serialize for ParamMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.name, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParamMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParamMapVisitor;

        impl<'de> Visitor<'de> for ParamMapVisitor {
            type Value = ParamMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of parameter entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ParamMap, A::Error> {
                let mut map = ParamMap::new();
                while let Some((_, entry)) = access.next_entry::<String, ParamEntry>()? {
                    map.insert(entry);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ParamMapVisitor)
    }
}

/// Simulation payload: a table, or `{}` when there is nothing to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimulatedData {
    Table(Table),
    Empty {},
}

impl SimulatedData {
    pub fn table(&self) -> Option<&Table> {
        match self {
            SimulatedData::Table(t) => Some(t),
            SimulatedData::Empty {} => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub measured_data: BTreeMap<String, Table>,
    pub simulated_data: SimulatedData,
    pub params: ParamMap,
}

impl Snapshot {
    pub fn new(
        measured_data: BTreeMap<String, Table>,
        simulated: Table,
        params: ParamMap,
    ) -> Self {
        Self {
            measured_data,
            simulated_data: SimulatedData::Table(simulated),
            params,
        }
    }

    /// The placeholder produced by a failed run.
    pub fn empty() -> Self {
        Self {
            measured_data: BTreeMap::new(),
            simulated_data: SimulatedData::Empty {},
            params: ParamMap::new(),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.measured_data.is_empty()
    }

    /// The parameter table as the dashboard shows and edits it, in model order.
    pub fn param_rows(&self) -> Vec<ParamRow> {
        self.params
            .iter()
            .map(|p| ParamRow {
                name: p.name.clone(),
                value: p.value,
                vary: p.vary.clone(),
                min: p.min,
                max: p.max,
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
