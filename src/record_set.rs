//! Heterogeneous set of records measured at one sweep point.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::collections::BTreeMap;

use crate::{AnyRecord, Metric, NavResult, NavigatorError, Record};

/// At most one record per metric kind, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<AnyRecord>,
}

/// Sets are equal when they hold equal records of the same kinds, in any order.
impl PartialEq for RecordSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .records
                .iter()
                .all(|r| other.get_by_tag(r.tag()) == Some(r))
    }
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record`, replacing an existing record of the same kind.
    pub fn insert<M: Metric>(&mut self, record: Record<M>) {
        self.insert_any(M::wrap(record));
    }

    pub fn insert_any(&mut self, record: AnyRecord) {
        match self.records.iter_mut().find(|r| r.tag() == record.tag()) {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    pub fn get<M: Metric>(&self) -> Option<Record<M>> {
        self.records.iter().find_map(M::unwrap)
    }

    pub fn get_by_tag(&self, tag: &str) -> Option<&AnyRecord> {
        self.records.iter().find(|r| r.tag() == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnyRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dictionary representation: metric tag to value.
    pub fn to_dict(&self) -> BTreeMap<String, f64> {
        self.records
            .iter()
            .map(|r| (r.tag().to_string(), r.value()))
            .collect()
    }

    pub fn from_dict(dict: &BTreeMap<String, f64>) -> NavResult<Self> {
        let mut out = Self::new();
        for (tag, value) in dict {
            let record = AnyRecord::from_tag(tag, *value).ok_or_else(|| {
                NavigatorError::InvalidArgument(format!("unknown record tag {tag:?}"))
            })?;
            out.insert_any(record);
        }
        Ok(out)
    }
}

impl Serialize for RecordSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_dict().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RecordSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dict = BTreeMap::<String, f64>::deserialize(deserializer)?;
        Self::from_dict(&dict).map_err(serde::de::Error::custom)
    }
}
