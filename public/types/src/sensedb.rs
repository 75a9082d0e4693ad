use std::{
    collections::{BTreeMap, BTreeSet, btree_map},
    error::Error,
    fs::File,
    path::Path,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::coord::{BitCoord, SenseBit};

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("record {key} already exists with different bits")]
    DuplicateRecord { key: String },
}

/// The bits attributed to one probe target of one job.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SenseRecord {
    pub prefix: String,
    pub target: String,
    pub members: Vec<String>,
    pub bits: BTreeSet<SenseBit>,
}

impl SenseRecord {
    pub fn key(&self) -> String {
        format!("{}{}", self.prefix, self.target)
    }
}

/// Append-only store of bit-sense records plus the log of bits that were
/// attributed to more than one probe target of the same job.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SenseDb {
    pub records: BTreeMap<String, SenseRecord>,
    pub ambiguities: BTreeMap<String, BTreeMap<BitCoord, BTreeSet<String>>>,
}

impl SenseDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let f = File::open(path)?;
        let mut cf = zstd::stream::Decoder::new(f)?;
        let config = bincode::config::standard();
        Ok(bincode::serde::decode_from_std_read(&mut cf, config)?)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let f = File::create(path)?;
        let mut cf = zstd::stream::Encoder::new(f, 9)?;
        let config = bincode::config::standard();
        bincode::serde::encode_into_std_write(self, &mut cf, config)?;
        cf.finish()?;
        Ok(())
    }

    pub fn insert_record(&mut self, record: SenseRecord) -> Result<(), StoreError> {
        match self.records.entry(record.key()) {
            btree_map::Entry::Vacant(e) => {
                e.insert(record);
                Ok(())
            }
            btree_map::Entry::Occupied(e) => {
                if *e.get() == record {
                    Ok(())
                } else {
                    Err(StoreError::DuplicateRecord {
                        key: e.key().clone(),
                    })
                }
            }
        }
    }

    pub fn insert_ambiguity(
        &mut self,
        prefix: &str,
        bit: BitCoord,
        targets: impl IntoIterator<Item = String>,
    ) {
        self.ambiguities
            .entry(prefix.into())
            .or_default()
            .entry(bit)
            .or_default()
            .extend(targets);
    }

    /// Appends another store. Fails without modifying `self` if any record
    /// would be overwritten with different contents.
    pub fn merge(&mut self, other: &SenseDb) -> Result<(), StoreError> {
        for (key, record) in &other.records {
            if let Some(cur) = self.records.get(key) {
                if cur != record {
                    return Err(StoreError::DuplicateRecord { key: key.clone() });
                }
            }
        }
        for record in other.records.values() {
            self.insert_record(record.clone())?;
        }
        for (prefix, bits) in &other.ambiguities {
            for (bit, targets) in bits {
                self.insert_ambiguity(prefix, bit.clone(), targets.iter().cloned());
            }
        }
        Ok(())
    }

    pub fn num_ambiguous(&self, prefix: &str) -> usize {
        self.ambiguities.get(prefix).map_or(0, |x| x.len())
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "records": serde_json::Map::from_iter(self.records.iter().map(|(key, rec)| {
                (
                    key.clone(),
                    json!({
                        "prefix": rec.prefix,
                        "target": rec.target,
                        "members": rec.members,
                        "bits": Vec::from_iter(rec.bits.iter().map(|b| b.to_string())),
                    }),
                )
            })),
            "ambiguities": serde_json::Map::from_iter(self.ambiguities.iter().map(|(prefix, bits)| {
                (
                    prefix.clone(),
                    serde_json::Map::from_iter(bits.iter().map(|(bit, targets)| {
                        (bit.to_string(), json!(targets.iter().collect_vec()))
                    }))
                    .into(),
                )
            })),
        })
    }
}
