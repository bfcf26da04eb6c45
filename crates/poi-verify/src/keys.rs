//! Registry of milestone public keys and the index windows during which they are trusted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{MilestoneIndex, MilestonePublicKey};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyRangeError {
    #[error("Key range for {public_key} ends at {end_index} before it starts at {start_index}")]
    Inverted {
        public_key: MilestonePublicKey,
        start_index: MilestoneIndex,
        end_index: MilestoneIndex,
    },
}

/// Validity window `[start_index, end_index]` of a milestone public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawKeyRange")]
pub struct KeyRange {
    public_key: MilestonePublicKey,
    start_index: MilestoneIndex,
    end_index: MilestoneIndex,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKeyRange {
    public_key: MilestonePublicKey,
    start_index: MilestoneIndex,
    end_index: MilestoneIndex,
}

impl TryFrom<RawKeyRange> for KeyRange {
    type Error = KeyRangeError;

    fn try_from(raw: RawKeyRange) -> Result<Self, Self::Error> {
        KeyRange::new(raw.public_key, raw.start_index, raw.end_index)
    }
}

impl KeyRange {
    pub fn new(
        public_key: MilestonePublicKey,
        start_index: MilestoneIndex,
        end_index: MilestoneIndex,
    ) -> Result<Self, KeyRangeError> {
        if end_index < start_index {
            return Err(KeyRangeError::Inverted {
                public_key,
                start_index,
                end_index,
            });
        }
        Ok(Self {
            public_key,
            start_index,
            end_index,
        })
    }

    pub fn contains(&self, index: MilestoneIndex) -> bool {
        self.start_index <= index && index <= self.end_index
    }
}

/// Immutable set of key ranges, built once at startup.
///
/// Ranges may overlap; the list is small enough that lookups are a linear scan.
#[derive(Debug, Clone, Default)]
pub struct KeyRangeRegistry {
    ranges: Vec<KeyRange>,
}

impl KeyRangeRegistry {
    pub fn new(ranges: Vec<KeyRange>) -> Self {
        Self { ranges }
    }

    /// Every public key whose window contains `index`
    pub fn public_key_set(&self, index: MilestoneIndex) -> HashSet<MilestonePublicKey> {
        self.ranges
            .iter()
            .filter(|range| range.contains(index))
            .map(|range| range.public_key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl FromIterator<KeyRange> for KeyRangeRegistry {
    fn from_iter<I: IntoIterator<Item = KeyRange>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
