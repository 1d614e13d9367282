use std::collections::BTreeMap;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// The addresses of the contracts deployed by the migrations, keyed by
/// contract name.
#[derive(Default, Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Addresses(BTreeMap<String, Address>);

impl Addresses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the address of a contract. A later deployment of the same
    /// contract replaces the earlier address.
    pub fn insert(&mut self, name: impl Into<String>, address: Address) {
        self.0.insert(name.into(), address);
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.0.iter().map(|(name, address)| (name.as_str(), *address))
    }
}

impl FromIterator<(String, Address)> for Addresses {
    fn from_iter<I: IntoIterator<Item = (String, Address)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
