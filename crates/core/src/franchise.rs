//! Canonical franchise and outlet records.

use serde::{Deserialize, Serialize};

/// A physical location belonging to a franchise.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub maps_url: Option<String>,
    /// Upstream validity timestamp, kept as reported.
    pub valid_until: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Derived from `valid_until` at normalization time.
    pub is_active: bool,
}

/// A merchant account from the external directory, in canonical form.
///
/// Timestamps are the strings the upstream reported; they are not reinterpreted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FranchiseRecord {
    pub fid: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub company_address: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub outlets: Vec<OutletRecord>,
}

impl FranchiseRecord {
    pub fn outlet_count(&self) -> usize {
        self.outlets.len()
    }

    pub fn active_outlet_count(&self) -> usize {
        self.outlets.iter().filter(|o| o.is_active).count()
    }

    /// Lowercased outlet id, name, address and maps url values, one per line.
    pub fn outlet_search_text(&self) -> String {
        self.outlets
            .iter()
            .flat_map(|o| [&o.id, &o.name, &o.address, &o.maps_url])
            .flatten()
            .filter(|value| !value.is_empty())
            .map(|value| value.to_lowercase())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
