//! Test fixtures for directory payloads and cache records.

use dircache_core::{FranchiseRecord, OutletRecord};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

/// Raw token accepted by `AppConfig::for_testing()`.
#[allow(dead_code)]
pub const TEST_API_TOKEN: &str = "test-api-token";

/// Compute SHA-256 hash of data as hex string.
#[allow(dead_code)]
pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// One raw franchise row as the directory might send it.
///
/// Alternates between key spellings so every page exercises the alias lookup.
#[allow(dead_code)]
pub fn raw_franchise(i: u64) -> Value {
    if i % 2 == 0 {
        json!({
            "fid": format!("F-{i:04}"),
            "name": format!("Franchise {i}"),
            "company": {"name": format!("Company {i}"), "address": format!("{i} Main Street")},
            "created_at": "2024-01-01T00:00:00Z",
            "outlets": [
                {"oid": format!("O-{i}-1"), "name": "Central", "valid_until": "2999-01-01"},
                {"oid": format!("O-{i}-2"), "name": "Harbour", "valid_until": "2001-01-01"}
            ]
        })
    } else {
        json!({
            "franchiseId": i,
            "franchiseName": format!("Franchise {i}"),
            "companyName": format!("Company {i}"),
            "companyAddress": format!("{i} Side Road"),
            "createdAt": "2024-01-01 00:00:00",
            "stores": {"outletId": format!("O-{i}-1"), "outletName": "Airport"}
        })
    }
}

/// Raw rows `first..first + count`.
#[allow(dead_code)]
pub fn raw_franchises(first: u64, count: u64) -> Vec<Value> {
    (first..first + count).map(raw_franchise).collect()
}

/// A normalized record with one active outlet.
#[allow(dead_code)]
pub fn franchise_record(fid: &str, name: &str) -> FranchiseRecord {
    FranchiseRecord {
        fid: Some(fid.to_string()),
        name: Some(name.to_string()),
        company: Some(format!("{name} Holdings")),
        company_address: Some("1 Test Street".to_string()),
        created_at: None,
        updated_at: None,
        outlets: vec![OutletRecord {
            id: Some(format!("{fid}-O1")),
            name: Some(format!("{name} Central")),
            is_active: true,
            ..Default::default()
        }],
    }
}
