//! Normalization of raw directory payloads into canonical records.
//!
//! The upstream payload has no fixed schema: the same logical field shows up under
//! different keys depending on the endpoint version. Each field is resolved by
//! trying an ordered list of candidate keys and taking the first non-empty value.
//! Normalization is total: any JSON value maps to a record or to `None`.

use crate::franchise::{FranchiseRecord, OutletRecord};
use crate::timestamp::outlet_is_active;
use serde_json::{Map, Value};
use time::OffsetDateTime;

const FID_KEYS: &[&str] = &["fid", "franchise_id", "franchiseId", "id"];
const FRANCHISE_NAME_KEYS: &[&str] = &["name", "franchise_name", "franchiseName", "title"];
const COMPANY_KEYS: &[&str] = &["company", "company_name", "companyName"];
const COMPANY_ADDRESS_KEYS: &[&str] = &["company_address", "companyAddress", "address"];
const CREATED_KEYS: &[&str] = &["created_at", "createdAt", "created"];
const UPDATED_KEYS: &[&str] = &["updated_at", "updatedAt", "updated"];
const OUTLET_LIST_KEYS: &[&str] = &["outlets", "outlet", "stores", "branches"];

const OID_KEYS: &[&str] = &["oid", "outlet_id", "outletId", "id"];
const OUTLET_NAME_KEYS: &[&str] = &["name", "outlet_name", "outletName"];
const OUTLET_ADDRESS_KEYS: &[&str] = &["address", "outlet_address", "outletAddress"];
const MAPS_URL_KEYS: &[&str] = &["maps_url", "mapsUrl", "google_maps_url", "map_url", "gmaps"];
const VALID_UNTIL_KEYS: &[&str] = &[
    "valid_until",
    "validUntil",
    "expired_at",
    "expiredAt",
    "expires_at",
];

/// Return the first candidate key holding a usable scalar, as a trimmed string.
///
/// Strings are trimmed and skipped when empty; numbers are stringified. Nulls,
/// booleans, objects and arrays never match.
pub fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| scalar_to_string(obj.get(*key)?))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Company metadata may be flat (`company_name`) or nested (`company: {name, address}`).
fn nested_company(obj: &Map<String, Value>) -> Option<&Map<String, Value>> {
    obj.get("company").and_then(Value::as_object)
}

/// Normalize one raw outlet. Returns `None` when no known field is present.
pub fn normalize_outlet(raw: &Value, now: OffsetDateTime) -> Option<OutletRecord> {
    let obj = raw.as_object()?;

    let id = first_str(obj, OID_KEYS);
    let name = first_str(obj, OUTLET_NAME_KEYS);
    let address = first_str(obj, OUTLET_ADDRESS_KEYS);
    let maps_url = first_str(obj, MAPS_URL_KEYS);
    let valid_until = first_str(obj, VALID_UNTIL_KEYS);
    let created_at = first_str(obj, CREATED_KEYS);
    let updated_at = first_str(obj, UPDATED_KEYS);

    let recognized = [
        &id,
        &name,
        &address,
        &maps_url,
        &valid_until,
        &created_at,
        &updated_at,
    ]
    .iter()
    .any(|field| field.is_some());
    if !recognized {
        return None;
    }

    let is_active = outlet_is_active(valid_until.as_deref(), now);

    Some(OutletRecord {
        id,
        name,
        address,
        maps_url,
        valid_until,
        created_at,
        updated_at,
        is_active,
    })
}

/// Normalize one raw franchise. Returns `None` when no known field is present.
///
/// Unrecognizable outlets are dropped individually; a franchise with only
/// recognizable outlets and no top-level fields is still kept.
pub fn normalize_franchise(raw: &Value, now: OffsetDateTime) -> Option<FranchiseRecord> {
    let obj = raw.as_object()?;
    let company_obj = nested_company(obj);

    let fid = first_str(obj, FID_KEYS);
    let name = first_str(obj, FRANCHISE_NAME_KEYS);
    let company = first_str(obj, COMPANY_KEYS)
        .or_else(|| company_obj.and_then(|c| first_str(c, &["name", "company_name"])));
    let company_address = first_str(obj, COMPANY_ADDRESS_KEYS)
        .or_else(|| company_obj.and_then(|c| first_str(c, &["address", "company_address"])));
    let created_at = first_str(obj, CREATED_KEYS);
    let updated_at = first_str(obj, UPDATED_KEYS);

    let outlets: Vec<OutletRecord> = OUTLET_LIST_KEYS
        .iter()
        .find_map(|key| match obj.get(*key)? {
            Value::Array(items) => Some(items.iter().collect::<Vec<_>>()),
            single @ Value::Object(_) => Some(vec![single]),
            _ => None,
        })
        .unwrap_or_default()
        .into_iter()
        .filter_map(|raw_outlet| normalize_outlet(raw_outlet, now))
        .collect();

    let recognized = [
        &fid,
        &name,
        &company,
        &company_address,
        &created_at,
        &updated_at,
    ]
    .iter()
    .any(|field| field.is_some())
        || !outlets.is_empty();
    if !recognized {
        return None;
    }

    Some(FranchiseRecord {
        fid,
        name,
        company,
        company_address,
        created_at,
        updated_at,
        outlets,
    })
}
