//! Extraction of rows, totals and tokens from loosely-shaped directory responses.

use crate::OutletLookup;
use crate::token::AuthToken;
use dircache_core::normalize::first_str;
use dircache_core::parse_upstream_timestamp;
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

const ROW_KEYS: &[&str] = &["data", "results", "franchises", "items"];
const TOTAL_COUNT_KEYS: &[&str] = &["total", "total_count", "totalCount", "count"];
const TOTAL_PAGES_KEYS: &[&str] = &["total_pages", "totalPages", "last_page", "lastPage", "pages"];
const META_KEYS: &[&str] = &["meta", "pagination"];

const TOKEN_KEYS: &[&str] = &["token", "access_token", "accessToken", "jwt"];
const EXPIRES_AT_KEYS: &[&str] = &["expires_at", "expiresAt", "expiry"];
const EXPIRES_IN_KEYS: &[&str] = &["expires_in", "expiresIn"];

/// Rows and paging hints from one list response.
#[derive(Debug, Default, PartialEq)]
pub struct PagePayload {
    pub rows: Vec<Value>,
    pub total_count: Option<u64>,
    pub total_pages: Option<u64>,
}

/// Split a list response into rows and optional totals.
///
/// Unknown shapes yield no rows and no totals.
pub fn parse_franchise_page(body: &Value) -> PagePayload {
    match body {
        Value::Array(rows) => PagePayload {
            rows: rows.clone(),
            ..Default::default()
        },
        Value::Object(obj) => {
            // `data` may itself be an envelope carrying rows and totals.
            let inner = obj.get("data").and_then(Value::as_object);
            let rows = find_rows(obj)
                .or_else(|| inner.and_then(find_rows))
                .unwrap_or_default();

            let scopes: Vec<&Map<String, Value>> = std::iter::once(obj)
                .chain(inner)
                .flat_map(|scope| {
                    std::iter::once(scope).chain(
                        META_KEYS
                            .iter()
                            .filter_map(move |key| scope.get(*key).and_then(Value::as_object)),
                    )
                })
                .collect();

            PagePayload {
                rows,
                total_count: scopes.iter().find_map(|s| find_count(s, TOTAL_COUNT_KEYS)),
                total_pages: scopes.iter().find_map(|s| find_count(s, TOTAL_PAGES_KEYS)),
            }
        }
        _ => PagePayload::default(),
    }
}

fn find_rows(obj: &Map<String, Value>) -> Option<Vec<Value>> {
    ROW_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array).cloned())
}

fn find_count(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Extract a bearer token and its expiry from an authenticate response.
///
/// Returns `None` when no token is present.
pub fn parse_auth_response(
    body: &Value,
    now: OffsetDateTime,
    default_ttl: Duration,
) -> Option<AuthToken> {
    let obj = body.as_object()?;
    let inner = obj.get("data").and_then(Value::as_object);
    let scopes: Vec<&Map<String, Value>> = std::iter::once(obj).chain(inner).collect();

    let value = scopes.iter().find_map(|s| first_str(s, TOKEN_KEYS))?;

    let absolute = scopes
        .iter()
        .find_map(|s| first_str(s, EXPIRES_AT_KEYS))
        .and_then(|raw| parse_upstream_timestamp(&raw).ok());
    let relative = scopes
        .iter()
        .find_map(|s| find_count(s, EXPIRES_IN_KEYS))
        .map(|secs| now.saturating_add(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))));

    Some(AuthToken {
        value,
        expires_at: absolute
            .or(relative)
            .unwrap_or_else(|| now.saturating_add(default_ttl)),
    })
}

/// Read franchise and outlet names from a single-outlet response.
pub fn parse_outlet_lookup(body: &Value) -> OutletLookup {
    let Some(obj) = body.as_object() else {
        return OutletLookup {
            franchise_name: None,
            outlet_name: None,
            found: true,
        };
    };
    let data = obj.get("data").and_then(Value::as_object).unwrap_or(obj);
    let nested = |key: &str| data.get(key).and_then(Value::as_object);

    let franchise_name = first_str(data, &["franchise_name", "franchiseName"]).or_else(|| {
        nested("franchise").and_then(|f| first_str(f, &["name", "franchise_name"]))
    });
    let outlet_name = first_str(data, &["outlet_name", "outletName"])
        .or_else(|| nested("outlet").and_then(|o| first_str(o, &["name", "outlet_name"])))
        .or_else(|| first_str(data, &["name"]));

    OutletLookup {
        franchise_name,
        outlet_name,
        found: true,
    }
}
