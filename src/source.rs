//! Fetching and decoding of case payloads.
//!
//! Payloads come in a handful of shapes: a bare array or an OData style
//! `{ "value": [...] }` envelope, and items that are either flat, carry a
//! nested `country` object, or reference a country by numeric id. All of that
//! is decoded here into [`RawCase`] so that the aggregator never has to probe
//! fields.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{self, DeserializeOwned, Deserializer, Unexpected, Visitor};
use tracing::{debug, info, warn};

use crate::record::{CaseRecord, Country};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed payload from {origin}: {source}")]
    Decode {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Response body: a bare array or an envelope with a `value` array.
#[derive(Debug, serde_derive::Deserialize)]
#[serde(untagged)]
pub enum Payload<T> {
    Bare(Vec<T>),
    Envelope { value: Vec<T> },
}

/// A count as sent by the API: an integer, or a float without fraction
/// (`3.0`). `null` reads as absent.
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    struct CountVisitor;

    impl<'de> Visitor<'de> for CountVisitor {
        type Value = Option<u64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative whole number or null")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v)
                .map(Some)
                .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v < u64::MAX as f64 {
                Ok(Some(v as u64))
            } else {
                Err(E::invalid_value(Unexpected::Float(v), &self))
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
            deserializer.deserialize_any(self)
        }
    }

    deserializer.deserialize_any(CountVisitor)
}

impl<T> Payload<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Payload::Bare(items) => items,
            Payload::Envelope { value } => value,
        }
    }
}

/// Counts shared by every item shape. Absent or null counts read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde_derive::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    #[serde(default, deserialize_with = "count")]
    pub confirmed: Option<u64>,
    #[serde(default, deserialize_with = "count")]
    pub deaths: Option<u64>,
    #[serde(default, deserialize_with = "count")]
    pub recovered: Option<u64>,
    #[serde(default, deserialize_with = "count")]
    pub active: Option<u64>,
    #[serde(default, deserialize_with = "count")]
    pub daily_confirmed: Option<u64>,
    #[serde(default, deserialize_with = "count")]
    pub daily_deaths: Option<u64>,
    #[serde(default)]
    pub report_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NormalizedCase {
    pub country_id: i64,
    #[serde(default)]
    pub report_date: Option<String>,
    #[serde(default, deserialize_with = "count")]
    pub confirmed: Option<u64>,
    #[serde(default, deserialize_with = "count")]
    pub deaths: Option<u64>,
    #[serde(default, deserialize_with = "count")]
    pub recovered: Option<u64>,
    #[serde(default, deserialize_with = "count")]
    pub active: Option<u64>,
    #[serde(default, deserialize_with = "count")]
    pub daily_confirmed: Option<u64>,
    #[serde(default, deserialize_with = "count")]
    pub daily_deaths: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRef {
    pub country_name: String,
    #[serde(default)]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedCase {
    pub country: CountryRef,
    /// Flat name and code some payloads send next to `country`; used when
    /// the nested name is empty.
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(flatten)]
    pub counts: Counts,
}

#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatCase {
    pub country_name: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(flatten)]
    pub counts: Counts,
}

/// One decoded item. Variant order matters: the first shape that fits wins.
#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Deserialize)]
#[serde(untagged)]
pub enum RawCase {
    Normalized(NormalizedCase),
    Nested(NestedCase),
    Flat(FlatCase),
}

/// `Id` -> [`Country`] lookup for normalized payloads.
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    by_id: HashMap<i64, Country>,
}

impl CountryTable {
    pub fn get(&self, id: i64) -> Option<&Country> {
        self.by_id.get(&id)
    }
}

impl FromIterator<Country> for CountryTable {
    fn from_iter<I: IntoIterator<Item = Country>>(iter: I) -> Self {
        Self {
            by_id: iter.into_iter().map(|c| (c.id, c)).collect(),
        }
    }
}

impl Counts {
    fn into_record(self, country_name: String, country_code: Option<String>) -> CaseRecord {
        CaseRecord {
            country_name,
            country_code,
            confirmed: self.confirmed.unwrap_or(0),
            deaths: self.deaths.unwrap_or(0),
            recovered: self.recovered.unwrap_or(0),
            active: self.active.unwrap_or(0),
            daily_confirmed: self.daily_confirmed.unwrap_or(0),
            daily_deaths: self.daily_deaths.unwrap_or(0),
            report_date: self.report_date,
        }
    }
}

impl RawCase {
    /// Resolve to a [`CaseRecord`]. `None` when a normalized item references
    /// a country missing from `countries`.
    pub fn resolve(self, countries: Option<&CountryTable>) -> Option<CaseRecord> {
        match self {
            RawCase::Flat(FlatCase {
                country_name,
                country_code,
                counts,
            }) => Some(counts.into_record(country_name, country_code)),
            RawCase::Nested(NestedCase {
                country,
                country_name,
                country_code,
                counts,
            }) => {
                let (name, code) = if country.country_name.is_empty() {
                    (country_name.unwrap_or_default(), country_code)
                } else {
                    (country.country_name, country.country_code.or(country_code))
                };
                Some(counts.into_record(name, code))
            }
            RawCase::Normalized(case) => {
                let country = countries?.get(case.country_id)?;
                let counts = Counts {
                    confirmed: case.confirmed,
                    deaths: case.deaths,
                    recovered: case.recovered,
                    active: case.active,
                    daily_confirmed: case.daily_confirmed,
                    daily_deaths: case.daily_deaths,
                    report_date: case.report_date,
                };
                Some(counts.into_record(
                    country.country_name.clone(),
                    Some(country.country_code.clone()),
                ))
            }
        }
    }
}

/// Decode a case payload. Items of an unrecognized shape are dropped.
pub fn decode_cases(origin: &str, body: &[u8]) -> Result<Vec<RawCase>, FetchError> {
    let items = decode_payload::<serde_json::Value>(origin, body)?;
    let total = items.len();
    let cases: Vec<RawCase> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if cases.len() < total {
        warn!(
            "{origin}: dropped {} of {total} items with an unrecognized shape",
            total - cases.len()
        );
    }
    Ok(cases)
}

pub fn decode_countries(origin: &str, body: &[u8]) -> Result<CountryTable, FetchError> {
    Ok(decode_payload::<Country>(origin, body)?.into_iter().collect())
}

fn decode_payload<T: DeserializeOwned>(origin: &str, body: &[u8]) -> Result<Vec<T>, FetchError> {
    serde_json::from_slice::<Payload<T>>(body)
        .map(Payload::into_items)
        .map_err(|source| FetchError::Decode {
            origin: origin.to_string(),
            source,
        })
}

/// Resolve every item, dropping the ones whose country id is unknown.
pub fn resolve_all(cases: Vec<RawCase>, countries: Option<&CountryTable>) -> Vec<CaseRecord> {
    let total = cases.len();
    let records: Vec<CaseRecord> = cases
        .into_iter()
        .filter_map(|case| case.resolve(countries))
        .collect();
    if records.len() < total {
        debug!(
            "dropped {} of {total} records with an unresolved country id",
            total - records.len()
        );
    }
    records
}

/// Where case records come from.
#[derive(Debug, Clone)]
pub enum Source {
    Http {
        cases_url: String,
        countries_url: Option<String>,
        take: Option<u32>,
    },
    File {
        path: std::path::PathBuf,
    },
}

impl Source {
    /// Load and resolve every record. Runs to completion, no retries.
    pub async fn load(&self) -> Result<Vec<CaseRecord>, FetchError> {
        match self {
            Source::Http {
                cases_url,
                countries_url,
                take,
            } => {
                let client = reqwest::Client::new();
                let query = take.map(|take| vec![("skip", 0), ("take", take)]);
                let body = get(&client, cases_url, query.as_deref()).await?;
                let cases = decode_cases(cases_url, &body)?;
                let countries = match countries_url {
                    Some(url) => {
                        let body = get(&client, url, None).await?;
                        Some(decode_countries(url, &body)?)
                    }
                    None => None,
                };
                Ok(resolve_all(cases, countries.as_ref()))
            }
            Source::File { path } => {
                let origin = path.display().to_string();
                let body = read_file(path).await?;
                let cases = decode_cases(&origin, &body)?;
                Ok(resolve_all(cases, None))
            }
        }
    }
}

async fn get(
    client: &reqwest::Client,
    url: &str,
    query: Option<&[(&str, u32)]>,
) -> Result<Vec<u8>, FetchError> {
    info!("GET {url}");
    let http = |source: reqwest::Error| FetchError::Http {
        url: url.to_string(),
        source,
    };

    let mut request = client.get(url);
    if let Some(query) = query {
        request = request.query(query);
    }
    let response = request.send().await.map_err(http)?;
    if !response.status().is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }
    let body = response.bytes().await.map_err(http)?;
    Ok(body.to_vec())
}

async fn read_file(path: &Path) -> Result<Vec<u8>, FetchError> {
    tokio::fs::read(path).await.map_err(|source| FetchError::Read {
        path: path.display().to_string(),
        source,
    })
}
