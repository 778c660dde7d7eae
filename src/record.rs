use std::fmt;
use std::str::FromStr;

/// One country's case counts as of a report date.
#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub country_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    pub confirmed: u64,
    pub deaths: u64,
    pub recovered: u64,
    pub active: u64,
    pub daily_confirmed: u64,
    pub daily_deaths: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_date: Option<String>,
}

impl CaseRecord {
    /// A record with every count at zero.
    pub fn empty(country_name: impl Into<String>) -> Self {
        Self {
            country_name: country_name.into(),
            country_code: None,
            confirmed: 0,
            deaths: 0,
            recovered: 0,
            active: 0,
            daily_confirmed: 0,
            daily_deaths: 0,
            report_date: None,
        }
    }
}

/// Reference dimension of the normalized payload, joined by `Id`.
#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Deserialize, serde_derive::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Country {
    pub id: i64,
    pub country_code: String,
    pub country_name: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: Option<u64>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    clap::ValueEnum,
    serde_derive::Serialize,
    serde_derive::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Confirmed,
    Deaths,
    Recovered,
    Active,
    /// Daily confirmed plus daily deaths.
    Daily,
}

impl Metric {
    /// Tab order of the dashboard.
    pub const ALL: [Metric; 5] = [
        Metric::Confirmed,
        Metric::Deaths,
        Metric::Recovered,
        Metric::Active,
        Metric::Daily,
    ];

    pub fn select(self, record: &CaseRecord) -> u64 {
        match self {
            Metric::Confirmed => record.confirmed,
            Metric::Deaths => record.deaths,
            Metric::Recovered => record.recovered,
            Metric::Active => record.active,
            Metric::Daily => record.daily_confirmed.saturating_add(record.daily_deaths),
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Metric::Confirmed => "confirmed",
            Metric::Deaths => "deaths",
            Metric::Recovered => "recovered",
            Metric::Active => "active",
            Metric::Daily => "daily",
        }
    }

    /// Label used on the map tabs and legend.
    pub fn map_label(self) -> &'static str {
        match self {
            Metric::Confirmed => "Confirmed Cases",
            Metric::Deaths => "Deaths",
            Metric::Recovered => "Recovered",
            Metric::Active => "Active Cases",
            Metric::Daily => "Daily Report",
        }
    }

    /// Label used by the treemap color legend.
    pub fn treemap_label(self) -> &'static str {
        match self {
            Metric::Confirmed => "Confirmed",
            Metric::Deaths => "Deaths",
            Metric::Recovered => "Recovered",
            Metric::Active => "Active",
            Metric::Daily => "Daily Increase",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric {0:?}, expected one of confirmed, deaths, recovered, active, daily")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.key() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

#[cfg(test)]
pub(crate) fn record(name: &str, confirmed: u64, report_date: &str) -> CaseRecord {
    CaseRecord {
        confirmed,
        report_date: Some(report_date.to_string()),
        ..CaseRecord::empty(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_sums_incremental_fields() {
        let r = CaseRecord {
            confirmed: 100,
            daily_confirmed: 7,
            daily_deaths: 3,
            ..CaseRecord::empty("A")
        };
        assert_eq!(Metric::Daily.select(&r), 10);
        assert_eq!(Metric::Confirmed.select(&r), 100);
        assert_eq!(Metric::Deaths.select(&r), 0);

        let huge = CaseRecord {
            daily_confirmed: u64::MAX,
            daily_deaths: 1,
            ..CaseRecord::empty("A")
        };
        assert_eq!(Metric::Daily.select(&huge), u64::MAX);
    }

    #[test]
    fn every_metric_projects_its_field() {
        let r = CaseRecord {
            confirmed: 1,
            deaths: 2,
            recovered: 3,
            active: 4,
            daily_confirmed: 5,
            daily_deaths: 6,
            ..CaseRecord::empty("A")
        };
        let values: Vec<u64> = Metric::ALL.iter().map(|m| m.select(&r)).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 11]);
    }

    #[test]
    fn metric_round_trips_through_its_key() {
        for metric in Metric::ALL {
            assert_eq!(metric.key().parse::<Metric>(), Ok(metric));
        }
        assert_eq!(
            "weekly".parse::<Metric>(),
            Err(UnknownMetric("weekly".to_string()))
        );
    }

    #[test]
    fn record_serializes_camel_case() {
        let json = serde_json::to_value(record("Chad", 5, "2024-01-01")).unwrap();
        assert_eq!(json["countryName"], "Chad");
        assert_eq!(json["dailyConfirmed"], 0);
        assert_eq!(json["reportDate"], "2024-01-01");
        assert!(json.get("countryCode").is_none());
    }
}
