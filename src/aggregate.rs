use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::record::CaseRecord;

/// Most recent record per country name.
pub type Snapshot = BTreeMap<String, CaseRecord>;

/// Per-day snapshots and the days they cover, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatedSnapshots {
    pub by_day: BTreeMap<String, Snapshot>,
    pub days: Vec<String>,
}

impl DatedSnapshots {
    pub fn get(&self, day: &str) -> Option<&Snapshot> {
        self.by_day.get(day)
    }

    pub fn latest_day(&self) -> Option<&str> {
        self.days.first().map(String::as_str)
    }
}

/// Parse a report date into a comparable instant. Date-only values are taken
/// as midnight; values without an offset are taken as UTC.
pub fn parse_report_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// The day portion of a report date: the text before any time component.
pub fn day_of(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.find(['T', ' ']) {
        Some(end) => &raw[..end],
        None => raw,
    }
}

fn when(record: &CaseRecord) -> Option<NaiveDateTime> {
    record.report_date.as_deref().and_then(parse_report_date)
}

/// Keep `candidate` only when it is strictly newer than what is stored. A
/// missing or unparseable date sorts before every valid one, so on a tie the
/// record seen first stays.
fn reduce_into(snapshot: &mut Snapshot, candidate: &CaseRecord) {
    match snapshot.get_mut(&candidate.country_name) {
        None => {
            snapshot.insert(candidate.country_name.clone(), candidate.clone());
        }
        Some(stored) => {
            if when(candidate).cmp(&when(stored)) == Ordering::Greater {
                *stored = candidate.clone();
            }
        }
    }
}

pub fn latest_by_country(records: &[CaseRecord]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for record in records {
        reduce_into(&mut snapshot, record);
    }
    snapshot
}

/// Bucket records by day and reduce each bucket like [`latest_by_country`].
/// Records without a report date belong to no day.
pub fn by_date(records: &[CaseRecord]) -> DatedSnapshots {
    let mut by_day: BTreeMap<String, Snapshot> = BTreeMap::new();
    for record in records {
        let Some(raw) = record.report_date.as_deref() else {
            continue;
        };
        let day = day_of(raw);
        if day.is_empty() {
            continue;
        }
        reduce_into(by_day.entry(day.to_string()).or_default(), record);
    }

    let mut days: Vec<String> = by_day.keys().cloned().collect();
    days.sort_by(|a, b| {
        let key = |d: &str| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok();
        key(b).cmp(&key(a)).then_with(|| b.cmp(a))
    });

    DatedSnapshots { by_day, days }
}

/// The snapshot to show: the latest record per country, or the records of one
/// day. `None` when `day` has no records.
pub fn snapshot_for(records: &[CaseRecord], day: Option<&str>) -> Option<Snapshot> {
    match day {
        None => Some(latest_by_country(records)),
        Some(day) => by_date(records).by_day.remove(day),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::record;

    #[test]
    fn keeps_latest_record_per_country() {
        let records = vec![
            record("A", 10, "2024-01-01"),
            record("A", 20, "2024-01-02"),
        ];
        let snapshot = latest_by_country(&records);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["A"].confirmed, 20);
    }

    #[test]
    fn order_of_input_does_not_matter_for_distinct_dates() {
        let records = vec![
            record("A", 30, "2024-01-03"),
            record("B", 1, "2023-12-31"),
            record("A", 10, "2024-01-01"),
            record("B", 2, "2024-01-05"),
            record("A", 20, "2024-01-02"),
        ];
        let snapshot = latest_by_country(&records);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["A"].report_date.as_deref(), Some("2024-01-03"));
        assert_eq!(snapshot["B"].confirmed, 2);

        for (name, chosen) in &snapshot {
            let max = records
                .iter()
                .filter(|r| &r.country_name == name)
                .filter_map(when)
                .max();
            assert_eq!(when(chosen), max);
        }
    }

    #[test]
    fn comparison_is_chronological_not_lexical() {
        // Lexically "2024-01-02T09:00:00+05:00" sorts after the second one but
        // is three hours earlier in UTC.
        let records = vec![
            record("A", 1, "2024-01-02T09:00:00+05:00"),
            record("A", 2, "2024-01-02T07:00:00Z"),
        ];
        assert_eq!(latest_by_country(&records)["A"].confirmed, 2);
    }

    #[test]
    fn first_record_wins_on_equal_dates() {
        let records = vec![
            record("A", 1, "2024-01-02"),
            record("A", 2, "2024-01-02T00:00:00"),
        ];
        assert_eq!(latest_by_country(&records)["A"].confirmed, 1);
    }

    #[test]
    fn missing_dates_lose_to_valid_ones() {
        let mut undated = record("A", 1, "");
        undated.report_date = None;
        let records = vec![undated.clone(), record("A", 2, "2020-01-01"), undated];
        assert_eq!(latest_by_country(&records)["A"].confirmed, 2);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let records = vec![
            record("A", 1, "2024-01-01"),
            record("B", 5, "2024-01-02"),
            record("A", 3, "2024-01-04"),
        ];
        assert_eq!(latest_by_country(&records), latest_by_country(&records));
        assert_eq!(by_date(&records), by_date(&records));
    }

    #[test]
    fn buckets_by_day_most_recent_first() {
        let records = vec![
            record("A", 1, "2024-01-01T08:00:00"),
            record("A", 2, "2024-01-01T20:00:00"),
            record("B", 3, "2024-01-01"),
            record("A", 4, "2024-01-03T00:00:00Z"),
            record("B", 5, "2024-01-02 10:00:00"),
        ];
        let dated = by_date(&records);
        assert_eq!(dated.days, vec!["2024-01-03", "2024-01-02", "2024-01-01"]);
        assert_eq!(dated.latest_day(), Some("2024-01-03"));

        let first = dated.get("2024-01-01").unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first["A"].confirmed, 2);
        assert_eq!(first["B"].confirmed, 3);
        assert_eq!(dated.get("2024-01-02").unwrap()["B"].confirmed, 5);
        assert!(dated.get("2024-01-04").is_none());
    }

    #[test]
    fn snapshot_for_a_day() {
        let records = vec![
            record("A", 1, "2024-01-01"),
            record("A", 2, "2024-01-02"),
        ];
        assert_eq!(snapshot_for(&records, None).unwrap()["A"].confirmed, 2);
        assert_eq!(snapshot_for(&records, Some("2024-01-01")).unwrap()["A"].confirmed, 1);
        assert!(snapshot_for(&records, Some("1999-12-31")).is_none());
    }

    #[test]
    fn day_of_strips_time() {
        assert_eq!(day_of("2024-05-06T07:08:09Z"), "2024-05-06");
        assert_eq!(day_of("2024-05-06 07:08"), "2024-05-06");
        assert_eq!(day_of("2024-05-06"), "2024-05-06");
    }
}
