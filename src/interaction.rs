use crate::format::format_number;
use crate::record::{CaseRecord, Metric};
use crate::treemap::TreemapNode;

/// Multi-line tooltip payload.
#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Serialize)]
pub struct Tooltip {
    pub lines: Vec<String>,
}

impl Tooltip {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Pointer state of one visualization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Hover {
    #[default]
    Idle,
    Hovering(Tooltip),
}

impl Hover {
    pub fn enter(self, tooltip: Tooltip) -> Hover {
        Hover::Hovering(tooltip)
    }

    pub fn leave(self) -> Hover {
        Hover::Idle
    }

    pub fn tooltip(&self) -> Option<&Tooltip> {
        match self {
            Hover::Idle => None,
            Hover::Hovering(tooltip) => Some(tooltip),
        }
    }
}

fn metric_lines(record: &CaseRecord, metric: Metric) -> Vec<String> {
    match metric {
        Metric::Confirmed => vec![format!("Confirmed: {}", format_number(record.confirmed))],
        Metric::Deaths => vec![format!("Deaths: {}", format_number(record.deaths))],
        Metric::Recovered => vec![format!("Recovered: {}", format_number(record.recovered))],
        Metric::Active => vec![format!("Active: {}", format_number(record.active))],
        Metric::Daily => vec![
            format!("Daily Confirmed: {}", format_number(record.daily_confirmed)),
            format!("Daily Deaths: {}", format_number(record.daily_deaths)),
        ],
    }
}

/// Tooltip of a map feature. `record` is `None` when the feature has no data.
pub fn map_tooltip(feature_name: &str, record: Option<&CaseRecord>, metric: Metric) -> Tooltip {
    let lines = match record {
        Some(record) => {
            let mut lines = vec![feature_name.to_string()];
            lines.extend(metric_lines(record, metric));
            lines
        }
        None => vec![format!("{feature_name}: No data")],
    };
    Tooltip { lines }
}

pub fn treemap_tooltip(node: &TreemapNode, metric: Metric) -> Tooltip {
    let mut lines = vec![
        node.record.country_name.clone(),
        format!("{}% of total", node.percentage),
        String::new(),
    ];
    lines.extend(metric_lines(&node.record, metric));
    Tooltip { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::latest_by_country;
    use crate::record::record;
    use crate::treemap;

    #[test]
    fn enter_and_leave() {
        let tooltip = map_tooltip("Chad", None, Metric::Deaths);
        let hover = Hover::default().enter(tooltip.clone());
        assert_eq!(hover.tooltip(), Some(&tooltip));
        assert_eq!(hover.leave(), Hover::Idle);
    }

    #[test]
    fn map_tooltip_lines() {
        let mut r = record("France", 1_234_567, "2024-01-01");
        r.daily_confirmed = 1_200;
        r.daily_deaths = 3;

        assert_eq!(
            map_tooltip("France", Some(&r), Metric::Confirmed).text(),
            "France\nConfirmed: 1,234,567"
        );
        assert_eq!(
            map_tooltip("France", Some(&r), Metric::Daily).lines,
            vec!["France", "Daily Confirmed: 1,200", "Daily Deaths: 3"]
        );
        assert_eq!(
            map_tooltip("Greenland", None, Metric::Confirmed).text(),
            "Greenland: No data"
        );
    }

    #[test]
    fn treemap_tooltip_lines() {
        let snapshot = latest_by_country(&[
            record("A", 75, "2024-01-01"),
            record("B", 25, "2024-01-01"),
        ]);
        let treemap = treemap::build(&snapshot, Metric::Confirmed).unwrap();
        assert_eq!(
            treemap_tooltip(&treemap.leaves[1], Metric::Confirmed).lines,
            vec!["B", "25.0% of total", "", "Confirmed: 25"]
        );
    }
}
