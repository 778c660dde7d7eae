//! Inline SVG for the map and the treemap.

use std::fmt::Write as _;

use handlebars::html_escape;

use crate::aggregate::Snapshot;
use crate::color::{map_hover, ChoroplethScale, QuantizeScale};
use crate::format::format_compact;
use crate::geo::{Geometry, MAP_HEIGHT, MAP_WIDTH};
use crate::interaction::{map_tooltip, treemap_tooltip};
use crate::record::Metric;
use crate::treemap::{CellText, Treemap, HEIGHT, WIDTH};

fn focus_class(name: &str, focus: Option<&str>) -> &'static str {
    if focus == Some(name) {
        " focused"
    } else {
        ""
    }
}

pub fn map_svg(
    geometry: &Geometry,
    snapshot: &Snapshot,
    metric: Metric,
    scale: &ChoroplethScale,
    focus: Option<&str>,
) -> String {
    let hover = map_hover(metric);
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg class="map" viewBox="0 0 {MAP_WIDTH} {MAP_HEIGHT}" width="100%" preserveAspectRatio="xMidYMid meet">"#
    );
    let _ = write!(
        svg,
        "<style>path.country:hover, path.country.focused {{ fill: {hover}; cursor: pointer; }}</style>"
    );

    for feature in &geometry.features {
        let record = snapshot.get(&feature.name);
        let fill = scale.fill(record.map(|r| metric.select(r)));
        let tooltip = html_escape(&map_tooltip(&feature.name, record, metric).text());
        let _ = write!(
            svg,
            r##"<path class="country{focused}" d="{d}" fill="{fill}" stroke="#ffffff" stroke-width="0.5" data-tooltip="{tooltip}"><title>{tooltip}</title></path>"##,
            focused = focus_class(&feature.name, focus),
            d = feature.path,
        );
    }
    svg.push_str("</svg>");
    svg
}

pub fn treemap_svg(treemap: &Treemap, scale: &QuantizeScale, focus: Option<&str>) -> String {
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg class="treemap" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    );

    for leaf in &treemap.leaves {
        let rect = &leaf.rect;
        let (w, h) = (rect.width(), rect.height());
        let tooltip = html_escape(&treemap_tooltip(leaf, treemap.metric).text());
        let _ = write!(
            svg,
            r##"<g class="cell{focused}" transform="translate({x},{y})" data-tooltip="{tooltip}"><title>{tooltip}</title><rect width="{w}" height="{h}" fill="{fill}" stroke="#fff" stroke-width="2"/>"##,
            focused = focus_class(&leaf.name, focus),
            x = rect.x0,
            y = rect.y0,
            fill = scale.color(leaf.value),
        );

        let text = CellText::for_rect(rect);
        if text.name {
            let fs = text.font_size;
            let name_y = h / 2.0 - if text.percentage { 10.0 } else { 0.0 };
            let _ = write!(
                svg,
                r#"<text x="{cx}" y="{name_y}" text-anchor="middle" font-size="{fs}" font-weight="bold">{name}</text>"#,
                cx = w / 2.0,
                name = html_escape(&leaf.name),
            );
            if text.value {
                let _ = write!(
                    svg,
                    r#"<text x="{cx}" y="{y}" text-anchor="middle" font-size="{size}">{value}</text>"#,
                    cx = w / 2.0,
                    y = h / 2.0 + fs,
                    size = fs * 0.9,
                    value = format_compact(leaf.value),
                );
            }
            if text.percentage {
                let _ = write!(
                    svg,
                    r#"<text x="{cx}" y="{y}" text-anchor="middle" font-size="{size}">{pct}%</text>"#,
                    cx = w / 2.0,
                    y = h / 2.0 + fs * 2.2,
                    size = fs * 0.8,
                    pct = leaf.percentage,
                );
            }
        }
        svg.push_str("</g>");
    }
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::latest_by_country;
    use crate::color::NO_DATA;
    use crate::record::record;
    use crate::treemap;

    fn world() -> Geometry {
        Geometry::parse(
            "world",
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "Peru"},
                 "geometry": {"type": "Polygon", "coordinates": [[[-75, -10], [-70, -10], [-70, -5], [-75, -10]]]}},
                {"type": "Feature", "properties": {"name": "Côte d'Ivoire"},
                 "geometry": {"type": "Polygon", "coordinates": [[[-5, 5], [-3, 5], [-3, 7], [-5, 5]]]}}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn map_marks_missing_data() {
        let snapshot = latest_by_country(&[record("Peru", 40, "2024-01-01")]);
        let scale = ChoroplethScale::new(&snapshot, Metric::Confirmed);
        let svg = map_svg(&world(), &snapshot, Metric::Confirmed, &scale, Some("Peru"));

        assert!(svg.contains(r#"class="country focused""#));
        assert!(svg.contains(&format!(r#"fill="{NO_DATA}""#)));
        assert!(svg.contains("Peru&#x0A;Confirmed: 40") || svg.contains("Peru\nConfirmed: 40"));
        assert!(svg.contains("Côte d&#x27;Ivoire: No data"));
        assert!(svg.contains("fill: #ff6b6b"));
    }

    #[test]
    fn treemap_cells() {
        let snapshot = latest_by_country(&[
            record("Big", 900, "2024-01-01"),
            record("Small", 100, "2024-01-01"),
        ]);
        let treemap = treemap::build(&snapshot, Metric::Confirmed).unwrap();
        let scale = QuantizeScale::new(&snapshot, Metric::Confirmed);
        let svg = treemap_svg(&treemap, &scale, None);

        assert_eq!(svg.matches("<rect").count(), 2);
        assert!(svg.contains(">Big</text>"));
        assert!(svg.contains(">90.0%</text>"));
        assert!(svg.contains(&format!(r#"fill="{}""#, scale.color(900))));
        assert!(!svg.contains("focused"));
    }
}
