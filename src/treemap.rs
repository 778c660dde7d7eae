use crate::aggregate::Snapshot;
use crate::record::{CaseRecord, Metric};

pub const WIDTH: f64 = 1200.0;
pub const HEIGHT: f64 = 600.0;
/// Gap between cells, and between the cells and the canvas edge.
pub const PADDING: f64 = 2.0;
/// Countries beyond this rank are left out entirely.
pub const MAX_LEAVES: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, serde_derive::Serialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Shrink by `p` on every side, collapsing to the center line when the
    /// rectangle is thinner than `2 * p`.
    fn inset(self, p: f64) -> Rect {
        let (mut x0, mut y0, mut x1, mut y1) = (self.x0 + p, self.y0 + p, self.x1 - p, self.y1 - p);
        if x1 < x0 {
            x0 = (x0 + x1) / 2.0;
            x1 = x0;
        }
        if y1 < y0 {
            y0 = (y0 + y1) / 2.0;
            y1 = y0;
        }
        Rect { x0, y0, x1, y1 }
    }

    fn round(self) -> Rect {
        Rect {
            x0: self.x0.round(),
            y0: self.y0.round(),
            x1: self.x1.round(),
            y1: self.y1.round(),
        }
    }
}

#[derive(Debug, Clone, serde_derive::Serialize)]
pub struct TreemapNode {
    pub name: String,
    pub value: u64,
    /// Share of the retained total, one decimal.
    pub percentage: String,
    #[serde(skip)]
    pub record: CaseRecord,
    pub rect: Rect,
}

#[derive(Debug, Clone, serde_derive::Serialize)]
pub struct Treemap {
    pub metric: Metric,
    pub total: u64,
    /// Sorted by value, largest first.
    pub leaves: Vec<TreemapNode>,
}

/// Rank countries by `metric`, keep the top [`MAX_LEAVES`] with a positive
/// value and lay them out. `None` when nothing is left to show.
pub fn build(snapshot: &Snapshot, metric: Metric) -> Option<Treemap> {
    let mut ranked: Vec<(&CaseRecord, u64)> = snapshot
        .values()
        .map(|r| (r, metric.select(r)))
        .filter(|&(_, value)| value > 0)
        .collect();
    // Stable: equal values keep the snapshot's name order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(MAX_LEAVES);

    let total = ranked
        .iter()
        .fold(0u64, |total, &(_, value)| total.saturating_add(value));
    if total == 0 {
        return None;
    }

    let values: Vec<f64> = ranked.iter().map(|&(_, value)| value as f64).collect();
    let rects = layout(&values, WIDTH, HEIGHT, PADDING);

    let leaves = ranked
        .into_iter()
        .zip(rects)
        .map(|((record, value), rect)| TreemapNode {
            name: record.country_name.clone(),
            value,
            percentage: format!("{:.1}", value as f64 / total as f64 * 100.0),
            record: record.clone(),
            rect,
        })
        .collect();

    Some(Treemap {
        metric,
        total,
        leaves,
    })
}

/// One-level squarified layout of `values` (sorted descending) over a
/// `width` x `height` canvas, with `padding` between cells and around the
/// edge, rounded to whole units.
pub fn layout(values: &[f64], width: f64, height: f64, padding: f64) -> Vec<Rect> {
    let half = padding / 2.0;
    // The root keeps `padding` from the canvas edge; each leaf then gives up
    // half the inner padding on every side.
    let area = Rect {
        x0: padding - half,
        y0: padding - half,
        x1: width - padding + half,
        y1: height - padding + half,
    };
    squarify(values, area)
        .into_iter()
        .map(|rect| rect.inset(half).round())
        .collect()
}

/// Target aspect ratio of the squarified rows.
const PHI: f64 = 1.618_033_988_749_895;

/// Squarified tiling after Bruls, Huizing and van Wijk: fill rows along the
/// shorter side while the worst aspect ratio in the row keeps improving.
fn squarify(values: &[f64], area: Rect) -> Vec<Rect> {
    let n = values.len();
    let mut out = Vec::with_capacity(n);
    let Rect {
        mut x0,
        mut y0,
        x1,
        y1,
    } = area;
    let mut remaining: f64 = values.iter().sum();

    let mut i0 = 0;
    let mut i1 = 0;
    while i0 < n {
        let dx = x1 - x0;
        let dy = y1 - y0;

        // Next non-empty value starts the row.
        let mut row_sum;
        loop {
            row_sum = values[i1];
            i1 += 1;
            if row_sum != 0.0 || i1 >= n {
                break;
            }
        }
        let mut min_value = row_sum;
        let mut max_value = row_sum;
        let alpha = (dy / dx).max(dx / dy) / (remaining * PHI);
        let mut beta = row_sum * row_sum * alpha;
        let mut min_ratio = (max_value / beta).max(beta / min_value);

        while i1 < n {
            let value = values[i1];
            row_sum += value;
            min_value = min_value.min(value);
            max_value = max_value.max(value);
            beta = row_sum * row_sum * alpha;
            let ratio = (max_value / beta).max(beta / min_value);
            if ratio > min_ratio {
                row_sum -= value;
                break;
            }
            min_ratio = ratio;
            i1 += 1;
        }

        let row = &values[i0..i1];
        if dx < dy {
            let y_end = if remaining > 0.0 {
                y0 + dy * row_sum / remaining
            } else {
                y1
            };
            dice(row, Rect { x0, y0, x1, y1: y_end }, &mut out);
            y0 = y_end;
        } else {
            let x_end = if remaining > 0.0 {
                x0 + dx * row_sum / remaining
            } else {
                x1
            };
            slice(row, Rect { x0, y0, x1: x_end, y1 }, &mut out);
            x0 = x_end;
        }
        remaining -= row_sum;
        i0 = i1;
    }
    out
}

/// Lay `row` out left to right across `area`.
fn dice(row: &[f64], area: Rect, out: &mut Vec<Rect>) {
    let sum: f64 = row.iter().sum();
    let k = if sum > 0.0 { area.width() / sum } else { 0.0 };
    let mut x = area.x0;
    for value in row {
        let x_next = x + value * k;
        out.push(Rect {
            x0: x,
            y0: area.y0,
            x1: x_next,
            y1: area.y1,
        });
        x = x_next;
    }
}

/// Lay `row` out top to bottom across `area`.
fn slice(row: &[f64], area: Rect, out: &mut Vec<Rect>) {
    let sum: f64 = row.iter().sum();
    let k = if sum > 0.0 { area.height() / sum } else { 0.0 };
    let mut y = area.y0;
    for value in row {
        let y_next = y + value * k;
        out.push(Rect {
            x0: area.x0,
            y0: y,
            x1: area.x1,
            y1: y_next,
        });
        y = y_next;
    }
}

/// Which text a cell has room for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellText {
    pub font_size: f64,
    pub name: bool,
    pub value: bool,
    pub percentage: bool,
}

impl CellText {
    pub fn for_rect(rect: &Rect) -> Self {
        let (w, h) = (rect.width(), rect.height());
        let name = w > 50.0 && h > 30.0;
        Self {
            font_size: (w / 8.0).min(h / 4.0).min(14.0),
            name,
            value: name && w > 100.0 && h > 60.0,
            percentage: name && w > 80.0 && h > 50.0,
        }
    }
}
