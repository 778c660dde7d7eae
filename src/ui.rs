use std::io::Result;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Json;
use handlebars::Handlebars;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::aggregate::{self, Snapshot};
use crate::color::{ChoroplethScale, LegendEntry, QuantizeScale, Rgb};
use crate::exporters::d3js;
use crate::geo::Geometry;
use crate::interaction::{map_tooltip, treemap_tooltip, Hover};
use crate::record::{CaseRecord, Metric, UnknownMetric};
use crate::render;
use crate::source::Source;
use crate::treemap::{self, Treemap};

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error(transparent)]
    Metric(#[from] UnknownMetric),

    #[error("no records for {0}")]
    UnknownDate(String),

    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),
}

impl IntoResponse for UiError {
    fn into_response(self) -> Response {
        let status = match &self {
            UiError::Metric(_) => StatusCode::BAD_REQUEST,
            UiError::UnknownDate(_) => StatusCode::NOT_FOUND,
            UiError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Outcome of the most recent fetch.
#[derive(Debug, Clone, Default)]
pub enum LoadState {
    #[default]
    Loading,
    Ready(Arc<Vec<CaseRecord>>),
    /// The fetch failed; pages show the empty state.
    Failed,
}

impl From<Option<Vec<CaseRecord>>> for LoadState {
    fn from(records: Option<Vec<CaseRecord>>) -> Self {
        match records {
            Some(records) => LoadState::Ready(Arc::new(records)),
            None => LoadState::Loading,
        }
    }
}

impl LoadState {
    fn records(&self) -> &[CaseRecord] {
        match self {
            LoadState::Ready(records) => records.as_slice(),
            LoadState::Loading | LoadState::Failed => &[],
        }
    }
}

pub struct Config {
    pub bind: SocketAddr,
    pub source: Source,
    pub geometry: Geometry,
    /// Records loaded before serving. Without them the server fetches in the
    /// background.
    pub records: Option<Vec<CaseRecord>>,
}

pub fn serve(config: Config) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(serve_impl(config))
}

#[derive(Clone)]
struct UiState {
    load: Arc<RwLock<LoadState>>,
    source: Arc<Source>,
    geometry: Arc<Geometry>,
    handlebars: Arc<Handlebars<'static>>,
}

fn templates() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    assert!(handlebars
        .register_template_string("index", include_str!("../static/index.hbs"))
        .is_ok());
    handlebars
}

async fn serve_impl(config: Config) -> Result<()> {
    let load = LoadState::from(config.records);
    let fetch = matches!(load, LoadState::Loading);
    let state = UiState {
        load: Arc::new(RwLock::new(load)),
        source: Arc::new(config.source),
        geometry: Arc::new(config.geometry),
        handlebars: Arc::new(templates()),
    };
    if fetch {
        spawn_fetch(&state);
    }

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

fn router(state: UiState) -> axum::Router {
    axum::Router::new()
        .route("/", get(page_handler))
        .route("/__data__", get(data_handler))
        .route("/__debug__", get(debug_handler))
        .route("/__refresh__", get(refresh_handler))
        .with_state(state)
}

/// Fetch in the background. The page shows the loading state until the fetch
/// completes; there is no retry.
fn spawn_fetch(state: &UiState) {
    let load = state.load.clone();
    let source = state.source.clone();
    tokio::spawn(async move {
        *load.write().await = LoadState::Loading;
        let next = match source.load().await {
            Ok(records) => {
                info!("loaded {} records", records.len());
                LoadState::Ready(Arc::new(records))
            }
            Err(e) => {
                error!("Error fetching COVID data: {e}");
                LoadState::Failed
            }
        };
        *load.write().await = next;
    });
}

#[derive(Debug, Default, serde_derive::Deserialize)]
struct DashboardQuery {
    metric: Option<String>,
    date: Option<String>,
    focus: Option<String>,
}

impl DashboardQuery {
    fn metric(&self) -> std::result::Result<Metric, UnknownMetric> {
        match self.metric.as_deref() {
            None | Some("") => Ok(Metric::default()),
            Some(metric) => metric.parse(),
        }
    }

    fn date(&self) -> Option<&str> {
        self.date.as_deref().filter(|d| !d.is_empty())
    }
}

fn select(records: &[CaseRecord], date: Option<&str>) -> std::result::Result<Snapshot, UiError> {
    aggregate::snapshot_for(records, date)
        .ok_or_else(|| UiError::UnknownDate(date.unwrap_or_default().to_string()))
}

#[derive(Debug, serde_derive::Serialize)]
struct TabData {
    label: &'static str,
    href: String,
    active: bool,
}

#[derive(Debug, serde_derive::Serialize)]
struct DateData {
    day: String,
    selected: bool,
}

#[derive(Debug, serde_derive::Serialize)]
struct HbsData {
    metric: &'static str,
    map_label: &'static str,
    treemap_label: &'static str,
    tabs: Vec<TabData>,
    date: Option<String>,
    dates: Vec<DateData>,
    loading: bool,
    map_svg: String,
    legend: Vec<LegendEntry>,
    unmatched: Vec<String>,
    treemap_svg: Option<String>,
    palette: Vec<Rgb>,
    tooltip: Option<Vec<String>>,
}

fn tab_href(metric: Metric, date: Option<&str>) -> String {
    let mut query = vec![("metric", metric.key())];
    query.extend(date.map(|date| ("date", date)));
    // Encoding a list of string pairs cannot fail.
    format!("/?{}", serde_urlencoded::to_string(query).unwrap_or_default())
}

/// The pinned tooltip for `focus`: the treemap cell if there is one,
/// otherwise the map feature.
fn focus_hover(
    focus: Option<&str>,
    geometry: &Geometry,
    snapshot: &Snapshot,
    treemap: Option<&Treemap>,
    metric: Metric,
) -> Hover {
    let Some(focus) = focus else {
        return Hover::Idle;
    };
    let cell = treemap.and_then(|t| t.leaves.iter().find(|leaf| leaf.name == focus));
    if let Some(cell) = cell {
        return Hover::Idle.enter(treemap_tooltip(cell, metric));
    }
    if geometry.features.iter().any(|f| f.name == focus) {
        return Hover::Idle.enter(map_tooltip(focus, snapshot.get(focus), metric));
    }
    Hover::Idle
}

fn dashboard(
    load: &LoadState,
    geometry: &Geometry,
    query: &DashboardQuery,
) -> std::result::Result<HbsData, UiError> {
    let metric = query.metric()?;
    let date = query.date();
    let records = load.records();
    let snapshot = select(records, date)?;
    debug!(
        "rendering {metric} for {} countries (date: {date:?})",
        snapshot.len()
    );

    let unmatched = geometry.unmatched(&snapshot);
    if !unmatched.is_empty() {
        warn!(
            "{} countries have no map feature: {}",
            unmatched.len(),
            unmatched.join(", ")
        );
    }

    let choropleth = ChoroplethScale::new(&snapshot, metric);
    let quantize = QuantizeScale::new(&snapshot, metric);
    let treemap = treemap::build(&snapshot, metric);
    let focus = query.focus.as_deref();
    let hover = focus_hover(focus, geometry, &snapshot, treemap.as_ref(), metric);

    Ok(HbsData {
        metric: metric.key(),
        map_label: metric.map_label(),
        treemap_label: metric.treemap_label(),
        tabs: Metric::ALL
            .into_iter()
            .map(|tab| TabData {
                label: tab.map_label(),
                href: tab_href(tab, date),
                active: tab == metric,
            })
            .collect(),
        date: date.map(str::to_string),
        dates: aggregate::by_date(records)
            .days
            .into_iter()
            .map(|day| DateData {
                selected: Some(day.as_str()) == date,
                day,
            })
            .collect(),
        loading: matches!(load, LoadState::Loading),
        map_svg: render::map_svg(geometry, &snapshot, metric, &choropleth, focus),
        legend: choropleth.legend(),
        unmatched,
        treemap_svg: treemap
            .as_ref()
            .map(|t| render::treemap_svg(t, &quantize, focus)),
        palette: quantize.palette().to_vec(),
        tooltip: hover.tooltip().map(|t| t.lines.clone()),
    })
}

async fn page_handler(
    State(state): State<UiState>,
    Query(query): Query<DashboardQuery>,
) -> std::result::Result<Html<String>, UiError> {
    let data = {
        let load = state.load.read().await;
        dashboard(&load, &state.geometry, &query)?
    };
    Ok(Html(state.handlebars.render("index", &data)?))
}

async fn data_handler(
    State(state): State<UiState>,
    Query(query): Query<DashboardQuery>,
) -> std::result::Result<Json<d3js::Node>, UiError> {
    let metric = query.metric()?;
    let load = state.load.read().await;
    let snapshot = select(load.records(), query.date())?;
    Ok(Json(d3js::export(treemap::build(&snapshot, metric).as_ref())))
}

async fn debug_handler(State(state): State<UiState>) -> Html<String> {
    let load = state.load.read().await;
    Html(format!(
        "<pre>{}</pre>",
        handlebars::html_escape(&format!("{:#?}", *load))
    ))
}

async fn refresh_handler(State(state): State<UiState>) -> Redirect {
    spawn_fetch(&state);
    Redirect::to("/")
}
