use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod color;
mod exporters {
    pub mod d3js;
}
mod format;
mod geo;
mod interaction;
mod record;
mod render;
mod source;
mod treemap;
mod ui;

use record::{CaseRecord, Metric};
use source::Source;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(clap::Parser, Debug)]
#[command(
    version,
    about = "Explore COVID-19 case records as a choropleth world map and a treemap.",
    long_about = "Explore COVID-19 case records as a choropleth world map and a treemap. Case records are fetched once in the background and reduced to the latest report per country, or to the reports of a selected day."
)]
#[command(flatten_help = true)]
pub struct Args {
    /// Endpoint returning case records, as a bare array or a `value` envelope.
    #[arg(long, default_value = "http://localhost:5129/odata/CovidCases")]
    cases_url: String,

    /// Endpoint returning countries, for case records that reference a
    /// country by `CountryId`.
    #[arg(long)]
    countries_url: Option<String>,

    /// Ask the case endpoint for at most this many records.
    #[arg(long)]
    take: Option<u32>,

    /// Read the case payload from a file instead of fetching it.
    #[arg(long, conflicts_with_all = ["countries_url", "take"])]
    input: Option<PathBuf>,

    /// GeoJSON FeatureCollection with a `name` property per country.
    #[arg(long, default_value = "map.json")]
    geometry: PathBuf,

    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Metric of the treemap printed by --dump-json.
    #[arg(long, value_enum, default_value_t = Metric::Confirmed)]
    metric: Metric,

    /// Day (YYYY-MM-DD) printed by --dump-json instead of the latest records.
    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    dump_json: bool,

    #[arg(long)]
    no_serve: bool,
}

impl Args {
    fn source(&self) -> Source {
        match &self.input {
            Some(path) => Source::File { path: path.clone() },
            None => Source::Http {
                cases_url: self.cases_url.clone(),
                countries_url: self.countries_url.clone(),
                take: self.take,
            },
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = <Args as clap::Parser>::parse();

    // Otherwise the server fetches in the background.
    let records = if args.dump_json || args.no_serve {
        let records = load_records(&args.source())?;
        if args.dump_json {
            println!("{}", dump_json(&args, &records)?);
        }
        Some(records)
    } else {
        None
    };

    if !args.no_serve {
        let geometry = geo::Geometry::load(&args.geometry)?;
        info!(
            "loaded {} map features from {:?}",
            geometry.features.len(),
            &args.geometry
        );
        // Serve the UI (localhost web page).
        ui::serve(ui::Config {
            bind: args.bind,
            source: args.source(),
            geometry,
            records,
        })?;
    }

    Ok(())
}

fn load_records(source: &Source) -> Result<Vec<CaseRecord>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let records = rt.block_on(source.load())?;
    info!("loaded {} records", records.len());
    Ok(records)
}

fn dump_json(args: &Args, records: &[CaseRecord]) -> Result<String> {
    let snapshot = aggregate::snapshot_for(records, args.date.as_deref())
        .ok_or_else(|| format!("no records for {}", args.date.as_deref().unwrap_or_default()))?;
    let treemap = treemap::build(&snapshot, args.metric);
    Ok(serde_json::to_string_pretty(&exporters::d3js::export(
        treemap.as_ref(),
    ))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        <Args as clap::Parser>::try_parse_from(
            ["covid-atlas", "--no-serve"].iter().chain(extra),
        )
        .unwrap()
    }

    #[test]
    fn loads_records_from_input_file() {
        let path = std::env::temp_dir().join(format!("covid-atlas-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"value": [
                {"countryName": "A", "confirmed": 30, "reportDate": "2024-01-01"},
                {"countryName": "B", "confirmed": 10, "reportDate": "2024-01-02"}
            ]}"#,
        )
        .unwrap();
        let args = args(&["--dump-json", "--input", path.to_str().unwrap()]);
        let records = load_records(&args.source()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(records.len(), 2);

        let json: serde_json::Value =
            serde_json::from_str(&dump_json(&args, &records).unwrap()).unwrap();
        assert_eq!(json["children"][0]["name"], "A");
        assert_eq!(json["children"][0]["percentage"], "75.0");
    }

    #[test]
    fn dump_for_unknown_date_is_an_error() {
        let args = args(&["--dump-json", "--date", "1999-01-01"]);
        let records = vec![record::record("A", 1, "2024-01-01")];
        assert!(dump_json(&args, &records).is_err());
    }

    #[test]
    fn missing_input_file_is_an_error() {
        let args = args(&["--input", "does-not-exist.json"]);
        assert!(load_records(&args.source()).is_err());
    }
}
