use clap::Subcommand;
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::config::config;
use crate::map::{MapCanvas, Viewport};
use crate::poi::{BoundingBox, FetchOutcome, LayerSource};

#[derive(Subcommand)]
pub enum PoiCommands {
    #[command(about = "Pan a simulated viewport across a grid and report tile cache activity")]
    Scan {
        #[arg(long, value_parser = BoundingBox::parse, allow_hyphen_values = true, help = "Starting viewport as west,south,east,north")]
        bbox: BoundingBox,
        #[arg(long, help = "Zoom level of the simulated viewport")]
        zoom: f64,
        #[arg(long, default_value_t = 1, help = "Pan across an N x N grid of viewports")]
        grid: u32,
        #[arg(long, help = "WFS endpoint (overrides POI_SERVICE_URL)")]
        poi_url: Option<String>,
        #[arg(long, help = "Minimum zoom for POI loading (overrides MAP_POI_MIN_ZOOM)")]
        min_zoom: Option<f64>,
    },
}

/// Tally of viewport-settle outcomes over a scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub below_threshold: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub added: usize,
    pub duplicates: usize,
}

impl ScanStats {
    pub fn record(&mut self, outcome: Option<FetchOutcome>) {
        match outcome {
            None => self.below_threshold += 1,
            Some(FetchOutcome::Skipped) => self.skipped += 1,
            Some(FetchOutcome::Failed) => self.failed += 1,
            Some(FetchOutcome::Merged { added, duplicates }) => {
                self.fetched += 1;
                self.added += added;
                self.duplicates += duplicates;
            }
        }
    }
}

pub async fn handle(cmd: PoiCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PoiCommands::Scan {
            bbox,
            zoom,
            grid,
            poi_url,
            min_zoom,
        } => {
            let mut settings = config().clone();
            if let Some(url) = poi_url {
                settings.poi.base_url = url;
            }
            if let Some(z) = min_zoom {
                settings.map.poi_min_zoom = z;
            }
            if !settings.poi_enabled() {
                anyhow::bail!("No POI service configured (set POI_SERVICE_URL or pass --poi-url)");
            }

            let layer = Arc::new(LayerSource::new());
            let (canvas, _events) = MapCanvas::from_config(&settings, layer.clone())?;
            let grid = grid.max(1);
            let path = grid_path(bbox, zoom, grid);

            let first_pass = scan(&canvas, &path, grid as usize).await;
            // Panning back over the same viewports must hit the cache
            let second_pass = scan(&canvas, &path, grid as usize).await;
            let status = canvas.poi_status();

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "viewports": path.len(),
                            "first_pass": first_pass,
                            "second_pass": second_pass,
                            "status": status,
                            "layer_publishes": layer.publish_count(),
                        }))?
                    );
                }
                OutputFormat::Text => {
                    println!("Viewports:       {}", path.len());
                    println!(
                        "First pass:      {} fetched, {} skipped, {} failed, {} below zoom",
                        first_pass.fetched, first_pass.skipped, first_pass.failed, first_pass.below_threshold
                    );
                    println!(
                        "Second pass:     {} fetched, {} skipped, {} failed, {} below zoom",
                        second_pass.fetched, second_pass.skipped, second_pass.failed, second_pass.below_threshold
                    );
                    println!("POIs:            {} ({} duplicates dropped)", status.count, first_pass.duplicates + second_pass.duplicates);
                    println!("Requests:        {}", status.requests);
                    println!("Queried tiles:   {}", status.queried_tiles);
                }
            }
            Ok(())
        }
    }
}

/// Row-major viewports covering a `grid` x `grid` block starting at `origin`.
fn grid_path(origin: BoundingBox, zoom: f64, grid: u32) -> Vec<Viewport> {
    (0..grid)
        .flat_map(|row| {
            (0..grid).map(move |col| Viewport {
                bounds: origin.offset(f64::from(col), f64::from(row)),
                zoom,
            })
        })
        .collect()
}

/// Settle each row's viewports concurrently, rows in order.
async fn scan(canvas: &MapCanvas, path: &[Viewport], row_len: usize) -> ScanStats {
    let mut stats = ScanStats::default();
    for row in path.chunks(row_len) {
        let outcomes = join_all(row.iter().map(|viewport| canvas.on_viewport_settle(*viewport))).await;
        for outcome in outcomes {
            stats.record(outcome);
        }
    }
    stats
}
