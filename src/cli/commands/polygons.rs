use clap::Subcommand;
use geojson::JsonObject;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cli::utils::{output_polygons, output_success};
use crate::cli::OutputFormat;
use crate::client::PolygonApiClient;
use crate::config::config;
use crate::database::models::parse_polygon;
use crate::map::{feature_id, MapCanvas};
use crate::shell::{ApplicationShell, LoadState};

#[derive(Subcommand)]
pub enum PolygonCommands {
    #[command(about = "List saved polygons, newest first")]
    List,

    #[command(about = "Save a polygon with optional attributes")]
    Create {
        #[arg(long, help = "GeoJSON Polygon geometry")]
        geometry: String,
        #[arg(long = "attr", value_parser = parse_attribute, help = "Attribute as key=value (repeatable)")]
        attributes: Vec<(String, Value)>,
    },

    #[command(about = "Delete a saved polygon")]
    Delete {
        #[arg(help = "Polygon ID")]
        id: String,
    },
}

pub async fn handle(
    cmd: PolygonCommands,
    server: &str,
    password: Option<&str>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let password = password.ok_or_else(|| anyhow::anyhow!("A password is required (--password or FIELDMAP_PASSWORD)"))?;

    let client = PolygonApiClient::new(server)?;
    client.login(password).await?;

    let (canvas, mut events) = MapCanvas::new(None, config().map.poi_min_zoom);
    let canvas = Arc::new(canvas);
    let mut shell = ApplicationShell::new(client, canvas.clone());

    match cmd {
        PolygonCommands::List => {
            load(&mut shell).await?;
            output_polygons(&output_format, shell.features())
        }
        PolygonCommands::Create { geometry, attributes } => {
            let value: Value = serde_json::from_str(&geometry)?;
            canvas.draw_polygon(parse_polygon(&value)?)?;
            shell.drain_events(&mut events);

            let attributes: JsonObject = attributes.into_iter().collect();
            let feature = shell.save(attributes).await?;
            let id = feature_id(&feature).unwrap_or_default();

            output_success(
                &output_format,
                &format!("Polygon '{}' created", id),
                Some(json!({ "polygon": feature })),
            )
        }
        PolygonCommands::Delete { id } => {
            load(&mut shell).await?;
            if !canvas.select_feature(&id) {
                anyhow::bail!("Polygon '{}' not found", id);
            }
            shell.drain_events(&mut events);
            shell.delete_selected().await?;

            output_success(&output_format, &format!("Polygon '{}' deleted", id), Some(json!({ "id": id })))
        }
    }
}

async fn load(shell: &mut ApplicationShell<PolygonApiClient>) -> anyhow::Result<()> {
    match shell.load().await {
        LoadState::Failed { message } => Err(anyhow::anyhow!("Failed to load polygons: {}", message)),
        _ => Ok(()),
    }
}

/// `key=value`; the value is read as JSON when it parses, otherwise kept as a string.
fn parse_attribute(input: &str) -> Result<(String, Value), String> {
    let (key, raw) = input
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", input))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty attribute name in '{}'", input));
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
