pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "fieldmap")]
#[command(about = "Fieldmap CLI - manage saved polygons and probe the POI overlay")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "FIELDMAP_SERVER",
        default_value = "http://localhost:3000",
        help = "Base URL of the fieldmap API"
    )]
    pub server: String,

    #[arg(long, global = true, env = "FIELDMAP_PASSWORD", hide_env_values = true, help = "Shared team password")]
    pub password: Option<String>,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List, create and delete saved polygons")]
    Polygons {
        #[command(subcommand)]
        cmd: commands::polygons::PolygonCommands,
    },

    #[command(about = "Query the point-of-interest feature service")]
    Poi {
        #[command(subcommand)]
        cmd: commands::poi::PoiCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Polygons { cmd } => {
            commands::polygons::handle(cmd, &cli.server, cli.password.as_deref(), output_format).await
        }
        Commands::Poi { cmd } => commands::poi::handle(cmd, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_polygon_create() {
        let cli = Cli::try_parse_from([
            "fieldmap",
            "--server",
            "http://example.test",
            "polygons",
            "create",
            "--geometry",
            "{}",
            "--attr",
            "name=Field A",
        ])
        .unwrap();

        assert_eq!(cli.server, "http://example.test");
        assert!(matches!(cli.command, Commands::Polygons { .. }));
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::try_parse_from(["fieldmap", "polygons", "list", "--json"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
    }

    #[test]
    fn rejects_malformed_bbox() {
        let result = Cli::try_parse_from(["fieldmap", "poi", "scan", "--bbox", "1,2,3", "--zoom", "15"]);
        assert!(result.is_err());
    }
}
