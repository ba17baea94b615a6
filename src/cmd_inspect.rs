//! `modhost inspect`: read unit metadata and the init order they would produce.

use std::path::PathBuf;

use serde::Serialize;

use modhost_config::Config;
use modhost_core::resolver::{self, DependencyGraph};
use modhost_core::{ComponentLoader, Runtime, UnitInspection};
use modhost_protocols::ComponentMetadata;

use crate::cmd_run::{loader_settings, runtime_options};

#[derive(Debug, Serialize)]
struct UnitRow {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<ComponentMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct Inspection {
    units: Vec<UnitRow>,
    order: Result<Vec<String>, String>,
}

fn summarize(units: Vec<UnitInspection>) -> Inspection {
    let mut graph = DependencyGraph::new();
    let units: Vec<UnitRow> = units
        .into_iter()
        .map(|(path, result)| match result {
            Ok(metadata) => {
                graph.insert(metadata.name.clone(), metadata.dependencies.clone());
                UnitRow {
                    path,
                    metadata: Some(metadata),
                    error: None,
                }
            }
            Err(e) => UnitRow {
                path,
                metadata: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let order = resolver::resolve_order(&graph).map_err(|e| e.to_string());
    Inspection { units, order }
}

pub(crate) fn inspect(config: &Config, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let settings = loader_settings(&config.plugins);
    let directory = settings.directory.clone();
    let loader = ComponentLoader::new(Runtime::new(runtime_options(config)), settings);
    let inspection = summarize(loader.inspect()?);

    if inspection.units.is_empty() {
        println!("No units found in {}.", directory.display());
        return Ok(());
    }

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&inspection)?;
            println!("{}", json);
        }
        _ => {
            println!("{:<16} {:<10} {:<24} {}", "NAME", "VERSION", "DEPENDENCIES", "PATH");
            println!("{}", "-".repeat(80));
            for unit in &inspection.units {
                match (&unit.metadata, &unit.error) {
                    (Some(metadata), _) => {
                        let deps = if metadata.dependencies.is_empty() {
                            "-".to_string()
                        } else {
                            metadata.dependencies.join(", ")
                        };
                        println!(
                            "{:<16} {:<10} {:<24} {}",
                            metadata.name,
                            metadata.version,
                            deps,
                            unit.path.display()
                        );
                    }
                    (None, error) => println!(
                        "{:<16} {:<10} {:<24} {} ({})",
                        "?",
                        "?",
                        "-",
                        unit.path.display(),
                        error.as_deref().unwrap_or("unreadable")
                    ),
                }
            }
            println!();
            match &inspection.order {
                Ok(order) => println!("Init order: {}", order.join(" -> ")),
                Err(e) => println!("Init order: unresolvable ({})", e),
            }
        }
    }

    Ok(())
}
