use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::utils::{format_table, output_error, output_success};
use crate::cli::OutputFormat;
use crate::schema::{catalog, SchemaCatalog, SchemaDescriptor};

#[derive(Subcommand)]
pub enum SchemaCommands {
    #[command(about = "List descriptors (built-in, or from a directory)")]
    List {
        #[arg(long, help = "Descriptor directory (defaults to PORTAL_SCHEMA_DIR, then the built-in set)")]
        dir: Option<PathBuf>,
    },

    #[command(about = "Validate descriptor files (JSON or YAML)")]
    Check {
        #[arg(required = true, help = "Descriptor files to validate")]
        paths: Vec<PathBuf>,
    },
}

pub async fn handle(cmd: SchemaCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SchemaCommands::List { dir } => list(dir, output_format),
        SchemaCommands::Check { paths } => check(&paths, output_format),
    }
}

fn list(dir: Option<PathBuf>, output_format: OutputFormat) -> anyhow::Result<()> {
    let dir = dir.or_else(|| std::env::var_os("PORTAL_SCHEMA_DIR").map(PathBuf::from));
    let catalog = match &dir {
        Some(dir) => SchemaCatalog::load_dir(dir).with_context(|| format!("loading {}", dir.display()))?,
        None => SchemaCatalog::builtin()?,
    };

    match output_format {
        OutputFormat::Json => {
            let schemas: Vec<Value> = catalog.iter().map(|d| summary(d)).collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "schemas": schemas }))?);
        }
        OutputFormat::Text => {
            if catalog.is_empty() {
                println!("No schema descriptors found");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = catalog
                .iter()
                .map(|d| {
                    vec![
                        d.slug.clone(),
                        d.endpoint.clone(),
                        d.db_pool.clone(),
                        d.table_name.clone(),
                        operations(d).join(","),
                    ]
                })
                .collect();
            println!("{}", format_table(&["SLUG", "ENDPOINT", "POOL", "TABLE", "OPERATIONS"], &rows));
        }
    }
    Ok(())
}

fn check(paths: &[PathBuf], output_format: OutputFormat) -> anyhow::Result<()> {
    let mut descriptors = Vec::new();
    let mut failures = 0;

    for path in paths {
        match catalog::load_file(path).and_then(|d| d.validate().map(|_| d)) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => {
                failures += 1;
                output_error(output_format, &e.to_string(), Some("INVALID_SCHEMA"))?;
            }
        }
    }

    // Cross-file checks only make sense once every file parses
    if failures == 0 {
        let count = descriptors.len();
        if let Err(e) = SchemaCatalog::from_descriptors(descriptors) {
            output_error(output_format, &e.to_string(), Some("DUPLICATE_SCHEMA"))?;
            anyhow::bail!("schema check failed");
        }
        return output_success(output_format, &format!("{} descriptor(s) valid", count), Some(json!({ "count": count })));
    }

    anyhow::bail!("{} of {} descriptor(s) invalid", failures, paths.len())
}

fn operations(descriptor: &SchemaDescriptor) -> Vec<&'static str> {
    descriptor.offered_operations().iter().map(|op| op.as_str()).collect()
}

fn summary(descriptor: &SchemaDescriptor) -> Value {
    json!({
        "slug": descriptor.slug,
        "title": descriptor.title,
        "endpoint": descriptor.endpoint,
        "dbPool": descriptor.db_pool,
        "tableName": descriptor.table_name,
        "operations": operations(descriptor),
    })
}
