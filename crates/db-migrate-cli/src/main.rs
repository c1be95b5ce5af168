//! db-migrate CLI - heterogeneous schema and data migration, one stage per command.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use db_migrate::ddl::{apply_schema, generate_ddl};
use db_migrate::dialect::TARGET_ENGINES;
use db_migrate::extract::run_extract;
use db_migrate::migrate::CheckpointStore;
use db_migrate::run::{approve, cleanup_old_runs, load_mappings, new_run_id};
use db_migrate::topo::order_mappings;
use db_migrate::validate::write_report;
use db_migrate::{
    Config, ConnectorRegistry, MappingDocument, MigrateError, MigrationEngine, RunManifest,
    RunPaths, SourceConnector, TargetConnector, Validator,
};
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "db-migrate")]
#[command(about = "Heterogeneous database schema and data migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract schema, stats and SQL objects from the source into a new run
    Extract {
        /// Reuse an existing run id instead of creating one
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Check the mapping documents of a run
    ValidateMapping {
        #[arg(long)]
        run_id: String,

        /// Check approved mappings instead of drafts
        #[arg(long)]
        approved: bool,
    },

    /// Move draft mappings into the approved directory
    #[command(group(ArgGroup::new("selection").required(true).args(["tables", "all"])))]
    Approve {
        #[arg(long)]
        run_id: String,

        /// Tables to approve (source table, target table or file name)
        tables: Vec<String>,

        /// Approve every draft
        #[arg(long)]
        all: bool,
    },

    /// Generate target DDL from approved mappings, then print or apply it
    #[command(group(ArgGroup::new("mode").required(true).args(["dry_run", "apply"])))]
    ApplySchema {
        #[arg(long)]
        run_id: String,

        /// Print the DDL without touching the target
        #[arg(long)]
        dry_run: bool,

        /// Execute the DDL against the target
        #[arg(long)]
        apply: bool,
    },

    /// Copy data for approved mappings, resuming from checkpoints
    Migrate {
        #[arg(long)]
        run_id: String,

        /// Only migrate these tables (comma separated)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
    },

    /// Compare row counts and aggregates between source and target
    Validate {
        #[arg(long)]
        run_id: String,
    },

    /// List the checkpoints of a run
    ShowCheckpoints {
        #[arg(long)]
        run_id: String,
    },

    /// List registered source and target engines
    ListEngines,

    /// Delete all but the newest runs
    Clean {
        /// Runs to keep [default: artifacts.keep_runs]
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let registry = ConnectorRegistry::with_builtins();

    // Needs no configuration
    if let Commands::ListEngines = cli.command {
        list_engines(&registry, cli.output_json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);
    let root = config.artifacts.root.clone();

    match cli.command {
        Commands::ListEngines => unreachable!(), // Handled above

        Commands::Extract { run_id } => {
            let run_id = run_id.unwrap_or_else(new_run_id);
            let paths = RunPaths::new(&root, &run_id);
            let manifest = RunManifest {
                run_id: run_id.clone(),
                created_at: Utc::now(),
                source_engine: config.source.engine.to_lowercase(),
                target_engine: config.target.engine.to_lowercase(),
                config_hash: config.hash(),
            };

            let mut source = connect_source(&registry, &config).await?;
            let result = run_extract(
                source.as_ref(),
                &paths,
                &config.source.database_name(),
                &config.source.schema_filter,
                config.validation.sample_rows,
                &manifest,
            )
            .await;
            source.close().await;
            let summary = result?;

            if cli.output_json {
                println!(
                    "{}",
                    serde_json::json!({
                        "run_id": summary.run_id,
                        "schema_path": summary.schema_path,
                        "stats_path": summary.stats_path,
                        "tables": summary.tables,
                        "sql_objects": summary.sql_objects,
                    })
                );
            } else {
                println!("\nExtraction completed!");
                println!("  Run ID: {}", summary.run_id);
                println!("  Tables: {}", summary.tables);
                println!("  SQL objects: {}", summary.sql_objects);
                println!("  Schema: {}", summary.schema_path.display());
                println!("  Stats: {}", summary.stats_path.display());
            }
        }

        Commands::ValidateMapping { run_id, approved } => {
            let paths = RunPaths::new(&root, &run_id);
            let dir = if approved {
                paths.approved_dir()
            } else {
                paths.drafts_dir()
            };
            let schema = paths.find_schema_doc()?;
            if schema.is_none() {
                warn!("No schema document for run {}; skipping column checks", run_id);
            }

            let files = db_migrate::run::json_files(&dir)?;
            if files.is_empty() {
                return Err(MigrateError::Mapping(format!(
                    "no mapping documents in {}",
                    dir.display()
                )));
            }

            let mut invalid = 0;
            for file in &files {
                let name = file.file_name().unwrap_or_default().to_string_lossy();
                let problems = match MappingDocument::load(file) {
                    Ok(doc) => doc.problems(schema.as_ref()),
                    Err(e) => vec![e.to_string()],
                };
                if problems.is_empty() {
                    println!("  OK   {}", name);
                } else {
                    invalid += 1;
                    println!("  FAIL {}", name);
                    for problem in problems {
                        println!("       - {}", problem);
                    }
                }
            }
            if invalid > 0 {
                return Err(MigrateError::Mapping(format!(
                    "{} of {} mapping document(s) have problems",
                    invalid,
                    files.len()
                )));
            }
            println!("\n{} mapping document(s) valid", files.len());
        }

        Commands::Approve { run_id, tables, all } => {
            let paths = RunPaths::new(&root, &run_id);
            let selection = if all { Vec::new() } else { tables };
            let moved = approve(&paths, &selection)?;
            for path in &moved {
                println!("  approved {}", path.display());
            }
            println!("\n{} mapping(s) approved", moved.len());
        }

        Commands::ApplySchema {
            run_id,
            dry_run,
            apply: _,
        } => {
            let paths = RunPaths::new(&root, &run_id);
            let mappings = approved_mappings(&paths, &config)?;
            let mut target = registry.create_target(&config.target.engine, config.target.settings()?)?;
            let files = generate_ddl(target.as_ref(), &config.target.schema_name(), &mappings, &paths)?;

            let mut stdout = std::io::stdout();
            if dry_run {
                apply_schema(target.as_ref(), &files, true, &mut stdout).await?;
                stdout.flush()?;
            } else {
                target.connect().await?;
                let result = apply_schema(target.as_ref(), &files, false, &mut stdout).await;
                target.close().await;
                let summary = result?;

                if cli.output_json {
                    println!(
                        "{}",
                        serde_json::json!({
                            "files": summary.files,
                            "applied": summary.applied,
                            "already_existed": summary.already_existed,
                        })
                    );
                } else {
                    println!("\nSchema applied!");
                    println!("  Files: {}", summary.files);
                    println!("  Statements applied: {}", summary.applied);
                    println!("  Already present: {}", summary.already_existed);
                }
            }
        }

        Commands::Migrate { run_id, tables } => {
            let paths = RunPaths::new(&root, &run_id);
            let mappings = approved_mappings(&paths, &config)?;

            let mut source = connect_source(&registry, &config).await?;
            let mut target = match connect_target(&registry, &config).await {
                Ok(target) => target,
                Err(e) => {
                    source.close().await;
                    return Err(e);
                }
            };

            let engine = MigrationEngine::new(
                source.as_ref(),
                target.as_ref(),
                config.migration.clone(),
                config.target.schema_name(),
                paths,
            );
            let summary = engine.migrate_all(&mappings, &tables).await;
            drop(engine);
            source.close().await;
            target.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&summary.tables)?);
            } else {
                println!("\nMigration completed!");
                println!("  Run ID: {}", summary.run_id);
                println!(
                    "  Tables: {}/{}",
                    summary.tables.len() - summary.failed_tables(),
                    summary.tables.len()
                );
                println!("  Rows: {}", summary.total_rows());
                for table in &summary.tables {
                    match &table.error {
                        None => println!("    {} {} rows", table.table, table.rows_loaded),
                        Some(e) => println!("    {} FAILED: {}", table.table, e),
                    }
                }
            }
            if summary.failed_tables() > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Validate { run_id } => {
            let paths = RunPaths::new(&root, &run_id);
            let mappings = approved_mappings(&paths, &config)?;

            let mut source = connect_source(&registry, &config).await?;
            let mut target = match connect_target(&registry, &config).await {
                Ok(target) => target,
                Err(e) => {
                    source.close().await;
                    return Err(e);
                }
            };

            let validator = Validator::new(
                source.as_ref(),
                target.as_ref(),
                config.validation.clone(),
                config.target.schema_name(),
            );
            let report = validator.validate_all(&mappings).await;
            drop(validator);
            source.close().await;
            target.close().await;

            let path = write_report(&paths, &report)?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\nValidation {}", if report.all_pass { "passed" } else { "FAILED" });
                for table in &report.tables {
                    let failed = table.checks.iter().filter(|c| !c.pass).count();
                    println!(
                        "  {} {} ({}/{} checks)",
                        if table.pass { "PASS" } else { "FAIL" },
                        table.target_table,
                        table.checks.len() - failed,
                        table.checks.len()
                    );
                }
                println!("  Report: {}", path.display());
            }
            if !report.all_pass {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::ShowCheckpoints { run_id } => {
            let paths = RunPaths::new(&root, &run_id);
            let checkpoints = CheckpointStore::new(paths.checkpoints_dir()).list()?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&checkpoints)?);
            } else if checkpoints.is_empty() {
                println!("No checkpoints for run {}", run_id);
            } else {
                println!("Checkpoints for run {}:", run_id);
                for cp in &checkpoints {
                    println!(
                        "  {}: offset {}, {} rows, updated {}",
                        cp.table,
                        cp.last_offset,
                        cp.rows_loaded,
                        cp.updated_at.to_rfc3339()
                    );
                }
            }
        }

        Commands::Clean { keep } => {
            let keep = keep.unwrap_or(config.artifacts.keep_runs);
            let removed = cleanup_old_runs(&root, keep)?;
            if removed.is_empty() {
                println!("Nothing to clean (keeping {} run(s))", keep);
            } else {
                for run_id in &removed {
                    println!("  removed {}", run_id);
                }
                println!("\n{} run(s) removed", removed.len());
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Approved mappings in directory order, or FK order when configured.
fn approved_mappings(paths: &RunPaths, config: &Config) -> Result<Vec<MappingDocument>, MigrateError> {
    let mappings = load_mappings(&paths.approved_dir())?;
    if mappings.is_empty() {
        return Err(MigrateError::Mapping(format!(
            "no approved mappings for run {}",
            paths.run_id()
        )));
    }

    let mappings = if config.migration.dependency_order {
        match paths.find_schema_doc()? {
            Some(schema) => order_mappings(mappings, &schema),
            None => {
                warn!("dependency_order is set but run {} has no schema document", paths.run_id());
                mappings
            }
        }
    } else {
        mappings
    };
    Ok(mappings.into_iter().map(|(_, doc)| doc).collect())
}

async fn connect_source(
    registry: &ConnectorRegistry,
    config: &Config,
) -> Result<Box<dyn SourceConnector>, MigrateError> {
    let mut source = registry.create_source(&config.source.engine, config.source.settings()?)?;
    source.connect().await?;
    Ok(source)
}

async fn connect_target(
    registry: &ConnectorRegistry,
    config: &Config,
) -> Result<Box<dyn TargetConnector>, MigrateError> {
    let mut target = registry.create_target(&config.target.engine, config.target.settings()?)?;
    target.connect().await?;
    Ok(target)
}

fn list_engines(registry: &ConnectorRegistry, output_json: bool) -> Result<(), MigrateError> {
    if output_json {
        let value = serde_json::json!({
            "sources": registry.source_engines(),
            "targets": registry.target_engines(),
            "type_templates": TARGET_ENGINES,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Source engines: {}", registry.source_engines().join(", "));
        println!("Target engines: {}", registry.target_engines().join(", "));
        println!("Type templates: {}", TARGET_ENGINES.join(", "));
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
