//! sqly CLI
//!
//! Command-line tool for creating, listing, and applying migrations.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use sqly_core::Dialect;
use sqly_migrate::prelude::*;
use sqly_sqlite::SqliteConnection;

/// Dependency-graph-based schema migrations.
#[derive(Parser)]
#[command(name = "sqly")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory for app migration storage (`<root>/<app>/migrations`).
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a migration in APP, incorporating dependencies from OTHER_APPS.
    Migration {
        /// The app that will own the migration.
        app: String,

        /// Other apps to include in the dependency graph.
        other_apps: Vec<String>,

        /// A couple words describing the migration's purpose.
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List the migrations in APPS in topological order.
    Migrations {
        /// The apps to list migrations for.
        apps: Vec<String>,

        /// Include dependency migrations and annotate direct dependencies.
        #[arg(short, long)]
        include_depends: bool,
    },

    /// Migrate a database to MIGRATION_KEY (up or down).
    Migrate {
        /// The migration key to migrate to.
        migration_key: String,

        /// Database to migrate; default = env $DATABASE_URL.
        #[arg(short = 'u', long, env = "DATABASE_URL")]
        database_url: Option<String>,

        /// Dialect of the database; default = env $DATABASE_DIALECT.
        #[arg(short, long, env = "DATABASE_DIALECT")]
        dialect: Option<String>,

        /// Show the migration steps without running them.
        #[arg(short = 'r', long)]
        dryrun: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to initialize logging");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let store = MigrationStore::new(&cli.root);

    match cli.command {
        Commands::Migration {
            app,
            other_apps,
            name,
        } => {
            let other_apps: Vec<&str> = other_apps.iter().map(String::as_str).collect();
            let migration = store.create(&app, &other_apps, name.as_deref())?;
            store.save(&migration)?;
            println!("Created migration: {}", migration.key());
            println!("    depends:");
            for depend in &migration.depends {
                println!("      - {depend}");
            }
        }

        Commands::Migrations {
            apps,
            include_depends,
        } => {
            for app in &apps {
                for line in migration_listing(&store, app, include_depends)? {
                    println!("{line}");
                }
            }
        }

        Commands::Migrate {
            migration_key,
            database_url,
            dialect,
            dryrun,
        } => {
            // Configuration errors are reported before any database contact.
            let Some(database_url) = database_url else {
                anyhow::bail!("--database-url or env $DATABASE_URL must be set");
            };
            let Some(dialect) = dialect else {
                anyhow::bail!("--dialect or env $DATABASE_DIALECT must be set");
            };
            let dialect = Dialect::from_str(&dialect)?;

            let mut conn = connect(dialect, &database_url)?;
            let migration = store.key_load(&migration_key)?;
            let migrator = Migrator::new(store, dialect);
            let steps = migrator.migrate(&mut *conn, &migration, dryrun)?;
            for step in &steps {
                let marker = if dryrun { "would migrate" } else { "migrated" };
                println!("{marker} {} {}", step.key, step.direction);
            }
        }
    }

    Ok(())
}

/// The listing for one app: keys in topological order, annotated with direct
/// dependencies when requested. The app's migration set (dependencies
/// included, for ordering) is loaded once; keys owned by other apps are shown
/// only with `include_depends`.
fn migration_listing(
    store: &MigrationStore,
    app: &str,
    include_depends: bool,
) -> anyhow::Result<Vec<String>> {
    let migrations = store.app_migrations(app, true)?;
    let graph = MigrationGraph::build(&migrations)?;

    let mut lines = Vec::new();
    for key in graph.lexicographic_topological_sort() {
        let Some(migration) = migrations.get(&key) else {
            continue;
        };
        if !include_depends && migration.app != app {
            continue;
        }
        lines.push(key);
        if include_depends {
            for depend in &migration.depends {
                lines.push(format!("\t=> {depend}"));
            }
        }
    }
    Ok(lines)
}

/// Opens a connection for the dialect. Only the bundled SQLite adapter ships
/// with the CLI; other dialects are served by external driver adapters.
fn connect(dialect: Dialect, database_url: &str) -> anyhow::Result<Box<dyn sqly_core::Connection>> {
    match dialect {
        Dialect::Sqlite => {
            let path = database_url
                .strip_prefix("sqlite:")
                .unwrap_or(database_url);
            Ok(Box::new(SqliteConnection::open(path)?))
        }
        other => anyhow::bail!("no bundled driver for dialect '{other}'"),
    }
}
