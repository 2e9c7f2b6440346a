//! Command-line front end for notemove.
//!
//! # Responsibility
//! - Open the SQLite note store and expose listing and migration commands.
//! - Print machine-readable JSON on stdout.
//!
//! # Invariants
//! - Exit code is non-zero when a command fails or a migration reports failures.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use notemove_core::{
    default_log_level, init_logging, open_db, MigrationOptions, MigrationService,
    MigrationStrategy, SqliteNoteHost,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const DEFAULT_DB_PATH: &str = "notemove.db";

#[derive(Parser, Debug)]
#[command(name = "notemove", version, about = "Move notes between collections")]
struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_DB_PATH, help = "SQLite note store")]
    db: PathBuf,
    #[arg(long, global = true, help = "Absolute directory for log files")]
    log_dir: Option<String>,
    #[arg(long, global = true, help = "trace|debug|info|warn|error")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check core linkage.
    Ping,
    /// List collections eligible for migration.
    Collections,
    /// List records of one collection.
    Records { collection: String },
    /// Move or copy records into another collection.
    Migrate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(
            long,
            value_enum,
            help = "Defaults to the options file value, else `copy`"
        )]
        strategy: Option<StrategyArg>,
        #[arg(long, help = "JSON file with migration options")]
        options: Option<PathBuf>,
        #[arg(long)]
        resolve_attempts: Option<u32>,
        #[arg(long)]
        resolve_delay_ms: Option<u64>,
        #[arg(required = true)]
        records: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Auto,
    Copy,
    NativeMove,
}

impl From<StrategyArg> for MigrationStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Auto => Self::Auto,
            StrategyArg::Copy => Self::Copy,
            StrategyArg::NativeMove => Self::NativeMove,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).context("starting file logging")?;
    }

    if let Commands::Ping = cli.command {
        print_json(&json!({
            "ping": notemove_core::ping(),
            "version": notemove_core::core_version(),
        }))?;
        return Ok(ExitCode::SUCCESS);
    }

    let conn = open_db(&cli.db)
        .with_context(|| format!("opening note store `{}`", cli.db.display()))?;
    let host = SqliteNoteHost::try_new(&conn).context("preparing note store")?;

    match cli.command {
        Commands::Ping => Ok(ExitCode::SUCCESS),
        Commands::Collections => {
            let service = MigrationService::new(&host, MigrationOptions::default());
            let collections = service
                .source_collections()
                .context("listing collections")?;
            print_json(&collections)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Records { collection } => {
            let service = MigrationService::new(&host, MigrationOptions::default());
            let records = service
                .list_records(&collection)
                .with_context(|| format!("listing records of `{collection}`"))?;
            print_json(&records)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Migrate {
            from,
            to,
            strategy,
            options,
            resolve_attempts,
            resolve_delay_ms,
            records,
        } => {
            let run_options = migration_options(
                options.as_deref(),
                strategy,
                resolve_attempts,
                resolve_delay_ms,
            )?;

            info!(
                "event=cli_migrate module=cli status=start selected={} strategy={}",
                records.len(),
                run_options.strategy
            );
            let service = MigrationService::new(&host, run_options);
            let summary = service.begin_migration(&from, &to, &records);
            print_json(&json!({
                "message": summary.message(),
                "summary": summary,
            }))?;
            Ok(if summary.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

/// Options file first, then flag overrides.
fn migration_options(
    path: Option<&Path>,
    strategy: Option<StrategyArg>,
    resolve_attempts: Option<u32>,
    resolve_delay_ms: Option<u64>,
) -> Result<MigrationOptions> {
    // Without an options file the CLI copies, like the plugin dialog.
    let mut options = match path {
        Some(path) => load_options(path)?,
        None => MigrationOptions {
            strategy: MigrationStrategy::Copy,
            ..MigrationOptions::default()
        },
    };
    if let Some(strategy) = strategy {
        options.strategy = strategy.into();
    }
    if let Some(attempts) = resolve_attempts {
        options.resolve_attempts = attempts;
    }
    if let Some(delay) = resolve_delay_ms {
        options.resolve_delay_ms = delay;
    }
    Ok(options)
}

fn load_options(path: &Path) -> Result<MigrationOptions> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read options `{}`", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid options `{}`", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serializing output")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_options, migration_options, Cli, Commands, StrategyArg};
    use clap::Parser;
    use notemove_core::MigrationStrategy;
    use std::io::Write;

    #[test]
    fn migrate_parses_strategy_and_records() {
        let cli = Cli::try_parse_from([
            "notemove", "migrate", "--from", "a", "--to", "b", "--strategy", "native-move", "r1",
            "r2",
        ])
        .expect("arguments should parse");

        let Commands::Migrate {
            strategy, records, ..
        } = cli.command
        else {
            panic!("expected migrate");
        };
        assert!(matches!(strategy, Some(StrategyArg::NativeMove)));
        assert_eq!(records, vec!["r1", "r2"]);
    }

    #[test]
    fn strategy_defaults_to_copy_and_flags_override() {
        let defaults = migration_options(None, None, None, None).expect("defaults");
        assert_eq!(defaults.strategy, MigrationStrategy::Copy);

        let overridden =
            migration_options(None, Some(StrategyArg::Auto), Some(5), Some(10)).expect("flags");
        assert_eq!(overridden.strategy, MigrationStrategy::Auto);
        assert_eq!(overridden.resolve_attempts, 5);
        assert_eq!(overridden.resolve_delay_ms, 10);
    }

    #[test]
    fn migrate_requires_at_least_one_record() {
        let err = Cli::try_parse_from(["notemove", "migrate", "--from", "a", "--to", "b"]);
        assert!(err.is_err());
    }

    #[test]
    fn options_file_errors_name_the_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"{not json").expect("write options");

        let err = load_options(file.path()).expect_err("invalid json must fail");
        assert!(format!("{err:#}").contains("invalid options"));

        let missing = file.path().with_extension("missing");
        let err = load_options(&missing).expect_err("missing file must fail");
        assert!(err.to_string().contains("failed to read options"));
    }

    #[test]
    fn options_file_fills_unset_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(br#"{"strategy": "copy", "resolve_attempts": 3}"#)
            .expect("write options");

        let options = load_options(file.path()).expect("options should load");
        assert_eq!(options.strategy, MigrationStrategy::Copy);
        assert_eq!(options.resolve_attempts, 3);
    }
}
