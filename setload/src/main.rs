//! Setload CLI - build Set/SetMember bulk-copy files from set listings
//!
//! # Main Commands
//!
//! ```bash
//! setload run --mode preview -i sets.txt -s store.json     # Write the bulk files only
//! setload run --mode load -i sets.txt -s store.json \
//!     --loader-command bcpin.csh                          # ... and bulk load them
//! setload contracts                                       # Show built-in input contracts
//! setload contracts B                                     # ... or just one
//! setload expand-sources libs.txt -o sets.txt --created-by user1
//! ```
//!
//! Most `run` flags fall back to an environment variable; a `.env` file in
//! the working directory is read first.

use clap::{Args, Parser, Subcommand};
use setload::logs::{
    log_error, log_info, log_info_indent, log_success, log_warning, log_warning_indent, LOGGER,
};
use setload::{
    expand_sources_file, run_setload, CommandLoader, InputContract, RunSettings, SetDefaults,
    SnapshotStore, DEFAULT_DATE_FORMAT,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "setload")]
#[command(about = "Build MGI_Set / MGI_SetMember bulk-copy files from set listings", long_about = None)]
struct Cli {
    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a set listing into bulk-copy files
    Run(RunArgs),

    /// Show the built-in input contracts as JSON
    Contracts {
        /// Only show this contract (built-in name or JSON file)
        name: Option<String>,
    },

    /// Turn a library/clone-set listing into set-first (contract B) input
    ExpandSources {
        /// Input file: library<TAB>set1, set2, ...
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Login recorded as creator of every set
        #[arg(long, env = "CREATEDBY")]
        created_by: String,

        /// Set type written on every line
        #[arg(long, default_value = "Source")]
        set_type: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Processing mode: preview or load
    #[arg(short, long, env = "SETMODE")]
    mode: Option<String>,

    /// Set listing to process
    #[arg(short, long, env = "SETINPUTFILE")]
    input: Option<PathBuf>,

    /// Store snapshot (JSON)
    #[arg(short, long, env = "SETSNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Input contract: A, B, C or a JSON contract file
    #[arg(short, long, default_value = "A")]
    contract: String,

    /// Directory for bulk, error and diagnostics files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Set name, for contracts without a set name column
    #[arg(long)]
    set_name: Option<String>,

    /// Set type, for contracts without a set type column
    #[arg(long)]
    set_type: Option<String>,

    /// Creator login, for contracts without a created-by column
    #[arg(long, env = "CREATEDBY")]
    created_by: Option<String>,

    /// chrono format of creation/modification dates
    #[arg(long, default_value = DEFAULT_DATE_FORMAT)]
    date_format: String,

    /// Bulk-copy script run per table in load mode
    #[arg(long, env = "BCP_COMMAND")]
    loader_command: Option<PathBuf>,

    /// Script that deletes superseded memberships in load mode
    #[arg(long, env = "PURGE_COMMAND")]
    purge_command: Option<PathBuf>,

    /// Database server (defaults to the snapshot's)
    #[arg(long, env = "MGD_DBSERVER")]
    server: Option<String>,

    /// Database name (defaults to the snapshot's)
    #[arg(long, env = "MGD_DBNAME")]
    database: Option<String>,

    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

impl From<RunArgs> for RunSettings {
    fn from(args: RunArgs) -> Self {
        RunSettings {
            mode: args.mode,
            input: args.input,
            snapshot: args.snapshot,
            contract: Some(args.contract),
            output_dir: Some(args.output_dir),
            defaults: SetDefaults {
                set_name: args.set_name,
                set_type: args.set_type,
                created_by: args.created_by,
            },
            date_format: Some(args.date_format),
            loader_command: args.loader_command,
            purge_command: args.purge_command,
            server: args.server,
            database: args.database,
            report: args.report,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    LOGGER.set_quiet(cli.quiet);

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args).await,

        Commands::Contracts { name } => cmd_contracts(name.as_deref()),

        Commands::ExpandSources {
            input,
            output,
            created_by,
            set_type,
        } => cmd_expand_sources(&input, &output, &created_by, &set_type),
    };

    if let Err(e) = result {
        log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

async fn cmd_run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = RunSettings::from(args).resolve()?;

    let store = SnapshotStore::from_file(&config.snapshot)?;
    if config.server.is_none() && !store.server().is_empty() {
        config.server = Some(store.server().to_string());
    }
    if config.database.is_none() && !store.database().is_empty() {
        config.database = Some(store.database().to_string());
    }

    log_info(format!(
        "⚙️  Mode: {}, contract: {} ({})",
        config.mode, config.contract.name, config.contract.description
    ));

    let loader = config.loader.as_ref().map(|settings| {
        let loader = CommandLoader::new(
            &settings.command,
            config.server.clone().unwrap_or_default(),
            config.database.clone().unwrap_or_default(),
        );
        match &settings.purge_command {
            Some(purge) => loader.with_purge_command(purge),
            None => loader,
        }
    });

    let report = run_setload(&config, &store, loader.as_ref()).await?;

    log_info("\n📊 Summary:");
    log_info_indent(format!("Lines read: {}", report.assembly.lines_read), 1);
    log_info_indent(format!("Accepted: {}", report.assembly.accepted), 1);
    log_info_indent(format!("Sets created: {}", report.assembly.sets_created), 1);
    log_info_indent(format!("Sets reused: {}", report.assembly.sets_reused), 1);
    log_info_indent(format!("Members written: {}", report.members_written), 1);
    for file in &report.files {
        log_info_indent(format!("💾 {}", file.display()), 1);
    }
    if !report.errors.is_empty() {
        log_warning(format!("{} lines rejected:", report.errors.len()));
        for message in report.errors.iter().take(5) {
            log_warning_indent(message, 1);
        }
    }

    log_success("Done!");
    Ok(())
}

fn cmd_contracts(name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let json = match name {
        Some(name) => InputContract::load(name)?.to_json()?,
        None => serde_json::to_string_pretty(&InputContract::builtin())?,
    };
    println!("{}", json);
    Ok(())
}

fn cmd_expand_sources(
    input: &Path,
    output: &Path,
    created_by: &str,
    set_type: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    log_info(format!("📄 Expanding: {}", input.display()));

    let expanded = expand_sources_file(input, output, set_type, created_by)?;

    for error in &expanded.errors {
        log_warning(error.to_string());
    }
    log_success(format!(
        "{} libraries, {} set lines written to {}",
        expanded.libraries,
        expanded.lines.len(),
        output.display()
    ));
    Ok(())
}
