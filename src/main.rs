//! drp-raid
//!
//! Configures hardware RAID volumes from declarative VolSpecs.
//!
//! VolSpecs are read as JSON from stdin (or `--input`), results are printed
//! as pretty JSON on stdout, and diagnostics go to stderr. The exit code is
//! non-zero when any error was recorded, or when `--compare` finds a
//! difference.

use anyhow::Context;
use clap::Parser;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use drp_raid::{
    load_controllers, ControllerRecord, DriverRegistry, Session, SessionConfig, SimulatedDriver,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// drp-raid - declarative hardware RAID configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output volspecs for all currently configured RAID volumes
    #[arg(long)]
    volspecs: bool,

    /// Output volspecs in generic format
    #[arg(long, env = "DRP_RAID_GENERIC")]
    generic: bool,

    /// Configure volumes on raid controllers to match the input volspecs
    #[arg(long)]
    configure: bool,

    /// Add new volumes to existing ones
    #[arg(long)]
    append: bool,

    /// Compare current config with the input volspecs
    #[arg(long)]
    compare: bool,

    /// Compile the input volspecs to final ones for the controllers
    #[arg(long)]
    compile: bool,

    /// Clear all local and foreign configuration
    #[arg(long)]
    clear: bool,

    /// Clear, then encrypt the controllers with the key and password
    #[arg(long)]
    encrypt: bool,

    /// Key for encryption
    #[arg(long, env = "DRP_RAID_KEY", default_value = "")]
    key: String,

    /// Password for encryption
    #[arg(long, env = "DRP_RAID_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Force any drives to be good when configuring or wiping
    #[arg(long, env = "DRP_RAID_FORCE")]
    force: bool,

    /// Log what would be created without touching the controllers
    #[arg(long, env = "DRP_RAID_DRY_RUN")]
    dry_run: bool,

    /// Controller JSON file to use instead of probing drivers
    #[arg(long, env = "DRP_RAID_CONTROLLER")]
    controller: Option<PathBuf>,

    /// Read volspecs from this file instead of stdin
    #[arg(long, env = "DRP_RAID_INPUT")]
    input: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long, env = "DRP_RAID_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DRP_RAID_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "DRP_RAID_LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    info!(version = drp_raid::VERSION, dry_run = config.dry_run, "Starting drp-raid");

    let registry = build_registry(&config)?;
    let mut session = Session::new(config, registry);
    session.load_controllers().context("Failed to load controllers")?;
    if session.has_errors() {
        return Ok(ExitCode::FAILURE);
    }

    let needs_input = args.compare || args.compile || args.configure || args.append;
    if needs_input {
        let reader = open_input(args.input.as_ref())?;
        session.read_wanted(reader).context("Unable to decode volspecs")?;
    }

    if args.compare {
        session.compile();
        let diff = session.diff()?;
        if session.has_errors() {
            return Ok(ExitCode::FAILURE);
        }
        print_json(&diff)?;
        return Ok(if diff.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    if args.volspecs {
        let generic = session.config().output_generic;
        print_json(&session.current_specs(!generic))?;
        return Ok(ExitCode::SUCCESS);
    }

    if args.clear {
        session.clear();
        return Ok(exit_code(&session));
    }

    if args.encrypt {
        session.encrypt(&args.key, &args.password);
        return Ok(exit_code(&session));
    }

    if args.compile {
        session.compile();
        if session.has_errors() {
            return Ok(ExitCode::FAILURE);
        }
        print_json(&session.compiled())?;
        return Ok(ExitCode::SUCCESS);
    }

    if args.append {
        session.configure(true);
    }
    if args.configure {
        session.configure(false);
    }
    print_json(&session.controller_records())?;
    Ok(exit_code(&session))
}

fn exit_code(session: &Session) -> ExitCode {
    if session.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// =============================================================================
// Setup
// =============================================================================

/// Defaults, then the config file, then flags and environment
fn load_config(args: &Args) -> anyhow::Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    config.dry_run |= args.dry_run;
    config.force_good |= args.force;
    config.output_generic |= args.generic;
    if args.controller.is_some() {
        config.controller_file = args.controller.clone();
    }
    Ok(config)
}

/// Snapshot runs get one simulated driver per driver named in the file
fn build_registry(config: &SessionConfig) -> anyhow::Result<DriverRegistry> {
    let mut registry = DriverRegistry::new();
    let Some(path) = &config.controller_file else {
        warn!("No controller file given and no hardware drivers are built in");
        return Ok(registry);
    };

    let records = load_controllers(path)
        .with_context(|| format!("Error opening controller json file: {}", path.display()))?;
    let mut by_driver: BTreeMap<String, Vec<ControllerRecord>> = BTreeMap::new();
    for record in records {
        by_driver.entry(record.driver.clone()).or_default().push(record);
    }
    for (name, records) in by_driver {
        info!(driver = %name, controllers = records.len(), "Registering simulated driver");
        registry.register(Arc::new(SimulatedDriver::new(name).with_controllers(records)));
    }
    Ok(registry)
}

fn open_input(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn Read>> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .with_context(|| format!("Error opening input {}", path.display()))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(io::stdin())),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }
}
