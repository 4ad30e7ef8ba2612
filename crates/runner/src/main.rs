//! ladderd CLI
//!
//! Loads a ladder configuration, runs it against simulated I/O and prints
//! the monitoring view periodically.

use clap::Parser as ClapParser;
use ladder_runtime::{ConfigureOutcome, Engine, EngineConfig, FileConfigStore};
use ladderd::{Assignment, SimulatedIo, parse_assignment, update_object};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(ClapParser)]
#[command(name = "ladderd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a ladder logic configuration against simulated I/O", long_about = None)]
struct Cli {
    /// Configuration document ({Device, Variables, Wires}). When omitted the
    /// configuration persisted in --state-file is restored.
    config: Option<PathBuf>,

    /// Feed the configuration in chunks of this many bytes (0 = all at once)
    #[arg(long, default_value_t = 0)]
    chunk_size: usize,

    /// File the applied configuration is persisted to
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// Stop after this many seconds (default: run until interrupted)
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Print the variables as JSON every N milliseconds (0 = never)
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    monitor_interval: u64,

    /// Set a Boolean or Number variable at start (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    sets: Vec<Assignment>,

    /// Drive a simulated input pin at start (repeatable)
    #[arg(long = "input", value_name = "PIN=LEVEL", value_parser = parse_assignment)]
    inputs: Vec<Assignment>,

    /// Print engine statistics as JSON on exit
    #[arg(long)]
    stats: bool,
}

fn main() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["ladderd=info", "ladder_runtime=info"] {
        if let Ok(d) = directive.parse::<tracing_subscriber::filter::Directive>() {
            filter = filter.add_directive(d);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let io = Arc::new(SimulatedIo::new());
    let mut builder = Engine::builder()
        .io(io.clone())
        .config(EngineConfig::from_env());
    if let Some(path) = &cli.state_file {
        builder = builder.config_store(Arc::new(FileConfigStore::new(path)));
    }
    let engine = builder.build();

    let outcome = match &cli.config {
        Some(path) => load(&engine, path, cli.chunk_size)?,
        None => engine
            .restore_persisted()
            .ok_or("no configuration given and nothing persisted in --state-file")?,
    };
    match outcome {
        ConfigureOutcome::Applied(summary) => info!(
            variables = summary.variables,
            wires = summary.wires,
            "running"
        ),
        ConfigureOutcome::Incomplete => {
            return Err("configuration is not a complete JSON document".to_string());
        }
        ConfigureOutcome::Rejected(e) => return Err(format!("configuration rejected: {}", e)),
    }

    for input in &cli.inputs {
        io.set_level(&input.name, input.level())
            .map_err(|e| format!("--input {}: {}", input.name, e))?;
    }
    if !cli.sets.is_empty() {
        let update = update_object(&cli.sets).to_string();
        let applied = engine
            .apply_remote_update(&update)
            .map_err(|e| e.to_string())?;
        if applied < cli.sets.len() {
            warn!(
                applied,
                requested = cli.sets.len(),
                "some --set names are not Boolean or Number variables"
            );
        }
    }

    let stop = Arc::new(AtomicBool::new(false));
    install_interrupt(&stop);
    let deadline = cli.duration.map(|s| Instant::now() + Duration::from_secs(s));
    let monitor = (cli.monitor_interval > 0).then(|| Duration::from_millis(cli.monitor_interval));
    let mut next_report = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            break;
        }
        if engine.expire_stale_configuration() {
            warn!("partial configuration discarded after inactivity");
        }
        if let Some(every) = monitor
            && now >= next_report
        {
            println!("{}", engine.variables_json());
            next_report = now + every;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    engine.shutdown();
    println!("{}", engine.variables_json());
    if cli.stats {
        let stats = serde_json::to_string(&engine.stats()).map_err(|e| e.to_string())?;
        println!("{}", stats);
    }
    Ok(())
}

fn load(engine: &Engine, path: &Path, chunk_size: usize) -> Result<ConfigureOutcome, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    if chunk_size == 0 {
        return Ok(engine.configure(&bytes, false));
    }
    let mut outcome = ConfigureOutcome::Incomplete;
    for chunk in bytes.chunks(chunk_size) {
        outcome = engine.configure(chunk, false);
        if outcome != ConfigureOutcome::Incomplete {
            break;
        }
    }
    Ok(outcome)
}

#[cfg(unix)]
fn install_interrupt(stop: &Arc<AtomicBool>) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, Arc::clone(stop)) {
            warn!(signal, error = %e, "could not install interrupt handler");
        }
    }
}

#[cfg(not(unix))]
fn install_interrupt(_stop: &Arc<AtomicBool>) {}
