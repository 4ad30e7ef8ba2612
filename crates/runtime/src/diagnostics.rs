//! Runtime diagnostics for production debugging
//!
//! Provides a SIGQUIT (kill -3) handler that dumps the statistics of every
//! live engine to stderr without stopping the process:
//!
//! ```bash
//! kill -3 <pid>
//! ```
//!
//! Signal handlers may only call async-signal-safe functions, and the dump
//! takes locks and does I/O. A dedicated thread waits on signal-hook's
//! iterator instead, so the dump runs in ordinary thread context.

use crate::engine::EngineInner;
use std::io::Write;
use std::sync::{Arc, Mutex, Once, Weak};

static SIGNAL_HANDLER_INIT: Once = Once::new();

static ENGINES: Mutex<Vec<Weak<EngineInner>>> = Mutex::new(Vec::new());

/// Maximum number of unit names listed per engine
const UNIT_DISPLAY_LIMIT: usize = 20;

/// Track `engine` for dumps and make sure the handler is installed
pub(crate) fn register(engine: &Arc<EngineInner>) {
    let mut engines = ENGINES.lock().unwrap_or_else(|e| e.into_inner());
    engines.retain(|e| e.strong_count() > 0);
    engines.push(Arc::downgrade(engine));
    drop(engines);
    install_signal_handler();
}

/// Install the SIGQUIT handler. Safe to call more than once.
pub fn install_signal_handler() {
    SIGNAL_HANDLER_INIT.call_once(|| {
        #[cfg(unix)]
        {
            use signal_hook::consts::SIGQUIT;
            use signal_hook::iterator::Signals;

            let mut signals = match Signals::new([SIGQUIT]) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "could not register SIGQUIT handler");
                    return;
                }
            };

            let spawned = std::thread::Builder::new()
                .name("ladder-diagnostics".to_string())
                .spawn(move || {
                    for sig in signals.forever() {
                        if sig == SIGQUIT {
                            dump_diagnostics();
                        }
                    }
                });
            if let Err(e) = spawned {
                tracing::warn!(error = %e, "could not start diagnostics thread");
            }
        }
    });
}

/// Dump diagnostics for every live engine to stderr
pub fn dump_diagnostics() {
    let mut out = std::io::stderr().lock();
    let _ = write_diagnostics(&mut out);
}

pub fn write_diagnostics(out: &mut impl Write) -> std::io::Result<()> {
    let engines: Vec<Arc<EngineInner>> = ENGINES
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .filter_map(Weak::upgrade)
        .collect();

    writeln!(out, "\n=== Ladder Runtime Diagnostics ===")?;
    writeln!(out, "Timestamp: {:?}", std::time::SystemTime::now())?;
    if engines.is_empty() {
        writeln!(out, "\n(no live engines)")?;
    }

    for (n, engine) in engines.iter().enumerate() {
        let stats = engine.snapshot();
        writeln!(out, "\n[Engine {}]", n + 1)?;
        writeln!(out, "  Units active:    {}", stats.active_units)?;
        writeln!(out, "  Units peak:      {} (high-water mark)", stats.peak_units)?;
        writeln!(out, "  Units spawned:   {} (total)", stats.total_spawned)?;
        if stats.spawn_failures > 0 {
            writeln!(out, "  WARNING: {} units failed to spawn", stats.spawn_failures)?;
        }
        writeln!(out, "  Scans:           {} (total)", stats.total_scans)?;
        if stats.scan_panics > 0 {
            writeln!(out, "  WARNING: {} scans panicked", stats.scan_panics)?;
        }
        writeln!(
            out,
            "  Configurations:  {} applied, {} rejected",
            stats.reconfigurations, stats.rejected_configurations
        )?;

        {
            let image = crate::image::lock(&engine.image);
            writeln!(
                out,
                "  Edge table:      {}/{} slots, {} refused",
                image.edges.len(),
                image.edges.capacity(),
                stats.edge_overflows
            )?;
            writeln!(
                out,
                "  Timer table:     {}/{} slots, {} refused",
                image.timers.len(),
                image.timers.capacity(),
                stats.timer_overflows
            )?;
            writeln!(out, "  Variables:       {}", image.store.len())?;
        }

        // a reconfiguration in progress holds the scheduler; skip the listing
        match engine.scheduler.try_lock() {
            Ok(scheduler) => {
                let names = scheduler.unit_names();
                writeln!(out, "  Running units:   {}", names.len())?;
                for name in names.iter().take(UNIT_DISPLAY_LIMIT) {
                    writeln!(out, "    {}", name)?;
                }
                if names.len() > UNIT_DISPLAY_LIMIT {
                    writeln!(out, "    ... and {} more", names.len() - UNIT_DISPLAY_LIMIT)?;
                }
            }
            Err(_) => writeln!(out, "  Running units:   (reconfiguring)")?,
        }
    }

    writeln!(out, "\n=== End Diagnostics ===\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;

    #[test]
    fn test_dump_lists_registered_engine() {
        let engine = Engine::builder().config(EngineConfig::default()).build();
        let mut out = Vec::new();
        write_diagnostics(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Ladder Runtime Diagnostics"));
        assert!(text.contains("[Engine"));
        assert!(text.contains("Edge table:      0/64 slots"));
        drop(engine);
    }

    #[test]
    fn test_install_signal_handler_idempotent() {
        install_signal_handler();
        install_signal_handler();
    }
}
