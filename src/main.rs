use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use bounded_buffer::config::{DEFAULT_CAPACITY, DEFAULT_TOTAL_ITEMS};
use bounded_buffer::event::LogSink;
use bounded_buffer::{logger, Config, Outcome, Pipeline, ProducerMode, RunError};

/// Run one producer and one consumer over a bounded buffer.
#[derive(Parser, Debug)]
#[command(name = "bounded-buffer")]
struct Cli {
    /// Buffer capacity.
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Items the consumer takes before the run completes.
    #[arg(long, default_value_t = DEFAULT_TOTAL_ITEMS)]
    total_items: u64,

    /// Keep producing until the consumer is done instead of stopping at
    /// exactly `total_items`.
    #[arg(long)]
    until_shutdown: bool,

    /// Give up on any single wait after this many milliseconds.
    #[arg(long)]
    wait_timeout_ms: Option<u64>,

    /// Producer sleeps up to this many milliseconds between items.
    #[arg(long)]
    produce_delay_ms: Option<u64>,

    /// Consumer sleeps up to this many milliseconds between items.
    #[arg(long)]
    consume_delay_ms: Option<u64>,

    /// Shut the run down after this many milliseconds.
    #[arg(long)]
    run_for_ms: Option<u64>,

    /// error, warn, info, debug or trace. Overrides the LOG variable.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::new(self.capacity, self.total_items);
        if self.until_shutdown {
            config = config.with_producer(ProducerMode::UntilShutdown);
        }
        if let Some(ms) = self.wait_timeout_ms {
            config = config.with_wait_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.produce_delay_ms {
            config = config.with_produce_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.consume_delay_ms {
            config = config.with_consume_delay(Duration::from_millis(ms));
        }
        config
    }
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.log_level.as_deref());

    let mut pipeline = match Pipeline::start(cli.config(), Arc::new(LogSink)) {
        Ok(pipeline) => pipeline,
        Err(err @ RunError::Config(_)) => {
            error!("{err}");
            process::exit(2);
        }
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    };

    if let Some(ms) = cli.run_for_ms {
        let handle = pipeline.shutdown_handle();
        // Shutting down a finished run is a no-op.
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(ms));
            handle.shutdown();
        });
    }

    match pipeline.await_completion() {
        Ok(report) if report.outcome == Outcome::Completed => {
            info!(
                "consumed {} of {} produced items, peak critical occupancy {}",
                report.consumed, report.produced, report.peak_critical_occupancy
            );
        }
        Ok(report) => {
            warn!(
                "cancelled after {} items, {} left in the buffer",
                report.consumed, report.final_buffer_size
            );
            process::exit(130);
        }
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    }
}
