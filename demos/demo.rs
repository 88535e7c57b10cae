//! Demo application driving every instrument kind from several threads.
//!
//! Run with:
//! ```bash
//! RUST_LOG=hedron_instrument=debug cargo run --example demo --features demo -- --help
//! ```

use clap::{Parser, ValueEnum};
use hedron_instrument::instrumentation::Instrumentation;
use hedron_instrument::observers::json::JsonObserver;
use hedron_instrument::observers::table::{TableObserver, TableStyle};
use hedron_instrument::scheduler::SchedulerConfig;
use hedron_instrument::timed_scope::LoggingAlertHandler;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Output format for the final report.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// CSV-like summary, one block per instrument kind
    Csv,
    /// Pretty tables, one per instrument kind
    Table,
    /// JSON snapshot
    Json,
}

/// Table style selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StyleChoice {
    Ascii,
    #[default]
    Rounded,
    Sharp,
    Modern,
    Markdown,
    Blank,
}

impl From<StyleChoice> for TableStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Ascii => TableStyle::Ascii,
            StyleChoice::Rounded => TableStyle::Rounded,
            StyleChoice::Sharp => TableStyle::Sharp,
            StyleChoice::Modern => TableStyle::Modern,
            StyleChoice::Markdown => TableStyle::Markdown,
            StyleChoice::Blank => TableStyle::Blank,
        }
    }
}

/// Demo application for hedron-instrument.
///
/// Simulates request handling on several threads, recording into every
/// instrument kind, then prints the collected instrumentation.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Table style (for table format)
    #[arg(short, long, value_enum, default_value = "rounded")]
    style: StyleChoice,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,

    /// Include timestamp in JSON output
    #[arg(long)]
    timestamp: bool,

    /// Number of simulated worker threads
    #[arg(short, long, default_value = "4")]
    threads: usize,

    /// Number of simulated requests per thread
    #[arg(short, long, default_value = "200")]
    iterations: usize,

    /// Deadline of the simulated handler in milliseconds
    #[arg(long, default_value = "3")]
    deadline_ms: u64,

    /// Threads running deadline alarms
    #[arg(long, default_value = "2")]
    alarm_threads: usize,

    /// Include instruments that recorded nothing
    #[arg(long)]
    all: bool,
}

/// Simulates request handling on `num_threads` threads.
fn simulate_traffic(instruments: &Arc<Instrumentation>, args: &Args) {
    // Registered but never used: only shown with --all.
    instruments.counter("http_retries_total");

    let mut handles = vec![];

    for i in 0..args.threads {
        let instruments = Arc::clone(instruments);
        let iterations = args.iterations;
        let deadline_ms = args.deadline_ms;

        handles.push(thread::spawn(move || {
            let requests = instruments.counter("http_requests_total");
            let in_flight = instruments.max_counter("http_in_flight");
            let status = instruments.counter_range("http_status");
            let throughput =
                instruments.counter_throughput("http_requests_per_10ms", Duration::from_millis(10));
            let handler = instruments.timed_scope("handle_request");

            for j in 0..iterations {
                requests.increment();
                in_flight.increment();
                throughput.increment();

                let result: Result<u16, String> = handler.execute(deadline_ms, LoggingAlertHandler, || {
                    // Every 50th request is slow, every 40th fails.
                    if (i * iterations + j) % 50 == 0 {
                        thread::sleep(Duration::from_millis(deadline_ms * 2));
                    }
                    if (i * iterations + j) % 40 == 0 {
                        Err(format!("upstream unavailable (request {j})"))
                    } else {
                        Ok(200)
                    }
                });

                status.increment(i64::from(result.unwrap_or(503)));
                in_flight.decrement();
            }
        }));
    }

    for handle in handles {
        if handle.join().is_err() {
            eprintln!("a simulation thread panicked");
        }
    }
}

/// Renders the instrumentation in the selected format.
fn render_output(args: &Args, instruments: &Instrumentation) -> String {
    let exclude_unused = !args.all;
    match args.format {
        OutputFormat::Csv => instruments.dump_all(exclude_unused),

        OutputFormat::Table => TableObserver::new()
            .with_style(args.style.into())
            .render_all(instruments, exclude_unused),

        OutputFormat::Json => JsonObserver::new()
            .pretty(args.pretty)
            .include_timestamp(args.timestamp)
            .to_json(instruments, exclude_unused)
            .unwrap_or_else(|e| format!("Error: {}", e)),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let instruments = match Instrumentation::builder()
        .scheduler_config(SchedulerConfig::new().worker_threads(args.alarm_threads))
        .build()
    {
        Ok(instruments) => Arc::new(instruments),
        Err(error) => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
    };

    eprintln!(
        "Simulating {} threads × {} requests...",
        args.threads, args.iterations
    );
    simulate_traffic(&instruments, &args);
    eprintln!("Simulation complete.\n");

    println!("{}", render_output(&args, &instruments));
}
