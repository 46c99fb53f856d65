use fixcycle::host::{MockBudgetHost, MockLocationProvider, RecordingUploader};
use fixcycle::{EventDispatcher, ExecutionBudgetPool, Fix, SchedulerRuntime, TrackerConfig, TrackerEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_RUN_SECS: u64 = 150;
const DELIVERY_INTERVAL: Duration = Duration::from_secs(1);

// Base position for the simulated provider (Tokyo station)
const BASE_LAT: f64 = 35.6812;
const BASE_LON: f64 = 139.7671;

/// Deterministic wobble so runs are reproducible
fn simulated_fix(step: u64) -> Fix {
    let phase = step as f64;
    let lat = BASE_LAT + 0.0001 * (phase * 0.7).sin();
    let lon = BASE_LON + 0.0001 * (phase * 1.3).cos();
    let accuracy_m = 5.0 + 45.0 * (0.5 + 0.5 * (phase * 2.1).sin());
    Fix::now(lat, lon, accuracy_m)
}

fn usage(program: &str) -> String {
    format!("Usage: {} [config.json] [--run-secs N]", program)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("fixcycle", |s| s.as_str());

    let mut config_path = None;
    let mut run_secs = DEFAULT_RUN_SECS;
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--run-secs" => {
                let value = rest.next().ok_or_else(|| usage(program))?;
                run_secs = value.parse::<u64>()?;
            }
            "--help" | "-h" => {
                println!("{}", usage(program));
                return Ok(());
            }
            path if config_path.is_none() => config_path = Some(path.to_string()),
            _ => {
                eprintln!("{}", usage(program));
                return Err("Invalid arguments".into());
            }
        }
    }

    let config = match &config_path {
        Some(path) => TrackerConfig::from_file(path)?,
        None => TrackerConfig::default(),
    };
    println!(
        "Duty cycle: {} ms period, {} ms window, running for {} s",
        config.cycle_period_ms, config.window_duration_ms, run_secs
    );

    let provider = MockLocationProvider::new();
    let budget_host = MockBudgetHost::new();
    let uploader = RecordingUploader::new();
    let pool = Arc::new(ExecutionBudgetPool::new(Arc::new(budget_host.clone())));
    let events = Arc::new(EventDispatcher::new());

    let (handle, task) = SchedulerRuntime::spawn(
        config,
        Arc::new(provider.clone()),
        pool,
        events,
        Arc::new(uploader.clone()),
    )?;

    handle.register_callback(Box::new(|event| match event {
        TrackerEvent::Advisory(advisory) => println!("[advisory] {}", advisory),
        TrackerEvent::Log(line) => println!("[log] {}", line),
    }));

    // Simulated provider: one fix per second while sampling is on
    let feeder = {
        let handle = handle.clone();
        let provider = provider.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DELIVERY_INTERVAL);
            let mut step = 0u64;
            loop {
                ticker.tick().await;
                if handle.is_closed() {
                    break;
                }
                if provider.is_sampling() {
                    step += 1;
                    handle.deliver_fixes(vec![simulated_fix(step)]);
                }
            }
        })
    };

    handle.start();
    handle.entered_background();

    tokio::time::sleep(Duration::from_secs(run_secs)).await;
    handle.upload_cycle();

    let snapshot = handle.snapshot().await?;
    println!("Final mode: {}", snapshot.mode);
    if let Some(last) = snapshot.last_location {
        println!(
            "Last location: {} (±{:.1} m)",
            last.coordinate, last.accuracy_m
        );
    }
    println!(
        "Budget tokens held: {} (master {:?}, nested {})",
        snapshot.budget.held(),
        snapshot.budget.master,
        snapshot.budget.nested.len()
    );

    handle.shutdown();
    task.await?;
    feeder.abort();

    for (index, upload) in uploader.uploads().iter().enumerate() {
        match upload {
            Some(fix) => println!("Upload {}: {}", index + 1, fix),
            None => println!("Upload {}: no location", index + 1),
        }
    }
    println!("Budget requests made: {}", budget_host.requests());

    Ok(())
}
