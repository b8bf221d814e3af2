use clap::Parser;
use diskprobe::bench::{run_all_phases, RunContext};
use diskprobe::cli::Cli;
use diskprobe::shutdown::{Shutdown, ShutdownSignal};
use diskprobe::{DiskProbeError, APP_NAME};
use std::process;
use tracing::{error, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Initialize the stderr log subscriber; `RUST_LOG` wins over the flags
fn init_tracing(level: tracing::Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

enum Outcome {
    Finished(diskprobe::Result<()>),
    Interrupted(ShutdownSignal),
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help and version go to stdout and are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };
    init_tracing(cli.log_level());

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: building tokio runtime: {}", APP_NAME, e);
            process::exit(1);
        }
    };

    let code = runtime.block_on(run(cli));
    // blocking workers may still hold the test file after an interrupt;
    // exit without waiting for them
    process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };
    let mut ctx = match RunContext::new(config) {
        Ok(ctx) => ctx,
        Err(e) => return fail(&e),
    };
    let mut shutdown = match Shutdown::install() {
        Ok(shutdown) => shutdown,
        Err(e) => return fail(&e),
    };

    let outcome = tokio::select! {
        result = run_all_phases(&mut ctx) => Outcome::Finished(result),
        signal = shutdown.recv() => Outcome::Interrupted(signal),
    };

    let code = match &outcome {
        Outcome::Finished(Ok(())) => 0,
        Outcome::Finished(Err(e)) => {
            error!(error = %e, "run aborted");
            1
        }
        Outcome::Interrupted(signal) => {
            warn!(signal = signal.name(), "interrupted, cleaning up");
            signal.exit_code()
        }
    };

    let report = ctx.report();
    if cli.json {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}: {}", APP_NAME, e),
        }
    } else {
        print!("{}", report);
    }

    if let Outcome::Finished(Err(e)) = &outcome {
        eprintln!("{}: {}", APP_NAME, e);
    }

    // removes the test file unless it is being kept
    drop(ctx);
    code
}

fn fail(err: &DiskProbeError) -> i32 {
    eprintln!("{}: {}", APP_NAME, err);
    1
}
