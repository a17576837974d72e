use clap::Parser;
use tokio_util::sync::CancellationToken;

mod config;
mod join;

fn init_logging(verbose: bool) {
    let pipeline = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // RUST_LOG is parsed last so it overrides the defaults
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("track_bus", pipeline)
        .filter_module("room_join", pipeline)
        .parse_default_env()
        .init();
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
        _ = quit.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[tokio::main]
async fn main() -> ! {
    let config = match config::JoinConfig::try_from(config::Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };
    init_logging(config.verbose);

    let cancel = CancellationToken::new();
    let mut run = tokio::spawn(join::run(config, cancel.clone()));

    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            signal = shutdown_signal() => {
                if let Err(e) = signal {
                    log::warn!("signal handler failed: {}", e);
                }
                if cancel.is_cancelled() {
                    log::warn!("second interrupt, exiting without cleanup");
                    std::process::exit(130);
                }
                log::info!("shutting down");
                cancel.cancel();
            },
        }
    };

    match result {
        Ok(Ok(())) => std::process::exit(0),
        Ok(Err(e)) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
        Err(e) => {
            log::error!("join task failed: {}", e);
            std::process::exit(1);
        }
    }
}
