//! Gateway link entry point
//!
//! Runs the registration heartbeat for a service, or performs a one-off
//! registration check against the configured gateway.

use std::future::Future;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway_link::{ApiSpec, LinkConfig, PingOutcome, ServiceLink};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_link=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load() -> Result<(LinkConfig, ApiSpec)> {
    let config = LinkConfig::from_env().context("Invalid configuration")?;
    let spec = ApiSpec::load(&config.swagger_path)
        .with_context(|| format!("Unable to load API spec {}", config.swagger_path.display()))?;
    Ok((config, spec))
}

async fn wait_for_shutdown<F>(signal: F) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    signal.await.context("Unable to listen for Ctrl+C")?;
    tracing::info!("Shutdown signal received");
    Ok(())
}

/// Start the link and keep it registered until Ctrl+C
fn run() -> Result<()> {
    let (config, spec) = load()?;
    let link = ServiceLink::start(config, spec)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let waited = runtime.block_on(wait_for_shutdown(tokio::signal::ctrl_c()));

    if let Some(stats) = link.heartbeat_stats() {
        tracing::info!(
            "Heartbeat: {} pings, {} registrations, {} failures",
            stats.pings,
            stats.registrations,
            stats.failures
        );
    }
    link.shutdown();
    waited
}

/// Print the records one publish pass would send
fn routes() -> Result<()> {
    let (mut config, spec) = load()?;
    config.enable_registration = false;
    let link = ServiceLink::start(config, spec)?;

    for record in link.publisher().route_records() {
        println!("{}", record.to_details()?);
    }
    link.shutdown();
    Ok(())
}

/// Ping the gateway once
fn ping() -> Result<()> {
    let (mut config, spec) = load()?;
    config.enable_registration = false;
    let link = ServiceLink::start(config, spec)?;

    let outcome = link.ping_once();
    link.shutdown();

    match outcome {
        PingOutcome::Registered => println!("registered"),
        PingOutcome::RegistrationRequested => println!("not registered"),
        PingOutcome::Unexpected(status) => println!("unexpected status {}", status),
        PingOutcome::Failed(message) => anyhow::bail!("ping failed: {}", message),
    }
    Ok(())
}

fn print_help() {
    println!("Gateway Link - keeps a microservice registered with the API gateway");
    println!();
    println!("Usage:");
    println!("  gateway-link run         Run the registration heartbeat until Ctrl+C");
    println!("  gateway-link routes      Print the route records as JSON lines");
    println!("  gateway-link ping        Ping the gateway once");
    println!();
    println!("Environment Variables:");
    println!("  API_PROTOCOL / API_HOST / API_PORT         API gateway location");
    println!("  FLASK_PROTOCOL / FLASK_HOST / FLASK_PORT   Advertised service location");
    println!("  MY_IDENT                 Registration key (default: host:port)");
    println!("  MY_NAME                  Friendly name for UI routes");
    println!("  SWAGGER                  API spec path");
    println!("  SWAGGER_UI               API UI mount point (default: ui)");
    println!("  REMOTE_MS                Public host fronting the API routes");
    println!("  SECURITY_USER_NAME / SECURITY_USER_PASSWORD  Basic auth for outbound calls");
    println!("  ENABLE_REGISTRATION      Run the heartbeat (default: true)");
    println!("  HEARTBEAT_INTERVAL_SECS  Seconds between pings (default: 5)");
    println!("  CALL_TIMEOUT_SECS        Blocking call deadline (default: 3)");
    println!("  ENDPOINT_OVERRIDES       prefix=url pairs, comma separated");
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("--help") | Some("-h") => {
            print_help();
            Ok(())
        }
        Some("routes") => {
            init_tracing();
            routes()
        }
        Some("ping") => {
            init_tracing();
            ping()
        }
        Some("run") | None => {
            init_tracing();
            run()
        }
        Some(other) => {
            print_help();
            anyhow::bail!("Unknown command: {}", other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[tokio::test]
    async fn test_signal_listener_failure_is_an_error() {
        let failed = std::future::ready(Err(io::Error::new(io::ErrorKind::Other, "no signal handler")));
        let err = wait_for_shutdown(failed).await.unwrap_err();
        assert!(err.to_string().contains("Ctrl+C"));
        assert!(format!("{:#}", err).contains("no signal handler"));
    }

    #[tokio::test]
    async fn test_signal_received_is_ok() {
        assert!(wait_for_shutdown(std::future::ready(Ok(()))).await.is_ok());
    }
}
