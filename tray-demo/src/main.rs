//! Console demo of the notification tray.
//!
//! Replays a short script of notifications against a logging surface and
//! exits once every notification expired, or on Ctrl+C.

mod surface;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

use notification_tray::headless::TimedAnimator;
use notification_tray::{Expiry, SignalName, Tray, TrayConfig, TraySignal};

use surface::ConsoleSurface;

const DEFAULT_TRANSITION_MS: u64 = 300;

fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::debug!("No .env file found, using system environment variables");
}

fn transition_duration() -> anyhow::Result<Duration> {
    let ms = match std::env::var("TRAY_TRANSITION_MS") {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<u64>()
            .with_context(|| format!("TRAY_TRANSITION_MS is not a number: {v}"))?,
        _ => DEFAULT_TRANSITION_MS,
    };
    Ok(Duration::from_millis(ms))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    load_dotenv();
    let config = TrayConfig::from_env().context("Invalid tray configuration")?;
    let transition = transition_duration()?;
    tracing::info!(
        duration_ms = config.duration_ms,
        transition_ms = transition.as_millis() as u64,
        "Starting notification tray demo"
    );

    let tray = Tray::builder()
        .config(config)
        .surface(Arc::new(ConsoleSurface))
        .animator(Arc::new(TimedAnimator::new(transition)))
        .build()?;

    let subscriptions: Vec<_> = SignalName::ALL
        .into_iter()
        .map(|name| tray.subscribe(name, log_signal))
        .collect();
    let mut events = tray.events();

    tokio::select! {
        result = run_script(&tray, &mut events) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    tray.close();
    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    tracing::info!(remaining = tray.len(), "Demo finished");
    Ok(())
}

fn log_signal(signal: &TraySignal) {
    match serde_json::to_string(signal) {
        Ok(json) => tracing::info!(name = %signal.name(), "{json}"),
        Err(e) => tracing::warn!("Failed to serialize signal: {e}"),
    }
}

/// Greeting now, a sticky 2 s notification after 1 s, another after 2 s.
async fn run_script(
    tray: &Tray,
    events: &mut broadcast::Receiver<TraySignal>,
) -> anyhow::Result<()> {
    let greeting = tray.notify("Greetings notification! :)");
    tokio::time::sleep(Duration::from_secs(1)).await;
    let incoming = tray.add(
        "New notification incoming",
        Expiry::After(Duration::from_millis(2000)),
        false,
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    let another = tray.notify("Another notification incoming");

    let (greeting, incoming, another) = tokio::join!(greeting, incoming, another);
    for item in [greeting?, incoming?, another?] {
        tracing::debug!(id = %item.id, offset = item.placement.offset, "Script notification shown");
    }

    wait_until_idle(tray, events).await;
    Ok(())
}

async fn wait_until_idle(tray: &Tray, events: &mut broadcast::Receiver<TraySignal>) {
    while tray.is_busy() || !tray.is_empty() {
        match events.recv().await {
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => tracing::warn!("Signal feed lagged by {n}"),
            Err(RecvError::Closed) => break,
        }
    }
}
