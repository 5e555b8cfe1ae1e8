use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use feed_courier::{
    app::{ComponentRegistry, build_router},
    config::Config,
    scheduler::daemon::spawn_poll_daemon,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(|s| s.as_str())
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            error!(
                thread = thread_name,
                message, "panic occurred without location information"
            );
        }
    }));

    // Tracing initialization is handled by Telemetry::new()
    let config = Config::from_env().context("failed to load configuration")?;
    let bind_addr = config.http_bind();
    let fetch_interval = config.fetch_interval();
    let registry =
        ComponentRegistry::build(config).context("failed to build component registry")?;
    let poller = registry.poller().clone();

    let _poll_daemon = spawn_poll_daemon(poller.clone(), fetch_interval);
    let router = build_router(registry);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {bind_addr}"))?;

    info!(%bind_addr, "listening");

    if let Err(error) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        warn!(error = %error, "server exited with error");
    }

    // 終了前に既出ストアの状態を落とし、再起動時の重複投稿を防ぐ
    if let Err(error) = poller.save_snapshot().await {
        warn!(error = %error, "failed to save seen snapshot during shutdown");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
    }
}
