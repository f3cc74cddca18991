use std::sync::Arc;

use clap::Parser;
use gateway::{Args, GatewayError, GatewayState, router};
use rpc_core::{Event, Registry, RegistryConfig};
use rt_ui_log::UiLogger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let (tx, _rx) = tokio::sync::broadcast::channel::<String>(256);
    let logger = Arc::new(UiLogger::with_buffer(tx, |entry| entry, 256));
    let log_for_events = logger.clone();

    let registry = Registry::create(RegistryConfig {
        label: "gateway".to_owned(),
    });
    let endpoint = registry.open_endpoint(
        "/rpc",
        args.max_conns,
        Some(Arc::new(move |_ep: &rpc_core::Endpoint, connid, event| match event {
            Event::Open => {
                tracing::info!(connid, "connection opened");
                log_for_events.log(format!("open connid={connid}"));
            }
            Event::Ready => tracing::debug!(connid, "connection ready"),
            Event::Close => {
                tracing::info!(connid, "connection closed");
                log_for_events.log(format!("close connid={connid}"));
            }
        })),
    )?;
    gateway::rpc_methods::bind_demo_methods(&endpoint)?;

    let state = GatewayState { endpoint, logger };
    let app = router(state);

    let (listener, addr) = gateway::ports::bind(args.port)
        .await
        .map_err(GatewayError::Bind)?;
    tracing::info!(%addr, "gateway listening");

    if args.should_launch_browser() {
        let url = format!("http://{addr}");
        if let Err(e) = open::that(&url) {
            tracing::warn!(error = %e, "failed to launch browser");
        }
    }

    axum::serve(listener, app)
        .await
        .map_err(GatewayError::Serve)?;
    Ok(())
}
