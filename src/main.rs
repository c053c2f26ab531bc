//! Gogs Webhook Daemon
//!
//! Receives Gogs webhook deliveries, verifies them and logs every event.

use anyhow::Context;
use clap::Parser;
use gogs_webhook::config::{ENV_EVENTS, ENV_PATH, ENV_SECRET};
use gogs_webhook::{server, ConfigError, EventFilter, WebhookConfig, WebhookHandler};
use tower_http::trace::TraceLayer;

/// Gogs Webhook Daemon
#[derive(Parser, Debug)]
#[command(name = "gogs-webhookd")]
#[command(version)]
#[command(about = "Verify and log Gogs webhook deliveries")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Path Gogs posts deliveries to
    #[arg(long, env = ENV_PATH, default_value = "/webhook")]
    path: String,

    /// Shared secret configured on the Gogs webhook
    #[arg(long, env = ENV_SECRET, hide_env_values = true)]
    secret: String,

    /// Accepted event names, comma separated (default: all)
    #[arg(long, env = ENV_EVENTS)]
    events: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Handler configuration from the parsed arguments
    fn config(&self) -> Result<WebhookConfig, ConfigError> {
        let events = match &self.events {
            Some(raw) => EventFilter::from_list(raw)?,
            None => EventFilter::Any,
        };
        Ok(WebhookConfig::new(self.path.as_str(), self.secret.as_str()).with_events(events))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.config().context("invalid --events")?;
    let handler = WebhookHandler::new(config);

    handler.on_any(|event| {
        tracing::info!(
            event = %event.event,
            delivery = %event.id,
            repository = event.repository().unwrap_or("-"),
            sender = event.sender().unwrap_or("-"),
            "Received Gogs event"
        );
    });
    handler.on_error(|error, request| {
        tracing::warn!(
            kind = error.kind(),
            url = %request.url,
            host = request.host.as_deref().unwrap_or("-"),
            "Rejected delivery: {}",
            error
        );
    });

    let app = server::router(handler.clone()).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(
        "Gogs webhook daemon listening on {} (path {})",
        addr,
        handler.config().path()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_events_list_is_trimmed() {
        let args = parse(&["gogs-webhookd", "--secret", "s", "--events", "push, create"]);
        let config = args.config().unwrap();

        assert!(config.events().accepts("push"));
        assert!(config.events().accepts("create"));
        assert!(!config.events().accepts("issues"));
    }

    #[test]
    fn test_events_trailing_comma_ignored() {
        let args = parse(&["gogs-webhookd", "--secret", "s", "--events", "push,"]);
        let config = args.config().unwrap();

        assert_eq!(config.events(), &EventFilter::single("push"));
        assert!(!config.events().accepts(""));
    }

    #[test]
    fn test_events_wildcard_and_blank_mean_all() {
        for events in ["*", " , "] {
            let args = parse(&["gogs-webhookd", "--secret", "s", "--events", events]);
            assert_eq!(args.config().unwrap().events(), &EventFilter::Any);
        }
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["gogs-webhookd", "--secret", "s", "--path", "/hooks"]);
        assert_eq!(args.port, 3000);
        assert_eq!(args.host, "127.0.0.1");

        let config = args.config().unwrap();
        assert_eq!(config.path(), "/hooks");
        assert_eq!(config.secret(), "s");
    }
}
