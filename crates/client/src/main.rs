//! OpenDebate command line client.
//!
//! Opens a session against the configured server and logs everything it
//! receives. With `OPENDEBATE_DEBATE_ID` set it also requests pairing and keeps
//! the heartbeat running until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use opendebate_client::{
    create_session, FeatureScope, LivenessOptions, SessionConfig, TracingUi, WsConnector,
};
use opendebate_protocol::{
    data_as, MessageBuilder, NotificationEvent, NotificationPayload, PairingEvent, Stance,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opendebate_client=debug,opendebate_protocol=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SessionConfig::from_env().context("Failed to load session configuration")?;
    tracing::info!(endpoint = %config.endpoint, "Starting OpenDebate client");
    let heartbeat = config.heartbeat;

    let session = create_session(config, Arc::new(WsConnector::new()), Arc::new(TracingUi));

    for event in [
        PairingEvent::MatchFound,
        PairingEvent::StartSearch,
        PairingEvent::Cancel,
    ] {
        session.on(event, move |data| {
            tracing::info!(event = event.as_str(), data = ?data, "Pairing update");
        })?;
    }
    session.on(NotificationEvent::NewNotification, |data| {
        match data_as::<NotificationPayload>(data) {
            Ok(notification) => tracing::info!(
                id = notification.notification_id,
                redirect = %notification.redirect_url,
                "{}",
                notification.message
            ),
            Err(e) => tracing::warn!(error = %e, "Unreadable notification"),
        }
    })?;

    session.connect()?;

    let pairing = match std::env::var("OPENDEBATE_DEBATE_ID") {
        Ok(raw) => {
            let debate_id: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("OPENDEBATE_DEBATE_ID is not a number: {raw}"))?;
            let stance = match std::env::var("OPENDEBATE_STANCE").as_deref() {
                Ok("against") => Stance::Against,
                _ => Stance::For,
            };

            session.send(&MessageBuilder::request_pairing(stance, debate_id))?;
            let mut scope = FeatureScope::new("pairing", session.clone());
            scope.start_liveness(LivenessOptions::pairing(heartbeat).on_exhausted(|| {
                tracing::error!("Lost contact with the pairing service");
            }))?;
            Some(scope)
        }
        Err(_) => None,
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");

    drop(pairing);
    session.shutdown()?;
    session.closed().await;
    Ok(())
}
