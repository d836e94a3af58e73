//! Process wiring: config in, running engine + server out.

use std::sync::{Arc, LazyLock};

use cadence_common::{Signal, internal, logging};
use cadence_dispatch::{Engine, ExecutorConfig};
use cadence_server::{ApiServer, ServerConfig};
use cadence_store::{MemoryStore, Store};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::transport::{ResendTransport, TransportConfig};

/// The whole process, as deserialized from the RON config file.
#[derive(Debug, Deserialize)]
pub struct Cadence {
    server: ServerConfig,
    #[serde(default)]
    dispatch: ExecutorConfig,
    transport: TransportConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

impl Cadence {
    /// Run the engine and its HTTP surface until shutdown.
    ///
    /// The transport client is constructed here, once, and injected into
    /// the engine; nothing in the send path owns global state.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport client cannot be built or the
    /// server cannot bind its address.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        internal!("Controller running");

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let transport = Arc::new(ResendTransport::new(self.transport)?);
        let engine = Engine::new(store, transport, self.dispatch);
        let server = ApiServer::new(self.server, engine).await?;

        let ret = tokio::select! {
            r = server.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(Into::into)
            }
            r = shutdown() => {
                r
            }
        };

        internal!("Shutting down...");

        ret
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parses_from_ron() {
        let config: Cadence = ron::from_str(
            r#"(
                server: (
                    listen_address: "127.0.0.1:8025",
                    trigger_token: "sekrit",
                    webhook_signing_secret: Some("whsec_dGVzdA=="),
                    production: true,
                ),
                dispatch: (
                    batch_size: 5,
                    from_address: "campaigns@example.org",
                ),
                transport: (
                    api_key: "re_test_key",
                ),
            )"#,
        )
        .expect("config parses");

        assert_eq!(config.server.trigger_token, "sekrit");
        assert!(config.server.production);
        assert_eq!(config.dispatch.batch_size, 5);
        assert_eq!(config.dispatch.batch_pause_ms, 1000);
        assert_eq!(config.dispatch.retry.max_retries, 3);
        assert_eq!(config.transport.base_url, "https://api.resend.com");
    }

    #[test]
    fn test_minimal_config() {
        let config: Cadence = ron::from_str(
            r#"(
                server: (trigger_token: "t"),
                transport: (api_key: "k"),
            )"#,
        )
        .expect("defaults fill the rest");

        assert_eq!(config.server.listen_address, "[::]:8025");
        assert!(config.server.webhook_signing_secret.is_none());
        assert_eq!(config.dispatch.batch_size, 10);
    }
}
