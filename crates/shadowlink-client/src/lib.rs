//! shadowlink local client.
//!
//! Accepts SOCKS5 CONNECT requests on a local port and relays each one
//! through a single encrypted connection to the configured remote proxy.
//! The upstream is dialed lazily, the first outbound frame carries the
//! destination address header, and everything sent upstream runs through one
//! continuous stream cipher per connection.

pub mod cli;
pub mod connector;
mod error;
mod handler;
pub mod pool;
pub mod relay;
mod resolve;
pub mod socks5;

pub use cli::ClientArgs;
pub use connector::{TcpConnector, Upstream, UpstreamConnector};
pub use error::{ClientError, RelayError, Socks5Error};
pub use handler::ClientState;
pub use pool::WorkerPool;
pub use relay::{RelayConfig, RelaySession, SessionState, SessionSummary};
pub use resolve::DnsResolver;

use std::sync::Arc;

use shadowlink_config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run the local client with the given configuration.
///
/// Every accepted connection becomes a task on `pool`. Returns once
/// `shutdown` is cancelled.
pub async fn run(
    config: Config,
    pool: &WorkerPool,
    shutdown: CancellationToken,
) -> Result<(), ClientError> {
    let state = Arc::new(ClientState::from_config(&config)?);

    if let Some(listen) = &config.metrics.listen {
        match shadowlink_metrics::init_prometheus(listen) {
            Ok(()) => info!(listen = %listen, "metrics exporter started"),
            Err(e) => warn!(listen = %listen, error = %e, "failed to start metrics exporter"),
        }
    }

    let listener = TcpListener::bind(config.local_endpoint()).await?;
    info!(
        listen = %config.local_endpoint(),
        remote = %config.server_endpoint(),
        method = %state.factory.kind(),
        workers = pool.workers(),
        "shadowlink local started"
    );

    serve(listener, state, pool, shutdown).await
}

/// Accept loop over an already-bound listener.
pub async fn serve<K>(
    listener: TcpListener,
    state: Arc<ClientState<K>>,
    pool: &WorkerPool,
    shutdown: CancellationToken,
) -> Result<(), ClientError>
where
    K: UpstreamConnector + 'static,
{
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&state);
                        pool.spawn(handler::handle_socks5_conn(stream, peer, state));
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!("shutting down client");
                break;
            }
        }
    }

    Ok(())
}
