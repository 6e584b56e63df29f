//! TCP listener
//!
//! Each accepted client gets its own task and its own chat session.

use std::sync::Arc;

use seirc_core::{ChatService, Config};
use tokio::net::TcpListener;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::connection::run_connection;
use crate::error::Result;

/// Bind the configured address and serve clients until the task is aborted
pub async fn start_server(config: Config, service: Arc<dyn ChatService>) -> Result<()> {
    let listener = TcpListener::bind(config.listen.address()).await?;
    info!("IRC gateway listening on {}", listener.local_addr()?);

    serve(listener, Arc::new(config), service).await
}

/// Accept loop over an already bound listener
pub async fn serve(listener: TcpListener, config: Arc<Config>, service: Arc<dyn ChatService>) -> Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept error: {}", e);
                continue;
            }
        };

        let id = Uuid::new_v4();
        let span = info_span!("session", %id, %peer);
        let config = Arc::clone(&config);
        let service = Arc::clone(&service);

        tokio::spawn(
            async move {
                info!("New connection");
                if let Err(e) = run_connection(socket, service, config).await {
                    warn!("Connection error: {}", e);
                }
                info!("Disconnected");
            }
            .instrument(span),
        );
    }
}
