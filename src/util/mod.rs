//! Utility functions shared across the application.

mod secret;

pub use secret::SecretString;

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::warn;

/// Number of ports after the preferred one tried before asking the OS
const PORT_SEARCH_SPAN: u16 = 10;

fn socket_addr(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

async fn port_is_free(addr: SocketAddr) -> bool {
    TcpListener::bind(addr).await.is_ok()
}

/// Find a free port for an auxiliary listener.
///
/// Tries `preferred`, then the next ten ports, then lets the OS pick. Only
/// for listeners nobody is configured against (the dashboard); the
/// authorization endpoint binds its port exactly.
pub async fn find_available_port(host: &str, preferred: u16) -> std::io::Result<u16> {
    if port_is_free(socket_addr(host, preferred)?).await {
        return Ok(preferred);
    }

    for offset in 1..=PORT_SEARCH_SPAN {
        let port = preferred.saturating_add(offset);
        if port_is_free(socket_addr(host, port)?).await {
            warn!(preferred, actual = port, "Preferred port unavailable, using alternate");
            return Ok(port);
        }
    }

    let listener = TcpListener::bind(socket_addr(host, 0)?).await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    warn!(preferred, actual = port, "Using OS-assigned port");
    Ok(port)
}
