//! Local port discovery: bind to the configured port, or let the OS pick
//! one when it is `0`, and report back the address actually bound.

use std::net::SocketAddr;

use tokio::net::TcpListener;

/// Binds a TCP listener on `127.0.0.1:port`. `port == 0` asks the OS to
/// assign an ephemeral port; the address returned always reflects the real
/// bound port, not the requested one.
pub async fn bind(port: u16) -> std::io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binding_port_zero_yields_a_real_ephemeral_port() {
        let (_listener, addr) = bind(0).await.unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn binding_an_explicit_port_reports_that_port() {
        let (_first, first_addr) = bind(0).await.unwrap();
        drop(_first);
        let (_listener, addr) = bind(first_addr.port()).await.unwrap();
        assert_eq!(addr.port(), first_addr.port());
    }
}
