use tokio::net::TcpListener;

use crate::error::ProvisionError;

/// Asks the OS for an ephemeral port by binding `0.0.0.0:0`, then releases it.
/// The port was free when checked; nothing keeps it free afterwards.
pub async fn allocate_free_port() -> Result<u16, ProvisionError> {
    let listener = TcpListener::bind("0.0.0.0:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// `count` independent lookups. The same port can come back twice.
pub async fn allocate_free_ports(count: usize) -> Result<Vec<u16>, ProvisionError> {
    let mut ports = Vec::with_capacity(count);
    for _ in 0..count {
        ports.push(allocate_free_port().await?);
    }
    Ok(ports)
}
