//! Server address discovery helper
//!
//! A server answers discovery requests with the address viewers should
//! connect to. The local interface address that routes towards the control
//! broker is a good answer; connecting a UDP socket sends no packets but makes
//! the OS pick that interface.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;

/// Local address the OS would use to reach `probe`, or loopback if none
pub async fn reachable_ip(probe: SocketAddr) -> IpAddr {
    match local_ip_towards(probe).await {
        Ok(ip) => ip,
        Err(e) => {
            tracing::error!(probe = %probe, error = %e, "Failed to find local IP address");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

async fn local_ip_towards(probe: SocketAddr) -> std::io::Result<IpAddr> {
    let bind: SocketAddr = if probe.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(bind).await?;
    socket.connect(probe).await?;
    Ok(socket.local_addr()?.ip())
}
