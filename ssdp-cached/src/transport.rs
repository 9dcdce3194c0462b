use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use async_trait::async_trait;
use anyhow::{bail, Context, Result};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

/// Datagram transport the relay runs on
#[async_trait]
pub trait Transport: Send + Sync {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Unicast send, routed normally
    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<()>;

    /// Multicast send out of the interface owning `interface`
    async fn send_on(&self, interface: Ipv4Addr, payload: &[u8], dest: SocketAddr) -> io::Result<()>;

    /// Local interface addresses used for discovery fan-out
    fn interfaces(&self) -> Vec<Ipv4Addr>;
}

/// SSDP socket bound to the well-known port and joined to the group on
/// every interface
pub struct UdpTransport {
    socket: UdpSocket,
    interfaces: Vec<Ipv4Addr>,
    /// Held across the IP_MULTICAST_IF switch and the send that relies on it
    multicast_lock: Mutex<()>,
}

impl UdpTransport {
    /// Bind and join. `interfaces` overrides enumeration when non-empty.
    pub fn bind(group: Ipv4Addr, port: u16, interfaces: &[Ipv4Addr]) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .context("Failed to create UDP socket")?;
        socket
            .set_reuse_address(true)
            .context("Failed to set SO_REUSEADDR")?;
        socket
            .bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())
            .with_context(|| format!("Failed to bind UDP port {}", port))?;

        let mut interfaces = if interfaces.is_empty() {
            enumerate_interfaces()
        } else {
            interfaces.to_vec()
        };

        if interfaces.is_empty() {
            tracing::warn!("No usable interfaces found, joining {} on the default interface", group);
            socket
                .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
                .with_context(|| format!("Failed to join multicast group {}", group))?;
            interfaces.push(Ipv4Addr::UNSPECIFIED);
        } else {
            interfaces.retain(|iface| match socket.join_multicast_v4(&group, iface) {
                Ok(()) => {
                    tracing::info!("Joined multicast group {} on interface {}", group, iface);
                    true
                }
                Err(e) => {
                    tracing::warn!("Failed to join multicast group {} on {}: {}", group, iface, e);
                    false
                }
            });
            if interfaces.is_empty() {
                bail!("Failed to join multicast group {} on any interface", group);
            }
        }

        // Our own discovery broadcasts must not come back as searches
        socket
            .set_multicast_loop_v4(false)
            .context("Failed to disable multicast loopback")?;
        socket
            .set_nonblocking(true)
            .context("Failed to set socket non-blocking")?;

        let socket = UdpSocket::from_std(socket.into())
            .context("Failed to register socket with tokio")?;

        Ok(Self {
            socket,
            interfaces,
            multicast_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.socket.send_to(payload, dest).await.map(|_| ())
    }

    async fn send_on(&self, interface: Ipv4Addr, payload: &[u8], dest: SocketAddr) -> io::Result<()> {
        let _guard = self.multicast_lock.lock().await;
        SockRef::from(&self.socket).set_multicast_if_v4(&interface)?;
        self.socket.send_to(payload, dest).await.map(|_| ())
    }

    fn interfaces(&self) -> Vec<Ipv4Addr> {
        self.interfaces.clone()
    }
}

/// All non-loopback IPv4 interface addresses, deduplicated
pub fn enumerate_interfaces() -> Vec<Ipv4Addr> {
    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(ifs) => ifs,
        Err(e) => {
            tracing::warn!("Failed to list network interfaces: {}", e);
            return Vec::new();
        }
    };

    let mut addrs: Vec<Ipv4Addr> = Vec::new();
    for (name, ip) in interfaces {
        if let IpAddr::V4(ipv4) = ip {
            if ipv4.is_loopback() || addrs.contains(&ipv4) {
                continue;
            }
            tracing::debug!("Found interface {} ({})", name, ipv4);
            addrs.push(ipv4);
        }
    }
    addrs
}
