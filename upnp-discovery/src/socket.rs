//! Blocking UDP sockets for SSDP traffic.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Result, SsdpError};
use crate::ssdp::{IncomingDatagramMessage, OutgoingDatagramMessage, SSDP_MULTICAST_ADDR, SSDP_PORT};

const RECEIVE_BUFFER_SIZE: usize = 2048;

/// A UDP socket sending and receiving SSDP datagrams
#[derive(Debug)]
pub struct SsdpSocket {
    socket: UdpSocket,
    local_address: Option<IpAddr>,
}

impl SsdpSocket {
    /// Bind the SSDP port and join the multicast group on `interface`.
    ///
    /// Used to hear NOTIFY and M-SEARCH traffic. `Ipv4Addr::UNSPECIFIED` lets the
    /// system pick the interface.
    pub fn bind_multicast(interface: Ipv4Addr, read_timeout: Duration) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SSDP_PORT));
        socket.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket.into();
        socket.join_multicast_v4(&SSDP_MULTICAST_ADDR, &interface)?;
        socket.set_multicast_loop_v4(true)?;
        socket.set_read_timeout(Some(read_timeout))?;

        tracing::info!("SSDP socket joined {} on {}", SSDP_MULTICAST_ADDR, interface);
        Ok(Self {
            socket,
            local_address: (!interface.is_unspecified()).then_some(IpAddr::V4(interface)),
        })
    }

    /// Bind an ephemeral port on `interface`.
    ///
    /// Used to send searches and receive the unicast responses.
    pub fn bind_unicast(interface: Ipv4Addr, read_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(interface, 0))?;
        socket.set_read_timeout(Some(read_timeout))?;
        socket.set_multicast_loop_v4(true)?;

        Ok(Self {
            socket,
            local_address: (!interface.is_unspecified()).then_some(IpAddr::V4(interface)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone()?,
            local_address: self.local_address,
        })
    }

    pub fn send(&self, message: &OutgoingDatagramMessage) -> Result<()> {
        self.socket.send_to(&message.to_bytes(), message.destination)?;
        tracing::debug!("Sent SSDP datagram {}", message);
        Ok(())
    }

    /// Wait for the next datagram; `Ok(None)` when the read timeout elapses
    pub fn receive(&self) -> Result<Option<IncomingDatagramMessage>> {
        let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
        match self.socket.recv_from(&mut buffer) {
            Ok((size, source)) => {
                IncomingDatagramMessage::parse(&buffer[..size], source, self.local_address).map(Some)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(SsdpError::Network(e)),
        }
    }

    /// Deliver datagrams to `handler` until `stop` is set.
    ///
    /// Datagrams that are not valid SSDP are skipped.
    pub fn run<F>(&self, stop: &AtomicBool, mut handler: F) -> Result<()>
    where
        F: FnMut(IncomingDatagramMessage),
    {
        while !stop.load(Ordering::SeqCst) {
            match self.receive() {
                Ok(Some(message)) => handler(message),
                Ok(None) => {}
                Err(SsdpError::InvalidDatagram(reason)) => {
                    tracing::debug!("Skipping datagram: {}", reason);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
