use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
    };
use tokio::net::{UdpSocket, ToSocketAddrs, lookup_host};
use log::*;

use super::Error;


/// udp port the device answers uart requests on
pub const GPSDO_PORT: u16 = 50001;

/**
    datagram link to the device

    answers may be lost or arrive after their request was given up, so a received datagram is not necessarily the answer to the last request sent. The caller matches them and keeps receiving until [Transport::timeout] runs out.
*/
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// send one datagram
    async fn send(&mut self, request: &[u8]) -> Result<(), Error>;
    /// wait for the next datagram, write it in `response` and return its size
    async fn receive(&mut self, response: &mut [u8]) -> Result<usize, Error>;
    /// time given to the device to answer one request
    fn timeout(&self) -> Duration;
}


/// datagram exchange over udp, with a per-exchange timeout
pub struct UdpTransport {
    socket: UdpSocket,
    timeout: Duration,
}
impl UdpTransport {
    /// open a socket connected to the device at the given address
    pub async fn open(address: impl ToSocketAddrs) -> Result<Self, Error> {
        let remote = lookup_host(address).await?
            .next()
            .ok_or(Error::Host("device address resolved to nothing"))?;
        let local: SocketAddr = if remote.is_ipv4()
            {(Ipv4Addr::UNSPECIFIED, 0).into()}
        else
            {(Ipv6Addr::UNSPECIFIED, 0).into()};
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;
        debug!("udp transport to {}", remote);
        Ok(Self {
            socket,
            timeout: Duration::from_millis(100),
        })
    }
    /// change the time waited for each answer
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
impl Transport for UdpTransport {
    async fn send(&mut self, request: &[u8]) -> Result<(), Error> {
        self.socket.send(request).await?;
        Ok(())
    }
    async fn receive(&mut self, response: &mut [u8]) -> Result<usize, Error> {
        Ok(self.socket.recv(response).await?)
    }
    fn timeout(&self) -> Duration {self.timeout}
}
