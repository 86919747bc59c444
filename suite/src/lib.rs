/*!
    helpers shared by the integration tests: an in-memory transport to an emulated device, and a udp server for it
*/

use std::{
    collections::VecDeque,
    sync::Arc,
    time::Duration,
    };
use tokio::{
    net::UdpSocket,
    time::sleep,
    };
use ringuart::{
    device::Device,
    host::{Error, Transport},
    protocol::{Packet, Code, MTU},
    };


/// start logging once for the whole test binary, level from `RUST_LOG`
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}


/// alteration applied to the next answer of a [Loopback]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Fault {
    /// the answer is lost
    Silence,
    /// the answer echoes another sequence number
    WrongSequence,
    /// the answer has an unexpected code
    WrongCode,
    /// the auxiliary field of the answer is replaced
    Aux(u16),
    /// the answer arrives just before the answer of the next request
    Late,
}

/// transport directly calling an emulated device, counting exchanges
pub struct Loopback<const POOL: usize> {
    pub device: Arc<Device<POOL>>,
    /// number of requests sent so far
    pub exchanges: usize,
    /// faults to apply to the next answers, one per exchange
    pub faults: VecDeque<Fault>,
    /// when set, no answer is ever received
    pub silent: bool,
    pub timeout: Duration,
    /// answers not yet received
    inbox: VecDeque<Vec<u8>>,
    late: Option<Vec<u8>>,
}
impl<const POOL: usize> Loopback<POOL> {
    pub fn new(device: Arc<Device<POOL>>) -> Self {
        Self {
            device,
            exchanges: 0,
            faults: VecDeque::new(),
            silent: false,
            timeout: Duration::from_millis(100),
            inbox: VecDeque::new(),
            late: None,
        }
    }
}
impl<const POOL: usize> Transport for Loopback<POOL> {
    async fn send(&mut self, request: &[u8]) -> Result<(), Error> {
        self.exchanges += 1;
        let mut response = [0u8; MTU];
        self.inbox.extend(self.late.take());
        let Some(size) = self.device.respond(request, &mut response).await
            else {return Ok(())};
        let mut response = response[.. size].to_vec();
        match self.faults.pop_front() {
            None => {},
            Some(Fault::Silence) => return Ok(()),
            Some(Fault::WrongSequence) => response[4] ^= 0xff,
            Some(Fault::WrongCode) => response[8] = u8::from(Code::None),
            Some(Fault::Aux(aux)) => response[9 .. 11].copy_from_slice(&aux.to_le_bytes()),
            Some(Fault::Late) => {
                self.late = Some(response);
                return Ok(())
            },
        }
        self.inbox.push_back(response);
        Ok(())
    }
    async fn receive(&mut self, response: &mut [u8]) -> Result<usize, Error> {
        match self.inbox.pop_front() {
            Some(answer) if !self.silent => {
                response[.. answer.len()].copy_from_slice(&answer);
                Ok(answer.len())
            },
            _ => std::future::pending().await,
        }
    }
    fn timeout(&self) -> Duration {self.timeout}
}


/// answer uart requests received on `socket` until it fails
pub async fn serve<const POOL: usize>(device: &Device<POOL>, socket: &UdpSocket) -> std::io::Result<()> {
    serve_late(device, socket, Code::None, Duration::ZERO).await
}

/// like [serve], but hold the answer to the first `code` request for `delay` before sending it
pub async fn serve_late<const POOL: usize>(
    device: &Device<POOL>,
    socket: &UdpSocket,
    code: Code,
    delay: Duration,
) -> std::io::Result<()> {
    let mut request = [0u8; MTU];
    let mut response = [0u8; MTU];
    let mut delayed = false;
    loop {
        let (size, peer) = socket.recv_from(&mut request).await?;
        if let Some(answer) = device.respond(&request[.. size], &mut response).await {
            let late = !delayed && Packet::decode(&request[.. size])
                .is_ok_and(|request| request.header.code == code);
            if late {
                delayed = true;
                sleep(delay).await;
            }
            socket.send_to(&response[.. answer], peer).await?;
        }
    }
}
