/*!
    host side of the emulated uart, in `std` environment.

    The central resource is the [Uart] struct, which mirrors the device output pool and rebuilds the gpsdo serial output line by line.

    - the datagram exchange itself is abstracted by the [Transport] trait, [UdpTransport] being the real one
    - sequence numbers of requests come from a [Sequence], random by default
*/

/// the ring cursor synchronization, this is the tricky part of the code
mod uart;
/// datagram exchange with the device
mod transport;
/// sequence numbers for requests
mod sequence;


pub use uart::*;
pub use transport::*;
pub use sequence::*;


use std::boxed::Box;
use thiserror::Error;
use crate::protocol::ProtocolError;

/// error regarding communication with the gpsdo device
#[derive(Error, Debug)]
pub enum Error {
    #[error("problem with datagram socket")]
    Bus(#[source] std::io::Error),
    #[error("no answer arrived in expected time")]
    Timeout,
    #[error("bad answer from device: {0}")]
    Protocol(&'static str),
    #[error("problem detected on host side: {0}")]
    Host(&'static str),
    #[error("failed to communicate with gpsdo")]
    Connect(#[source] Box<Error>),
    #[error("failed to send line to gpsdo")]
    Send(#[source] Box<Error>),
}
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Bus(error)
    }
}
impl From<ProtocolError> for Error {
    fn from(error: ProtocolError) -> Self {
        Self::Protocol(error.0)
    }
}
