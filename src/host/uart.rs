use std::{
    boxed::Box,
    string::String,
    vec::Vec,
    time::Duration,
    };
use tokio::time::{Instant, sleep, timeout_at};
use log::*;

use crate::{
    protocol::{Packet, Code, MTU, MAX_PAYLOAD},
    ring::{Cursor, reconcile},
    };
use super::{Error, Transport, Sequence, RandomSequence};


/// delay between two polls of the device while waiting for a line
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);
/// longest wait of [Uart::read_line], longer timeouts are shortened to it
pub const MAX_READ_TIMEOUT: Duration = Duration::from_secs(30 * 365 * 86400);


/**
    uart emulation over the device output pool

    The device keeps the last bytes output by the gpsdo in a circular pool. This struct keeps a mirror of that pool, the position the device was writing at when last polled (the remote cursor), and the position the caller has read up to (the local cursor). The device is polled only once everything known has been read.

    It is not meant to be shared, every operation takes it exclusively.
*/
pub struct Uart<T, S = RandomSequence> {
    transport: T,
    sequence: S,
    /// mirror of the device pool, as of the last successful poll
    cache: Vec<u8>,
    /// next position to read
    local: Cursor,
    /// next position the device was going to write
    remote: Cursor,
    /// bytes of the line being read
    line: Vec<u8>,
}

impl<T: Transport> Uart<T> {
    /// initialize the uart with random sequence numbers
    pub async fn connect(transport: T) -> Result<Self, Error> {
        Self::new(transport, RandomSequence).await
    }
}

impl<T: Transport, S: Sequence> Uart<T, S> {
    /// ask the device for its pool size and start reading from its beginning
    pub async fn new(transport: T, sequence: S) -> Result<Self, Error> {
        let mut uart = Self {
            transport,
            sequence,
            cache: Vec::new(),
            local: Cursor::default(),
            remote: Cursor::default(),
            line: Vec::new(),
        };
        let reply = uart.request(Code::PoolSizeRequest, Code::PoolSizeAck, &[]).await
            .map_err(|error| Error::Connect(Box::new(error)))?;
        let size = usize::from(reply.header.pool_size());
        if size == 0 || size > MAX_PAYLOAD {
            return Err(Error::Connect(Box::new(Error::Protocol("pool size out of range"))));
        }
        debug!("gpsdo pool is {} bytes", size);
        uart.cache.resize(size, 0);
        Ok(uart)
    }

    /// size of the device pool
    pub fn pool_size(&self) -> usize {self.cache.len()}
    /// cursor up to which bytes have been read
    pub fn local(&self) -> Cursor {self.local}
    /// device cursor as of the last poll
    pub fn remote(&self) -> Cursor {self.remote}
    pub fn transport(&self) -> &T {&self.transport}
    pub fn transport_mut(&mut self) -> &mut T {&mut self.transport}

    /**
        send a line to the gpsdo

        line feeds not preceded by a carriage return are sent as `\r\n`. The line is sent in one datagram so it must not exceed [MAX_PAYLOAD] once translated.
        On error the line may or may not have reached the device.
    */
    pub async fn write_line(&mut self, text: &str) -> Result<(), Error> {
        let data = crlf(text);
        if data.len() > MAX_PAYLOAD {
            return Err(Error::Host("line is longer than maximum payload"));
        }
        self.request(Code::WriteRequest, Code::WriteAck, &data).await
            .map_err(|error| Error::Send(Box::new(error)))?;
        Ok(())
    }

    /**
        receive one line from the gpsdo, without its line ending

        returns as soon as a line feed is received. If none arrives before `timeout`, the bytes received so far are returned instead, and the next call starts a new line after them.
        A poll still pending at the deadline is abandoned, so this returns at most [POLL_INTERVAL] after `timeout`.
    */
    pub async fn read_line(&mut self, timeout: Duration) -> String {
        let deadline = Instant::now() + timeout.min(MAX_READ_TIMEOUT);

        'poll: while Instant::now() < deadline {
            if timeout_at(deadline, self.refresh()).await.is_err() {
                debug!("cache refresh abandoned at read deadline");
                break
            }
            while let Some(byte) = self.next_byte() {
                match byte {
                    b'\r' => continue,
                    b'\n' => break 'poll,
                    _ => self.line.push(byte),
                }
            }
            sleep(POLL_INTERVAL).await;
        }
        if Instant::now() >= deadline {
            trace!("read timeout with {} bytes pending", self.line.len());
        }
        let line = std::mem::take(&mut self.line);
        String::from_utf8_lossy(&line).into_owned()
    }

    /// poll the device pool if everything known has been read, then step over lapped data
    async fn refresh(&mut self) {
        if self.local.is_behind(&self.remote)
            {return}

        match self.request(Code::CacheRequest, Code::CacheAck, &[]).await {
            Ok(reply) => {
                let state = Cursor::from(reply.header.state());
                if reply.data.len() < self.cache.len() {
                    debug!("cache refresh skipped: answer shorter than pool");
                }
                else if usize::from(state.position) >= self.cache.len() {
                    debug!("cache refresh skipped: device position {} out of pool", state.position);
                }
                else {
                    let pool = self.cache.len();
                    self.cache.copy_from_slice(&reply.data[.. pool]);
                    self.remote = state;
                }
            },
            Err(error) => debug!("cache refresh skipped: {}", error),
        }

        let reconciled = reconcile(self.local, self.remote, &self.cache);
        if reconciled != self.local {
            warn!("gpsdo output lapped the host, skipping from {:?} to {:?}", self.local, reconciled);
            self.local = reconciled;
        }
    }

    /// next byte from the mirror, if the device wrote it
    fn next_byte(&mut self) -> Option<u8> {
        if !self.local.is_behind(&self.remote)
            {return None}
        let byte = self.cache[usize::from(self.local.position)];
        self.local.advance(self.cache.len());
        Some(byte)
    }

    /**
        send a request and wait for its acknowledgement

        datagrams that are not the acknowledgement, like late answers to abandoned requests, are dropped until the transport timeout runs out
    */
    async fn request(&mut self, code: Code, ack: Code, data: &[u8]) -> Result<Packet, Error> {
        let sequence = self.sequence.next_sequence();
        let mut send = [0u8; MTU];
        let size = Packet::new(code, sequence, data)?.encode(&mut send)?;
        self.transport.send(&send[.. size]).await?;

        let timeout = self.transport.timeout();
        let transport = &mut self.transport;
        let reply = tokio::time::timeout(timeout, async {
            let mut receive = [0u8; MTU];
            loop {
                let received = transport.receive(&mut receive).await?;
                let reply = Packet::decode(&receive[.. received.min(MTU)])
                    .and_then(|reply| reply.answers(ack, sequence).map(|()| reply));
                match reply {
                    Ok(reply) => break Ok::<_, Error>(reply),
                    Err(error) => debug!("dropped datagram while waiting for {:?} {}: {}", ack, sequence, error),
                }
            }
        }).await
            .map_err(|_| Error::Timeout)??;
        trace!("{:?} {} answered with {} bytes", code, sequence, reply.data.len());
        Ok(reply)
    }
}

/// translate bare line feeds to `\r\n`
fn crlf(text: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(text.len());
    let mut previous = None;
    for &byte in text.as_bytes() {
        if byte == b'\n' && previous != Some(b'\r') {
            data.push(b'\r');
        }
        data.push(byte);
        previous = Some(byte);
    }
    data
}
