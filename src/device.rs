/*!
    device side of the emulated uart

    The device never streams the gpsdo output: it only keeps the last `POOL` bytes in a circular pool, and sends a snapshot of that pool with its write cursor whenever the host asks. Host writes are kept aside for forwarding to the gpsdo serial input.
*/

use log::*;

use crate::{
    mutex::*,
    protocol::{Packet, Code, CacheState, MAX_PAYLOAD, PROTOCOL_VERSION},
    ring::Cursor,
    };


/// gpsdo output pool shared between the producer of serial bytes and the datagram responder
pub struct Device<const POOL: usize> {
    pool: BusyMutex<Pool<POOL>>,
}
/// content and state of the device pool
pub struct Pool<const POOL: usize> {
    buffer: [u8; POOL],
    /// next position to write
    produced: Cursor,
    /// payload of the last host write
    received: heapless::Vec<u8, MAX_PAYLOAD>,
}

impl<const POOL: usize> Device<POOL> {
    pub fn new() -> Self {
        // the whole pool travels in one datagram and positions are transmitted on 8 bits
        const { assert!(POOL >= 1 && POOL <= MAX_PAYLOAD, "pool size must be in 1 ..= MAX_PAYLOAD") };
        Self {
            pool: BusyMutex::new(Pool {
                buffer: [0; POOL],
                produced: Cursor::default(),
                received: heapless::Vec::new(),
            }),
        }
    }
    pub async fn lock(&self) -> BusyMutexGuard<'_, Pool<POOL>> {self.pool.lock().await}
    pub fn try_lock(&self) -> Option<BusyMutexGuard<'_, Pool<POOL>>> {self.pool.try_lock()}

    /// append gpsdo output to the pool
    pub async fn push(&self, bytes: &[u8]) {
        self.lock().await.push(bytes)
    }
    /// answer a host datagram, returning the size of the answer written in `response`, if any
    pub async fn respond(&self, request: &[u8], response: &mut [u8]) -> Option<usize> {
        self.lock().await.respond(request, response)
    }
}
impl<const POOL: usize> Default for Device<POOL> {
    fn default() -> Self {Self::new()}
}

impl<const POOL: usize> Pool<POOL> {
    /// write bytes at the produced cursor, overwriting the oldest ones
    pub fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.buffer[usize::from(self.produced.position)] = byte;
            self.produced.advance(POOL);
        }
    }
    /// cursor where the next byte will be written
    pub fn produced(&self) -> Cursor {self.produced}
    /// current pool content
    pub fn buffer(&self) -> &[u8] {&self.buffer}
    /// payload of the last host write, line endings as sent by the host
    pub fn received(&self) -> &[u8] {&self.received}

    pub fn respond(&mut self, request: &[u8], response: &mut [u8]) -> Option<usize> {
        let request = match Packet::decode(request) {
            Ok(request) => request,
            Err(err) => {
                debug!("ignore malformed datagram: {}", err);
                return None
            },
        };
        if request.header.version != PROTOCOL_VERSION {
            debug!("ignore datagram with protocol version {}", request.header.version);
            return None
        }
        let reply = match request.header.code {
            Code::PoolSizeRequest => {
                let mut reply = request.reply(Code::PoolSizeAck);
                reply.header.aux = u16::try_from(POOL).ok()?;
                reply
            },
            Code::CacheRequest => {
                let mut reply = request.reply(Code::CacheAck);
                let state = CacheState::try_from(self.produced).ok()?;
                reply.header.aux = state.into();
                reply.data = heapless::Vec::from_slice(&self.buffer).ok()?;
                reply
            },
            Code::WriteRequest => {
                trace!("host write {:?}", request.data);
                self.received = request.data.clone();
                request.reply(Code::WriteAck)
            },
            other => {
                debug!("ignore command {:?}", other);
                return None
            },
        };
        match reply.encode(response) {
            Ok(size) => Some(size),
            Err(err) => {
                warn!("cannot answer {:?}: {}", request.header.code, err);
                None
            },
        }
    }
}
