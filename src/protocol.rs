/*!
    datagram layout shared by host and device

    every datagram is a fixed little-endian [Header] followed by `header.size` bytes of payload.
    The host picks the sequence number, the device echoes it back in its acknowledgement.
*/

use core::fmt;
use bilge::prelude::*;
use packbytes::{FromBytes, ToBytes, ByteArray};

use crate::pack_enum;


/// version number a device must answer with
pub const PROTOCOL_VERSION: u32 = 3;
/// maximum number of payload bytes in one datagram
pub const MAX_PAYLOAD: usize = 256;
/// size of the datagram header
pub const HEADER: usize = <Header as FromBytes>::Bytes::SIZE;
/// maximum size of a datagram
pub const MTU: usize = HEADER + MAX_PAYLOAD;


/// datagram header
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq)]
pub struct Header {
    /// must be [PROTOCOL_VERSION]
    pub version: u32,
    /// identifier of the exchange, echoed in the answer
    pub sequence: u32,
    /// type of request or acknowledgement
    pub code: Code,
    /// pool size or [CacheState] depending on `code`
    pub aux: u16,
    /// number of bytes following this header
    pub size: u16,
}
impl Header {
    /// pool size reported in a [Code::PoolSizeAck]
    pub fn pool_size(&self) -> u16 {self.aux}
    /// device cursor reported in a [Code::CacheAck]
    pub fn state(&self) -> CacheState {CacheState::from(self.aux)}
}

/// request and acknowledgement codes
#[bitsize(8)]
#[derive(Copy, Clone, Default, FromBits, Debug, PartialEq)]
pub enum Code {
    #[default]
    None = 0,
    /// ask for the size of the device output pool
    PoolSizeRequest = 1,
    PoolSizeAck = 2,
    /// forward the payload to the gpsdo serial input
    WriteRequest = 3,
    WriteAck = 4,
    /// ask for a snapshot of the whole output pool
    CacheRequest = 5,
    CacheAck = 6,
    #[fallback]
    Unknown = 255,
}
pack_enum!(Code);

/// write cursor of the device pool, as transmitted in [Header::aux]
#[bitsize(16)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq)]
pub struct CacheState {
    /// number of times the device wrapped around its pool
    pub wraps: u8,
    /// next position the device will write
    pub position: u8,
}


/// a datagram failed to encode or decode, or is not the expected answer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProtocolError(pub &'static str);
impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}


/// header and payload of one datagram
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub data: heapless::Vec<u8, MAX_PAYLOAD>,
}
impl Packet {
    /// build a request with the given payload
    pub fn new(code: Code, sequence: u32, data: &[u8]) -> Result<Self, ProtocolError> {
        let header = Header {
            version: PROTOCOL_VERSION,
            sequence,
            code,
            aux: 0,
            size: payload_size(data.len())?,
        };
        let data = heapless::Vec::from_slice(data)
            .map_err(|_| ProtocolError("payload is longer than maximum allowed"))?;
        Ok(Self {header, data})
    }
    /// build an empty answer to this packet, echoing its version and sequence
    pub fn reply(&self, code: Code) -> Self {
        Self {
            header: Header {
                version: self.header.version,
                sequence: self.header.sequence,
                code,
                .. Default::default()
            },
            data: heapless::Vec::new(),
        }
    }
    /// write the datagram into `dst` and return its size
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize, ProtocolError> {
        let size = HEADER + self.data.len();
        if dst.len() < size {
            return Err(ProtocolError("buffer too small for datagram"));
        }
        let mut header = self.header;
        header.size = payload_size(self.data.len())?;
        dst[.. HEADER].copy_from_slice(&header.to_le_bytes());
        dst[HEADER .. size].copy_from_slice(&self.data);
        Ok(size)
    }
    /// parse a received datagram
    pub fn decode(src: &[u8]) -> Result<Self, ProtocolError> {
        let Some(head) = src.get(.. HEADER)
            else {return Err(ProtocolError("datagram shorter than header"))};
        let header = Header::from_le_bytes(head.try_into()
            .map_err(|_| ProtocolError("datagram shorter than header"))?);
        let size = usize::from(header.size);
        if size > MAX_PAYLOAD {
            return Err(ProtocolError("declared payload is longer than maximum allowed"));
        }
        let Some(payload) = src.get(HEADER .. HEADER + size)
            else {return Err(ProtocolError("datagram shorter than declared payload"))};
        let data = heapless::Vec::from_slice(payload)
            .map_err(|_| ProtocolError("declared payload is longer than maximum allowed"))?;
        Ok(Self {header, data})
    }
    /// check this packet is the acknowledgement `code` for the request numbered `sequence`
    pub fn answers(&self, code: Code, sequence: u32) -> Result<(), ProtocolError> {
        if self.header.version != PROTOCOL_VERSION
            {return Err(ProtocolError("protocol version mismatch"))}
        if self.header.code != code
            {return Err(ProtocolError("unexpected answer code"))}
        if self.header.sequence != sequence
            {return Err(ProtocolError("sequence number mismatch"))}
        Ok(())
    }
}

fn payload_size(size: usize) -> Result<u16, ProtocolError> {
    if size <= MAX_PAYLOAD  {Ok(size as u16)}
    else {Err(ProtocolError("payload is longer than maximum allowed"))}
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let packet = Packet {
            header: Header {
                version: PROTOCOL_VERSION,
                sequence: 0x0403_0201,
                code: Code::CacheAck,
                aux: CacheState::new(7, 42).into(),
                size: 0,
            },
            data: heapless::Vec::from_slice(b"$G").unwrap(),
        };
        let mut buffer = [0u8; MTU];
        let size = packet.encode(&mut buffer).unwrap();
        assert_eq!(HEADER, 13);
        assert_eq!(size, HEADER + 2);
        assert_eq!(&buffer[.. size], &[3u8,0,0,0, 1,2,3,4, 6, 7,42, 2,0, b'$', b'G']);

        let decoded = Packet::decode(&buffer[.. size]).unwrap();
        assert_eq!(decoded.header.state().wraps(), 7);
        assert_eq!(decoded.header.state().position(), 42);
        assert_eq!(&decoded.data[..], b"$G");
    }

    #[test]
    fn decode_rejects_truncated() {
        let packet = Packet::new(Code::WriteRequest, 1, b"$PMTK000*32\r\n").unwrap();
        let mut buffer = [0u8; MTU];
        let size = packet.encode(&mut buffer).unwrap();
        assert!(Packet::decode(&buffer[.. HEADER - 1]).is_err());
        assert!(Packet::decode(&buffer[.. size - 1]).is_err());
        assert!(Packet::decode(&buffer[.. size]).is_ok());
    }

    #[test]
    fn decode_rejects_oversized_declaration() {
        let mut buffer = [0u8; MTU + 8];
        let header = Header {
            version: PROTOCOL_VERSION,
            size: (MAX_PAYLOAD + 1) as u16,
            .. Default::default()
        };
        buffer[.. HEADER].copy_from_slice(&header.to_le_bytes());
        assert!(Packet::decode(&buffer).is_err());
    }

    #[test]
    fn new_rejects_long_payload() {
        assert!(Packet::new(Code::WriteRequest, 0, &[b'x'; MAX_PAYLOAD]).is_ok());
        assert!(Packet::new(Code::WriteRequest, 0, &[b'x'; MAX_PAYLOAD + 1]).is_err());
    }

    #[test]
    fn unknown_code_falls_back() {
        let mut buffer = [0u8; HEADER];
        buffer[8] = 200;
        let packet = Packet::decode(&buffer).unwrap();
        assert_eq!(packet.header.code, Code::Unknown);
    }

    #[test]
    fn answers_checks_code_and_sequence() {
        let request = Packet::new(Code::CacheRequest, 99, &[]).unwrap();
        let reply = request.reply(Code::CacheAck);
        assert!(reply.answers(Code::CacheAck, 99).is_ok());
        assert_eq!(reply.answers(Code::CacheAck, 98), Err(ProtocolError("sequence number mismatch")));
        assert_eq!(reply.answers(Code::WriteAck, 99), Err(ProtocolError("unexpected answer code")));

        let mut foreign = reply.clone();
        foreign.header.version = 1;
        assert_eq!(foreign.answers(Code::CacheAck, 99), Err(ProtocolError("protocol version mismatch")));
    }
}
