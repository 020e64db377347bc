//! RFC 1928 wire format: greeting, method selection, request, reply, and
//! the UDP ASSOCIATE datagram header (specification §4.5).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub const VERSION: u8 = 0x05;

pub const METHOD_NO_AUTH: u8 = 0x00;
pub const METHOD_NO_ACCEPTABLE: u8 = 0xFF;

const ATYP_V4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_V6: u8 = 0x04;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unsupported SOCKS version {0:#x}")]
    UnsupportedVersion(u8),
    #[error("unsupported command {0:#x}")]
    UnsupportedCommand(u8),
    #[error("unsupported address type {0:#x}")]
    UnsupportedAddrType(u8),
    #[error("domain name is not valid UTF-8")]
    InvalidDomain,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The three SOCKS5 commands (specification §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Bind,
    UdpAssociate,
}

impl Command {
    fn from_byte(b: u8) -> Result<Command, ProtocolError> {
        match b {
            0x01 => Ok(Command::Connect),
            0x02 => Ok(Command::Bind),
            0x03 => Ok(Command::UdpAssociate),
            other => Err(ProtocolError::UnsupportedCommand(other)),
        }
    }
}

/// A destination address as carried on the wire: either an IP literal or a
/// domain name. DOMAIN is "the primary routing surface" (specification
/// §4.5) — it is what carries a `*.latency.space` hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Ip(IpAddr),
    Domain(String),
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Ip(ip) => write!(f, "{ip}"),
            Address::Domain(d) => write!(f, "{d}"),
        }
    }
}

/// A parsed SOCKS5 request (specification §4.5 "Request").
#[derive(Debug, Clone)]
pub struct Request {
    pub command: Command,
    pub address: Address,
    pub port: u16,
}

/// Reply codes used in the SOCKS5 reply (specification §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    Success = 0x00,
    GeneralFailure = 0x01,
    NotAllowed = 0x02,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    CommandNotSupported = 0x07,
    AddrTypeNotSupported = 0x08,
}

/// Read the greeting (`VER`, `NMETHODS`, `METHODS`) and return the offered
/// method list.
pub async fn read_greeting<R: tokio::io::AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;
    if header[0] != VERSION {
        return Err(ProtocolError::UnsupportedVersion(header[0]));
    }
    let mut methods = vec![0u8; header[1] as usize];
    stream.read_exact(&mut methods).await?;
    Ok(methods)
}

/// Choose NO_AUTH if offered, else NO_ACCEPTABLE (specification §4.5).
pub fn choose_method(offered: &[u8]) -> u8 {
    if offered.contains(&METHOD_NO_AUTH) {
        METHOD_NO_AUTH
    } else {
        METHOD_NO_ACCEPTABLE
    }
}

pub async fn write_method_selection<W: tokio::io::AsyncWrite + Unpin>(
    stream: &mut W,
    method: u8,
) -> Result<(), ProtocolError> {
    stream.write_all(&[VERSION, method]).await?;
    Ok(())
}

/// Read a SOCKS5 request (`VER CMD RSV ATYP DST.ADDR DST.PORT`).
pub async fn read_request<R: tokio::io::AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<Request, ProtocolError> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    if header[0] != VERSION {
        return Err(ProtocolError::UnsupportedVersion(header[0]));
    }
    let command = Command::from_byte(header[1])?;
    // header[2] is RSV, ignored.
    let atyp = header[3];

    let address = match atyp {
        ATYP_V4 => {
            let mut octets = [0u8; 4];
            stream.read_exact(&mut octets).await?;
            Address::Ip(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        ATYP_V6 => {
            let mut octets = [0u8; 16];
            stream.read_exact(&mut octets).await?;
            Address::Ip(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        ATYP_DOMAIN => {
            let mut len_buf = [0u8; 1];
            stream.read_exact(&mut len_buf).await?;
            let mut domain = vec![0u8; len_buf[0] as usize];
            stream.read_exact(&mut domain).await?;
            Address::Domain(String::from_utf8(domain).map_err(|_| ProtocolError::InvalidDomain)?)
        }
        other => return Err(ProtocolError::UnsupportedAddrType(other)),
    };

    let mut port_buf = [0u8; 2];
    stream.read_exact(&mut port_buf).await?;
    let port = u16::from_be_bytes(port_buf);

    Ok(Request {
        command,
        address,
        port,
    })
}

/// Write a SOCKS5 reply (`VER REP RSV ATYP BND.ADDR BND.PORT`).
pub async fn write_reply<W: tokio::io::AsyncWrite + Unpin>(
    stream: &mut W,
    rep: ReplyCode,
    bound: SocketAddr,
) -> Result<(), ProtocolError> {
    let mut buf = vec![VERSION, rep as u8, 0x00];
    match bound {
        SocketAddr::V4(v4) => {
            buf.push(ATYP_V4);
            buf.extend_from_slice(&v4.ip().octets());
            buf.extend_from_slice(&v4.port().to_be_bytes());
        }
        SocketAddr::V6(v6) => {
            buf.push(ATYP_V6);
            buf.extend_from_slice(&v6.ip().octets());
            buf.extend_from_slice(&v6.port().to_be_bytes());
        }
    }
    stream.write_all(&buf).await?;
    Ok(())
}

/// A parsed UDP ASSOCIATE datagram (`RSV FRAG ATYP DST.ADDR DST.PORT DATA`,
/// specification §4.5). `fragment != 0` datagrams are dropped by the caller.
#[derive(Debug, Clone)]
pub struct UdpDatagram {
    pub fragment: u8,
    pub address: Address,
    pub port: u16,
    pub payload: Vec<u8>,
}

/// Parse a client-to-relay UDP datagram.
pub fn parse_udp_datagram(buf: &[u8]) -> Result<UdpDatagram, ProtocolError> {
    if buf.len() < 4 {
        return Err(ProtocolError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "UDP datagram shorter than the RSV/FRAG/ATYP header",
        )));
    }
    // buf[0..2] is RSV, must be zero per RFC 1928 but is not enforced here.
    let fragment = buf[2];
    let atyp = buf[3];
    let mut offset = 4;

    let address = match atyp {
        ATYP_V4 => {
            if buf.len() < offset + 4 {
                return Err(truncated());
            }
            let ip = Ipv4Addr::new(buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]);
            offset += 4;
            Address::Ip(IpAddr::V4(ip))
        }
        ATYP_V6 => {
            if buf.len() < offset + 16 {
                return Err(truncated());
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&buf[offset..offset + 16]);
            offset += 16;
            Address::Ip(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        ATYP_DOMAIN => {
            if buf.len() <= offset {
                return Err(truncated());
            }
            let len = buf[offset] as usize;
            offset += 1;
            if buf.len() < offset + len {
                return Err(truncated());
            }
            let domain = String::from_utf8(buf[offset..offset + len].to_vec())
                .map_err(|_| ProtocolError::InvalidDomain)?;
            offset += len;
            Address::Domain(domain)
        }
        other => return Err(ProtocolError::UnsupportedAddrType(other)),
    };

    if buf.len() < offset + 2 {
        return Err(truncated());
    }
    let port = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
    offset += 2;

    Ok(UdpDatagram {
        fragment,
        address,
        port,
        payload: buf[offset..].to_vec(),
    })
}

fn truncated() -> ProtocolError {
    ProtocolError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "UDP datagram truncated before DST.PORT/DATA",
    ))
}

/// Wrap an outbound (relay-to-client) UDP payload symmetrically.
pub fn encode_udp_datagram(address: &Address, port: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8, 0u8, 0u8];
    match address {
        Address::Ip(IpAddr::V4(v4)) => {
            buf.push(ATYP_V4);
            buf.extend_from_slice(&v4.octets());
        }
        Address::Ip(IpAddr::V6(v6)) => {
            buf.push(ATYP_V6);
            buf.extend_from_slice(&v6.octets());
        }
        Address::Domain(domain) => {
            buf.push(ATYP_DOMAIN);
            buf.push(domain.len() as u8);
            buf.extend_from_slice(domain.as_bytes());
        }
    }
    buf.extend_from_slice(&port.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_no_auth_when_offered() {
        assert_eq!(choose_method(&[0x01, 0x00, 0x02]), METHOD_NO_AUTH);
    }

    #[test]
    fn falls_back_to_no_acceptable() {
        assert_eq!(choose_method(&[0xFF]), METHOD_NO_ACCEPTABLE);
    }

    #[test]
    fn udp_datagram_round_trips_domain() {
        let encoded = encode_udp_datagram(&Address::Domain("mars.latency.space".into()), 9000, b"hi");
        let mut with_rsv_frag = vec![0u8, 0u8, 0u8];
        with_rsv_frag.extend_from_slice(&encoded[3..]);
        let parsed = parse_udp_datagram(&with_rsv_frag).unwrap();
        assert_eq!(parsed.fragment, 0);
        assert_eq!(parsed.port, 9000);
        assert_eq!(parsed.payload, b"hi");
        assert_eq!(parsed.address, Address::Domain("mars.latency.space".into()));
    }

    #[test]
    fn truncated_datagram_is_rejected() {
        let result = parse_udp_datagram(&[0, 0, 0, ATYP_V4, 1, 2]);
        assert!(result.is_err());
    }
}
