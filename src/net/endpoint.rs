//! Network endpoints (address + port).

use std::fmt;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use socket2::{Domain, SockAddr};

/// Address family of an endpoint or socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl From<AddressFamily> for Domain {
    fn from(family: AddressFamily) -> Self {
        match family {
            AddressFamily::Ipv4 => Domain::IPV4,
            AddressFamily::Ipv6 => Domain::IPV6,
        }
    }
}

/// An immutable IP address and port pair identifying a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    ip: IpAddr,
    port: u16,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// The IPv4 wildcard address (`INADDR_ANY`) on `port`.
    pub fn any(port: u16) -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
    }

    /// The IPv6 wildcard address on `port`.
    pub fn any_v6(port: u16) -> Self {
        Self::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port)
    }

    pub fn localhost(port: u16) -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    /// Parse `"a.b.c.d:port"` or `"[v6]:port"`.
    pub fn parse(s: &str) -> Result<Self, AddrParseError> {
        s.parse::<SocketAddr>().map(Self::from)
    }

    pub fn family(&self) -> AddressFamily {
        match self.ip {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Raw address bytes in network order (4 or 16 bytes).
    pub fn octets(&self) -> Vec<u8> {
        match self.ip {
            IpAddr::V4(ip) => ip.octets().to_vec(),
            IpAddr::V6(ip) => ip.octets().to_vec(),
        }
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Convert a native address. Returns `None` for non-IP families.
    pub fn from_sock_addr(addr: &SockAddr) -> Option<Self> {
        addr.as_socket().map(Self::from)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_socket_addr()
    }
}

impl From<Endpoint> for SockAddr {
    fn from(endpoint: Endpoint) -> Self {
        SockAddr::from(endpoint.to_socket_addr())
    }
}

impl From<&Endpoint> for SockAddr {
    fn from(endpoint: &Endpoint) -> Self {
        SockAddr::from(endpoint.to_socket_addr())
    }
}

impl FromStr for Endpoint {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_socket_addr())
    }
}
