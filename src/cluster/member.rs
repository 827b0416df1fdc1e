use std::fmt;
use std::net::IpAddr;
use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;

/// Identity of a registry process, rendered as `ip:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        MemberId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub ip: IpAddr,
    /// Replication port
    pub port: u16,
}

impl Member {
    pub fn new(
        ip: IpAddr,
        port: u16,
    ) -> Self {
        let addr = SocketAddr::new(ip, port);
        Member {
            id: MemberId(addr.to_string()),
            ip,
            port,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// `http://ip:port/<path>`
    pub fn url(
        &self,
        path: &str,
    ) -> String {
        format!("http://{}/{}", self.socket_addr(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for Member {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.id.as_str())
    }
}
