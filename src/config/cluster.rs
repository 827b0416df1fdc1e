use std::collections::HashSet;
use std::net::IpAddr;
use std::net::Ipv4Addr;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Address of one registry process as seen by its peers
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub ip: IpAddr,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Address the replication endpoints listen on
    #[serde(default = "default_self_ip")]
    pub self_ip: IpAddr,

    #[serde(default = "default_self_port")]
    pub self_port: u16,

    /// Peers known up front; the static membership announces them as joined
    #[serde(default)]
    pub members: Vec<PeerAddress>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            self_ip: default_self_ip(),
            self_port: default_self_port(),
            members: vec![],
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.self_port == 0 {
            return Err(Error::InvalidConfig(
                "self_port must specify a non-zero port".into(),
            ));
        }

        let mut seen = HashSet::new();
        for member in &self.members {
            if member.port == 0 {
                return Err(Error::InvalidConfig(format!(
                    "member {} must specify a non-zero port",
                    member.ip
                )));
            }
            if !seen.insert((member.ip, member.port)) {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate member {}:{} in cluster members",
                    member.ip, member.port
                )));
            }
        }
        Ok(())
    }
}

fn default_self_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
fn default_self_port() -> u16 {
    6100
}
