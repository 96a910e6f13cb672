use crate::error::{NetdiagError, Result};
use ipnetwork::IpNetwork;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Environment variable carrying the cluster's data network range
pub const DATA_CIDR_ENV: &str = "NETDIAG_DATA_CIDR";

/// A validated data network range such as `192.168.1.0/24` or `fd00::/64`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataCidr(IpNetwork);

impl DataCidr {
    /// Address part as written (not masked to the network address)
    pub fn address(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn prefix_len(&self) -> u8 {
        self.0.prefix()
    }

    pub fn network(&self) -> IpNetwork {
        self.0
    }

    /// Whether `ip` falls inside this range
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(*ip)
    }
}

impl fmt::Display for DataCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DataCidr {
    type Err = NetdiagError;

    fn from_str(s: &str) -> Result<Self> {
        parse_cidr(s)
    }
}

fn invalid(detail: String) -> NetdiagError {
    NetdiagError::configuration(
        format!("{} is not the correct cidr format: {}", DATA_CIDR_ENV, detail),
        format!("example: {}=192.168.1.0/24", DATA_CIDR_ENV),
    )
}

/// Parse a CIDR string like "10.88.0.0/16" into a DataCidr.
///
/// The prefix length is mandatory and must be plain decimal digits.
pub fn parse_cidr(cidr_str: &str) -> Result<DataCidr> {
    let trimmed = cidr_str.trim();
    let (_, prefix_part) = trimmed
        .split_once('/')
        .ok_or_else(|| invalid(format!("'{}' has no prefix length", cidr_str)))?;

    if prefix_part.is_empty() || !prefix_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!("invalid prefix length '{}'", prefix_part)));
    }

    let network = IpNetwork::from_str(trimmed)
        .map_err(|e| invalid(format!("'{}': {}", trimmed, e)))?;
    Ok(DataCidr(network))
}
