use anyhow::Result;
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::ScanError;

/// One scanner input token: a bare IPv4 address or an IPv4 CIDR block.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ScanTarget {
    Single(Ipv4Addr),
    Block(Ipv4Net),
}

impl FromStr for ScanTarget {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScanError::InvalidAddress {
            token: s.to_string(),
        };
        if s.contains('/') {
            s.parse::<Ipv4Net>()
                .map(ScanTarget::Block)
                .map_err(|_| invalid())
        } else {
            s.parse::<Ipv4Addr>()
                .map(ScanTarget::Single)
                .map_err(|_| invalid())
        }
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanTarget::Single(ip) => write!(f, "{ip}"),
            ScanTarget::Block(net) => write!(f, "{net}"),
        }
    }
}

impl From<Ipv4Addr> for ScanTarget {
    fn from(ip: Ipv4Addr) -> Self {
        ScanTarget::Single(ip)
    }
}

impl From<Ipv4Net> for ScanTarget {
    fn from(net: Ipv4Net) -> Self {
        ScanTarget::Block(net)
    }
}

impl ScanTarget {
    /// Number of addresses [`expand`] yields for this target.
    pub fn len(&self) -> u64 {
        match self {
            ScanTarget::Single(_) => 1,
            ScanTarget::Block(net) => 1u64 << (32 - u32::from(net.prefix_len())),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Parse a single input token. Shorthand for `token.parse::<ScanTarget>()`.
/// Surrounding whitespace is not stripped; split the input first.
pub fn parse_target(token: &str) -> Result<ScanTarget, ScanError> {
    token.parse()
}

/// Parse every token, keeping the valid targets and the errors separately.
pub fn parse_targets<'a, I>(tokens: I) -> (Vec<ScanTarget>, Vec<ScanError>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut targets = Vec::new();
    let mut errors = Vec::new();
    for token in tokens {
        match token.parse::<ScanTarget>() {
            Ok(t) => targets.push(t),
            Err(e) => errors.push(e),
        }
    }
    (targets, errors)
}

/// Lazy walk over the addresses of one [`ScanTarget`].
///
/// Clone it before iterating to walk the same range again.
#[derive(Clone, Debug)]
pub struct AddressSet {
    next: Option<u32>,
    last: u32,
}

impl Iterator for AddressSet {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        let cur = self.next?;
        // checked_add keeps a /0 walk from wrapping back to 0.0.0.0
        self.next = if cur == self.last {
            None
        } else {
            cur.checked_add(1)
        };
        Some(Ipv4Addr::from(cur))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(n) => {
                let left = (self.last - n) as u64 + 1;
                let left = usize::try_from(left).unwrap_or(usize::MAX);
                (left, Some(left))
            }
            None => (0, Some(0)),
        }
    }
}

/// Expand a target into every address it denotes.
///
/// CIDR blocks start at `network & mask` and include the network and broadcast
/// addresses; a bare address yields itself.
pub fn expand(target: &ScanTarget) -> AddressSet {
    match target {
        ScanTarget::Single(ip) => {
            let n = u32::from(*ip);
            AddressSet {
                next: Some(n),
                last: n,
            }
        }
        ScanTarget::Block(net) => AddressSet {
            next: Some(u32::from(net.network())),
            last: u32::from(net.broadcast()),
        },
    }
}

/// Detect the IPv4 networks of local non-loopback interfaces.
///
/// Each interface contributes its real network (`192.168.1.42/255.255.255.0`
/// becomes `192.168.1.0/24`). An unusable netmask falls back to /24.
/// Duplicates are removed and the result is sorted.
pub fn detect_local_cidrs() -> Result<Vec<Ipv4Net>> {
    let mut set = HashSet::<Ipv4Net>::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = iface.addr {
            let ip = v4.ip;
            if ip.is_loopback() {
                continue;
            }
            let cidr = Ipv4Net::with_netmask(ip, v4.netmask)
                .map(|n| n.trunc())
                .unwrap_or_else(|_| ipv4_to_default_cidr(ip));
            tracing::debug!(iface = %iface.name, %cidr, "local network");
            set.insert(cidr);
        }
    }
    let mut cidrs: Vec<Ipv4Net> = set.into_iter().collect();
    cidrs.sort_by_key(|n| (u32::from(n.network()), n.prefix_len()));
    Ok(cidrs)
}

/// Convert an IPv4 address into its enclosing /24 network.
pub fn ipv4_to_default_cidr(ip: Ipv4Addr) -> Ipv4Net {
    let o = ip.octets();
    let net = Ipv4Addr::new(o[0], o[1], o[2], 0);
    Ipv4Net::new(net, 24).expect("/24 is always valid")
}
