//! ip allocation for nodes
//!
//! hands out the lowest free host address in each configured prefix.
//! addresses are computed arithmetically so large prefixes such as the
//! default /10 and /48 never get materialised.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use crate::Error;

/// allocates ip addresses for new nodes.
///
/// load the addresses already held by persisted nodes with
/// [`load_allocated`](Self::load_allocated) before allocating; both steps
/// must run inside the same write transaction as the insert that uses the
/// result.
pub struct IpAllocator {
    prefixes: Vec<IpNet>,
    allocated: HashSet<IpAddr>,
}

impl IpAllocator {
    /// create a new ip allocator over the given prefixes.
    pub fn new(prefixes: impl IntoIterator<Item = IpNet>) -> Self {
        Self {
            prefixes: prefixes.into_iter().collect(),
            allocated: HashSet::new(),
        }
    }

    /// mark addresses as taken.
    pub fn load_allocated(&mut self, addresses: impl IntoIterator<Item = IpAddr>) {
        self.allocated.extend(addresses);
    }

    /// allocate one address from every configured prefix, in configuration order.
    ///
    /// nothing is reserved unless every prefix yields an address.
    pub fn allocate(&mut self) -> Result<Vec<IpAddr>, Error> {
        let mut out = Vec::with_capacity(self.prefixes.len());
        for prefix in &self.prefixes {
            out.push(self.lowest_free(prefix)?);
        }
        self.allocated.extend(out.iter().copied());
        Ok(out)
    }

    fn lowest_free(&self, prefix: &IpNet) -> Result<IpAddr, Error> {
        let (base, first, last) = host_range(prefix);
        // at most `allocated.len()` candidates can be taken, so the lowest
        // free one is within that many steps of the first host
        let bound = last.min(first.saturating_add(self.allocated.len() as u128));
        let mut offset = first;
        loop {
            let candidate = to_addr(prefix, base.wrapping_add(offset));
            if !self.allocated.contains(&candidate) {
                return Ok(candidate);
            }
            if offset >= bound {
                return Err(Error::AddressPoolExhausted(*prefix));
            }
            offset += 1;
        }
    }
}

/// network base and the first/last usable host offsets of a prefix.
///
/// ipv4 skips the network and broadcast addresses except on /31 and /32.
/// ipv6 skips the subnet-router anycast address except on /128.
fn host_range(prefix: &IpNet) -> (u128, u128, u128) {
    match prefix {
        IpNet::V4(net) => {
            let base = u32::from(net.network()) as u128;
            let host_bits = 32 - u32::from(net.prefix_len());
            let size = 1u128 << host_bits;
            match net.prefix_len() {
                32 => (base, 0, 0),
                31 => (base, 0, 1),
                _ => (base, 1, size - 2),
            }
        }
        IpNet::V6(net) => {
            let base = u128::from(net.network());
            let host_bits = 128 - u32::from(net.prefix_len());
            let last = if host_bits == 128 {
                u128::MAX
            } else {
                (1u128 << host_bits) - 1
            };
            match net.prefix_len() {
                128 => (base, 0, 0),
                _ => (base, 1, last),
            }
        }
    }
}

fn to_addr(prefix: &IpNet, value: u128) -> IpAddr {
    match prefix {
        IpNet::V4(_) => IpAddr::V4(Ipv4Addr::from(value as u32)),
        IpNet::V6(_) => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_allocate_both_families() {
        let mut allocator =
            IpAllocator::new([prefix("100.64.0.0/10"), prefix("fd7a:115c:a1e0::/48")]);

        let ips = allocator.allocate().unwrap();
        assert_eq!(
            ips,
            vec![
                "100.64.0.1".parse::<IpAddr>().unwrap(),
                "fd7a:115c:a1e0::1".parse::<IpAddr>().unwrap(),
            ]
        );

        let ips = allocator.allocate().unwrap();
        assert_eq!(ips[0].to_string(), "100.64.0.2");
        assert_eq!(ips[1].to_string(), "fd7a:115c:a1e0::2");
    }

    #[test]
    fn test_lowest_free_fills_gaps() {
        let mut allocator = IpAllocator::new([prefix("10.0.0.0/24")]);
        allocator.load_allocated([
            "10.0.0.1".parse().unwrap(),
            "10.0.0.3".parse().unwrap(),
        ]);

        let ips = allocator.allocate().unwrap();
        assert_eq!(ips[0].to_string(), "10.0.0.2");
        let ips = allocator.allocate().unwrap();
        assert_eq!(ips[0].to_string(), "10.0.0.4");
    }

    #[test]
    fn test_exhaustion() {
        // /30 has only 2 usable hosts: .1 and .2
        let mut allocator = IpAllocator::new([prefix("100.64.0.0/30")]);
        let a = allocator.allocate().unwrap();
        let b = allocator.allocate().unwrap();
        assert_ne!(a, b);

        let err = allocator.allocate().unwrap_err();
        assert!(matches!(err, Error::AddressPoolExhausted(p) if p == prefix("100.64.0.0/30")));
    }

    #[test]
    fn test_exhaustion_in_one_prefix_reserves_nothing() {
        let mut allocator = IpAllocator::new([prefix("10.0.0.0/24"), prefix("10.1.0.0/32")]);
        allocator.load_allocated(["10.1.0.0".parse().unwrap()]);

        assert!(allocator.allocate().is_err());

        // 10.0.0.1 was not consumed by the failed attempt
        assert_eq!(allocator.allocated.len(), 1);
        assert!(!allocator.allocated.contains(&"10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_addresses_outside_prefix_are_ignored() {
        let mut allocator = IpAllocator::new([prefix("100.64.0.0/10")]);
        allocator.load_allocated(["192.168.1.1".parse().unwrap(), "10.0.0.1".parse().unwrap()]);
        // two foreign addresses widen the search bound but do not block .1
        let ips = allocator.allocate().unwrap();
        assert_eq!(ips[0].to_string(), "100.64.0.1");
    }

    #[test]
    fn test_small_prefixes() {
        let mut allocator = IpAllocator::new([prefix("10.9.9.8/31")]);
        assert_eq!(allocator.allocate().unwrap()[0].to_string(), "10.9.9.8");
        assert_eq!(allocator.allocate().unwrap()[0].to_string(), "10.9.9.9");
        assert!(allocator.allocate().is_err());

        let mut allocator = IpAllocator::new([prefix("fd00::5/128")]);
        assert_eq!(allocator.allocate().unwrap()[0].to_string(), "fd00::5");
        assert!(allocator.allocate().is_err());
    }
}
