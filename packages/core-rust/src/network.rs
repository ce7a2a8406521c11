//! Classification of caller addresses as internal (private/reserved) or external.
//!
//! Unparsable addresses are never private, so spoofed or malformed
//! forwarding headers land in the audited path.

use std::net::IpAddr;
use std::sync::OnceLock;

use ipnetwork::IpNetwork;

/// Private, loopback, link-local, documentation, multicast and broadcast ranges.
pub const RESERVED_NETWORKS: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "172.0.0.0/8",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.88.99.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "240.0.0.0/4",
    "255.255.255.255/32",
    "224.0.0.0/4",
];

/// A network range in the classifier table failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid network range {range:?}: {reason}")]
pub struct ClassifierError {
    pub range: String,
    pub reason: String,
}

/// Immutable table of CIDR ranges with an OR-combined membership test.
#[derive(Debug, Clone)]
pub struct NetworkClassifier {
    networks: Vec<IpNetwork>,
}

impl NetworkClassifier {
    /// Parses every range up front.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError`] for the first range that is not valid CIDR.
    pub fn new<'a, I>(ranges: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let networks = ranges
            .into_iter()
            .map(|range| {
                range.parse::<IpNetwork>().map_err(|e| ClassifierError {
                    range: range.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { networks })
    }

    /// The shared classifier over [`RESERVED_NETWORKS`], parsed once.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError`] if the static table is malformed.
    pub fn reserved() -> Result<&'static Self, ClassifierError> {
        static RESERVED: OnceLock<Result<NetworkClassifier, ClassifierError>> = OnceLock::new();
        RESERVED
            .get_or_init(|| Self::new(RESERVED_NETWORKS.iter().copied()))
            .as_ref()
            .map_err(Clone::clone)
    }

    #[must_use]
    pub fn networks(&self) -> &[IpNetwork] {
        &self.networks
    }

    /// Whether `ip` falls inside any range. Unparsable literals are not contained.
    #[must_use]
    pub fn contains(&self, ip: &str) -> bool {
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return false;
        };
        // IPv4-mapped IPv6 addresses match the IPv4 ranges.
        let addr = match addr {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
            IpAddr::V4(_) => addr,
        };
        self.networks.iter().any(|network| network.contains(addr))
    }
}

/// Whether `ip` is inside a private or reserved range.
///
/// # Errors
///
/// Returns [`ClassifierError`] only if the reserved range table is malformed.
pub fn is_private(ip: &str) -> Result<bool, ClassifierError> {
    Ok(NetworkClassifier::reserved()?.contains(ip))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn reserved_table_parses() {
        let classifier = NetworkClassifier::reserved().unwrap();
        assert_eq!(classifier.networks().len(), RESERVED_NETWORKS.len());
    }

    #[test]
    fn finds_private_addresses() {
        for ip in [
            "10.1.2.3",
            "127.0.0.1",
            "169.254.10.1",
            "172.16.5.4",
            "192.168.1.1",
            "100.64.0.1",
            "198.51.100.7",
            "203.0.113.9",
            "224.0.0.251",
            "255.255.255.255",
            "::ffff:10.0.0.1",
        ] {
            assert_eq!(is_private(ip), Ok(true), "{ip}");
        }
    }

    #[test]
    fn public_addresses_are_not_private() {
        for ip in ["1.1.1.1", "8.8.8.8", "151.101.1.69", "2606:4700:4700::1111"] {
            assert_eq!(is_private(ip), Ok(false), "{ip}");
        }
    }

    #[test]
    fn unparsable_literal_is_not_private() {
        for ip in ["", "foo", "1.1.1", "10.0.0.1, 1.1.1.1", " 10.0.0.1"] {
            assert_eq!(is_private(ip), Ok(false), "{ip:?}");
        }
    }

    #[test]
    fn malformed_range_is_reported() {
        let err = NetworkClassifier::new(["10.0.0.0/8", "10.0.0.0/99"]).unwrap_err();
        assert_eq!(err.range, "10.0.0.0/99");
    }

    #[test]
    fn overlapping_ranges_are_harmless() {
        let classifier = NetworkClassifier::new(["10.0.0.0/8", "10.1.0.0/16"]).unwrap();
        assert!(classifier.contains("10.1.2.3"));
        assert!(classifier.contains("10.2.2.3"));
        assert!(!classifier.contains("11.0.0.1"));
    }

    proptest! {
        #[test]
        fn ten_slash_eight_is_private(b in 0u8..=255, c in 0u8..=255, d in 0u8..=255) {
            let ip = Ipv4Addr::new(10, b, c, d).to_string();
            prop_assert_eq!(is_private(&ip), Ok(true));
        }

        #[test]
        fn one_slash_eight_is_public(b in 0u8..=255, c in 0u8..=255, d in 0u8..=255) {
            let ip = Ipv4Addr::new(1, b, c, d).to_string();
            prop_assert_eq!(is_private(&ip), Ok(false));
        }
    }
}
