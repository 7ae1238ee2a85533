//! LAN address discovery for shareable stream URLs
//!
//! A viewer on another device needs an address it can route to, so private
//! IPv4 addresses (10/8, 172.16/12, 192.168/16) win over loopback. Failing
//! discovery only costs shareability, never the stream.

use local_ip_address::list_afinet_netifas;
use std::net::{IpAddr, Ipv4Addr};

use crate::config::ShareConfig;
use crate::constants::STREAM_PAGE_PATH;

/// Environment override for the advertised address
pub const LOCAL_IP_ENV: &str = "LSR_LOCAL_IP";

pub fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    a == 10 || (a == 172 && (16..=31).contains(&b)) || (a == 192 && b == 168)
}

/// Pick the best private address, preferring 192.168.x.x
pub fn pick_lan_address<I>(candidates: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    let private: Vec<Ipv4Addr> = candidates
        .into_iter()
        .filter_map(|ip| match ip {
            IpAddr::V4(v4) if !v4.is_loopback() && is_private_ipv4(v4) => Some(v4),
            _ => None,
        })
        .collect();

    private
        .iter()
        .find(|ip| ip.octets()[..2] == [192, 168])
        .or_else(|| private.first())
        .copied()
}

/// First routable IPv4 address, private or not
fn first_external(candidates: &[IpAddr]) -> Option<Ipv4Addr> {
    candidates.iter().find_map(|ip| match ip {
        IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() && !v4.is_link_local() => {
            Some(*v4)
        }
        _ => None,
    })
}

/// Resolve the host viewers should use.
///
/// Order: a private override, a private interface address, any external
/// IPv4 address, then loopback.
pub fn resolve_share_host(override_ip: Option<Ipv4Addr>) -> Ipv4Addr {
    if let Some(ip) = override_ip {
        if is_private_ipv4(ip) {
            tracing::debug!("Using configured LAN address {}", ip);
            return ip;
        }
        tracing::warn!("Ignoring configured address {}: not a private IPv4 address", ip);
    }

    let candidates: Vec<IpAddr> = match list_afinet_netifas() {
        Ok(interfaces) => interfaces.into_iter().map(|(_, ip)| ip).collect(),
        Err(e) => {
            tracing::warn!("Network interface scan failed: {}", e);
            Vec::new()
        }
    };

    if let Some(ip) = pick_lan_address(candidates.iter().copied()) {
        return ip;
    }
    if let Some(ip) = first_external(&candidates) {
        tracing::warn!("No private address found, advertising {}", ip);
        return ip;
    }

    tracing::warn!("No LAN address found, falling back to loopback; other devices cannot open the stream");
    Ipv4Addr::LOCALHOST
}

/// `<scheme>://<host>:<port>/stream?token=<token>`
pub fn share_url(scheme: &str, host: impl std::fmt::Display, port: u16, token: &str) -> String {
    let token: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    format!("{}://{}:{}{}?token={}", scheme, host, port, STREAM_PAGE_PATH, token)
}

/// Shareable URL for a session from configuration, the relay port and the environment
pub fn session_share_url(config: &ShareConfig, relay_port: u16, token: &str) -> String {
    let override_ip = config.local_ip.or_else(|| {
        std::env::var(LOCAL_IP_ENV)
            .ok()
            .and_then(|value| value.trim().parse().ok())
    });
    let host = resolve_share_host(override_ip);
    share_url(&config.scheme, host, config.port.unwrap_or(relay_port), token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_private_ranges() {
        assert!(is_private_ipv4(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(is_private_ipv4(Ipv4Addr::new(172, 16, 0, 1)));
        assert!(is_private_ipv4(Ipv4Addr::new(172, 31, 255, 255)));
        assert!(!is_private_ipv4(Ipv4Addr::new(172, 32, 0, 1)));
        assert!(!is_private_ipv4(Ipv4Addr::new(172, 15, 0, 1)));
        assert!(is_private_ipv4(Ipv4Addr::new(192, 168, 1, 98)));
        assert!(!is_private_ipv4(Ipv4Addr::new(192, 169, 0, 1)));
        assert!(!is_private_ipv4(Ipv4Addr::LOCALHOST));
        assert!(!is_private_ipv4(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn test_prefers_192_168() {
        let picked = pick_lan_address(vec![
            v4(127, 0, 0, 1),
            v4(10, 0, 0, 5),
            v4(192, 168, 1, 20),
        ]);
        assert_eq!(picked, Some(Ipv4Addr::new(192, 168, 1, 20)));

        let picked = pick_lan_address(vec![v4(127, 0, 0, 1), v4(172, 20, 0, 2), v4(10, 1, 1, 1)]);
        assert_eq!(picked, Some(Ipv4Addr::new(172, 20, 0, 2)));
    }

    #[test]
    fn test_no_private_candidates() {
        let candidates = vec![v4(127, 0, 0, 1), v4(203, 0, 113, 4), "::1".parse().unwrap()];
        assert_eq!(pick_lan_address(candidates.clone()), None);
        assert_eq!(first_external(&candidates), Some(Ipv4Addr::new(203, 0, 113, 4)));
    }

    #[test]
    fn test_private_override_wins() {
        let ip = Ipv4Addr::new(10, 9, 8, 7);
        assert_eq!(resolve_share_host(Some(ip)), ip);
    }

    #[test]
    fn test_share_url() {
        assert_eq!(
            share_url("http", Ipv4Addr::new(192, 168, 1, 98), 3001, "abc123"),
            "http://192.168.1.98:3001/stream?token=abc123"
        );
        assert_eq!(
            share_url("https", "studio.local", 443, "a b"),
            "https://studio.local:443/stream?token=a+b"
        );
    }

    proptest! {
        #[test]
        fn prop_picked_address_is_private(octets in proptest::collection::vec(any::<[u8; 4]>(), 0..8)) {
            let candidates: Vec<IpAddr> = octets.iter().map(|o| v4(o[0], o[1], o[2], o[3])).collect();
            if let Some(ip) = pick_lan_address(candidates.clone()) {
                prop_assert!(is_private_ipv4(ip));
                prop_assert!(candidates.contains(&IpAddr::V4(ip)));
            } else {
                let none_private = candidates.iter().all(|ip| match ip {
                    IpAddr::V4(addr) => !is_private_ipv4(*addr),
                    IpAddr::V6(_) => true,
                });
                prop_assert!(none_private);
            }
        }
    }
}
