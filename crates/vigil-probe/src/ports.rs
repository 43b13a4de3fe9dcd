//! Listening socket discovery

use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::TcpListener;
use tracing::debug;
use vigil_core::{Error, Result};

const PROC_NET_TABLES: &[&str] = &["/proc/net/tcp", "/proc/net/tcp6"];

/// Socket state code for LISTEN in the proc tables
const TCP_LISTEN: &str = "0A";

/// Check whether any socket on the host is listening on `port`
pub fn is_listening(port: u16) -> bool {
    match listening_ports() {
        Ok(ports) => ports.contains(&port),
        Err(e) => {
            debug!("Falling back to bind test for port {}: {}", port, e);
            is_port_in_use(port)
        }
    }
}

/// Collect every TCP port in LISTEN state from the kernel socket tables
pub fn listening_ports() -> Result<HashSet<u16>> {
    let mut ports = HashSet::new();
    let mut readable = false;

    for table in PROC_NET_TABLES {
        match std::fs::read_to_string(table) {
            Ok(content) => {
                readable = true;
                ports.extend(parse_proc_net_tcp(&content));
            }
            Err(e) => debug!("Cannot read {}: {}", table, e),
        }
    }

    if readable {
        Ok(ports)
    } else {
        Err(Error::probe("no readable socket table"))
    }
}

/// Parse a `/proc/net/tcp{,6}` table, returning ports in LISTEN state
pub fn parse_proc_net_tcp(content: &str) -> HashSet<u16> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 || fields[3] != TCP_LISTEN {
                return None;
            }
            let (_, port_hex) = fields[1].rsplit_once(':')?;
            u16::from_str_radix(port_hex, 16).ok()
        })
        .collect()
}

/// Bind test: a port we cannot bind on all interfaces is held by someone.
/// Only `AddrInUse` counts, so a host without IPv6 does not read as busy.
pub fn is_port_in_use(port: u16) -> bool {
    ["0.0.0.0", "::"].iter().any(|host| {
        matches!(
            TcpListener::bind((*host, port)),
            Err(e) if e.kind() == ErrorKind::AddrInUse
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP_TABLE: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:1F40 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 41234 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1388 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 41235 1 0000000000000000 100 0 0 10 0
   2: 0100007F:C350 0100007F:1388 01 00000000:00000000 00:00000000 00000000  1000        0 41236 1 0000000000000000 20 4 30 10 -1
";

    const TCP6_TABLE: &str = "  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000000000000:0BB8 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 51234 1 0000000000000000 100 0 0 10 0
";

    #[test]
    fn test_parse_listen_entries() {
        let ports = parse_proc_net_tcp(TCP_TABLE);
        assert!(ports.contains(&8000));
        assert!(ports.contains(&5000));
        // Established connection's local port is not a listener
        assert!(!ports.contains(&50000));
        assert_eq!(ports.len(), 2);
    }

    #[test]
    fn test_parse_tcp6() {
        let ports = parse_proc_net_tcp(TCP6_TABLE);
        assert_eq!(ports.into_iter().collect::<Vec<_>>(), vec![3000]);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_proc_net_tcp("header\nnot a table line\n").is_empty());
        assert!(parse_proc_net_tcp("").is_empty());
    }

    #[test]
    fn test_bound_listener_is_detected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(is_listening(port));
    }
}
