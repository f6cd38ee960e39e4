//! Minimal `/etc/resolv.conf` reader: just enough to discover configured
//! nameservers when the caller doesn't supply one explicitly. There is no
//! ecosystem crate in this project's dependency family for this, and the
//! format this crate cares about is a single `nameserver <addr>` line per
//! server, so it's hand-rolled rather than pulled in.
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::ip_address::IpAddress;

pub const DEFAULT_PATH: &str = "/etc/resolv.conf";

/// Parse `nameserver` lines out of a resolv.conf-formatted string.
pub fn parse_nameservers(contents: &str) -> Vec<IpAddress> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("nameserver") {
                let addr = rest.trim();
                IpAddress::parse(addr, None).ok()
            } else {
                None
            }
        })
        .collect()
}

/// Read and parse the system resolver configuration at `path`.
pub fn name_servers_at(path: impl AsRef<Path>) -> Result<Vec<IpAddress>> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_nameservers(&contents))
}

/// Read and parse `/etc/resolv.conf`.
pub fn name_servers() -> Result<Vec<IpAddress>> {
    name_servers_at(DEFAULT_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nameserver_lines_and_skips_comments() {
        let conf = "# generated by NetworkManager\nnameserver 1.1.1.1\nnameserver 2001:4860:4860::8888\nsearch example.com\n";
        let servers = parse_nameservers(conf);
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].to_text(), "1.1.1.1");
    }
}
