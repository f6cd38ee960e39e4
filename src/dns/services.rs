//! Minimal `/etc/services` reader: maps a service name (e.g. `"domain"`,
//! `"https"`) to its configured port. Same shape as [`super::resolver_conf`]
//! — a tiny hand-rolled line parser, since there is no ecosystem crate in
//! this project's dependency family for it either.
use std::fs;
use std::path::Path;

use crate::error::{Error, ErrorKind, Result};

pub const DEFAULT_PATH: &str = "/etc/services";

/// Parse `name  port/proto` lines, returning the port for `name` (any
/// protocol). Comments (`#`) and blank lines are skipped.
pub fn parse_service(contents: &str, name: &str) -> Option<u16> {
    contents.lines().find_map(|line| {
        let line = line.split('#').next().unwrap_or("").trim();
        let mut fields = line.split_whitespace();
        let service_name = fields.next()?;
        if service_name != name {
            return None;
        }
        let port_proto = fields.next()?;
        let port = port_proto.split('/').next()?;
        port.parse().ok()
    })
}

/// Read and parse the system services database at `path`.
pub fn resolve_service_at(name: &str, path: impl AsRef<Path>) -> Result<u16> {
    let contents = fs::read_to_string(path)?;
    parse_service(&contents, name)
        .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("no such service: {}", name)))
}

/// Read and parse `/etc/services`.
pub fn resolve_service(name: &str) -> Result<u16> {
    resolve_service_at(name, DEFAULT_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_known_service_lines() {
        let conf = "# standard services\ndomain\t\t53/udp\nhttps\t\t443/tcp\t\t\t# HTTP over TLS\n";
        assert_eq!(parse_service(conf, "domain"), Some(53));
        assert_eq!(parse_service(conf, "https"), Some(443));
        assert_eq!(parse_service(conf, "nonexistent"), None);
    }
}
