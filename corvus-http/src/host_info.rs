//! URL parsing for the "raw" pipeline's arbitrary-host support.
//!
//! Discord's own base is handled by [`crate::client`] directly; this helper
//! exists so user code that routes non-Discord URLs through the raw
//! pipeline still gets scheme/port defaulting without pulling in a full
//! URL crate the rest of the stack doesn't otherwise need.

use crate::error::{Error, ErrorType};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostInfo {
    pub scheme: String,
    pub hostname: String,
    pub port: u16,
    pub is_ssl: bool,
}

/// Parse `[scheme://]host[:port][/path]`.
///
/// A missing scheme defaults to `http` on port 80, except for the literal
/// hostname `discord.com`, which defaults to `https` on port 443 to match
/// Discord's own API surface.
pub fn get_host_info(url: &str) -> Result<HostInfo, Error> {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, url),
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() {
        return Err(Error::new(ErrorType::BuildingRequest));
    }

    let (hostname, explicit_port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::new(ErrorType::BuildingRequest))?;
            (host, Some(port))
        }
        None => (authority, None),
    };

    let default_ssl = scheme.is_none() && hostname.eq_ignore_ascii_case("discord.com");

    let is_ssl = match scheme {
        Some("https") | Some("wss") => true,
        Some("http") | Some("ws") => false,
        Some(_) => return Err(Error::new(ErrorType::BuildingRequest)),
        None => default_ssl,
    };

    let scheme_name = if is_ssl { "https" } else { "http" };
    let port = explicit_port.unwrap_or(if is_ssl { 443 } else { 80 });

    Ok(HostInfo {
        scheme: scheme_name.to_owned(),
        hostname: hostname.to_owned(),
        port,
        is_ssl,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_https_url_with_path() {
        let info = get_host_info("https://discord.com/api/v10/gateway").unwrap();
        assert_eq!(info.scheme, "https");
        assert_eq!(info.hostname, "discord.com");
        assert_eq!(info.port, 443);
        assert!(info.is_ssl);
    }

    #[test]
    fn bare_host_with_port_defaults_to_http() {
        let info = get_host_info("example.com:8080").unwrap();
        assert_eq!(info.scheme, "http");
        assert_eq!(info.hostname, "example.com");
        assert_eq!(info.port, 8080);
        assert!(!info.is_ssl);
    }

    #[test]
    fn bare_discord_host_defaults_to_https() {
        let info = get_host_info("discord.com").unwrap();
        assert_eq!(info.port, 443);
        assert!(info.is_ssl);
    }
}
