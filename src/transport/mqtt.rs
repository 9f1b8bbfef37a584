//! MQTT broker endpoint and transport setup.

use anyhow::{anyhow, Context, Result};
use rumqttc::Transport;
use std::path::{Path, PathBuf};

/// Where the bridge connects, and whether the link is encrypted.
#[derive(Clone, Debug)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

/// Certificates the overlay bridge presents to, or trusts from, the broker.
#[derive(Clone, Debug, Default)]
pub struct TlsMaterials {
    /// Broker CA. Without it the platform roots decide.
    pub ca: Option<Vec<u8>>,
    /// `(certificate, key)` when the broker wants to see a client identity.
    pub client_auth: Option<(Vec<u8>, Vec<u8>)>,
}

impl TlsMaterials {
    /// Read the PEM files named on the command line.
    ///
    /// A client identity needs both halves; one without the other is refused
    /// before anything is read.
    pub fn load(
        ca_path: Option<&PathBuf>,
        client_cert_path: Option<&PathBuf>,
        client_key_path: Option<&PathBuf>,
    ) -> Result<Self> {
        let identity = match (client_cert_path, client_key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(anyhow!("MQTT TLS client certificate provided without key"))
            }
            (None, Some(_)) => {
                return Err(anyhow!("MQTT TLS client key provided without certificate"))
            }
        };

        let ca = ca_path.map(|path| read_pem(path, "CA")).transpose()?;
        let client_auth = identity
            .map(|(cert, key)| -> Result<_> {
                Ok((read_pem(cert, "client cert")?, read_pem(key, "client key")?))
            })
            .transpose()?;
        Ok(Self { ca, client_auth })
    }

    pub fn is_configured(&self) -> bool {
        self.ca.is_some() || self.client_auth.is_some()
    }

    /// Transport for the bridge connection: plain TCP, or rustls with either
    /// the platform roots or the configured CA and identity.
    pub fn build_transport(&self, endpoint: &MqttEndpoint) -> Result<Transport> {
        if !endpoint.use_tls {
            if self.is_configured() {
                return Err(anyhow!(
                    "MQTT TLS materials provided but TLS is disabled.\n\
                     Use --mqtt-use-tls or the mqtts:// scheme to enable TLS."
                ));
            }
            return Ok(Transport::tcp());
        }

        if !self.is_configured() {
            return Ok(Transport::tls_with_default_config());
        }

        let ca = self.ca.clone().ok_or_else(|| {
            anyhow!(
                "MQTT TLS CA certificate is required when providing client certificates.\n\
                 Specify --mqtt-tls-ca-path or remove the client certificate."
            )
        })?;
        Ok(Transport::tls(ca, self.client_auth.clone(), None))
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path)
        .with_context(|| format!("failed to read MQTT TLS {} '{}'", what, path.display()))
}

/// Parse a broker address.
///
/// Accepts `host:port`, `mqtt://`, `tcp://`, `mqtts://`, `ssl://` and
/// bracketed IPv6 hosts. `tls_override` forces TLS for scheme-less addresses.
pub fn parse_mqtt_endpoint(addr: &str, tls_override: bool) -> Result<MqttEndpoint> {
    let mut use_tls = tls_override;
    let mut remainder = addr.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            "mqtts" | "ssl" => use_tls = true,
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }

    let (host, port) = split_host_port(remainder)?;
    if host.is_empty() {
        return Err(anyhow!("missing MQTT host in {}", addr));
    }
    Ok(MqttEndpoint {
        host,
        port,
        use_tls,
    })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid MQTT port in {}", addr))?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid MQTT port in {}", addr))?;
    Ok((host.to_string(), port))
}

/// Reject non-loopback brokers unless remote access was requested.
pub fn validate_loopback_addr(endpoint: &MqttEndpoint, original: &str) -> Result<()> {
    let host = endpoint.host.as_str();
    if host == "localhost" {
        return Ok(());
    }
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        if ip.is_loopback() {
            return Ok(());
        }
    }
    Err(anyhow!(
        "MQTT broker must be loopback: {} (use --allow-remote-mqtt to override)",
        original
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_materials_require_cert_and_key_together() {
        let cert_only =
            TlsMaterials::load(None, Some(&PathBuf::from("/nonexistent/cert.pem")), None);
        assert!(cert_only.unwrap_err().to_string().contains("without key"));
        let key_only =
            TlsMaterials::load(None, None, Some(&PathBuf::from("/nonexistent/key.pem")));
        assert!(key_only
            .unwrap_err()
            .to_string()
            .contains("without certificate"));
    }

    #[test]
    fn plain_transport_rejects_tls_material() {
        let materials = TlsMaterials {
            ca: Some(b"ca".to_vec()),
            client_auth: None,
        };
        let endpoint = parse_mqtt_endpoint("127.0.0.1:1883", false).unwrap();
        let err = materials.build_transport(&endpoint).err().unwrap();
        assert!(err.to_string().contains("TLS is disabled"));
    }

    #[test]
    fn client_auth_without_ca_is_rejected() {
        let materials = TlsMaterials {
            ca: None,
            client_auth: Some((b"cert".to_vec(), b"key".to_vec())),
        };
        let endpoint = parse_mqtt_endpoint("mqtts://127.0.0.1:8883", false).unwrap();
        assert!(materials.build_transport(&endpoint).is_err());
    }

    #[test]
    fn unsupported_scheme() {
        assert!(parse_mqtt_endpoint("ws://127.0.0.1:9001", false).is_err());
    }

    #[test]
    fn missing_or_malformed_port() {
        assert!(parse_mqtt_endpoint("localhost", false).is_err());
        assert!(parse_mqtt_endpoint("[::1]", false).is_err());
        assert!(parse_mqtt_endpoint(":1883", false).is_err());
        assert!(parse_mqtt_endpoint("127.0.0.1:http", false).is_err());
        assert!(parse_mqtt_endpoint("127.0.0.1:70000", false).is_err());
    }
}
