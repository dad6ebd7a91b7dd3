//! TLS transport construction for mTLS connections to the export broker.

use std::sync::Arc;

use exp_config::{MqttConf, TlsMaterial};
use rumqttc::{TlsConfiguration, Transport};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

use crate::error::{MqttError, MqttResult};

/// Certificate verifier that accepts any server certificate.
///
/// Wired in only when `mqtt.skip_tls_ver` is set; callers should only set
/// that flag against local development brokers, never in production.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

/// Build the `rumqttc` transport for `conf`. Plaintext unless `mtls` is set.
///
/// `skip_tls_ver` bypasses server-certificate verification via a custom
/// rustls verifier (`TlsConfiguration::Rustls`); otherwise the CA/client
/// material is handed to `TlsConfiguration::Simple` as usual.
pub fn build_transport(conf: &MqttConf) -> MqttResult<Transport> {
    if !conf.mtls {
        return Ok(Transport::Tcp);
    }

    let material = conf.tls_material.clone().unwrap_or(TlsMaterial {
        ca: None,
        client_cert: None,
        client_key: None,
    });

    if conf.skip_tls_ver {
        return Ok(Transport::tls_with_config(TlsConfiguration::Rustls(
            Arc::new(insecure_client_config(material)?),
        )));
    }

    let client_auth = match (material.client_cert, material.client_key) {
        (Some(cert), Some(key)) => Some((cert, key)),
        _ => None,
    };

    Ok(Transport::Tls(TlsConfiguration::Simple {
        ca: material.ca.unwrap_or_default(),
        alpn: None,
        client_auth,
    }))
}

fn insecure_client_config(material: TlsMaterial) -> MqttResult<ClientConfig> {
    let builder = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerifier));

    let config = match (material.client_cert, material.client_key) {
        (Some(cert), Some(key)) => {
            let chain = parse_cert_chain(&cert)?;
            let key = parse_private_key(&key)?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| MqttError::Tls(format!("invalid client certificate/key: {e}")))?
        }
        _ => builder.with_no_client_auth(),
    };
    Ok(config)
}

fn parse_cert_chain(pem: &[u8]) -> MqttResult<Vec<CertificateDer<'static>>> {
    rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MqttError::Tls(format!("failed to parse client certificate: {e}")))
}

fn parse_private_key(pem: &[u8]) -> MqttResult<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut &pem[..])
        .map_err(|e| MqttError::Tls(format!("failed to parse client private key: {e}")))?
        .ok_or_else(|| MqttError::Tls("no private key found in client key PEM".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_when_mtls_disabled() {
        let conf = MqttConf {
            host: "tcp://localhost:1883".into(),
            ..Default::default()
        };
        assert!(matches!(build_transport(&conf).unwrap(), Transport::Tcp));
    }

    #[test]
    fn tls_transport_carries_ca_and_client_auth() {
        let mut conf = MqttConf {
            host: "ssl://localhost:8883".into(),
            mtls: true,
            ..Default::default()
        };
        conf.tls_material = Some(TlsMaterial {
            ca: Some(b"ca-pem".to_vec()),
            client_cert: Some(b"cert-pem".to_vec()),
            client_key: Some(b"key-pem".to_vec()),
        });

        match build_transport(&conf).unwrap() {
            Transport::Tls(TlsConfiguration::Simple {
                ca, client_auth, ..
            }) => {
                assert_eq!(ca, b"ca-pem");
                assert_eq!(client_auth, Some((b"cert-pem".to_vec(), b"key-pem".to_vec())));
            }
            other => panic!("expected TLS transport, got {other:?}"),
        }
    }

    #[test]
    fn skip_tls_ver_builds_a_custom_rustls_transport() {
        let conf = MqttConf {
            host: "ssl://localhost:8883".into(),
            mtls: true,
            skip_tls_ver: true,
            ..Default::default()
        };

        // No client material configured: the custom-verifier config must
        // still build successfully, with no client auth.
        assert!(matches!(
            build_transport(&conf).unwrap(),
            Transport::Tls(TlsConfiguration::Rustls(_))
        ));
    }

    #[test]
    fn skip_tls_ver_false_never_builds_a_rustls_transport() {
        let mut conf = MqttConf {
            host: "ssl://localhost:8883".into(),
            mtls: true,
            skip_tls_ver: false,
            ..Default::default()
        };
        conf.tls_material = Some(TlsMaterial {
            ca: Some(b"ca-pem".to_vec()),
            client_cert: None,
            client_key: None,
        });

        assert!(matches!(
            build_transport(&conf).unwrap(),
            Transport::Tls(TlsConfiguration::Simple { .. })
        ));
    }

    #[test]
    fn skip_tls_ver_with_malformed_client_cert_is_an_error() {
        let mut conf = MqttConf {
            host: "ssl://localhost:8883".into(),
            mtls: true,
            skip_tls_ver: true,
            ..Default::default()
        };
        conf.tls_material = Some(TlsMaterial {
            ca: None,
            client_cert: Some(b"not a pem certificate".to_vec()),
            client_key: Some(b"not a pem key".to_vec()),
        });

        let err = build_transport(&conf).unwrap_err();
        assert!(matches!(err, MqttError::Tls(_)));
    }
}
