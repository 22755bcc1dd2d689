//! TLS client setup for network sinks
//!
//! Builds a rustls `ClientConfig` from the validated options: minimum
//! protocol version, trust roots from the CA bundle, optional client
//! certificate for mutual TLS, and the test-only skip-verify mode.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use dnsflow_config::TlsClientOptions;
use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::{Result, SinkError};

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| SinkError::Tls(format!("cannot read {}: {e}", path.display())))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| SinkError::Tls(format!("bad pem in {}: {e}", path.display())))
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| SinkError::Tls(format!("cannot read {}: {e}", path.display())))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| SinkError::Tls(format!("bad pem in {}: {e}", path.display())))?
        .ok_or_else(|| SinkError::Tls(format!("no private key in {}", path.display())))
}

/// Build a client config from validated TLS options
pub fn client_config(options: &TlsClientOptions) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let versions: &[&rustls::SupportedProtocolVersion] = match options.min_version.as_str() {
        "1.3" => &[&rustls::version::TLS13],
        _ => &[&rustls::version::TLS12, &rustls::version::TLS13],
    };

    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(versions)
        .map_err(|e| SinkError::Tls(e.to_string()))?;

    let builder = if options.insecure_skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification { provider }))
    } else {
        let mut roots = RootCertStore::empty();
        // validation guarantees a ca-file when verification is on
        if let Some(ca_file) = &options.ca_file {
            for cert in load_certs(ca_file)? {
                roots
                    .add(cert)
                    .map_err(|e| SinkError::Tls(format!("bad ca certificate: {e}")))?;
            }
        }
        builder.with_root_certificates(roots)
    };

    let config = match (&options.cert_file, &options.key_file) {
        (Some(cert_file), Some(key_file)) => builder
            .with_client_auth_cert(load_certs(cert_file)?, load_key(key_file)?)
            .map_err(|e| SinkError::Tls(format!("bad client certificate: {e}")))?,
        _ => builder.with_no_client_auth(),
    };

    Ok(config)
}

/// Parse the endpoint host into a TLS server name
pub fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|e| SinkError::Tls(format!("invalid server name `{host}`: {e}")))
}

/// Certificate verifier that accepts everything; skip-verify mode only
#[derive(Debug)]
struct NoVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
