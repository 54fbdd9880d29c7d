//! TLS acceptor construction and peer-certificate inspection.

use std::path::Path;

use native_tls::Identity;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::x509::X509;
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

use crate::auth::VerifyCommonName;
use crate::errors::Error;

/// Build a TLS identity from PEM certificate and key files.
pub fn load_identity(cert_path: &Path, key_path: &Path) -> Result<Identity, Error> {
    let cert_bytes = std::fs::read(cert_path).map_err(|err| {
        Error::TlsError(format!("could not read certificate {cert_path:?}: {err}"))
    })?;
    let key_bytes = std::fs::read(key_path).map_err(|err| {
        Error::TlsError(format!("could not read private key {key_path:?}: {err}"))
    })?;

    let cert = X509::from_pem(&cert_bytes)
        .map_err(|err| Error::TlsError(format!("bad certificate: {err}")))?;
    let key = PKey::private_key_from_pem(&key_bytes)
        .map_err(|err| Error::TlsError(format!("bad private key: {err}")))?;

    let pkcs12 = Pkcs12::builder()
        .name("pg_usher")
        .pkey(&key)
        .cert(&cert)
        .build2("")
        .map_err(|err| Error::TlsError(format!("could not build identity: {err}")))?;
    let der = pkcs12
        .to_der()
        .map_err(|err| Error::TlsError(format!("could not encode identity: {err}")))?;

    Identity::from_pkcs12(&der, "")
        .map_err(|err| Error::TlsError(format!("could not load identity: {err}")))
}

/// Build the acceptor used for client connections.
pub fn build_acceptor(identity: Identity) -> Result<tokio_native_tls::TlsAcceptor, Error> {
    let acceptor = native_tls::TlsAcceptor::builder(identity)
        .build()
        .map_err(|err| Error::TlsError(format!("could not build acceptor: {err}")))?;
    Ok(tokio_native_tls::TlsAcceptor::from(acceptor))
}

/// Common names extracted from the negotiated peer certificate.
pub struct TlsCertificateInfo {
    common_names: Vec<String>,
}

impl TlsCertificateInfo {
    /// Inspect the peer certificate of a finished handshake. Returns None
    /// when the client presented no certificate.
    pub fn from_stream(stream: &TlsStream<TcpStream>) -> Option<TlsCertificateInfo> {
        let certificate = stream.get_ref().peer_certificate().ok()??;
        let der = certificate.to_der().ok()?;
        let x509 = X509::from_der(&der).ok()?;

        let common_names = x509
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .filter_map(|entry| entry.data().as_utf8().ok().map(|name| name.to_string()))
            .collect();

        Some(TlsCertificateInfo { common_names })
    }

    #[cfg(test)]
    pub fn with_common_names(common_names: Vec<String>) -> TlsCertificateInfo {
        TlsCertificateInfo { common_names }
    }
}

impl VerifyCommonName for TlsCertificateInfo {
    fn verify_common_name(&self, expected: &str) -> bool {
        self.common_names.iter().any(|name| name == expected)
    }
}
