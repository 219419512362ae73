use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_rustls::rustls::pki_types::CertificateDer;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::error::{MirrorError, MirrorResult};
use crate::utils::logging::{LogLevel, Logger};

/// Build the TLS connector shared by every https request of a run
///
/// Trust comes from the operating system store, falling back to the bundled
/// Mozilla roots when the system has none, and is extended by `cert_store`.
pub fn build_connector(
    cert_store: Option<&Path>,
    logger: &dyn Logger,
) -> MirrorResult<TlsConnector> {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        logger.log(LogLevel::Verbose, &format!("Skipping system certificate source: {}", error));
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    logger.log(
        LogLevel::Verbose,
        &format!("Loaded {} system certificates ({} ignored)", added, ignored),
    );

    if roots.is_empty() {
        logger.log(LogLevel::Verbose, "No system certificates, using bundled roots");
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    if let Some(path) = cert_store {
        let bundle = load_bundle(path)?;
        let count = bundle.len();
        for cert in bundle {
            roots.add(cert).map_err(|e| {
                MirrorError::Config(format!("unusable certificate in {}: {}", path.display(), e))
            })?;
        }
        logger.log(
            LogLevel::Verbose,
            &format!("Loaded {} certificates from {}", count, path.display()),
        );
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| MirrorError::Config(format!("TLS setup failed: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Read PEM certificates from a file, or from every PEM file in a directory
pub fn load_bundle(path: &Path) -> MirrorResult<Vec<CertificateDer<'static>>> {
    let config_error = |e: io::Error| {
        MirrorError::Config(format!(
            "cannot read certificate store {}: {}",
            path.display(),
            e
        ))
    };

    let files = if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)
            .map_err(config_error)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|file| {
                file.is_file()
                    && file
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .map_or(false, |ext| matches!(ext, "pem" | "crt" | "cer"))
            })
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut certs = Vec::new();
    for file in files {
        let handle = fs::File::open(&file).map_err(config_error)?;
        let mut reader = BufReader::new(handle);
        for cert in rustls_pemfile::certs(&mut reader) {
            certs.push(cert.map_err(config_error)?);
        }
    }

    if certs.is_empty() {
        return Err(MirrorError::Config(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(certs)
}

/// Whether a handshake failed because the peer's certificate was rejected
pub fn is_certificate_error(err: &io::Error) -> bool {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        .map_or(false, |tls| {
            matches!(
                tls,
                rustls::Error::InvalidCertificate(_) | rustls::Error::NoCertificatesPresented
            )
        })
}

/// Map a failed handshake to the error taxonomy
pub fn handshake_error(host: &str, err: io::Error) -> MirrorError {
    if is_certificate_error(&err) {
        MirrorError::Certificate {
            host: host.to_string(),
            reason: err.to_string(),
        }
    } else {
        MirrorError::Connection {
            host: host.to_string(),
            reason: format!("TLS handshake failed: {}", err),
        }
    }
}
