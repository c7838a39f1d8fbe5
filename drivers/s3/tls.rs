//! TLS 主机名修正
//!
//! Under virtual-hosted addressing a dotted bucket such as `a.x` becomes the host
//! `a.x.s3-eu-west-1.amazonaws.com`, which the `*.s3-eu-west-1.amazonaws.com` wildcard
//! certificate does not cover. When the real name fails validation, the verifier here
//! retries with the bucket labels collapsed (`ax.s3-eu-west-1.amazonaws.com`). The connection
//! itself still goes to the real host.
//!
//! The verifier lives in the TLS config of one HTTP client only; no other connection in the
//! process is affected.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::SystemTime;

use once_cell::sync::Lazy;
use rustls::client::{ServerCertVerified, ServerCertVerifier, WebPkiVerifier};
use rustls::{Certificate, ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName};

/// Domain suffix the correction applies to
pub const S3_DOMAIN_SUFFIX: &str = ".amazonaws.com";

/// Number of trailing labels kept as-is (`s3-<region>.amazonaws.com`)
const SUFFIX_LABELS: usize = 3;

static ROOT_STORE: Lazy<Arc<RootCertStore>> = Lazy::new(|| {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));
    Arc::new(roots)
});

/// Collapse all labels before the S3 suffix into one label / 合并存储桶子域名
///
/// ```
/// use s3csv_fdw::drivers::s3::tls::normalize_host;
/// assert_eq!(normalize_host("a.x.s3-eu-west-1.amazonaws.com"), "ax.s3-eu-west-1.amazonaws.com");
/// assert_eq!(normalize_host("a.x.s3-eu-west-1.example.com"), "a.x.s3-eu-west-1.example.com");
/// ```
pub fn normalize_host(host: &str) -> Cow<'_, str> {
    if !host.ends_with(S3_DOMAIN_SUFFIX) {
        return Cow::Borrowed(host);
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= SUFFIX_LABELS + 1 {
        return Cow::Borrowed(host);
    }
    let (prefix, suffix) = labels.split_at(labels.len() - SUFFIX_LABELS);
    Cow::Owned(format!("{}.{}", prefix.concat(), suffix.join(".")))
}

/// Wraps a verifier with a collapsed-name retry
pub struct HostnameNormalizingVerifier {
    inner: Arc<dyn ServerCertVerifier>,
}

impl HostnameNormalizingVerifier {
    /// Wrap the standard WebPKI verifier backed by the bundled Mozilla roots
    pub fn webpki() -> Self {
        Self::wrap(Arc::new(WebPkiVerifier::new(ROOT_STORE.clone(), None)))
    }

    pub fn wrap(inner: Arc<dyn ServerCertVerifier>) -> Self {
        Self { inner }
    }
}

impl ServerCertVerifier for HostnameNormalizingVerifier {
    /// The real name is tried first; the collapsed name only when that fails
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        intermediates: &[Certificate],
        server_name: &ServerName,
        scts: &mut dyn Iterator<Item = &[u8]>,
        ocsp_response: &[u8],
        now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let scts: Vec<&[u8]> = scts.collect();
        let first = self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            &mut scts.iter().copied(),
            ocsp_response,
            now,
        );
        if first.is_ok() {
            return first;
        }

        let rewritten = match server_name {
            ServerName::DnsName(dns) => {
                let original: &str = dns.as_ref();
                match normalize_host(original) {
                    Cow::Owned(host) => {
                        tracing::debug!("TLS hostname rewritten for validation: {} -> {}", original, host);
                        ServerName::try_from(host.as_str()).ok()
                    }
                    Cow::Borrowed(_) => None,
                }
            }
            _ => None,
        };
        match rewritten {
            Some(name) => self.inner.verify_server_cert(
                end_entity,
                intermediates,
                &name,
                &mut scts.iter().copied(),
                ocsp_response,
                now,
            ),
            None => first,
        }
    }
}

/// Accepts any certificate; used only when `verify_ssl` is off
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// Certificate verifier for the `verify_ssl` setting
pub fn server_cert_verifier(verify_ssl: bool) -> Arc<dyn ServerCertVerifier> {
    if verify_ssl {
        Arc::new(HostnameNormalizingVerifier::webpki())
    } else {
        Arc::new(AcceptAnyCertificate)
    }
}

/// TLS config for one object-store client / 构建客户端 TLS 配置
pub fn client_tls_config(verify_ssl: bool) -> ClientConfig {
    ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(server_cert_verifier(verify_ssl))
        .with_no_client_auth()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Accepts exactly the names a `*.<suffix>` wildcard certificate covers
    pub struct WildcardVerifier {
        pub suffix: &'static str,
    }

    impl ServerCertVerifier for WildcardVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &Certificate,
            _intermediates: &[Certificate],
            server_name: &ServerName,
            _scts: &mut dyn Iterator<Item = &[u8]>,
            _ocsp_response: &[u8],
            _now: SystemTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            let covered = match server_name {
                ServerName::DnsName(dns) => {
                    let name: &str = dns.as_ref();
                    name.strip_suffix(self.suffix)
                        .map_or(false, |label| !label.is_empty() && !label.contains('.'))
                }
                _ => false,
            };
            if covered {
                Ok(ServerCertVerified::assertion())
            } else {
                Err(rustls::Error::InvalidCertificate(rustls::CertificateError::NotValidForName))
            }
        }
    }
}
