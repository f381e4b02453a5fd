//! The credential gate (§4.8): everything the session needs to know about
//! the TLS channel underneath it to decide whether a secure-scheme push
//! may be claimed and whether CREDENTIAL frames may be trusted, without
//! this crate depending on any particular TLS stack.

/// Implemented by the caller's TLS layer (or a test double). The session
/// consults this once per push-stream acceptance and once per
/// `CREDENTIAL` frame; it never inspects certificate bytes itself.
pub trait SslInfo: Send + Sync {
    /// True if the peer certificate's name matches `domain`.
    fn certificate_matches_domain(&self, domain: &str) -> bool;

    /// The domain this channel's binding was negotiated for — typically
    /// the SNI/host used at handshake time.
    fn channel_binding_domain(&self) -> &str;

    /// True if CREDENTIAL frames may be trusted on this channel (requires
    /// a protocol version that supports them and a handshake that
    /// completed without certificate errors).
    fn credentials_enabled(&self) -> bool;

    /// True if the certificate chain reported an error at handshake. Used
    /// to refuse secure-scheme pushed streams per §4.8.
    fn had_certificate_error(&self) -> bool;
}

/// Verifies a pushed or claimed stream's authority against the session's
/// channel, per §4.8: the peer cert must name `domain`, and either the
/// channel's own binding already matches the session's host or
/// credential frames are enabled (letting a single connection legitimately
/// serve other origins it presents credentials for).
pub fn verify_domain_authentication(ssl: &dyn SslInfo, domain: &str) -> bool {
    if !ssl.certificate_matches_domain(domain) {
        return false;
    }
    ssl.channel_binding_domain() == domain || ssl.credentials_enabled()
}

/// A permissive stand-in for sessions that run over a transport without
/// TLS (plaintext testing, `h2c`-style bootstrap) — every domain matches
/// and credentials are considered unavailable.
#[derive(Debug)]
pub struct PlaintextSsl {
    pub host: String,
}

impl SslInfo for PlaintextSsl {
    fn certificate_matches_domain(&self, _domain: &str) -> bool {
        true
    }

    fn channel_binding_domain(&self) -> &str {
        &self.host
    }

    fn credentials_enabled(&self) -> bool {
        false
    }

    fn had_certificate_error(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        matches: bool,
        binding: String,
        creds: bool,
    }

    impl SslInfo for Fake {
        fn certificate_matches_domain(&self, _domain: &str) -> bool {
            self.matches
        }
        fn channel_binding_domain(&self) -> &str {
            &self.binding
        }
        fn credentials_enabled(&self) -> bool {
            self.creds
        }
        fn had_certificate_error(&self) -> bool {
            false
        }
    }

    #[test]
    fn mismatched_certificate_always_fails() {
        let ssl = Fake { matches: false, binding: "h".into(), creds: true };
        assert!(!verify_domain_authentication(&ssl, "h"));
    }

    #[test]
    fn cross_origin_requires_credentials() {
        let ssl = Fake { matches: true, binding: "a".into(), creds: false };
        assert!(!verify_domain_authentication(&ssl, "b"));

        let ssl = Fake { matches: true, binding: "a".into(), creds: true };
        assert!(verify_domain_authentication(&ssl, "b"));
    }

    #[test]
    fn same_origin_never_needs_credentials() {
        let ssl = Fake { matches: true, binding: "a".into(), creds: false };
        assert!(verify_domain_authentication(&ssl, "a"));
    }
}
