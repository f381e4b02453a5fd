use bytes::Bytes;

/// Carries a client certificate bound to a TLS channel-binding value, for
/// multi-origin reuse of one connection (v3+). This codec records the slot
/// and proof but does not interpret certificate bytes; that is the
/// transport/SSL layer's job (see `crate::ssl`).
#[derive(Debug)]
pub struct Credential {
    slot: u16,
    proof: Bytes,
    certs: Vec<Bytes>,
}

impl Credential {
    pub fn new(slot: u16, proof: Bytes, certs: Vec<Bytes>) -> Credential {
        Credential { slot, proof, certs }
    }

    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub fn proof(&self) -> &Bytes {
        &self.proof
    }

    pub fn certs(&self) -> &[Bytes] {
        &self.certs
    }
}
