// titlekit/src/es/signature.rs
// Signed blobs: 4-byte signature tag, signature region, payload

use log::trace;

use super::constants::{
    ECDSA_SIG_FILL, ECDSA_SIG_LEN, RSA_SIG_FILL, RSA2048_SIG_LEN, RSA4096_SIG_LEN, SIG_ECDSA,
    SIG_RSA2048, SIG_RSA4096, SIG_TAG_SIZE,
};
use super::layout::read_u32;
use crate::exceptions::{Result, TitleError};

/// Signature kinds the platform defines; the tag fixes the header layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureType {
    Rsa4096,
    Rsa2048,
    Ecdsa,
}

impl SignatureType {
    /// Map a raw tag to its kind
    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            SIG_RSA4096 => Ok(SignatureType::Rsa4096),
            SIG_RSA2048 => Ok(SignatureType::Rsa2048),
            SIG_ECDSA => Ok(SignatureType::Ecdsa),
            other => Err(TitleError::UnknownSignatureType(other)),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            SignatureType::Rsa4096 => SIG_RSA4096,
            SignatureType::Rsa2048 => SIG_RSA2048,
            SignatureType::Ecdsa => SIG_ECDSA,
        }
    }

    /// Length of the signature proper
    pub fn signature_len(self) -> usize {
        match self {
            SignatureType::Rsa4096 => RSA4096_SIG_LEN,
            SignatureType::Rsa2048 => RSA2048_SIG_LEN,
            SignatureType::Ecdsa => ECDSA_SIG_LEN,
        }
    }

    /// Length of the region between tag and payload (signature plus fill)
    pub fn region_len(self) -> usize {
        match self {
            SignatureType::Rsa4096 | SignatureType::Rsa2048 => self.signature_len() + RSA_SIG_FILL,
            SignatureType::Ecdsa => self.signature_len() + ECDSA_SIG_FILL,
        }
    }

    /// Offset at which the payload begins
    pub fn header_size(self) -> usize {
        SIG_TAG_SIZE + self.region_len()
    }
}

/// An owned signed blob (ticket, TMD, certificate)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedBlob {
    kind: SignatureType,
    bytes: Vec<u8>,
}

impl SignedBlob {
    /// Take ownership of raw blob bytes, validating the tag and header length
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < SIG_TAG_SIZE {
            return Err(TitleError::Malformed(format!(
                "signed blob is {} bytes, too short for a signature tag",
                bytes.len()
            )));
        }

        let kind = SignatureType::from_tag(read_u32(&bytes, 0))?;
        if bytes.len() < kind.header_size() {
            return Err(TitleError::Malformed(format!(
                "signed blob is {} bytes, {:?} header needs {}",
                bytes.len(),
                kind,
                kind.header_size()
            )));
        }

        trace!("Signed blob: {:?}, {} bytes", kind, bytes.len());
        Ok(SignedBlob { kind, bytes })
    }

    /// Assemble a blob from a signature kind and a payload, signature zeroed
    pub fn new(kind: SignatureType, payload: &[u8]) -> Self {
        let mut bytes = vec![0u8; kind.header_size() + payload.len()];
        bytes[..SIG_TAG_SIZE].copy_from_slice(&kind.tag().to_be_bytes());
        bytes[kind.header_size()..].copy_from_slice(payload);
        SignedBlob { kind, bytes }
    }

    pub fn signature_type(&self) -> SignatureType {
        self.kind
    }

    /// Signature region (signature plus trailing fill)
    pub fn signature(&self) -> &[u8] {
        &self.bytes[SIG_TAG_SIZE..self.kind.header_size()]
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.kind.header_size()..]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let start = self.kind.header_size();
        &mut self.bytes[start..]
    }

    /// Overwrite the whole signature region with zeroes
    pub fn zero_signature(&mut self) {
        let end = self.kind.header_size();
        self.bytes[SIG_TAG_SIZE..end].fill(0);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{SignatureType, SignedBlob};
    use crate::exceptions::TitleError;

    fn blob_with_noise(kind: SignatureType, payload_len: usize) -> Vec<u8> {
        let mut bytes: Vec<u8> = (0..kind.header_size() + payload_len)
            .map(|i| (i % 251) as u8 | 1)
            .collect();
        bytes[..4].copy_from_slice(&kind.tag().to_be_bytes());
        bytes
    }

    #[test]
    fn test_header_sizes() {
        assert_eq!(SignatureType::Rsa4096.header_size(), 0x240);
        assert_eq!(SignatureType::Rsa2048.header_size(), 0x140);
        assert_eq!(SignatureType::Ecdsa.header_size(), 0x80);
    }

    #[test]
    fn test_zero_signature_is_idempotent() {
        for kind in [
            SignatureType::Rsa4096,
            SignatureType::Rsa2048,
            SignatureType::Ecdsa,
        ] {
            let mut blob = SignedBlob::from_bytes(blob_with_noise(kind, 32)).unwrap();
            let payload = blob.payload().to_vec();

            blob.zero_signature();
            assert!(blob.signature().iter().all(|&b| b == 0));
            assert_eq!(blob.signature().len(), kind.region_len());
            let once = blob.clone();

            blob.zero_signature();
            assert_eq!(blob, once);

            // Tag and payload untouched
            assert_eq!(&blob.as_bytes()[..4], &kind.tag().to_be_bytes());
            assert_eq!(blob.payload(), &payload[..]);
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut bytes = blob_with_noise(SignatureType::Rsa2048, 8);
        bytes[..4].copy_from_slice(&0x0001_0003u32.to_be_bytes());
        match SignedBlob::from_bytes(bytes) {
            Err(TitleError::UnknownSignatureType(0x0001_0003)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_truncated_header_rejected() {
        let mut bytes = blob_with_noise(SignatureType::Rsa2048, 0);
        bytes.truncate(0x100);
        assert!(matches!(
            SignedBlob::from_bytes(bytes),
            Err(TitleError::Malformed(_))
        ));
        assert!(matches!(
            SignedBlob::from_bytes(vec![0, 1]),
            Err(TitleError::Malformed(_))
        ));
    }

    #[test]
    fn test_new_places_payload_after_region() {
        let blob = SignedBlob::new(SignatureType::Ecdsa, &[0xAA; 4]);
        assert_eq!(blob.len(), 0x84);
        assert_eq!(blob.payload(), &[0xAA; 4]);
        assert!(blob.signature().iter().all(|&b| b == 0));
    }
}
