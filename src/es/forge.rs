// titlekit/src/es/forge.rs
// Fakesigning: zero the signature, then search the 16-bit free field until
// the payload digest starts with a zero byte

use log::{debug, trace, warn};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use super::constants::{
    TICKET_PADDING_OFFSET, TICKET_SIZE, TMD_FILL_OFFSET, TMD_HEADER_SIZE, TMD_NUM_CONTENTS_OFFSET,
};
use super::crypto::{Sha1Hash, sha1};
use super::layout::{read_u16, write_u16};
use super::signature::SignedBlob;
use super::tmd::tmd_payload_size;
use crate::exceptions::{Result, TitleError};

/// Container kinds that carry a forging search field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Ticket,
    Tmd,
}

impl ContainerKind {
    /// Guess from a file extension (`.tik`, `.tmd`)
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "tik" => Some(ContainerKind::Ticket),
            "tmd" => Some(ContainerKind::Tmd),
            _ => None,
        }
    }

    /// Payload offset of the search field
    pub fn search_offset(self) -> usize {
        match self {
            ContainerKind::Ticket => TICKET_PADDING_OFFSET,
            ContainerKind::Tmd => TMD_FILL_OFFSET,
        }
    }

    /// Number of payload bytes the digest covers
    pub fn digest_len(self, payload: &[u8]) -> Result<usize> {
        let len = match self {
            ContainerKind::Ticket => TICKET_SIZE,
            ContainerKind::Tmd => {
                if payload.len() < TMD_HEADER_SIZE {
                    return Err(TitleError::Malformed(format!(
                        "TMD payload is {} bytes, header needs {}",
                        payload.len(),
                        TMD_HEADER_SIZE
                    )));
                }
                tmd_payload_size(read_u16(payload, TMD_NUM_CONTENTS_OFFSET))
            }
        };

        if payload.len() < len {
            return Err(TitleError::Malformed(format!(
                "{:?} payload is {} bytes, digest covers {}",
                self,
                payload.len(),
                len
            )));
        }
        Ok(len)
    }
}

/// Forge `blob` using `digest` as the hash primitive.
///
/// Returns the winning search value. On exhaustion the field keeps the last
/// value tried (0xFFFF).
pub fn forge_with<F>(blob: &mut SignedBlob, kind: ContainerKind, mut digest: F) -> Result<u16>
where
    F: FnMut(&[u8]) -> Sha1Hash,
{
    let len = kind.digest_len(blob.payload())?;
    let offset = kind.search_offset();
    let timer = Instant::now();

    blob.zero_signature();
    trace!("Signature zeroed, searching {:?} field @{:#x}", kind, offset);

    let payload = &mut blob.payload_mut()[..len];
    for fill in 0..=u16::MAX {
        write_u16(payload, offset, fill);
        if digest(payload)[0] == 0 {
            debug!(
                "✍️ Forged {:?} with field {:#06x} after {} attempts in {:?}",
                kind,
                fill,
                fill as u32 + 1,
                timer.elapsed()
            );
            return Ok(fill);
        }
    }

    warn!("⚠️ Forging {:?} exhausted all 65536 field values", kind);
    Err(TitleError::ForgeExhausted)
}

/// Fakesign a signed ticket in place
pub fn fakesign_ticket(blob: &mut SignedBlob) -> Result<u16> {
    forge_with(blob, ContainerKind::Ticket, sha1)
}

/// Fakesign a signed TMD in place
pub fn fakesign_tmd(blob: &mut SignedBlob) -> Result<u16> {
    forge_with(blob, ContainerKind::Tmd, sha1)
}

pub fn fakesign(blob: &mut SignedBlob, kind: ContainerKind) -> Result<u16> {
    forge_with(blob, kind, sha1)
}

/// Whether a permissive verifier would accept `blob`: zero signature and a
/// payload digest beginning with 0
pub fn is_fakesigned(blob: &SignedBlob, kind: ContainerKind) -> Result<bool> {
    let len = kind.digest_len(blob.payload())?;
    Ok(blob.signature().iter().all(|&b| b == 0) && sha1(&blob.payload()[..len])[0] == 0)
}
