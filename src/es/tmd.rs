// titlekit/src/es/tmd.rs
// Title metadata (TMD) payload and its unsigned view

use serde::Serialize;

use super::constants::{
    CONTENT_TYPE_SHARED, ISSUER_SIZE, SHA1_SIZE, TMD_CONTENT_SIZE, TMD_FILL_OFFSET,
    TMD_HEADER_SIZE, TMD_NUM_CONTENTS_OFFSET, TMD_SYS_VERSION_OFFSET, TMD_TITLE_ID_OFFSET,
    TMD_TITLE_VERSION_OFFSET, TMD_VIEW_CONTENT_SIZE, TMD_VIEW_HEADER_SIZE,
};
use super::crypto::Sha1Hash;
use super::defaults::STUB_CONTENT_LAYOUT;
use super::layout::{read_array, read_u16, read_u32, read_u64, write_u16, write_u32, write_u64};
use super::title_id::TitleId;
use crate::exceptions::{Result, TitleError};
use crate::utils::c_str;

/// Content descriptor inside a full TMD
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContentRecord {
    pub content_id: u32,
    pub index: u16,
    pub kind: u16,
    pub size: u64,
    #[serde(serialize_with = "hex_hash")]
    pub hash: Sha1Hash,
}

fn hex_hash<S: serde::Serializer>(hash: &Sha1Hash, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(hash))
}

impl ContentRecord {
    /// Content is deduplicated through the shared content map
    pub fn is_shared(&self) -> bool {
        self.kind & CONTENT_TYPE_SHARED != 0
    }

    fn unpack(data: &[u8]) -> Self {
        ContentRecord {
            content_id: read_u32(data, 0x00),
            index: read_u16(data, 0x04),
            kind: read_u16(data, 0x06),
            size: read_u64(data, 0x08),
            hash: read_array(data, 0x10),
        }
    }

    fn pack_into(&self, out: &mut [u8]) {
        write_u32(out, 0x00, self.content_id);
        write_u16(out, 0x04, self.index);
        write_u16(out, 0x06, self.kind);
        write_u64(out, 0x08, self.size);
        out[0x10..0x10 + SHA1_SIZE].copy_from_slice(&self.hash);
    }
}

/// Decoded TMD payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tmd {
    pub issuer: [u8; ISSUER_SIZE],
    pub version: u8,
    pub ca_crl_version: u8,
    pub signer_crl_version: u8,
    pub vwii_title: u8,
    pub sys_version: u64,
    pub title_id: TitleId,
    pub title_type: u32,
    pub group_id: u16,
    pub region: u16,
    pub ratings: [u8; 16],
    pub ipc_mask: [u8; 12],
    pub access_rights: u32,
    pub title_version: u16,
    pub boot_index: u16,
    pub fill: u16, // Free for forging
    pub contents: Vec<ContentRecord>,
}

/// Bytes a TMD payload with `num_contents` records occupies
pub fn tmd_payload_size(num_contents: u16) -> usize {
    TMD_HEADER_SIZE + num_contents as usize * TMD_CONTENT_SIZE
}

impl Tmd {
    /// Decode from a payload holding the header and every content record
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < TMD_HEADER_SIZE {
            return Err(TitleError::Malformed(format!(
                "TMD payload is {} bytes, header needs {}",
                data.len(),
                TMD_HEADER_SIZE
            )));
        }

        let num_contents = read_u16(data, TMD_NUM_CONTENTS_OFFSET);
        let needed = tmd_payload_size(num_contents);
        if data.len() < needed {
            return Err(TitleError::Malformed(format!(
                "TMD payload is {} bytes, {} contents need {}",
                data.len(),
                num_contents,
                needed
            )));
        }

        let contents = data[TMD_HEADER_SIZE..needed]
            .chunks_exact(TMD_CONTENT_SIZE)
            .map(ContentRecord::unpack)
            .collect();

        Ok(Tmd {
            issuer: read_array(data, 0x00),
            version: data[0x40],
            ca_crl_version: data[0x41],
            signer_crl_version: data[0x42],
            vwii_title: data[0x43],
            sys_version: read_u64(data, TMD_SYS_VERSION_OFFSET),
            title_id: TitleId(read_u64(data, TMD_TITLE_ID_OFFSET)),
            title_type: read_u32(data, 0x54),
            group_id: read_u16(data, 0x58),
            region: read_u16(data, 0x5C),
            ratings: read_array(data, 0x5E),
            ipc_mask: read_array(data, 0x7A),
            access_rights: read_u32(data, 0x98),
            title_version: read_u16(data, TMD_TITLE_VERSION_OFFSET),
            boot_index: read_u16(data, 0xA0),
            fill: read_u16(data, TMD_FILL_OFFSET),
            contents,
        })
    }

    /// Encode header and content records; reserved bytes are zero
    pub fn pack(&self) -> Result<Vec<u8>> {
        let num_contents = u16::try_from(self.contents.len()).map_err(|_| {
            TitleError::Malformed(format!("{} contents do not fit a TMD", self.contents.len()))
        })?;
        let mut bytes = vec![0u8; tmd_payload_size(num_contents)];

        bytes[0x00..0x40].copy_from_slice(&self.issuer);
        bytes[0x40] = self.version;
        bytes[0x41] = self.ca_crl_version;
        bytes[0x42] = self.signer_crl_version;
        bytes[0x43] = self.vwii_title;
        write_u64(&mut bytes, TMD_SYS_VERSION_OFFSET, self.sys_version);
        write_u64(&mut bytes, TMD_TITLE_ID_OFFSET, self.title_id.0);
        write_u32(&mut bytes, 0x54, self.title_type);
        write_u16(&mut bytes, 0x58, self.group_id);
        write_u16(&mut bytes, 0x5C, self.region);
        bytes[0x5E..0x6E].copy_from_slice(&self.ratings);
        bytes[0x7A..0x86].copy_from_slice(&self.ipc_mask);
        write_u32(&mut bytes, 0x98, self.access_rights);
        write_u16(&mut bytes, TMD_TITLE_VERSION_OFFSET, self.title_version);
        write_u16(&mut bytes, TMD_NUM_CONTENTS_OFFSET, num_contents);
        write_u16(&mut bytes, 0xA0, self.boot_index);
        write_u16(&mut bytes, TMD_FILL_OFFSET, self.fill);

        for (record, out) in self
            .contents
            .iter()
            .zip(bytes[TMD_HEADER_SIZE..].chunks_exact_mut(TMD_CONTENT_SIZE))
        {
            record.pack_into(out);
        }

        Ok(bytes)
    }

    pub fn issuer(&self) -> String {
        c_str(&self.issuer)
    }

    /// Sum of every content size
    pub fn installed_size(&self) -> Result<u64> {
        self.contents
            .iter()
            .try_fold(0u64, |total, c| total.checked_add(c.size))
            .ok_or_else(|| {
                TitleError::Malformed(format!(
                    "content sizes of {} overflow 64 bits",
                    self.title_id
                ))
            })
    }

    /// Placeholder module layout: no IOS major in `sys_version`, one own
    /// content followed by two shared ones
    pub fn is_stub_ios(&self) -> bool {
        self.sys_version >> 32 == 0 && has_stub_layout(self.contents.iter().map(|c| c.kind))
    }
}

impl Default for Tmd {
    fn default() -> Self {
        Tmd {
            issuer: [0; ISSUER_SIZE],
            version: 0,
            ca_crl_version: 0,
            signer_crl_version: 0,
            vwii_title: 0,
            sys_version: 0,
            title_id: TitleId(0),
            title_type: 1,
            group_id: 0,
            region: 3,
            ratings: [0; 16],
            ipc_mask: [0; 12],
            access_rights: 0,
            title_version: 0,
            boot_index: 0,
            fill: 0,
            contents: Vec::new(),
        }
    }
}

/// Content types exactly match the placeholder layout
pub(crate) fn has_stub_layout(kinds: impl ExactSizeIterator<Item = u16>) -> bool {
    kinds.len() == STUB_CONTENT_LAYOUT.len() && kinds.eq(STUB_CONTENT_LAYOUT.iter().copied())
}

/// Content descriptor inside a TMD view (no hash)
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ViewContent {
    pub content_id: u32,
    pub index: u16,
    pub kind: u16,
    pub size: u64,
}

/// Unsigned, read-only projection of a TMD
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TmdView {
    pub version: u8,
    pub sys_version: u64,
    pub title_id: TitleId,
    pub title_type: u32,
    pub group_id: u16,
    pub title_version: u16,
    pub contents: Vec<ViewContent>,
}

impl TmdView {
    /// Low byte of the title version, the part stubs zero out
    pub fn revision_low(&self) -> u8 {
        (self.title_version & 0xFF) as u8
    }

    /// Content record whose `index` is 0, wherever it sits in the list
    pub fn boot_content(&self) -> Option<&ViewContent> {
        self.contents.iter().find(|c| c.index == 0)
    }

    pub fn has_stub_layout(&self) -> bool {
        has_stub_layout(self.contents.iter().map(|c| c.kind))
    }

    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < TMD_VIEW_HEADER_SIZE {
            return Err(TitleError::Malformed(format!(
                "TMD view is {} bytes, header needs {}",
                data.len(),
                TMD_VIEW_HEADER_SIZE
            )));
        }

        let num_contents = read_u16(data, 0x5A) as usize;
        let needed = TMD_VIEW_HEADER_SIZE + num_contents * TMD_VIEW_CONTENT_SIZE;
        if data.len() < needed {
            return Err(TitleError::Malformed(format!(
                "TMD view is {} bytes, {} contents need {}",
                data.len(),
                num_contents,
                needed
            )));
        }

        let contents = data[TMD_VIEW_HEADER_SIZE..needed]
            .chunks_exact(TMD_VIEW_CONTENT_SIZE)
            .map(|c| ViewContent {
                content_id: read_u32(c, 0x00),
                index: read_u16(c, 0x04),
                kind: read_u16(c, 0x06),
                size: read_u64(c, 0x08),
            })
            .collect();

        Ok(TmdView {
            version: data[0x00],
            sys_version: read_u64(data, 0x04),
            title_id: TitleId(read_u64(data, 0x0C)),
            title_type: read_u32(data, 0x14),
            group_id: read_u16(data, 0x18),
            title_version: read_u16(data, 0x58),
            contents,
        })
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        let num_contents = u16::try_from(self.contents.len()).map_err(|_| {
            TitleError::Malformed(format!(
                "{} contents do not fit a TMD view",
                self.contents.len()
            ))
        })?;
        let mut bytes =
            vec![0u8; TMD_VIEW_HEADER_SIZE + self.contents.len() * TMD_VIEW_CONTENT_SIZE];

        bytes[0x00] = self.version;
        write_u64(&mut bytes, 0x04, self.sys_version);
        write_u64(&mut bytes, 0x0C, self.title_id.0);
        write_u32(&mut bytes, 0x14, self.title_type);
        write_u16(&mut bytes, 0x18, self.group_id);
        // 0x1A..0x58: TMD reserved area, not carried
        write_u16(&mut bytes, 0x58, self.title_version);
        write_u16(&mut bytes, 0x5A, num_contents);

        for (content, out) in self
            .contents
            .iter()
            .zip(bytes[TMD_VIEW_HEADER_SIZE..].chunks_exact_mut(TMD_VIEW_CONTENT_SIZE))
        {
            write_u32(out, 0x00, content.content_id);
            write_u16(out, 0x04, content.index);
            write_u16(out, 0x06, content.kind);
            write_u64(out, 0x08, content.size);
        }

        Ok(bytes)
    }
}

impl From<&Tmd> for TmdView {
    fn from(tmd: &Tmd) -> Self {
        TmdView {
            version: tmd.version,
            sys_version: tmd.sys_version,
            title_id: tmd.title_id,
            title_type: tmd.title_type,
            group_id: tmd.group_id,
            title_version: tmd.title_version,
            contents: tmd
                .contents
                .iter()
                .map(|c| ViewContent {
                    content_id: c.content_id,
                    index: c.index,
                    kind: c.kind,
                    size: c.size,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentRecord, Tmd, TmdView, tmd_payload_size};
    use crate::es::constants::{TMD_FILL_OFFSET, TMD_VIEW_HEADER_SIZE};
    use crate::es::signature::{SignatureType, SignedBlob};
    use crate::es::title_id::TitleId;
    use crate::exceptions::TitleError;

    fn record(index: u16, kind: u16, size: u64) -> ContentRecord {
        ContentRecord {
            content_id: 0x10 + index as u32,
            index,
            kind,
            size,
            hash: [index as u8; 20],
        }
    }

    fn stub_tmd() -> Tmd {
        Tmd {
            title_id: TitleId::system(60),
            title_version: 0x1900,
            contents: vec![
                record(0, 0x0001, 0x40),
                record(1, 0x8001, 0x1000),
                record(2, 0x8001, 0x2000),
            ],
            ..Tmd::default()
        }
    }

    #[test]
    fn test_pack_layout() {
        let mut tmd = stub_tmd();
        tmd.fill = 0x1234;
        let bytes = tmd.pack().unwrap();
        assert_eq!(bytes.len(), tmd_payload_size(3));
        assert_eq!(bytes.len(), 0xA4 + 3 * 0x24);
        assert_eq!(&bytes[TMD_FILL_OFFSET..TMD_FILL_OFFSET + 2], &[0x12, 0x34]);
        assert_eq!(Tmd::unpack(&bytes).unwrap(), tmd);
    }

    #[test]
    fn test_truncated_contents_rejected() {
        let bytes = stub_tmd().pack().unwrap();
        assert!(matches!(
            Tmd::unpack(&bytes[..bytes.len() - 1]),
            Err(TitleError::Malformed(_))
        ));
    }

    #[test]
    fn test_installed_size_and_stub_layout() {
        let mut tmd = stub_tmd();
        assert_eq!(tmd.installed_size().unwrap(), 0x3040);
        assert!(tmd.is_stub_ios());

        tmd.sys_version = 0x0000_0001_0000_0025;
        assert!(!tmd.is_stub_ios());

        tmd.sys_version = 0;
        tmd.contents[2].kind = 0x0001;
        assert!(!tmd.is_stub_ios());
    }

    #[test]
    fn test_installed_size_overflow_is_malformed() {
        let mut tmd = stub_tmd();
        tmd.contents = vec![record(0, 0x0001, u64::MAX), record(1, 0x0001, u64::MAX)];
        let blob = SignedBlob::new(SignatureType::Rsa2048, &tmd.pack().unwrap());
        let decoded = Tmd::unpack(blob.payload()).unwrap();

        assert!(matches!(
            decoded.installed_size(),
            Err(TitleError::Malformed(_))
        ));

        tmd.contents.truncate(1);
        assert_eq!(tmd.installed_size().unwrap(), u64::MAX);
    }

    #[test]
    fn test_view_projection() {
        let tmd = stub_tmd();
        let view = TmdView::from(&tmd);
        let bytes = view.pack().unwrap();
        assert_eq!(bytes.len(), TMD_VIEW_HEADER_SIZE + 3 * 0x10);

        let decoded = TmdView::unpack(&bytes).unwrap();
        assert_eq!(decoded, view);
        assert_eq!(decoded.revision_low(), 0);
        assert!(decoded.has_stub_layout());
        assert_eq!(decoded.boot_content().map(|c| c.content_id), Some(0x10));
    }

    #[test]
    fn test_boot_content_found_out_of_order() {
        let mut tmd = stub_tmd();
        tmd.contents.rotate_left(1);
        let view = TmdView::from(&tmd);
        assert_eq!(view.contents[0].index, 1);
        assert_eq!(view.boot_content().map(|c| c.content_id), Some(0x10));

        tmd.contents.retain(|c| c.index != 0);
        assert!(TmdView::from(&tmd).boot_content().is_none());
    }
}
