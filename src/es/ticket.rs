// titlekit/src/es/ticket.rs
// Ticket payload (0x164 bytes) and the unsigned ticket view (0xD8 bytes)

use log::debug;
use serde::Serialize;

use super::constants::{
    CONTENT_ACCESS_MASK_SIZE, ISSUER_SIZE, TICKET_COMMON_KEY_INDEX_OFFSET,
    TICKET_CONTENT_ACCESS_OFFSET, TICKET_ID_OFFSET, TICKET_LIMIT_COUNT, TICKET_LIMITS_OFFSET,
    TICKET_PADDING_OFFSET, TICKET_SIZE, TICKET_TITLE_ID_OFFSET, TICKET_TITLE_KEY_OFFSET,
    TICKET_VIEW_SIZE,
};
use super::crypto::{AesKey, aes_cbc_decrypt};
use super::keys::CommonKeys;
use super::layout::{read_array, read_u16, read_u32, read_u64, write_u16, write_u32, write_u64};
use super::title_id::TitleId;
use crate::exceptions::{Result, TitleError};
use crate::utils::c_str;

/// One of the eight play limits a ticket can carry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TicketLimit {
    pub kind: u32,
    pub value: u32,
}

/// Decoded ticket payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub issuer: [u8; ISSUER_SIZE],
    pub ecdh: [u8; 0x3C],
    pub format_version: u8,
    pub title_key: [u8; 16], // Encrypted under a common key
    pub ticket_id: u64,
    pub console_id: u32,
    pub title_id: TitleId,
    pub access_mask: u16,
    pub ticket_title_version: u16,
    pub permitted_titles_mask: u32,
    pub permit_mask: u32,
    pub export_allowed: u8,
    pub common_key_index: u8,
    pub content_access: [u8; CONTENT_ACCESS_MASK_SIZE],
    pub padding: u16, // Free for forging
    pub limits: [TicketLimit; TICKET_LIMIT_COUNT],
}

impl Ticket {
    /// Decode from a payload of at least `TICKET_SIZE` bytes
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < TICKET_SIZE {
            return Err(TitleError::Malformed(format!(
                "ticket payload is {} bytes, expected {}",
                data.len(),
                TICKET_SIZE
            )));
        }

        let mut limits = [TicketLimit::default(); TICKET_LIMIT_COUNT];
        for (i, limit) in limits.iter_mut().enumerate() {
            let offset = TICKET_LIMITS_OFFSET + i * 8;
            limit.kind = read_u32(data, offset);
            limit.value = read_u32(data, offset + 4);
        }

        Ok(Ticket {
            issuer: read_array(data, 0x00),
            ecdh: read_array(data, 0x40),
            format_version: data[0x7C],
            title_key: read_array(data, TICKET_TITLE_KEY_OFFSET),
            ticket_id: read_u64(data, TICKET_ID_OFFSET),
            console_id: read_u32(data, 0x98),
            title_id: TitleId(read_u64(data, TICKET_TITLE_ID_OFFSET)),
            access_mask: read_u16(data, 0xA4),
            ticket_title_version: read_u16(data, 0xA6),
            permitted_titles_mask: read_u32(data, 0xA8),
            permit_mask: read_u32(data, 0xAC),
            export_allowed: data[0xB0],
            common_key_index: data[TICKET_COMMON_KEY_INDEX_OFFSET],
            content_access: read_array(data, TICKET_CONTENT_ACCESS_OFFSET),
            padding: read_u16(data, TICKET_PADDING_OFFSET),
            limits,
        })
    }

    /// Encode to a `TICKET_SIZE` payload; reserved bytes are zero
    pub fn pack(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; TICKET_SIZE];

        bytes[0x00..0x40].copy_from_slice(&self.issuer);
        bytes[0x40..0x7C].copy_from_slice(&self.ecdh);
        bytes[0x7C] = self.format_version;
        bytes[TICKET_TITLE_KEY_OFFSET..TICKET_TITLE_KEY_OFFSET + 16]
            .copy_from_slice(&self.title_key);
        write_u64(&mut bytes, TICKET_ID_OFFSET, self.ticket_id);
        write_u32(&mut bytes, 0x98, self.console_id);
        write_u64(&mut bytes, TICKET_TITLE_ID_OFFSET, self.title_id.0);
        write_u16(&mut bytes, 0xA4, self.access_mask);
        write_u16(&mut bytes, 0xA6, self.ticket_title_version);
        write_u32(&mut bytes, 0xA8, self.permitted_titles_mask);
        write_u32(&mut bytes, 0xAC, self.permit_mask);
        bytes[0xB0] = self.export_allowed;
        bytes[TICKET_COMMON_KEY_INDEX_OFFSET] = self.common_key_index;
        bytes[TICKET_CONTENT_ACCESS_OFFSET..TICKET_CONTENT_ACCESS_OFFSET + CONTENT_ACCESS_MASK_SIZE]
            .copy_from_slice(&self.content_access);
        write_u16(&mut bytes, TICKET_PADDING_OFFSET, self.padding);
        for (i, limit) in self.limits.iter().enumerate() {
            let offset = TICKET_LIMITS_OFFSET + i * 8;
            write_u32(&mut bytes, offset, limit.kind);
            write_u32(&mut bytes, offset + 4, limit.value);
        }

        bytes
    }

    pub fn issuer(&self) -> String {
        c_str(&self.issuer)
    }

    /// Decrypt the title key with the common key the ticket names.
    ///
    /// IV is the title ID followed by eight zero bytes.
    pub fn decrypt_title_key(&self, keys: &CommonKeys) -> Result<AesKey> {
        let common_key = keys
            .for_index(self.common_key_index)
            .ok_or(TitleError::UnsupportedCommonKey(self.common_key_index))?;

        let mut iv = [0u8; 16];
        iv[..8].copy_from_slice(&self.title_id.to_be_bytes());

        let mut title_key = self.title_key;
        aes_cbc_decrypt(common_key, &iv, &mut title_key)?;
        debug!(
            "🔑 Decrypted title key for {} with common key {}",
            self.title_id, self.common_key_index
        );
        Ok(title_key)
    }
}

impl Default for Ticket {
    fn default() -> Self {
        Ticket {
            issuer: [0; ISSUER_SIZE],
            ecdh: [0; 0x3C],
            format_version: 0,
            title_key: [0; 16],
            ticket_id: 0,
            console_id: 0,
            title_id: TitleId(0),
            access_mask: 0,
            ticket_title_version: 0,
            permitted_titles_mask: 0,
            permit_mask: 0,
            export_allowed: 0,
            common_key_index: 0,
            content_access: [0xFF; CONTENT_ACCESS_MASK_SIZE],
            padding: 0,
            limits: [TicketLimit::default(); TICKET_LIMIT_COUNT],
        }
    }
}

/// Unsigned ticket view as handed out by the title manager
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TicketView {
    pub view: u32,
    pub ticket_id: u64,
    pub console_id: u32,
    pub title_id: TitleId,
    pub access_mask: u16,
    #[serde(skip)]
    pub content_access: [u8; CONTENT_ACCESS_MASK_SIZE],
    pub padding: u16,
    pub limits: [TicketLimit; TICKET_LIMIT_COUNT],
}

impl TicketView {
    /// Project a full ticket onto its view
    pub fn from_ticket(view: u32, ticket: &Ticket) -> Self {
        TicketView {
            view,
            ticket_id: ticket.ticket_id,
            console_id: ticket.console_id,
            title_id: ticket.title_id,
            access_mask: ticket.access_mask,
            content_access: ticket.content_access,
            padding: ticket.padding,
            limits: ticket.limits,
        }
    }

    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < TICKET_VIEW_SIZE {
            return Err(TitleError::Malformed(format!(
                "ticket view is {} bytes, expected {}",
                data.len(),
                TICKET_VIEW_SIZE
            )));
        }

        let mut limits = [TicketLimit::default(); TICKET_LIMIT_COUNT];
        for (i, limit) in limits.iter_mut().enumerate() {
            let offset = 0x98 + i * 8;
            limit.kind = read_u32(data, offset);
            limit.value = read_u32(data, offset + 4);
        }

        Ok(TicketView {
            view: read_u32(data, 0x00),
            ticket_id: read_u64(data, 0x04),
            console_id: read_u32(data, 0x0C),
            title_id: TitleId(read_u64(data, 0x10)),
            access_mask: read_u16(data, 0x18),
            content_access: read_array(data, 0x56),
            padding: read_u16(data, 0x96),
            limits,
        })
    }

    pub fn pack(&self) -> [u8; TICKET_VIEW_SIZE] {
        let mut bytes = [0u8; TICKET_VIEW_SIZE];

        write_u32(&mut bytes, 0x00, self.view);
        write_u64(&mut bytes, 0x04, self.ticket_id);
        write_u32(&mut bytes, 0x0C, self.console_id);
        write_u64(&mut bytes, 0x10, self.title_id.0);
        write_u16(&mut bytes, 0x18, self.access_mask);
        // 0x1A..0x56 reserved
        bytes[0x56..0x96].copy_from_slice(&self.content_access);
        write_u16(&mut bytes, 0x96, self.padding);
        for (i, limit) in self.limits.iter().enumerate() {
            let offset = 0x98 + i * 8;
            write_u32(&mut bytes, offset, limit.kind);
            write_u32(&mut bytes, offset + 4, limit.value);
        }

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::{Ticket, TicketView};
    use crate::es::constants::{TICKET_PADDING_OFFSET, TICKET_SIZE};
    use crate::es::crypto::aes_cbc_encrypt;
    use crate::es::keys::CommonKeys;
    use crate::es::title_id::TitleId;
    use crate::exceptions::TitleError;

    fn sample_ticket() -> Ticket {
        let mut ticket = Ticket::default();
        ticket.issuer[..26].copy_from_slice(b"Root-CA00000001-XS00000003");
        ticket.ticket_id = 0x0001_0203_0405_0607;
        ticket.title_id = TitleId::system(58);
        ticket.limits[0].kind = 4;
        ticket.limits[0].value = 10;
        ticket
    }

    #[test]
    fn test_padding_lands_at_search_offset() {
        let mut ticket = sample_ticket();
        ticket.padding = 0xBEEF;
        let bytes = ticket.pack();
        assert_eq!(bytes.len(), TICKET_SIZE);
        assert_eq!(&bytes[TICKET_PADDING_OFFSET..TICKET_PADDING_OFFSET + 2], &[0xBE, 0xEF]);
        assert_eq!(Ticket::unpack(&bytes).unwrap(), ticket);
        assert_eq!(ticket.issuer(), "Root-CA00000001-XS00000003");
    }

    #[test]
    fn test_short_payload_rejected() {
        assert!(matches!(
            Ticket::unpack(&[0u8; TICKET_SIZE - 1]),
            Err(TitleError::Malformed(_))
        ));
    }

    #[test]
    fn test_view_projection() {
        let ticket = sample_ticket();
        let view = TicketView::from_ticket(0, &ticket);
        let decoded = TicketView::unpack(&view.pack()).unwrap();
        assert_eq!(decoded, view);
        assert_eq!(decoded.title_id, TitleId::system(58));
        assert_eq!(decoded.limits[0].value, 10);
    }

    #[test]
    fn test_title_key_decrypts_with_named_common_key() {
        let keys = CommonKeys {
            common: [0x11; 16],
            vwii: [0x22; 16],
        };
        let plain = [0x5A; 16];

        for (index, key) in [(0u8, keys.common), (2u8, keys.vwii)] {
            let mut ticket = sample_ticket();
            ticket.common_key_index = index;
            let mut iv = [0u8; 16];
            iv[..8].copy_from_slice(&ticket.title_id.to_be_bytes());
            let mut encrypted = plain;
            aes_cbc_encrypt(&key, &iv, &mut encrypted).unwrap();
            ticket.title_key = encrypted;

            assert_eq!(ticket.decrypt_title_key(&keys).unwrap(), plain);
        }

        let mut korean = sample_ticket();
        korean.common_key_index = 1;
        assert!(matches!(
            korean.decrypt_title_key(&keys),
            Err(TitleError::UnsupportedCommonKey(1))
        ));
    }
}
