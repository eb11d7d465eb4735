// titlekit/src/es/constants.rs
// Fixed on-disk layout constants for signed content. These never change.
// Paths, key offsets and classification tables live in defaults.rs.

// Signature tags
pub const SIG_RSA4096: u32 = 0x0001_0000;
pub const SIG_RSA2048: u32 = 0x0001_0001;
pub const SIG_ECDSA: u32 = 0x0001_0002;

// Signature region sizes (signature + fill after it)
pub const RSA4096_SIG_LEN: usize = 0x200;
pub const RSA2048_SIG_LEN: usize = 0x100;
pub const ECDSA_SIG_LEN: usize = 0x3C;
pub const RSA_SIG_FILL: usize = 0x3C;
pub const ECDSA_SIG_FILL: usize = 0x40;
pub const SIG_TAG_SIZE: usize = 4;

pub const SHA1_SIZE: usize = 20;
pub const AES_KEY_SIZE: usize = 16;
pub const ISSUER_SIZE: usize = 0x40;

// Ticket payload
pub const TICKET_SIZE: usize = 0x164;
pub const TICKET_TITLE_KEY_OFFSET: usize = 0x7F;
pub const TICKET_ID_OFFSET: usize = 0x90;
pub const TICKET_TITLE_ID_OFFSET: usize = 0x9C;
pub const TICKET_COMMON_KEY_INDEX_OFFSET: usize = 0xB1;
pub const TICKET_CONTENT_ACCESS_OFFSET: usize = 0xE2;
pub const TICKET_PADDING_OFFSET: usize = 0x122; // Forging search field
pub const TICKET_LIMITS_OFFSET: usize = 0x124;
pub const TICKET_LIMIT_COUNT: usize = 8;
pub const TICKET_VIEW_SIZE: usize = 0xD8;
pub const CONTENT_ACCESS_MASK_SIZE: usize = 0x40;

// TMD payload
pub const TMD_HEADER_SIZE: usize = 0xA4;
pub const TMD_CONTENT_SIZE: usize = 0x24;
pub const TMD_SYS_VERSION_OFFSET: usize = 0x44;
pub const TMD_TITLE_ID_OFFSET: usize = 0x4C;
pub const TMD_TITLE_VERSION_OFFSET: usize = 0x9C;
pub const TMD_NUM_CONTENTS_OFFSET: usize = 0x9E;
pub const TMD_FILL_OFFSET: usize = 0xA2; // Forging search field

// TMD view (unsigned projection)
pub const TMD_VIEW_HEADER_SIZE: usize = 0x5C;
pub const TMD_VIEW_CONTENT_SIZE: usize = 0x10;

// Content type bits
pub const CONTENT_TYPE_NORMAL: u16 = 0x0001;
pub const CONTENT_TYPE_SHARED: u16 = 0x8000;

// Shared content map record: filename[8] + sha1
pub const SHARED_CONTENT_NAME_SIZE: usize = 8;
pub const SHARED_CONTENT_RECORD_SIZE: usize = SHARED_CONTENT_NAME_SIZE + SHA1_SIZE;

// Build tag trailer
pub const BUILD_TAG_SIZE: usize = 0x40;
pub const BUILD_TAG_MAGIC: u32 = 0x1EE7_C105;
pub const BUILD_TAG_VERSION: u32 = 1;

// Title ID categories
pub const TITLE_CATEGORY_SYSTEM: u32 = 0x0000_0001;

// Error sentinels (negative, distinct from title manager codes)
pub const ERR_ALLOCATION: i32 = -1;
pub const ERR_CORRUPT_CONTENT_MAP: i32 = -996;
pub const ERR_BUILD_TAG: i32 = -997;
pub const ERR_FORGE_EXHAUSTED: i32 = -998;
pub const ERR_INVALID: i32 = -1017;
pub const FS_ENOENT: i32 = -106;
