// titlekit/src/es/defaults.rs
// Platform paths, key locations and the fixed system-module tables

// =================================
// NAND paths
// =================================
pub const SHARED_CONTENT_MAP_PATH: &str = "/shared1/content.map";
pub const SHARED_CONTENT_DIR: &str = "/shared1";
pub const CERT_STORE_PATH: &str = "/sys/cert.sys";
pub const CERT_STORE_LEN: usize = 0x280;
pub const TMD_FILE_NAME: &str = "title.tmd";

// =================================
// Key material
// =================================
/// Offset of the platform common key in OTP bank 0 (after the boot1 hash)
pub const OTP_COMMON_KEY_OFFSET: u8 = 0x14;

/// Offset of the Korean common key in the SEEPROM
pub const SEEPROM_KOREAN_KEY_OFFSET: u8 = 0x74;

/// Derived (vWii) common key, encrypted under the platform common key
pub const VWII_COMMON_KEY_ENC: [u8; 16] = [
    0x6e, 0x18, 0xdb, 0x23, 0x84, 0x7c, 0xba, 0x6c, 0x19, 0x31, 0xa4, 0x17, 0x9b, 0xaf, 0x8e, 0x09,
];

/// Probe vector for the Korean key and the plaintext it decrypts to
pub const KOREAN_KEY_PROBE: [u8; 16] = [
    0x56, 0x52, 0x6f, 0x63, 0xa1, 0x2c, 0xd1, 0x32, 0x07, 0x99, 0x82, 0x3b, 0x1b, 0x08, 0x17, 0xd0,
];
pub const KOREAN_KEY_PROBE_PLAIN: &[u8; 16] = b"thepikachugamer\0";

// =================================
// System module (IOS) range
// =================================
pub const IOS_MIN: u32 = 3;
pub const IOS_MAX: u32 = 255;

// =================================
// Stub classification tables
// =================================
/// boot2 generation from which the late-boot2 rules apply
pub const BOOT2_LATE_GENERATION: u32 = 5;

/// Modules that are always stubs on late-boot2 consoles, and that are stubs
/// on any console while their revision low byte is below
/// `KNOWN_STUB_MIN_REVISION`
pub const KNOWN_STUB_IOS: &[u8] = &[202, 222, 223, 224];
pub const KNOWN_STUB_MIN_REVISION: u8 = 4;

/// Modules that are stubs on late-boot2 consoles below revision 18
pub const LATE_BOOT2_STUB_IOS: &[u8] = &[249, 250];
pub const LATE_BOOT2_MIN_REVISION: u8 = 18;

/// Content type layout of a placeholder module: own content, two shared
pub const STUB_CONTENT_LAYOUT: [u16; 3] = [0x0001, 0x8001, 0x8001];
