// titlekit/src/es/build_tag.rs
// Build tag trailer that custom system modules carry in their boot content

use log::debug;
use serde::{Serialize, Serializer};

use super::backends::{Storage, TitleManager};
use super::constants::{BUILD_TAG_MAGIC, BUILD_TAG_SIZE, BUILD_TAG_VERSION};
use super::layout::{read_array, read_u32};
use super::title::TitleStore;
use super::title_id::TitleId;
use crate::exceptions::{Result, TitleError};
use crate::utils::c_str;

/// Decoded 64-byte build tag
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildTag {
    /// Custom module version
    pub version: u32,
    /// Stock module the build is based on
    pub base: u32,
    #[serde(serialize_with = "fixed_str")]
    pub name: [u8; 16],
    #[serde(serialize_with = "fixed_str")]
    pub version_string: [u8; 16],
}

fn fixed_str<S: Serializer>(field: &[u8; 16], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&c_str(field))
}

impl BuildTag {
    /// Decode and validate size, magic and format version
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != BUILD_TAG_SIZE {
            return Err(TitleError::InvalidBuildTag(format!(
                "{} bytes, expected {}",
                data.len(),
                BUILD_TAG_SIZE
            )));
        }

        let magic = read_u32(data, 0x00);
        if magic != BUILD_TAG_MAGIC {
            return Err(TitleError::InvalidBuildTag(format!("bad magic {magic:#010x}")));
        }
        let format = read_u32(data, 0x04);
        if format != BUILD_TAG_VERSION {
            return Err(TitleError::InvalidBuildTag(format!(
                "unsupported format version {format}"
            )));
        }

        Ok(BuildTag {
            version: read_u32(data, 0x08),
            base: read_u32(data, 0x0C),
            name: read_array(data, 0x10),
            version_string: read_array(data, 0x20),
        })
    }

    pub fn name(&self) -> String {
        c_str(&self.name)
    }

    pub fn version_string(&self) -> String {
        c_str(&self.version_string)
    }
}

/// NAND path of content `content_id` of system module `ios`
pub fn content_path(ios: u32, content_id: u32) -> String {
    format!("/title/00000001/{ios:08x}/content/{content_id:08x}.app")
}

/// Read the build tag of system module `ios`, reporting why it is absent
pub fn try_read_build_tag<M: TitleManager>(
    store: &TitleStore<M>,
    storage: &dyn Storage,
    ios: u32,
) -> Result<BuildTag> {
    let view = store.tmd_view(TitleId::system(ios))?;
    let boot = view
        .boot_content()
        .ok_or_else(|| TitleError::Malformed(format!("IOS{ios} has no content with index 0")))?;

    let path = content_path(ios, boot.content_id);
    let data = storage.read_file(&path)?;
    BuildTag::parse(&data)
}

/// Build tag of system module `ios`, or `None` for stock modules
pub fn read_build_tag<M: TitleManager>(
    store: &TitleStore<M>,
    storage: &dyn Storage,
    ios: u32,
) -> Option<BuildTag> {
    match try_read_build_tag(store, storage, ios) {
        Ok(tag) => {
            debug!("🏷️ IOS{ios}: {} v{} (base {})", tag.name(), tag.version, tag.base);
            Some(tag)
        }
        Err(e) => {
            debug!("IOS{ios}: no build tag ({e})");
            None
        }
    }
}
