//! Signed title content: tickets, TMDs, fakesigning, system module
//! classification and shared content

pub mod backends;
pub mod build_tag;
pub mod constants;
pub mod crypto;
pub mod defaults;
pub mod forge;
pub mod keys;
pub(crate) mod layout;
pub mod shared;
pub mod signature;
pub mod stub;
pub mod ticket;
pub mod title;
pub mod title_id;
pub mod tmd;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main operations
pub use build_tag::{BuildTag, read_build_tag};
pub use forge::{ContainerKind, fakesign, fakesign_ticket, fakesign_tmd, is_fakesigned};
pub use shared::{SharedContentMap, is_shared_content_present, load_shared_content_map};
pub use stub::{IosClass, classify_ios};
pub use title::{TitleStore, read_certs};

// Re-export types for advanced usage
pub use backends::{KeyBank, KeyFiles, KeySource, NandDump, Storage, TitleManager};
pub use keys::{CommonKeys, KeyContext};
pub use signature::{SignatureType, SignedBlob};
pub use ticket::{Ticket, TicketView};
pub use title_id::TitleId;
pub use tmd::{ContentRecord, Tmd, TmdView};
