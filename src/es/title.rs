// titlekit/src/es/title.rs
// Title metadata retrieval: every read is count/size first, then a fill into
// a buffer this layer reserves and hands to the caller

use log::{debug, info};
use std::mem::size_of;

use super::backends::{Storage, TitleManager};
use super::constants::TICKET_VIEW_SIZE;
use super::defaults::{CERT_STORE_LEN, CERT_STORE_PATH, IOS_MAX, IOS_MIN};
use super::signature::SignedBlob;
use super::ticket::TicketView;
use super::title_id::TitleId;
use super::tmd::{Tmd, TmdView};
use crate::exceptions::{Result, TitleError};

/// Reserve a buffer of `len` elements, reporting failure instead of aborting
pub(crate) fn alloc_buffer<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| TitleError::Allocation {
            requested: len.saturating_mul(size_of::<T>()),
        })?;
    buf.resize(len, value);
    Ok(buf)
}

/// Read access to installed titles through a [`TitleManager`]
#[derive(Debug)]
pub struct TitleStore<M: TitleManager> {
    manager: M,
}

impl<M: TitleManager> TitleStore<M> {
    pub fn new(manager: M) -> Self {
        TitleStore { manager }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// Every installed title, in the order the manager reports them
    pub fn list_titles(&self) -> Result<Vec<TitleId>> {
        let count = self.manager.num_titles()? as usize;
        let mut titles = alloc_buffer(count, TitleId(0))?;
        self.manager.read_titles(&mut titles)?;
        debug!("Listed {} installed titles", titles.len());
        Ok(titles)
    }

    /// Ticket views installed for `tid`
    pub fn ticket_views(&self, tid: TitleId) -> Result<Vec<TicketView>> {
        let count = self.manager.num_ticket_views(tid)? as usize;
        let mut buf = alloc_buffer(count.saturating_mul(TICKET_VIEW_SIZE), 0u8)?;
        self.manager.read_ticket_views(tid, &mut buf)?;

        buf.chunks_exact(TICKET_VIEW_SIZE)
            .map(TicketView::unpack)
            .collect()
    }

    /// Stored signed TMD, ready to hand to the forging engine
    pub fn tmd(&self, tid: TitleId) -> Result<SignedBlob> {
        let size = self.manager.stored_tmd_size(tid)? as usize;
        let mut buf = alloc_buffer(size, 0u8)?;
        self.manager.read_stored_tmd(tid, &mut buf)?;
        SignedBlob::from_bytes(buf)
    }

    /// Unsigned TMD view
    pub fn tmd_view(&self, tid: TitleId) -> Result<TmdView> {
        let size = self.manager.tmd_view_size(tid)? as usize;
        let mut buf = alloc_buffer(size, 0u8)?;
        self.manager.read_tmd_view(tid, &mut buf)?;
        TmdView::unpack(&buf)
    }

    fn tmd_payload(&self, tid: TitleId) -> Result<Tmd> {
        let blob = self.tmd(tid)?;
        Tmd::unpack(blob.payload())
    }

    /// Title version from the stored TMD (fetched on every call)
    pub fn title_version(&self, tid: TitleId) -> Result<u16> {
        Ok(self.tmd_payload(tid)?.title_version)
    }

    /// System version from the stored TMD (fetched on every call)
    pub fn sys_version(&self, tid: TitleId) -> Result<u64> {
        Ok(self.tmd_payload(tid)?.sys_version)
    }

    /// Sum of all content sizes
    pub fn installed_size(&self, tid: TitleId) -> Result<u64> {
        self.tmd_payload(tid)?.installed_size()
    }

    /// Low byte of every installed system module in [3, 255], in listing
    /// order. No sorting, no deduplication.
    pub fn ios_versions(&self) -> Result<Vec<u8>> {
        let titles = self.list_titles()?;
        let versions: Vec<u8> = titles
            .iter()
            .filter(|tid| tid.is_system() && (IOS_MIN..=IOS_MAX).contains(&tid.id()))
            .map(|tid| (tid.id() & 0xFF) as u8)
            .collect();

        info!(
            "📋 Found {} system modules among {} titles",
            versions.len(),
            titles.len()
        );
        Ok(versions)
    }
}

/// Leading certificate chain from the system certificate store
pub fn read_certs(storage: &dyn Storage) -> Result<Vec<u8>> {
    let mut certs = storage.read_file(CERT_STORE_PATH)?;
    if certs.len() < CERT_STORE_LEN {
        return Err(TitleError::Malformed(format!(
            "{} is {} bytes, expected at least {}",
            CERT_STORE_PATH,
            certs.len(),
            CERT_STORE_LEN
        )));
    }
    certs.truncate(CERT_STORE_LEN);
    Ok(certs)
}
