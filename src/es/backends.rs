// titlekit/src/es/backends.rs
// Collaborator traits (title manager, storage, key bank) and the
// directory-backed implementations used against a NAND dump

use anyhow::Context;
use glob::glob;
use log::{debug, trace};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::constants::{ERR_INVALID, FS_ENOENT, SIG_TAG_SIZE, TICKET_SIZE, TICKET_VIEW_SIZE};
use super::defaults::TMD_FILE_NAME;
use super::layout::read_u32;
use super::signature::{SignatureType, SignedBlob};
use super::ticket::{Ticket, TicketView};
use super::title_id::TitleId;
use super::tmd::{Tmd, TmdView};
use crate::exceptions::{Result, TitleError};

/// The platform title manager. Every call may block; every buffer is sized
/// and owned by the caller.
pub trait TitleManager {
    /// Number of installed titles
    fn num_titles(&self) -> Result<u32>;

    /// Fill `out` with installed title IDs
    fn read_titles(&self, out: &mut [TitleId]) -> Result<()>;

    /// Number of ticket views installed for `tid`
    fn num_ticket_views(&self, tid: TitleId) -> Result<u32>;

    /// Fill `out` with packed ticket views (`TICKET_VIEW_SIZE` each)
    fn read_ticket_views(&self, tid: TitleId, out: &mut [u8]) -> Result<()>;

    /// Size of the stored signed TMD
    fn stored_tmd_size(&self, tid: TitleId) -> Result<u32>;

    /// Fill `out` with the stored signed TMD
    fn read_stored_tmd(&self, tid: TitleId, out: &mut [u8]) -> Result<()>;

    /// Size of the unsigned TMD view
    fn tmd_view_size(&self, tid: TitleId) -> Result<u32>;

    /// Fill `out` with the packed TMD view
    fn read_tmd_view(&self, tid: TitleId, out: &mut [u8]) -> Result<()>;
}

impl<T: TitleManager + ?Sized> TitleManager for &T {
    fn num_titles(&self) -> Result<u32> {
        (**self).num_titles()
    }
    fn read_titles(&self, out: &mut [TitleId]) -> Result<()> {
        (**self).read_titles(out)
    }
    fn num_ticket_views(&self, tid: TitleId) -> Result<u32> {
        (**self).num_ticket_views(tid)
    }
    fn read_ticket_views(&self, tid: TitleId, out: &mut [u8]) -> Result<()> {
        (**self).read_ticket_views(tid, out)
    }
    fn stored_tmd_size(&self, tid: TitleId) -> Result<u32> {
        (**self).stored_tmd_size(tid)
    }
    fn read_stored_tmd(&self, tid: TitleId, out: &mut [u8]) -> Result<()> {
        (**self).read_stored_tmd(tid, out)
    }
    fn tmd_view_size(&self, tid: TitleId) -> Result<u32> {
        (**self).tmd_view_size(tid)
    }
    fn read_tmd_view(&self, tid: TitleId, out: &mut [u8]) -> Result<()> {
        (**self).read_tmd_view(tid, out)
    }
}

/// Whole-file reads from persistent storage
pub trait Storage {
    /// Read the file at an absolute NAND path (`/shared1/content.map`)
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
}

impl<T: Storage + ?Sized> Storage for &T {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        (**self).read_file(path)
    }
}

/// Hardware key banks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeySource {
    Otp,
    Seeprom,
}

/// One-time programmable key storage
pub trait KeyBank {
    /// Read up to `buf.len()` bytes at `offset`; returns bytes read
    fn read_key(&self, source: KeySource, offset: u8, buf: &mut [u8]) -> Result<usize>;
}

impl<T: KeyBank + ?Sized> KeyBank for &T {
    fn read_key(&self, source: KeySource, offset: u8, buf: &mut [u8]) -> Result<usize> {
        (**self).read_key(source, offset, buf)
    }
}

/// A NAND dump extracted to a directory
#[derive(Clone, Debug)]
pub struct NandDump {
    root: PathBuf,
}

impl NandDump {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        NandDump {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path of an absolute NAND path
    pub fn resolve(&self, nand_path: &str) -> PathBuf {
        self.root.join(nand_path.trim_start_matches('/'))
    }

    pub fn tmd_path(&self, tid: TitleId) -> PathBuf {
        self.resolve(&format!(
            "/title/{:08x}/{:08x}/content/{}",
            tid.category(),
            tid.id(),
            TMD_FILE_NAME
        ))
    }

    pub fn ticket_path(&self, tid: TitleId) -> PathBuf {
        self.resolve(&format!(
            "/ticket/{:08x}/{:08x}.tik",
            tid.category(),
            tid.id()
        ))
    }

    /// Installed titles, sorted by title ID
    pub fn scan_titles(&self) -> Result<Vec<TitleId>> {
        let timer = Instant::now();
        let pattern = self.root.join("title/*/*/content").join(TMD_FILE_NAME);
        let pattern = pattern.to_string_lossy();

        let mut titles = Vec::new();
        for entry in glob(&pattern).map_err(|e| TitleError::Generic(e.to_string()))? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    debug!("Skipping unreadable title entry: {e}");
                    continue;
                }
            };
            if let Some(tid) = title_id_from_tmd_path(&path) {
                titles.push(tid);
            }
        }
        titles.sort();

        trace!(
            "📂 Scanned {} titles under {} in {:?}",
            titles.len(),
            self.root.display(),
            timer.elapsed()
        );
        Ok(titles)
    }

    fn read_tmd_blob(&self, tid: TitleId) -> Result<Vec<u8>> {
        fs::read(self.tmd_path(tid)).map_err(|e| manager_error(&e.kind()))
    }

    fn tmd_view_bytes(&self, tid: TitleId) -> Result<Vec<u8>> {
        let blob = SignedBlob::from_bytes(self.read_tmd_blob(tid)?)?;
        let tmd = Tmd::unpack(blob.payload())?;
        TmdView::from(&tmd).pack()
    }

    fn ticket_views(&self, tid: TitleId) -> Result<Vec<TicketView>> {
        let bytes = match fs::read(self.ticket_path(tid)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(split_tickets(&bytes)?
            .iter()
            .enumerate()
            .map(|(i, ticket)| TicketView::from_ticket(i as u32, ticket))
            .collect())
    }
}

/// Title ID from `.../title/<hi>/<lo>/content/title.tmd`
fn title_id_from_tmd_path(path: &Path) -> Option<TitleId> {
    let lo_dir = path.parent()?.parent()?;
    let hi_dir = lo_dir.parent()?;
    let lo = u32::from_str_radix(lo_dir.file_name()?.to_str()?, 16).ok()?;
    let hi = u32::from_str_radix(hi_dir.file_name()?.to_str()?, 16).ok()?;
    Some(TitleId::new(hi, lo))
}

/// Tickets in a `.tik` file are concatenated signed blobs
pub fn split_tickets(mut bytes: &[u8]) -> Result<Vec<Ticket>> {
    let mut tickets = Vec::new();
    while !bytes.is_empty() {
        if bytes.len() < SIG_TAG_SIZE {
            return Err(TitleError::Malformed(format!(
                "ticket {} truncated: {} trailing bytes",
                tickets.len(),
                bytes.len()
            )));
        }
        let header = SignatureType::from_tag(read_u32(bytes, 0))?.header_size();
        let end = header + TICKET_SIZE;
        if bytes.len() < end {
            return Err(TitleError::Malformed(format!(
                "ticket {} truncated: {} bytes, {} needed",
                tickets.len(),
                bytes.len(),
                end
            )));
        }
        tickets.push(Ticket::unpack(&bytes[header..end])?);
        bytes = &bytes[end..];
    }
    Ok(tickets)
}

/// Map a host I/O error onto the code the title manager would report
fn manager_error(kind: &ErrorKind) -> TitleError {
    match kind {
        ErrorKind::NotFound => TitleError::Manager(FS_ENOENT),
        _ => TitleError::Manager(ERR_INVALID),
    }
}

fn copy_exact(src: &[u8], out: &mut [u8]) -> Result<()> {
    if src.len() != out.len() {
        return Err(TitleError::Manager(ERR_INVALID));
    }
    out.copy_from_slice(src);
    Ok(())
}

fn size_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| TitleError::Manager(ERR_INVALID))
}

impl TitleManager for NandDump {
    fn num_titles(&self) -> Result<u32> {
        size_u32(self.scan_titles()?.len())
    }

    fn read_titles(&self, out: &mut [TitleId]) -> Result<()> {
        let titles = self.scan_titles()?;
        if titles.len() < out.len() {
            return Err(TitleError::Manager(ERR_INVALID));
        }
        out.copy_from_slice(&titles[..out.len()]);
        Ok(())
    }

    fn num_ticket_views(&self, tid: TitleId) -> Result<u32> {
        size_u32(self.ticket_views(tid)?.len())
    }

    fn read_ticket_views(&self, tid: TitleId, out: &mut [u8]) -> Result<()> {
        let views = self.ticket_views(tid)?;
        if out.len() != views.len() * TICKET_VIEW_SIZE {
            return Err(TitleError::Manager(ERR_INVALID));
        }
        for (view, chunk) in views.iter().zip(out.chunks_exact_mut(TICKET_VIEW_SIZE)) {
            chunk.copy_from_slice(&view.pack());
        }
        Ok(())
    }

    fn stored_tmd_size(&self, tid: TitleId) -> Result<u32> {
        let meta = fs::metadata(self.tmd_path(tid)).map_err(|e| manager_error(&e.kind()))?;
        u32::try_from(meta.len()).map_err(|_| TitleError::Manager(ERR_INVALID))
    }

    fn read_stored_tmd(&self, tid: TitleId, out: &mut [u8]) -> Result<()> {
        copy_exact(&self.read_tmd_blob(tid)?, out)
    }

    fn tmd_view_size(&self, tid: TitleId) -> Result<u32> {
        size_u32(self.tmd_view_bytes(tid)?.len())
    }

    fn read_tmd_view(&self, tid: TitleId, out: &mut [u8]) -> Result<()> {
        copy_exact(&self.tmd_view_bytes(tid)?, out)
    }
}

impl Storage for NandDump {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let host = self.resolve(path);
        trace!("Reading {} from {}", path, host.display());
        Ok(fs::read(host)?)
    }
}

/// Key banks dumped to files (`otp.bin`, `seeprom.bin`)
#[derive(Clone, Debug, Default)]
pub struct KeyFiles {
    pub otp: Option<PathBuf>,
    pub seeprom: Option<PathBuf>,
}

impl KeyFiles {
    pub fn new(otp: Option<PathBuf>, seeprom: Option<PathBuf>) -> Self {
        KeyFiles { otp, seeprom }
    }
}

impl KeyBank for KeyFiles {
    fn read_key(&self, source: KeySource, offset: u8, buf: &mut [u8]) -> Result<usize> {
        let path = match source {
            KeySource::Otp => self.otp.as_ref(),
            KeySource::Seeprom => self.seeprom.as_ref(),
        }
        .ok_or_else(|| TitleError::Generic(format!("no {source:?} dump configured")))?;

        let bank = fs::read(path)
            .with_context(|| format!("reading {source:?} dump {}", path.display()))?;
        let start = (offset as usize).min(bank.len());
        let available = &bank[start..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}
