// titlekit/src/es/testing.rs
// In-memory collaborators and fixtures for unit tests

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::backends::{KeyBank, KeySource, NandDump, Storage, TitleManager};
use super::constants::{ERR_INVALID, FS_ENOENT, TICKET_VIEW_SIZE};
use super::signature::{SignatureType, SignedBlob};
use super::ticket::{Ticket, TicketView};
use super::title_id::TitleId;
use super::tmd::{ContentRecord, Tmd, TmdView};
use crate::exceptions::{Result, TitleError};

const BANK_SIZE: usize = 0x100;

/// OTP and SEEPROM banks held in memory; an absent bank fails every read
#[derive(Default)]
pub struct MemoryKeyBank {
    otp: Option<Vec<u8>>,
    seeprom: Option<Vec<u8>>,
    otp_reads: AtomicUsize,
    seeprom_reads: AtomicUsize,
}

impl MemoryKeyBank {
    pub fn with_otp_key(offset: u8, key: [u8; 16]) -> Self {
        let mut otp = vec![0u8; BANK_SIZE];
        otp[offset as usize..offset as usize + 16].copy_from_slice(&key);
        MemoryKeyBank {
            otp: Some(otp),
            ..Default::default()
        }
    }

    pub fn seeprom_key(&mut self, offset: u8, key: [u8; 16]) {
        let bank = self.seeprom.get_or_insert_with(|| vec![0u8; BANK_SIZE]);
        bank[offset as usize..offset as usize + 16].copy_from_slice(&key);
    }

    pub fn reads(&self, source: KeySource) -> usize {
        match source {
            KeySource::Otp => self.otp_reads.load(Ordering::SeqCst),
            KeySource::Seeprom => self.seeprom_reads.load(Ordering::SeqCst),
        }
    }
}

impl KeyBank for MemoryKeyBank {
    fn read_key(&self, source: KeySource, offset: u8, buf: &mut [u8]) -> Result<usize> {
        let bank = match source {
            KeySource::Otp => {
                self.otp_reads.fetch_add(1, Ordering::SeqCst);
                self.otp.as_ref()
            }
            KeySource::Seeprom => {
                self.seeprom_reads.fetch_add(1, Ordering::SeqCst);
                self.seeprom.as_ref()
            }
        }
        .ok_or_else(|| TitleError::Generic(format!("{source:?} bank not present")))?;

        let available = &bank[(offset as usize).min(bank.len())..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}

/// Title manager over in-memory TMDs and tickets, with failure injection
#[derive(Default)]
pub struct MemoryTitleManager {
    titles: Vec<TitleId>,
    tmds: HashMap<TitleId, Tmd>,
    tickets: HashMap<TitleId, Vec<Ticket>>,
    failing_views: HashSet<TitleId>,
    fail_listing: Option<i32>,
    view_fetches: Cell<usize>,
}

impl MemoryTitleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a title; the listing keeps insertion order
    pub fn install(&mut self, tmd: Tmd) {
        self.titles.push(tmd.title_id);
        self.tmds.insert(tmd.title_id, tmd);
    }

    /// List a title without any metadata behind it
    pub fn list_only(&mut self, tid: TitleId) {
        self.titles.push(tid);
    }

    pub fn add_ticket(&mut self, ticket: Ticket) {
        self.tickets.entry(ticket.title_id).or_default().push(ticket);
    }

    pub fn fail_view(&mut self, tid: TitleId) {
        self.failing_views.insert(tid);
    }

    pub fn fail_listing(&mut self, code: i32) {
        self.fail_listing = Some(code);
    }

    pub fn view_fetches(&self) -> usize {
        self.view_fetches.get()
    }

    fn tmd(&self, tid: TitleId) -> Result<&Tmd> {
        self.tmds.get(&tid).ok_or(TitleError::Manager(FS_ENOENT))
    }

    fn signed_tmd(&self, tid: TitleId) -> Result<Vec<u8>> {
        Ok(SignedBlob::new(SignatureType::Rsa2048, &self.tmd(tid)?.pack()?).into_bytes())
    }

    fn view_bytes(&self, tid: TitleId) -> Result<Vec<u8>> {
        if self.failing_views.contains(&tid) {
            return Err(TitleError::Manager(ERR_INVALID));
        }
        TmdView::from(self.tmd(tid)?).pack()
    }
}

fn fill(src: &[u8], out: &mut [u8]) -> Result<()> {
    if src.len() != out.len() {
        return Err(TitleError::Manager(ERR_INVALID));
    }
    out.copy_from_slice(src);
    Ok(())
}

impl TitleManager for MemoryTitleManager {
    fn num_titles(&self) -> Result<u32> {
        match self.fail_listing {
            Some(code) => Err(TitleError::Manager(code)),
            None => Ok(self.titles.len() as u32),
        }
    }

    fn read_titles(&self, out: &mut [TitleId]) -> Result<()> {
        if out.len() > self.titles.len() {
            return Err(TitleError::Manager(ERR_INVALID));
        }
        out.copy_from_slice(&self.titles[..out.len()]);
        Ok(())
    }

    fn num_ticket_views(&self, tid: TitleId) -> Result<u32> {
        Ok(self.tickets.get(&tid).map_or(0, Vec::len) as u32)
    }

    fn read_ticket_views(&self, tid: TitleId, out: &mut [u8]) -> Result<()> {
        let packed: Vec<u8> = self
            .tickets
            .get(&tid)
            .into_iter()
            .flatten()
            .enumerate()
            .flat_map(|(i, t)| TicketView::from_ticket(i as u32, t).pack())
            .collect();
        debug_assert_eq!(packed.len() % TICKET_VIEW_SIZE, 0);
        fill(&packed, out)
    }

    fn stored_tmd_size(&self, tid: TitleId) -> Result<u32> {
        Ok(self.signed_tmd(tid)?.len() as u32)
    }

    fn read_stored_tmd(&self, tid: TitleId, out: &mut [u8]) -> Result<()> {
        fill(&self.signed_tmd(tid)?, out)
    }

    fn tmd_view_size(&self, tid: TitleId) -> Result<u32> {
        self.view_fetches.set(self.view_fetches.get() + 1);
        Ok(self.view_bytes(tid)?.len() as u32)
    }

    fn read_tmd_view(&self, tid: TitleId, out: &mut [u8]) -> Result<()> {
        fill(&self.view_bytes(tid)?, out)
    }
}

/// Files keyed by absolute NAND path
#[derive(Default)]
pub struct MemoryStorage {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, bytes: Vec<u8>) {
        self.files.insert(path.to_string(), bytes);
    }
}

impl Storage for MemoryStorage {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()).into()
        })
    }
}

/// TMD for `tid` with one content per entry in `kinds`
pub fn sample_tmd(tid: TitleId, title_version: u16, kinds: &[u16]) -> Tmd {
    let mut tmd = Tmd {
        title_id: tid,
        title_version,
        sys_version: 0x0000_0001_0000_0024,
        contents: kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| ContentRecord {
                content_id: i as u32,
                index: i as u16,
                kind,
                size: 0x100 * (i as u64 + 1),
                hash: [i as u8 + 1; 20],
            })
            .collect(),
        ..Tmd::default()
    };
    tmd.issuer[..26].copy_from_slice(b"Root-CA00000001-CP00000004");
    tmd
}

pub fn sample_ticket(tid: TitleId) -> Ticket {
    let mut ticket = Ticket {
        ticket_id: 0x0001_0203_0405_0607,
        title_id: tid,
        ..Ticket::default()
    };
    ticket.issuer[..26].copy_from_slice(b"Root-CA00000001-XS00000003");
    ticket
}

/// Write a signed TMD into a NAND dump at the title's content directory
pub fn write_title(nand: &NandDump, tmd: &Tmd) {
    let path = nand.tmd_path(tmd.title_id);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let blob = SignedBlob::new(SignatureType::Rsa2048, &tmd.pack().unwrap());
    fs::write(path, blob.as_bytes()).unwrap();
}
