//! High-level API for titlekit operations

use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::es::build_tag::{BuildTag, read_build_tag};
use crate::es::forge::{ContainerKind, fakesign, is_fakesigned};
use crate::es::shared::SharedContentMap;
use crate::es::signature::{SignatureType, SignedBlob};
use crate::es::stub::{IosClass, StubReason, classify_ios_with_reason};
use crate::es::{KeyContext, KeyFiles, NandDump, TitleId, TitleStore};
use crate::exceptions::{Result, TitleError};

/// Options for opening a console dump
#[derive(Debug, Default)]
pub struct ConsoleOptions {
    /// Root of the extracted NAND
    pub nand_root: PathBuf,
    /// OTP dump (`otp.bin`)
    pub otp: Option<PathBuf>,
    /// SEEPROM dump (`seeprom.bin`)
    pub seeprom: Option<PathBuf>,
    /// boot2 version of the console
    pub boot2_version: u32,
}

/// One row of `titles`
#[derive(Debug, Serialize)]
pub struct TitleSummary {
    pub title_id: TitleId,
    pub title_version: u16,
    pub installed_size: u64,
    pub ticket_views: usize,
}

/// Classification of one installed system module
#[derive(Debug, Serialize)]
pub struct IosReport {
    pub ios: u8,
    pub class: IosClass,
    pub reason: StubReason,
    pub build_tag: Option<BuildTag>,
}

/// Result of fakesigning a file
#[derive(Debug, Serialize)]
pub struct ForgeOutcome {
    pub kind: ContainerKind,
    #[serde(serialize_with = "signature_name")]
    pub signature: SignatureType,
    pub fill: u16,
    pub output: PathBuf,
}

fn signature_name<S: serde::Serializer>(
    kind: &SignatureType,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{kind:?}"))
}

/// A console: its NAND dump, its key banks and its boot2 version
#[derive(Debug)]
pub struct Console {
    titles: TitleStore<NandDump>,
    storage: NandDump,
    keys: KeyContext<KeyFiles>,
    boot2_version: u32,
}

impl Console {
    pub fn open(options: ConsoleOptions) -> Result<Self> {
        if !options.nand_root.is_dir() {
            return Err(TitleError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("NAND root {} is not a directory", options.nand_root.display()),
            )));
        }

        let nand = NandDump::new(&options.nand_root);
        info!(
            "📂 Opened NAND dump {} (boot2 v{})",
            nand.root().display(),
            options.boot2_version
        );

        Ok(Console {
            titles: TitleStore::new(nand.clone()),
            storage: nand,
            keys: KeyContext::new(KeyFiles::new(options.otp, options.seeprom)),
            boot2_version: options.boot2_version,
        })
    }

    pub fn titles(&self) -> &TitleStore<NandDump> {
        &self.titles
    }

    pub fn storage(&self) -> &NandDump {
        &self.storage
    }

    pub fn keys(&self) -> &KeyContext<KeyFiles> {
        &self.keys
    }

    pub fn keys_mut(&mut self) -> &mut KeyContext<KeyFiles> {
        &mut self.keys
    }

    pub fn boot2_version(&self) -> u32 {
        self.boot2_version
    }

    /// Version, size and ticket count of every installed title
    pub fn title_summaries(&self) -> Result<Vec<TitleSummary>> {
        self.titles
            .list_titles()?
            .into_iter()
            .map(|tid| {
                Ok(TitleSummary {
                    title_id: tid,
                    title_version: self.titles.title_version(tid)?,
                    installed_size: self.titles.installed_size(tid)?,
                    ticket_views: self.titles.ticket_views(tid)?.len(),
                })
            })
            .collect()
    }

    pub fn classify(&self, ios: u8) -> StubReason {
        classify_ios_with_reason(&self.titles, self.boot2_version, ios)
    }

    pub fn build_tag(&self, ios: u8) -> Option<BuildTag> {
        read_build_tag(&self.titles, &self.storage, ios as u32)
    }

    /// Classification and build tag of every installed system module, in
    /// enumeration order
    pub fn ios_report(&self) -> Result<Vec<IosReport>> {
        let report: Vec<IosReport> = self
            .titles
            .ios_versions()?
            .into_iter()
            .map(|ios| {
                let reason = self.classify(ios);
                IosReport {
                    ios,
                    class: reason.class(),
                    reason,
                    build_tag: self.build_tag(ios),
                }
            })
            .collect();

        info!(
            "🔍 {} system modules, {} stubs",
            report.len(),
            report.iter().filter(|r| r.class == IosClass::Stub).count()
        );
        Ok(report)
    }

    pub fn shared_content(&self) -> Result<SharedContentMap> {
        SharedContentMap::load(&self.storage)
    }
}

fn resolve_kind(path: &Path, kind: Option<ContainerKind>) -> Result<ContainerKind> {
    kind.or_else(|| ContainerKind::from_path(path)).ok_or_else(|| {
        TitleError::Generic(format!(
            "cannot tell whether {} is a ticket or a TMD; pass --kind",
            path.display()
        ))
    })
}

/// Fakesign a ticket or TMD file, writing the result to `output` (or back in
/// place)
pub fn forge_file(
    path: &Path,
    kind: Option<ContainerKind>,
    output: Option<&Path>,
) -> Result<ForgeOutcome> {
    let kind = resolve_kind(path, kind)?;
    let mut blob = SignedBlob::from_bytes(fs::read(path)?)?;
    let fill = fakesign(&mut blob, kind)?;

    let output = output.unwrap_or(path).to_path_buf();
    fs::write(&output, blob.as_bytes())?;
    info!("✍️ Fakesigned {} -> {}", path.display(), output.display());

    Ok(ForgeOutcome {
        kind,
        signature: blob.signature_type(),
        fill,
        output,
    })
}

/// Whether a ticket or TMD file is fakesigned
pub fn check_file(path: &Path, kind: Option<ContainerKind>) -> Result<bool> {
    let kind = resolve_kind(path, kind)?;
    let blob = SignedBlob::from_bytes(fs::read(path)?)?;
    is_fakesigned(&blob, kind)
}

#[cfg(test)]
mod tests {
    use super::{Console, ConsoleOptions, check_file, forge_file};
    use crate::es::build_tag::content_path;
    use crate::es::forge::ContainerKind;
    use crate::es::signature::{SignatureType, SignedBlob};
    use crate::es::stub::{IosClass, StubReason};
    use crate::es::testing::{sample_ticket, sample_tmd, write_title};
    use crate::es::title_id::TitleId;
    use crate::es::NandDump;
    use crate::exceptions::TitleError;
    use std::fs;
    use std::path::Path;

    fn build_tag_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; 64];
        bytes[0..4].copy_from_slice(&0x1EE7_C105u32.to_be_bytes());
        bytes[4..8].copy_from_slice(&1u32.to_be_bytes());
        bytes[8..12].copy_from_slice(&11u32.to_be_bytes());
        bytes[12..16].copy_from_slice(&56u32.to_be_bytes());
        bytes[0x10..0x13].copy_from_slice(b"d2x");
        bytes
    }

    fn console_fixture(root: &Path, boot2_version: u32) -> Console {
        let nand = NandDump::new(root);
        write_title(&nand, &sample_tmd(TitleId::system(58), 0x1820, &[1, 1]));
        write_title(
            &nand,
            &sample_tmd(TitleId::system(60), 0x1900, &[0x0001, 0x8001, 0x8001]),
        );
        write_title(&nand, &sample_tmd(TitleId::system(249), 0x0011, &[1]));
        write_title(
            &nand,
            &sample_tmd(TitleId::new(0x0001_0002, 0x4841_4141), 0x0002, &[1]),
        );

        let tag = nand.resolve(&content_path(249, 0));
        fs::write(tag, build_tag_bytes()).unwrap();

        Console::open(ConsoleOptions {
            nand_root: root.to_path_buf(),
            boot2_version,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_open_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = Console::open(ConsoleOptions {
            nand_root: dir.path().join("missing"),
            ..Default::default()
        });
        assert_eq!(result.unwrap_err().code(), -106);
    }

    #[test]
    fn test_ios_report() {
        let dir = tempfile::tempdir().unwrap();
        let console = console_fixture(dir.path(), 4);

        let report = console.ios_report().unwrap();
        let ios: Vec<u8> = report.iter().map(|r| r.ios).collect();
        assert_eq!(ios, vec![58, 60, 249]);

        assert_eq!(report[0].class, IosClass::Active);
        assert_eq!(report[1].reason, StubReason::StubLayout);
        let tag = report[2].build_tag.as_ref().unwrap();
        assert_eq!((tag.version, tag.base), (11, 56));
        assert!(report[0].build_tag.is_none());

        // Same dump on a late boot2: IOS249 revision 17 is below 18
        let late = console_fixture(dir.path(), 5);
        assert_eq!(late.classify(249), StubReason::LateBoot2Revision);
    }

    #[test]
    fn test_title_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let console = console_fixture(dir.path(), 4);
        let summaries = console.title_summaries().unwrap();
        assert_eq!(summaries.len(), 4);
        assert_eq!(summaries[0].title_id, TitleId::system(58));
        assert_eq!(summaries[0].installed_size, 0x300);
        assert_eq!(summaries[0].ticket_views, 0);
    }

    #[test]
    fn test_title_summaries_reject_overflowing_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let console = console_fixture(dir.path(), 4);
        let mut tmd = sample_tmd(TitleId::system(80), 0x1F00, &[1, 1]);
        for content in &mut tmd.contents {
            content.size = u64::MAX;
        }
        write_title(console.storage(), &tmd);

        let err = console.title_summaries().unwrap_err();
        assert!(matches!(err, TitleError::Malformed(_)));
        assert_eq!(err.code(), -1017);
    }

    #[test]
    fn test_forge_and_check_file() {
        let dir = tempfile::tempdir().unwrap();
        let tik = dir.path().join("cetk.tik");
        let blob = SignedBlob::new(SignatureType::Rsa2048, &sample_ticket(TitleId::system(58)).pack());
        fs::write(&tik, blob.as_bytes()).unwrap();

        let out = dir.path().join("forged.bin");
        let outcome = forge_file(&tik, None, Some(&out)).unwrap();
        assert_eq!(outcome.kind, ContainerKind::Ticket);
        assert!(check_file(&out, Some(ContainerKind::Ticket)).unwrap());

        // Unknown extension needs an explicit kind
        assert!(check_file(&out, None).is_err());
    }
}
