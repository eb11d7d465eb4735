// titlekit/src/es/stub.rs
// Stub classifier: is an installed system module real, or a placeholder?

use log::{debug, warn};
use serde::Serialize;
use std::fmt;

use super::backends::TitleManager;
use super::defaults::{
    BOOT2_LATE_GENERATION, KNOWN_STUB_IOS, KNOWN_STUB_MIN_REVISION, LATE_BOOT2_MIN_REVISION,
    LATE_BOOT2_STUB_IOS,
};
use super::title::TitleStore;
use super::title_id::TitleId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IosClass {
    Stub,
    Active,
}

impl fmt::Display for IosClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IosClass::Stub => f.pad("stub"),
            IosClass::Active => f.pad("active"),
        }
    }
}

/// Which rule decided the classification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StubReason {
    /// Always a stub on late boot2 consoles
    KnownStub,
    /// TMD view could not be fetched
    Unqueryable,
    /// Late boot2 console and revision below the working one
    LateBoot2Revision,
    /// Known stub module below its first working revision
    KnownStubRevision,
    /// Revision low byte 0 with the placeholder content layout
    StubLayout,
    /// Revision low byte 0, any other layout
    ZeroRevision,
    /// Nonzero revision
    Revision,
}

impl StubReason {
    pub fn class(self) -> IosClass {
        match self {
            StubReason::KnownStub
            | StubReason::Unqueryable
            | StubReason::LateBoot2Revision
            | StubReason::KnownStubRevision
            | StubReason::StubLayout => IosClass::Stub,
            StubReason::ZeroRevision | StubReason::Revision => IosClass::Active,
        }
    }
}

/// Classify system module `ios` on a console with boot2 `boot2_version`,
/// reporting the rule that decided it. First matching rule wins.
pub fn classify_ios_with_reason<M: TitleManager>(
    store: &TitleStore<M>,
    boot2_version: u32,
    ios: u8,
) -> StubReason {
    let late_boot2 = boot2_version >= BOOT2_LATE_GENERATION;

    if late_boot2 && KNOWN_STUB_IOS.contains(&ios) {
        debug!("IOS{ios}: always a stub on boot2 v{boot2_version}");
        return StubReason::KnownStub;
    }

    let view = match store.tmd_view(TitleId::system(ios as u32)) {
        Ok(view) => view,
        Err(e) => {
            warn!("⚠️ IOS{ios}: TMD view unavailable ({e}), treating as stub");
            return StubReason::Unqueryable;
        }
    };
    let revision = view.revision_low();

    if late_boot2 && LATE_BOOT2_STUB_IOS.contains(&ios) && revision < LATE_BOOT2_MIN_REVISION {
        debug!("IOS{ios}: revision {revision} too old for boot2 v{boot2_version}");
        return StubReason::LateBoot2Revision;
    }

    if KNOWN_STUB_IOS.contains(&ios) && revision < KNOWN_STUB_MIN_REVISION {
        debug!("IOS{ios}: revision {revision} predates a working build");
        return StubReason::KnownStubRevision;
    }

    if revision == 0 {
        if view.has_stub_layout() {
            debug!("IOS{ios}: revision 0 with placeholder content layout");
            return StubReason::StubLayout;
        }
        return StubReason::ZeroRevision;
    }

    StubReason::Revision
}

pub fn classify_ios<M: TitleManager>(store: &TitleStore<M>, boot2_version: u32, ios: u8) -> IosClass {
    classify_ios_with_reason(store, boot2_version, ios).class()
}
