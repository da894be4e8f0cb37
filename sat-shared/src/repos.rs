//! Red Hat repository sets used to build RHEL installation content.

use std::{fmt::Display, str::FromStr};

pub const DEFAULT_ARCHITECTURE: &str = "x86_64";

/// How to find one Red Hat repository inside the subscription catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoDefinition {
    pub key: &'static str,
    pub product: &'static str,
    pub reposet: &'static str,
    pub name: &'static str,
    /// Release version passed when enabling. For kickstart trees this is the
    /// exact OS minor release.
    pub releasever: &'static str,
}

const RHEL_PRODUCT: &str = "Red Hat Enterprise Linux for x86_64";
const RHEL7_PRODUCT: &str = "Red Hat Enterprise Linux Server";

static KICKSTART_REPOS: &[RepoDefinition] = &[
    RepoDefinition {
        key: "rhel7",
        product: RHEL7_PRODUCT,
        reposet: "Red Hat Enterprise Linux 7 Server (Kickstart)",
        name: "Red Hat Enterprise Linux 7 Server Kickstart x86_64 7.9",
        releasever: "7.9",
    },
    RepoDefinition {
        key: "rhel8_bos",
        product: RHEL_PRODUCT,
        reposet: "Red Hat Enterprise Linux 8 for x86_64 - BaseOS (Kickstart)",
        name: "Red Hat Enterprise Linux 8 for x86_64 - BaseOS Kickstart 8.10",
        releasever: "8.10",
    },
    RepoDefinition {
        key: "rhel8_aps",
        product: RHEL_PRODUCT,
        reposet: "Red Hat Enterprise Linux 8 for x86_64 - AppStream (Kickstart)",
        name: "Red Hat Enterprise Linux 8 for x86_64 - AppStream Kickstart 8.10",
        releasever: "8.10",
    },
    RepoDefinition {
        key: "rhel9_bos",
        product: RHEL_PRODUCT,
        reposet: "Red Hat Enterprise Linux 9 for x86_64 - BaseOS (Kickstart)",
        name: "Red Hat Enterprise Linux 9 for x86_64 - BaseOS Kickstart 9.5",
        releasever: "9.5",
    },
    RepoDefinition {
        key: "rhel9_aps",
        product: RHEL_PRODUCT,
        reposet: "Red Hat Enterprise Linux 9 for x86_64 - AppStream (Kickstart)",
        name: "Red Hat Enterprise Linux 9 for x86_64 - AppStream Kickstart 9.5",
        releasever: "9.5",
    },
];

static CONTENT_REPOS: &[RepoDefinition] = &[
    RepoDefinition {
        key: "rhel7",
        product: RHEL7_PRODUCT,
        reposet: "Red Hat Enterprise Linux 7 Server (RPMs)",
        name: "Red Hat Enterprise Linux 7 Server RPMs x86_64 7Server",
        releasever: "7Server",
    },
    RepoDefinition {
        key: "rhel8_bos",
        product: RHEL_PRODUCT,
        reposet: "Red Hat Enterprise Linux 8 for x86_64 - BaseOS (RPMs)",
        name: "Red Hat Enterprise Linux 8 for x86_64 - BaseOS RPMs 8",
        releasever: "8",
    },
    RepoDefinition {
        key: "rhel8_aps",
        product: RHEL_PRODUCT,
        reposet: "Red Hat Enterprise Linux 8 for x86_64 - AppStream (RPMs)",
        name: "Red Hat Enterprise Linux 8 for x86_64 - AppStream RPMs 8",
        releasever: "8",
    },
    RepoDefinition {
        key: "rhel9_bos",
        product: RHEL_PRODUCT,
        reposet: "Red Hat Enterprise Linux 9 for x86_64 - BaseOS (RPMs)",
        name: "Red Hat Enterprise Linux 9 for x86_64 - BaseOS RPMs 9",
        releasever: "9",
    },
    RepoDefinition {
        key: "rhel9_aps",
        product: RHEL_PRODUCT,
        reposet: "Red Hat Enterprise Linux 9 for x86_64 - AppStream (RPMs)",
        name: "Red Hat Enterprise Linux 9 for x86_64 - AppStream RPMs 9",
        releasever: "9",
    },
];

pub fn kickstart_repo(key: &str) -> Option<&'static RepoDefinition> {
    KICKSTART_REPOS.iter().find(|r| r.key == key)
}

pub fn content_repo(key: &str) -> Option<&'static RepoDefinition> {
    CONTENT_REPOS.iter().find(|r| r.key == key)
}

/// RHEL 7 and older ship one repo set; newer majors split BaseOS and AppStream.
pub fn repo_keys_for(rhel_version: u32) -> Vec<String> {
    if rhel_version <= 7 {
        vec![format!("rhel{rhel_version}")]
    } else {
        vec![
            format!("rhel{rhel_version}_bos"),
            format!("rhel{rhel_version}_aps"),
        ]
    }
}

/// Key of the kickstart tree that pins the installed OS release.
pub fn os_release_key(rhel_version: u32) -> String {
    if rhel_version == 7 {
        format!("rhel{rhel_version}")
    } else {
        format!("rhel{rhel_version}_bos")
    }
}

/// `major.minor` release such as `8.10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsRelease {
    pub major: u32,
    pub minor: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid OS release '{0}', expected MAJOR.MINOR")]
pub struct InvalidOsRelease(pub String);

impl FromStr for OsRelease {
    type Err = InvalidOsRelease;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidOsRelease(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl Display for OsRelease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
