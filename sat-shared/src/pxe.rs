use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Boot firmware / bootloader pairing for a provisioned VM.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PxeLoader {
    #[default]
    Bios,
    Uefi,
    Ipxe,
    HttpUefi,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown PXE loader '{0}' (expected one of: bios, uefi, ipxe, http_uefi)")]
pub struct UnknownPxeLoader(pub String);

impl PxeLoader {
    pub const ALL: [PxeLoader; 4] = [
        PxeLoader::Bios,
        PxeLoader::Uefi,
        PxeLoader::Ipxe,
        PxeLoader::HttpUefi,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PxeLoader::Bios => "bios",
            PxeLoader::Uefi => "uefi",
            PxeLoader::Ipxe => "ipxe",
            PxeLoader::HttpUefi => "http_uefi",
        }
    }

    /// Firmware the broker configures on the VM.
    pub fn vm_firmware(&self) -> &'static str {
        match self {
            PxeLoader::Bios | PxeLoader::Ipxe => "bios",
            PxeLoader::Uefi | PxeLoader::HttpUefi => "uefi",
        }
    }

    /// Loader name as the host group expects it.
    pub fn pxe_loader(&self) -> &'static str {
        match self {
            PxeLoader::Bios => "PXELinux BIOS",
            PxeLoader::Uefi => "Grub2 UEFI",
            PxeLoader::Ipxe => "iPXE Embedded",
            PxeLoader::HttpUefi => "Grub2 UEFI HTTP",
        }
    }
}

impl FromStr for PxeLoader {
    type Err = UnknownPxeLoader;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PxeLoader::ALL
            .into_iter()
            .find(|loader| loader.key() == s)
            .ok_or_else(|| UnknownPxeLoader(s.to_string()))
    }
}

impl Display for PxeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
