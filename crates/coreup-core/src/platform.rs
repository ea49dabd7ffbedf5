use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Linux,
    Darwin,
}

impl Os {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Self::Windows,
            "macos" => Self::Darwin,
            _ => Self::Linux,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
        }
    }

    pub fn executable_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Linux | Self::Darwin => "",
        }
    }

    /// Format the upstream project publishes binaries in for this OS.
    pub fn release_archive(self) -> ArchiveFormat {
        match self {
            Self::Windows => ArchiveFormat::Zip,
            Self::Linux | Self::Darwin => ArchiveFormat::Gzip,
        }
    }

    /// Whether freshly written binaries need their executable bit set.
    pub fn needs_exec_bit(self) -> bool {
        !matches!(self, Self::Windows)
    }

    /// Elevated network permission (TUN) is unnecessary on Windows.
    pub fn supports_permission_grant(self) -> bool {
        !matches!(self, Self::Windows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Amd64,
    Arm64,
    #[serde(rename = "386")]
    X86,
    Armv7,
}

impl Arch {
    pub fn current() -> Self {
        match std::env::consts::ARCH {
            "aarch64" => Self::Arm64,
            "x86" => Self::X86,
            "arm" => Self::Armv7,
            _ => Self::Amd64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::X86 => "386",
            Self::Armv7 => "armv7",
        }
    }
}

/// Microarchitecture level of amd64 builds (x86-64-v1/v2/v3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuTier {
    V1,
    V2,
    V3,
}

impl CpuTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "v1" => Some(Self::V1),
            "v2" => Some(Self::V2),
            "v3" => Some(Self::V3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    pub fn current() -> Self {
        Self::new(Os::current(), Arch::current())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Gzip,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Gzip => "gz",
        }
    }

    /// Infers the format from an asset file name. Anything that is neither a
    /// zip archive nor a single gzip stream is rejected by the caller.
    pub fn infer_from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            return None;
        }
        if lower.ends_with(".zip") {
            return Some(Self::Zip);
        }
        if lower.ends_with(".gz") {
            return Some(Self::Gzip);
        }
        None
    }
}
