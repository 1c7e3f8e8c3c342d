//! Operating system and architecture naming.
//!
//! Release assets name their target platform in many dialects
//! (`x86_64`, `amd64`, `x64`; `darwin`, `macos`, `osx`). Everything here is
//! driven by a single table of canonical names, the synonyms that count as a
//! match, and tokens that disqualify a match outright.

use std::fmt;

/// One row of the platform synonym table.
#[derive(Debug, Clone, Copy)]
pub struct PlatformAlias {
    /// Name used internally and in error messages.
    pub canonical: &'static str,
    /// Tokens that identify this platform in an asset name (lowercase).
    pub synonyms: &'static [&'static str],
    /// Tokens whose presence means the asset targets something else.
    ///
    /// `arm` is a substring of `arm64`, and `win` of `darwin`; without these
    /// an `arm` machine would pick an `arm64` build.
    pub conflicts: &'static [&'static str],
}

/// Operating systems.
pub const OS_ALIASES: &[PlatformAlias] = &[
    PlatformAlias {
        canonical: "linux",
        synonyms: &["linux"],
        conflicts: &[],
    },
    PlatformAlias {
        canonical: "darwin",
        synonyms: &["darwin", "macos", "osx", "apple"],
        conflicts: &[],
    },
    PlatformAlias {
        canonical: "windows",
        synonyms: &["windows", "win"],
        conflicts: &["darwin"],
    },
    PlatformAlias {
        canonical: "freebsd",
        synonyms: &["freebsd"],
        conflicts: &[],
    },
];

/// CPU architectures.
pub const ARCH_ALIASES: &[PlatformAlias] = &[
    PlatformAlias {
        canonical: "amd64",
        synonyms: &["amd64", "x86_64", "x64"],
        conflicts: &[],
    },
    PlatformAlias {
        canonical: "arm64",
        synonyms: &["arm64", "aarch64"],
        conflicts: &[],
    },
    PlatformAlias {
        canonical: "386",
        synonyms: &["386", "i386", "i686", "x86"],
        conflicts: &["x86_64", "amd64"],
    },
    PlatformAlias {
        canonical: "arm",
        synonyms: &["armv7", "armv6", "arm"],
        conflicts: &["arm64", "aarch64"],
    },
];

/// Looks up the table row for `name`, which may be a canonical name or any
/// synonym. Returns `None` for names outside the table.
#[must_use]
pub fn alias_for(table: &'static [PlatformAlias], name: &str) -> Option<&'static PlatformAlias> {
    let name = name.to_ascii_lowercase();
    table.iter().find(|alias| alias.canonical == name || alias.synonyms.contains(&name.as_str()))
}

/// The platform an asset must target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Canonical OS name (`linux`, `darwin`, `windows`, ...).
    pub os: String,
    /// Canonical architecture name (`amd64`, `arm64`, `386`, `arm`, ...).
    pub arch: String,
}

impl Platform {
    /// Builds a platform from any spelling found in the synonym table.
    ///
    /// Names outside the table are kept lowercased as-is.
    pub fn new(os: impl AsRef<str>, arch: impl AsRef<str>) -> Self {
        let canonical = |table: &'static [PlatformAlias], name: &str| {
            alias_for(table, name)
                .map_or_else(|| name.to_ascii_lowercase(), |alias| alias.canonical.to_string())
        };
        Self {
            os: canonical(OS_ALIASES, os.as_ref()),
            arch: canonical(ARCH_ALIASES, arch.as_ref()),
        }
    }

    /// The platform this binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self::new(os, arch)
    }

    /// Executable file name of `tool` on this platform.
    #[must_use]
    pub fn executable_name(&self, tool: &str) -> String {
        if self.os == "windows" {
            format!("{tool}.exe")
        } else {
            tool.to_string()
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
