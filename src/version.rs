//! Version and build information.

use std::fmt;

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: Option<&'static str>,
    pub build_date: Option<&'static str>,
    pub target: &'static str,
    pub rustc_version: Option<&'static str>,
    pub document_formats: &'static [&'static str],
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "upgrade-preflight {}", self.version)?;

        if let Some(commit) = self.commit {
            writeln!(f, "Commit: {}", commit)?;
        }

        if let Some(date) = self.build_date {
            writeln!(f, "Built: {}", date)?;
        }

        writeln!(f, "Target: {}", self.target)?;
        writeln!(f, "Report formats: {}", self.document_formats.join(", "))?;

        if let Some(rustc) = self.rustc_version {
            write!(f, "Rustc: {}", rustc)?;
        }

        Ok(())
    }
}

#[cfg(feature = "junit")]
const DOCUMENT_FORMATS: &[&str] = &["json", "junit"];
#[cfg(not(feature = "junit"))]
const DOCUMENT_FORMATS: &[&str] = &["json"];

/// Get build information
pub fn get_build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("UPGRADE_PREFLIGHT_GIT_HASH"),
        build_date: option_env!("UPGRADE_PREFLIGHT_BUILD_DATE"),
        target: option_env!("TARGET").unwrap_or(std::env::consts::ARCH),
        rustc_version: option_env!("UPGRADE_PREFLIGHT_RUSTC_VERSION"),
        document_formats: DOCUMENT_FORMATS,
    }
}
