use qrcode::{QrCode, render::svg};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::warn;

use crate::shared_types::TenantKey;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const ARTIFACT_SUFFIX: &str = ".qr.svg";
const MIN_DIMENSION: u32 = 256;

// -----------------------------------------------------------------------------
// ----- ChallengeRenderer -----------------------------------------------------

/// Turns a raw pairing challenge into something a human can scan. Failures are
/// reported as a value; they never abort the connection flow.
pub trait ChallengeRenderer: Send + Sync + 'static {
    fn render(&self, tenant: &TenantKey, challenge: &str) -> RenderOutcome;

    /// Removes whatever `render` produced for this tenant, if anything.
    fn discard(&self, tenant: &TenantKey);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered(PathBuf),
    Skipped,
    Failed(String),
}

// -----------------------------------------------------------------------------
// ----- QrSvgRenderer ---------------------------------------------------------

/// Writes `<dir>/<tenant>.qr.svg` next to the tenant's credential directory.
#[derive(Debug, Clone)]
pub struct QrSvgRenderer {
    dir: PathBuf,
}

impl QrSvgRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn artifact_path(&self, tenant: &TenantKey) -> PathBuf {
        self.dir
            .join(format!("{}{ARTIFACT_SUFFIX}", tenant.storage_name()))
    }
}

impl ChallengeRenderer for QrSvgRenderer {
    fn render(&self, tenant: &TenantKey, challenge: &str) -> RenderOutcome {
        let path = self.artifact_path(tenant);
        match write_svg(&path, challenge) {
            Ok(()) => RenderOutcome::Rendered(path),
            Err(reason) => RenderOutcome::Failed(reason),
        }
    }

    fn discard(&self, tenant: &TenantKey) {
        let path = self.artifact_path(tenant);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("failed to remove pairing artifact {}: {e}", path.display());
            }
        }
    }
}

fn write_svg(path: &Path, challenge: &str) -> Result<(), String> {
    let code = QrCode::new(challenge.as_bytes()).map_err(|e| format!("qr encode: {e}"))?;
    let image = code
        .render()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("{}: {e}", parent.display()))?;
    }
    fs::write(path, image).map_err(|e| format!("{}: {e}", path.display()))
}

// -----------------------------------------------------------------------------
// ----- NullRenderer ----------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl ChallengeRenderer for NullRenderer {
    fn render(&self, _tenant: &TenantKey, _challenge: &str) -> RenderOutcome {
        RenderOutcome::Skipped
    }

    fn discard(&self, _tenant: &TenantKey) {}
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
