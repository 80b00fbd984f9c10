use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{DocumentError, Rasterizer};

const OUTPUT_ROOT: &str = "page";

/// Poppler's `pdftoppm`, run as a child process at its default 150 DPI.
///
/// The upload is written to a private temp dir; `pdftoppm` writes
/// `page-<n>.jpg` files next to it (zero-padded for longer documents).
/// The dir is removed when the call returns.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: PathBuf,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    async fn render_pages(
        &self,
        pdf: &[u8],
        first_page: u32,
        last_page: u32,
    ) -> Result<Vec<Bytes>, DocumentError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("upload.pdf");
        tokio::fs::write(&input, pdf).await?;

        let output = Command::new(&self.binary)
            .arg("-jpeg")
            .arg("-f")
            .arg(first_page.to_string())
            .arg("-l")
            .arg(last_page.to_string())
            .arg(&input)
            .arg(dir.path().join(OUTPUT_ROOT))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DocumentError::Rasterize(format!("could not run {}: {e}", self.binary.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("pdftoppm exited with {}: {}", output.status, stderr);
            return Err(DocumentError::Rasterize(if stderr.is_empty() {
                format!("pdftoppm exited with {}", output.status)
            } else {
                stderr
            }));
        }

        let pages = collect_pages(dir.path()).await?;
        debug!("pdftoppm rendered {} page(s)", pages.len());
        Ok(pages)
    }
}

/// Reads `page-<n>.jpg` files from `dir` in page order.
async fn collect_pages(dir: &Path) -> Result<Vec<Bytes>, DocumentError> {
    let mut numbered = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if let Some(n) = name.to_str().and_then(page_number) {
            numbered.push((n, entry.path()));
        }
    }
    numbered.sort_by_key(|(n, _)| *n);

    let mut pages = Vec::with_capacity(numbered.len());
    for (_, path) in numbered {
        pages.push(Bytes::from(tokio::fs::read(path).await?));
    }
    Ok(pages)
}

fn page_number(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(OUTPUT_ROOT)?
        .strip_prefix('-')?
        .strip_suffix(".jpg")?
        .parse()
        .ok()
}
