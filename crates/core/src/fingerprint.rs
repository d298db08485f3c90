use crate::error::ExtractError;
use crate::pdf::PdfPages;
use sha2::{Digest, Sha256};

/// First page is rastered at a deliberately low resolution: the digest only
/// has to tell documents apart, not reproduce them.
pub const FINGERPRINT_DPI: u16 = 36;

/// Content identity of a PDF: hex digest of the first page rendered at
/// [`FINGERPRINT_DPI`] with annotations excluded, followed by the page count
/// as fixed-width hex. Independent of file path, mtime and metadata. Two
/// PDFs with an identical first-page raster and page count collide by
/// design. A zero-page PDF has no fingerprint.
pub fn fingerprint(document: &dyn PdfPages) -> Result<Option<String>, ExtractError> {
    let total_pages = document.page_count();
    if total_pages == 0 {
        return Ok(None);
    }

    let raster = document.render_page(0, FINGERPRINT_DPI, false)?;
    let mut hasher = Sha256::new();
    hasher.update(&raster.pixels);

    Ok(Some(format!("{:x}{:04x}", hasher.finalize(), total_pages)))
}
