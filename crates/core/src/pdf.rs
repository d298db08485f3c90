use crate::error::ExtractError;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::Path;

/// Raw raster of one rendered page, BGRA8 row-major,
/// `width * height * 4` bytes.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Render/text-layer primitive behind the extraction pipeline. Kept narrow
/// so tests can substitute an in-memory engine.
pub trait PdfEngine {
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn PdfPages + 'a>, ExtractError>;
}

/// One opened PDF. Page indices are 0-based here; 1-based page numbers are
/// assigned by the extractor.
pub trait PdfPages {
    fn page_count(&self) -> u32;

    fn page_text(&self, index: u32) -> Result<String, ExtractError>;

    fn render_page(
        &self,
        index: u32,
        dpi: u16,
        with_annotations: bool,
    ) -> Result<RenderedPage, ExtractError>;
}

/// Production engine backed by the pdfium library. Looks for a bundled
/// `./lib` copy first, then falls back to the system install.
pub struct PdfiumEngine {
    pdfium: Pdfium,
}

impl PdfiumEngine {
    pub fn new() -> Result<Self, ExtractError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./lib"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|error| ExtractError::Pdf(error.to_string()))?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PdfEngine for PdfiumEngine {
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn PdfPages + 'a>, ExtractError> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|error| ExtractError::Pdf(format!("{}: {error}", path.display())))?;

        Ok(Box::new(PdfiumPages { document }))
    }
}

struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
}

impl PdfPages for PdfiumPages<'_> {
    fn page_count(&self) -> u32 {
        u32::from(self.document.pages().len())
    }

    fn page_text(&self, index: u32) -> Result<String, ExtractError> {
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|error| ExtractError::Pdf(error.to_string()))?;
        let text = page
            .text()
            .map_err(|error| ExtractError::Pdf(error.to_string()))?;
        Ok(text.all())
    }

    fn render_page(
        &self,
        index: u32,
        dpi: u16,
        with_annotations: bool,
    ) -> Result<RenderedPage, ExtractError> {
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|error| ExtractError::Pdf(error.to_string()))?;

        // PDF points are 1/72 inch.
        let scale = f32::from(dpi) / 72.0;
        let width = ((page.width().value * scale).round() as i32).max(1);
        let height = ((page.height().value * scale).round() as i32).max(1);

        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_size(width, height)
                    .render_annotations(with_annotations),
            )
            .map_err(|error| ExtractError::Pdf(error.to_string()))?;

        Ok(RenderedPage {
            width: width as u32,
            height: height as u32,
            pixels: bitmap.as_raw_bytes().to_vec(),
        })
    }
}

/// Converts a BGRA raster into an RGB image for the cover thumbnail.
pub fn cover_image(page: &RenderedPage) -> Result<RgbImage, ExtractError> {
    let expected = page.width as usize * page.height as usize * 4;
    if page.pixels.len() != expected {
        return Err(ExtractError::MalformedRaster {
            expected,
            actual: page.pixels.len(),
        });
    }

    let mut rgb = RgbImage::new(page.width, page.height);
    for (offset, pixel) in page.pixels.chunks_exact(4).enumerate() {
        let x = (offset as u32) % page.width;
        let y = (offset as u32) / page.width;
        rgb.put_pixel(x, y, image::Rgb([pixel[2], pixel[1], pixel[0]]));
    }

    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_image_swaps_bgra_to_rgb() {
        let page = RenderedPage {
            width: 2,
            height: 1,
            pixels: vec![10, 20, 30, 255, 40, 50, 60, 255],
        };

        let image = cover_image(&page).expect("raster should convert");
        assert_eq!(image.get_pixel(0, 0).0, [30, 20, 10]);
        assert_eq!(image.get_pixel(1, 0).0, [60, 50, 40]);
    }

    #[test]
    fn cover_image_rejects_truncated_raster() {
        let page = RenderedPage {
            width: 2,
            height: 2,
            pixels: vec![0; 7],
        };

        assert!(matches!(
            cover_image(&page),
            Err(ExtractError::MalformedRaster { expected: 16, actual: 7 })
        ));
    }
}
