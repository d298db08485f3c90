use crate::error::ExtractError;
use crate::fingerprint::fingerprint;
use crate::models::{Document, ExtractionArtifact, PageExtraction, PathFingerprints};
use crate::normalize::{Dehyphenator, LanguageDetector, PageNormalizer};
use crate::pdf::{cover_image, PdfEngine};
use std::fs;
use std::io::Cursor;
use std::path::Path;

pub const TEXT_ARTIFACT: &str = "text.json";
pub const COVER_ARTIFACT: &str = "cover.jpg";
pub const FINGERPRINTS_FILE: &str = "path2fingerprints.json";

/// Cover thumbnail resolution. Twice the fingerprint raster, good enough
/// for a result list.
pub const COVER_DPI: u16 = 72;

pub struct DocumentExtractor<'e, D, H> {
    engine: &'e dyn PdfEngine,
    normalizer: PageNormalizer<D, H>,
}

impl<'e, D, H> DocumentExtractor<'e, D, H>
where
    D: LanguageDetector,
    H: Dehyphenator,
{
    pub fn new(engine: &'e dyn PdfEngine, normalizer: PageNormalizer<D, H>) -> Self {
        Self { engine, normalizer }
    }

    /// Extracts one PDF into `output_root/<fingerprint>/`. Returns the
    /// fingerprint, or `None` for a zero-page PDF (the caller skips it).
    ///
    /// When the artifact directory already holds both `text.json` and
    /// `cover.jpg` the PDF is not reprocessed; re-running over an unchanged
    /// library costs one open and one low-resolution render per file. Both
    /// artifacts are written via temp file + rename, so a crash mid-write
    /// can never produce a directory that passes the completeness check.
    pub fn extract_pdf(
        &self,
        path: &Path,
        output_root: &Path,
    ) -> Result<Option<String>, ExtractError> {
        let document = self.engine.open(path)?;
        let Some(fp) = fingerprint(document.as_ref())? else {
            return Ok(None);
        };

        let artifact_dir = output_root.join(&fp);
        if artifact_is_complete(&artifact_dir) {
            return Ok(Some(fp));
        }
        fs::create_dir_all(&artifact_dir)?;

        let total_pages = document.page_count();
        let mut pages = Vec::with_capacity(total_pages as usize);
        for index in 0..total_pages {
            let raw = document.page_text(index)?;
            let normalized = self.normalizer.normalize(&raw)?;
            pages.push(PageExtraction {
                page: index + 1,
                text: normalized.text,
                guessed_lang: normalized.language.tag().to_string(),
            });
        }

        let artifact = ExtractionArtifact {
            pages,
            total_pages,
            path: path.to_string_lossy().to_string(),
        };
        write_atomic(
            &artifact_dir.join(TEXT_ARTIFACT),
            &serde_json::to_vec_pretty(&artifact)?,
        )?;

        let raster = document.render_page(0, COVER_DPI, true)?;
        let cover = cover_image(&raster)?;
        let mut encoded = Vec::new();
        cover.write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Jpeg)?;
        write_atomic(&artifact_dir.join(COVER_ARTIFACT), &encoded)?;

        Ok(Some(fp))
    }
}

/// Both required files present. A partially written directory fails this
/// and is re-extracted on the next run.
pub fn artifact_is_complete(artifact_dir: &Path) -> bool {
    artifact_dir.join(TEXT_ARTIFACT).is_file() && artifact_dir.join(COVER_ARTIFACT).is_file()
}

fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), ExtractError> {
    let staged = target.with_extension("tmp");
    fs::write(&staged, bytes)?;
    fs::rename(&staged, target)?;
    Ok(())
}

/// Reads a persisted `text.json`, or `None` when the fingerprint has no
/// artifact (extraction failed or never ran).
pub fn load_artifact(
    output_root: &Path,
    fingerprint: &str,
) -> Result<Option<ExtractionArtifact>, ExtractError> {
    let path = output_root.join(fingerprint).join(TEXT_ARTIFACT);
    if !path.is_file() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&fs::read(path)?)?))
}

pub struct SkippedAttachment {
    pub path: String,
    pub reason: String,
}

pub struct ExtractionReport {
    pub fingerprints: PathFingerprints,
    pub skipped: Vec<SkippedAttachment>,
}

/// Runs the extractor over every PDF attachment in the library, best
/// effort: a failed attachment is recorded and the run continues. Only
/// successful extractions end up in the fingerprint map.
pub fn extract_library<D, H>(
    extractor: &DocumentExtractor<'_, D, H>,
    documents: &[Document],
    pdf_base: &Path,
    output_root: &Path,
) -> ExtractionReport
where
    D: LanguageDetector,
    H: Dehyphenator,
{
    let mut fingerprints = PathFingerprints::new();
    let mut skipped = Vec::new();

    for document in documents {
        for attachment in &document.attachments {
            if !attachment.is_pdf() || fingerprints.contains_key(&attachment.path) {
                continue;
            }

            match extractor.extract_pdf(&pdf_base.join(&attachment.path), output_root) {
                Ok(Some(fp)) => {
                    fingerprints.insert(attachment.path.clone(), fp);
                }
                Ok(None) => skipped.push(SkippedAttachment {
                    path: attachment.path.clone(),
                    reason: "pdf has no pages".to_string(),
                }),
                Err(error) => skipped.push(SkippedAttachment {
                    path: attachment.path.clone(),
                    reason: error.to_string(),
                }),
            }
        }
    }

    ExtractionReport {
        fingerprints,
        skipped,
    }
}

pub fn load_documents(path: &Path) -> Result<Vec<Document>, ExtractError> {
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

pub fn load_fingerprints(path: &Path) -> Result<PathFingerprints, ExtractError> {
    if !path.is_file() {
        return Ok(PathFingerprints::new());
    }
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

pub fn store_fingerprints(path: &Path, fingerprints: &PathFingerprints) -> Result<(), ExtractError> {
    write_atomic(path, &serde_json::to_vec_pretty(fingerprints)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attachment;
    use crate::pdf::{PdfPages, RenderedPage};
    use serde_json::json;
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    /// In-memory engine: each "file" is a list of page texts; pixels are a
    /// deterministic function of the page content.
    struct FakeEngine {
        files: BTreeMap<String, Vec<String>>,
        text_calls: Cell<usize>,
        render_calls: Cell<usize>,
    }

    impl FakeEngine {
        fn new(files: Vec<(&str, Vec<&str>)>) -> Self {
            Self {
                files: files
                    .into_iter()
                    .map(|(path, pages)| {
                        (
                            path.to_string(),
                            pages.into_iter().map(str::to_string).collect(),
                        )
                    })
                    .collect(),
                text_calls: Cell::new(0),
                render_calls: Cell::new(0),
            }
        }

        fn work_done(&self) -> usize {
            self.text_calls.get() + self.render_calls.get()
        }
    }

    struct FakePages<'a> {
        pages: &'a [String],
        engine: &'a FakeEngine,
    }

    impl PdfEngine for FakeEngine {
        fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn PdfPages + 'a>, ExtractError> {
            let key = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            let pages = self
                .files
                .get(key)
                .ok_or_else(|| ExtractError::Pdf(format!("no such file: {key}")))?;
            Ok(Box::new(FakePages {
                pages,
                engine: self,
            }))
        }
    }

    impl PdfPages for FakePages<'_> {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn page_text(&self, index: u32) -> Result<String, ExtractError> {
            self.engine.text_calls.set(self.engine.text_calls.get() + 1);
            Ok(self.pages[index as usize].clone())
        }

        fn render_page(
            &self,
            index: u32,
            dpi: u16,
            _with_annotations: bool,
        ) -> Result<RenderedPage, ExtractError> {
            self.engine
                .render_calls
                .set(self.engine.render_calls.get() + 1);
            let seed = self.pages[index as usize]
                .bytes()
                .fold(dpi as u8, u8::wrapping_add);
            Ok(RenderedPage {
                width: 2,
                height: 2,
                pixels: vec![seed; 16],
            })
        }
    }

    fn extractor(engine: &FakeEngine) -> DocumentExtractor<'_, impl LanguageDetector, impl Dehyphenator> {
        DocumentExtractor::new(engine, PageNormalizer::default())
    }

    #[test]
    fn extraction_writes_both_artifacts() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::new(vec![("a.pdf", vec!["first page", "second page"])]);

        let fp = extractor(&engine)
            .extract_pdf(Path::new("a.pdf"), dir.path())
            .unwrap()
            .expect("two-page pdf must fingerprint");

        assert!(fp.ends_with("0002"));
        assert!(artifact_is_complete(&dir.path().join(&fp)));

        let artifact = load_artifact(dir.path(), &fp).unwrap().unwrap();
        assert_eq!(artifact.total_pages, 2);
        assert_eq!(artifact.pages[0].page, 1);
        assert_eq!(artifact.pages[1].page, 2);
    }

    #[test]
    fn second_run_is_a_cache_hit() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::new(vec![("a.pdf", vec!["only page"])]);
        let extractor = extractor(&engine);

        let first = extractor.extract_pdf(Path::new("a.pdf"), dir.path()).unwrap();
        let after_first = engine.work_done();
        let artifact_bytes = fs::read(
            dir.path()
                .join(first.as_deref().unwrap())
                .join(TEXT_ARTIFACT),
        )
        .unwrap();

        let second = extractor.extract_pdf(Path::new("a.pdf"), dir.path()).unwrap();
        assert_eq!(first, second);
        // Only the fingerprint render happens again; no page text work.
        assert_eq!(engine.work_done(), after_first + 1);

        let rerun_bytes = fs::read(
            dir.path()
                .join(second.as_deref().unwrap())
                .join(TEXT_ARTIFACT),
        )
        .unwrap();
        assert_eq!(artifact_bytes, rerun_bytes);
    }

    #[test]
    fn zero_page_pdf_is_skipped() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::new(vec![("empty.pdf", vec![])]);

        let fp = extractor(&engine)
            .extract_pdf(Path::new("empty.pdf"), dir.path())
            .unwrap();
        assert_eq!(fp, None);
    }

    #[test]
    fn partial_artifact_is_reextracted() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::new(vec![("a.pdf", vec!["only page"])]);
        let extractor = extractor(&engine);

        let fp = extractor
            .extract_pdf(Path::new("a.pdf"), dir.path())
            .unwrap()
            .unwrap();

        // Simulate a crash that lost the cover.
        fs::remove_file(dir.path().join(&fp).join(COVER_ARTIFACT)).unwrap();
        assert!(!artifact_is_complete(&dir.path().join(&fp)));

        extractor.extract_pdf(Path::new("a.pdf"), dir.path()).unwrap();
        assert!(artifact_is_complete(&dir.path().join(&fp)));
    }

    #[test]
    fn two_page_attachment_ends_up_as_three_records_with_rejoined_text() {
        use crate::models::SearchRecord;
        use crate::normalize::tests::FixedLanguage;
        use crate::normalize::{DetectedLanguage, HeuristicDehyphenator};
        use crate::records::{build_records, item_id};

        let dir = tempdir().unwrap();
        let engine = FakeEngine::new(vec![(
            "d1.pdf",
            vec!["an experi-\nment begins", "and concludes here"],
        )]);
        let extractor = DocumentExtractor::new(
            &engine,
            PageNormalizer::new(
                FixedLanguage(DetectedLanguage::English),
                HeuristicDehyphenator,
            ),
        );

        let documents = vec![Document {
            id: "D1".to_string(),
            title: "Paper".to_string(),
            tags: Vec::new(),
            metadata: json!({}),
            attachments: vec![Attachment {
                path: "d1.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
            }],
        }];

        let report = extract_library(&extractor, &documents, Path::new(""), dir.path());
        let fp = report.fingerprints.get("d1.pdf").expect("extraction succeeds");

        let records = build_records(&documents, &report.fingerprints, dir.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.contains_key(&item_id("D1")));
        assert!(records.contains_key(&format!("{fp}-00002")));

        match records.get(&format!("{fp}-00001")).unwrap() {
            SearchRecord::Fulltext { fulltext, .. } => {
                assert_eq!(fulltext.text, "an experiment begins");
                assert_eq!(fulltext.guessed_lang, "en");
            }
            other => panic!("expected fulltext record, got {other:?}"),
        }
    }

    #[test]
    fn library_extraction_is_best_effort() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine::new(vec![
            ("good.pdf", vec!["some page text"]),
            ("empty.pdf", vec![]),
        ]);
        let documents = vec![Document {
            id: "doc-1".to_string(),
            title: "Test".to_string(),
            tags: Vec::new(),
            metadata: json!({}),
            attachments: vec![
                Attachment {
                    path: "good.pdf".to_string(),
                    mime_type: "application/pdf".to_string(),
                },
                Attachment {
                    path: "empty.pdf".to_string(),
                    mime_type: "application/pdf".to_string(),
                },
                Attachment {
                    path: "missing.pdf".to_string(),
                    mime_type: "application/pdf".to_string(),
                },
                Attachment {
                    path: "notes.html".to_string(),
                    mime_type: "text/html".to_string(),
                },
            ],
        }];

        let report = extract_library(
            &extractor(&engine),
            &documents,
            Path::new(""),
            dir.path(),
        );

        assert_eq!(report.fingerprints.len(), 1);
        assert!(report.fingerprints.contains_key("good.pdf"));
        assert_eq!(report.skipped.len(), 2);

        let fingerprints_file = dir.path().join(FINGERPRINTS_FILE);
        store_fingerprints(&fingerprints_file, &report.fingerprints).unwrap();
        assert_eq!(load_fingerprints(&fingerprints_file).unwrap(), report.fingerprints);
    }
}
