pub mod diff;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod models;
pub mod normalize;
pub mod pdf;
pub mod records;
pub mod stores;
pub mod sync;
pub mod traits;

pub use diff::{diff_snapshots, partition_changes, ChangeBatches, RecordChange};
pub use error::{ExtractError, SyncError};
pub use extract::{
    artifact_is_complete, extract_library, load_artifact, load_documents, load_fingerprints,
    store_fingerprints, DocumentExtractor, ExtractionReport, SkippedAttachment, COVER_ARTIFACT,
    FINGERPRINTS_FILE, TEXT_ARTIFACT,
};
pub use fingerprint::{fingerprint, FINGERPRINT_DPI};
pub use models::{
    Attachment, Document, ExtractionArtifact, FulltextPage, PageExtraction, PathFingerprints,
    RecordSnapshot, SearchRecord, PDF_MIME_TYPE,
};
pub use normalize::{
    DetectedLanguage, Dehyphenator, HeuristicDehyphenator, LanguageDetector, NormalizedPage,
    PageNormalizer, WhatlangDetector,
};
pub use pdf::{PdfEngine, PdfPages, PdfiumEngine, RenderedPage};
pub use records::{build_records, fulltext_record_id, item_id};
pub use stores::MeilisearchIndex;
pub use sync::{apply_changes, load_snapshot, store_snapshot, SyncOutcome, SNAPSHOT_FILE};
pub use traits::SearchIndex;
