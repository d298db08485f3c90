use crate::error::ExtractError;
use crate::extract::load_artifact;
use crate::models::{Document, FulltextPage, PathFingerprints, RecordSnapshot, SearchRecord};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::path::Path;

/// Stable, reversible textual identity for a library document.
pub fn item_id(document_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(document_id.as_bytes())
}

/// Record id of one extracted page: fingerprint plus zero-padded 1-based
/// page number.
pub fn fulltext_record_id(fingerprint: &str, page: u32) -> String {
    format!("{fingerprint}-{page:05}")
}

/// Maps the library into the flat record set the index consumes: one
/// metadata record per document (always, even with zero usable
/// attachments) and one fulltext record per extracted page. Attachments
/// without a fingerprint or a persisted artifact are silently left out of
/// `attachment_fingerprints`; their absence is the degradation mode, not an
/// error.
pub fn build_records(
    documents: &[Document],
    fingerprints: &PathFingerprints,
    output_root: &Path,
) -> Result<RecordSnapshot, ExtractError> {
    let mut records = RecordSnapshot::new();

    for document in documents {
        let item_id = item_id(&document.id);
        let mut attachment_fingerprints = Vec::new();

        for attachment in &document.attachments {
            let Some(fingerprint) = fingerprints.get(&attachment.path) else {
                continue;
            };
            let Some(artifact) = load_artifact(output_root, fingerprint)? else {
                continue;
            };

            attachment_fingerprints.push(fingerprint.clone());
            for page in &artifact.pages {
                let id = fulltext_record_id(fingerprint, page.page);
                records.insert(
                    id.clone(),
                    SearchRecord::Fulltext {
                        id,
                        item_id: item_id.clone(),
                        fingerprint: fingerprint.clone(),
                        total_pages: artifact.total_pages,
                        fulltext: FulltextPage {
                            page: page.page,
                            text: page.text.clone(),
                            guessed_lang: page.guessed_lang.clone(),
                        },
                    },
                );
            }
        }

        records.insert(
            item_id.clone(),
            SearchRecord::Metadata {
                id: item_id.clone(),
                item_id,
                tags: document.tags.clone(),
                metadata: document.metadata.clone(),
                attachment_fingerprints,
            },
        );
    }

    Ok(records)
}
