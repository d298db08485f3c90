use crate::error::ExtractError;
use unicode_normalization::UnicodeNormalization;

/// Words of one physical line. Non-final lines of a paragraph carry a
/// trailing space on their last word so flattening keeps word boundaries.
pub type Line = Vec<String>;

/// Lines of one paragraph, as handed to the dehyphenation collaborator.
pub type Paragraph = Vec<Line>;

/// Language branch of the normalizer. Closed set: adding a language means
/// adding a variant and a match arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedLanguage {
    English,
    Japanese,
    Other(String),
    Unknown,
}

impl DetectedLanguage {
    pub fn tag(&self) -> &str {
        match self {
            DetectedLanguage::English => "en",
            DetectedLanguage::Japanese => "ja",
            DetectedLanguage::Other(code) => code,
            DetectedLanguage::Unknown => "unknown",
        }
    }
}

/// Black-box language classifier. Classification failure maps to
/// [`DetectedLanguage::Unknown`] rather than an error.
pub trait LanguageDetector {
    fn detect(&self, text: &str) -> DetectedLanguage;
}

#[derive(Debug, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> DetectedLanguage {
        match whatlang::detect_lang(text) {
            Some(whatlang::Lang::Eng) => DetectedLanguage::English,
            Some(whatlang::Lang::Jpn) => DetectedLanguage::Japanese,
            Some(lang) => DetectedLanguage::Other(lang.code().to_string()),
            None => DetectedLanguage::Unknown,
        }
    }
}

/// Statistical line-wrap repair, injected so tests can use deterministic
/// stubs. Input and output share the paragraph/line/word structure built by
/// [`text_to_format`].
pub trait Dehyphenator {
    fn dehyphenate(&self, paragraphs: Vec<Paragraph>) -> Result<Vec<Paragraph>, ExtractError>;
}

/// Deterministic scorer: a trailing line-break hyphen is joined with the
/// next line's first word when that word starts with a lowercase ASCII
/// letter, which covers the common "wrapped mid-word" case without a model.
#[derive(Debug, Default)]
pub struct HeuristicDehyphenator;

impl Dehyphenator for HeuristicDehyphenator {
    fn dehyphenate(&self, paragraphs: Vec<Paragraph>) -> Result<Vec<Paragraph>, ExtractError> {
        paragraphs.into_iter().map(dehyphenate_paragraph).collect()
    }
}

fn dehyphenate_paragraph(mut lines: Paragraph) -> Result<Paragraph, ExtractError> {
    let mut index = 0;
    while index + 1 < lines.len() {
        let tail = lines[index]
            .last()
            .ok_or_else(|| malformed("empty line in paragraph"))?
            .trim_end()
            .to_string();
        let head = lines[index + 1]
            .first()
            .ok_or_else(|| malformed("empty line in paragraph"))?
            .clone();

        let joinable = tail.len() > 1
            && tail.ends_with('-')
            && head.chars().next().is_some_and(|c| c.is_ascii_lowercase());

        if joinable {
            let mut word = tail[..tail.len() - 1].to_string();
            word.push_str(&head);
            if let Some(last) = lines[index].last_mut() {
                *last = word;
            }
            lines[index + 1].remove(0);
            if lines[index + 1].is_empty() {
                lines.remove(index + 1);
                continue;
            }
        }

        index += 1;
    }

    Ok(lines)
}

fn malformed(reason: &str) -> ExtractError {
    ExtractError::Dehyphenation {
        reason: reason.to_string(),
        structure: String::new(),
    }
}

/// Splits page text into the paragraph/line/word structure the dehyphenator
/// consumes. A blank line is a paragraph boundary; text without any line
/// break is a single one-line paragraph.
pub fn text_to_format(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();

    if text.contains('\n') {
        let mut current: Vec<&str> = Vec::new();
        for line in text.lines() {
            if line.is_empty() {
                paragraphs.push(paragraph_to_format(&current));
                current.clear();
            } else {
                current.push(line);
            }
        }
        paragraphs.push(paragraph_to_format(&current));
    } else {
        paragraphs.push(paragraph_to_format(&[text]));
    }

    paragraphs.retain(|paragraph| !paragraph.is_empty());
    paragraphs
}

fn paragraph_to_format(lines: &[&str]) -> Paragraph {
    let mut split: Vec<Line> = lines
        .iter()
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect();

    let last = split.pop();
    let mut paragraph = Vec::new();

    for mut line in split {
        if let Some(word) = line.last_mut() {
            word.push(' ');
            paragraph.push(line);
        }
    }
    if let Some(line) = last {
        if !line.is_empty() {
            paragraph.push(line);
        }
    }

    paragraph
}

/// Flattens the repaired structure into a single text stream. The trailing
/// space markers create doubled spaces at line joins, collapsed here.
pub fn flatten(paragraphs: &[Paragraph]) -> String {
    paragraphs
        .iter()
        .flatten()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .replace("  ", " ")
}

/// CJK line joining: physical lines are concatenated without a separator,
/// except that a break between two ASCII characters gets a single space so
/// unrelated Latin tokens (citation numbers, inline identifiers) stay
/// apart. Decided per line boundary, not per character.
pub fn join_wrapped_lines(text: &str) -> String {
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();

    for index in 0..lines.len().saturating_sub(1) {
        let tail_ascii = lines[index].chars().last().is_some_and(|c| c.is_ascii());
        let head_ascii = lines[index + 1].chars().next().is_some_and(|c| c.is_ascii());
        if tail_ascii && head_ascii {
            lines[index].push(' ');
        }
    }

    lines.concat().replace("  ", " ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPage {
    pub text: String,
    pub language: DetectedLanguage,
}

pub struct PageNormalizer<D, H> {
    detector: D,
    dehyphenator: H,
}

impl Default for PageNormalizer<WhatlangDetector, HeuristicDehyphenator> {
    fn default() -> Self {
        Self::new(WhatlangDetector, HeuristicDehyphenator)
    }
}

impl<D, H> PageNormalizer<D, H>
where
    D: LanguageDetector,
    H: Dehyphenator,
{
    pub fn new(detector: D, dehyphenator: H) -> Self {
        Self {
            detector,
            dehyphenator,
        }
    }

    /// Strip U+FFFD (malformed-glyph marker left by the text layer),
    /// NFKC-normalize, then repair line wrapping per detected language.
    pub fn normalize(&self, raw: &str) -> Result<NormalizedPage, ExtractError> {
        let text: String = raw.replace('\u{FFFD}', "").nfkc().collect();
        let language = self.detector.detect(&text);

        let text = match &language {
            DetectedLanguage::English => {
                let paragraphs = text_to_format(&text);
                let repaired = self
                    .dehyphenator
                    .dehyphenate(paragraphs.clone())
                    .map_err(|error| ExtractError::Dehyphenation {
                        reason: error.to_string(),
                        structure: format!("{paragraphs:?}"),
                    })?;
                flatten(&repaired)
            }
            DetectedLanguage::Japanese => join_wrapped_lines(&text),
            DetectedLanguage::Other(_) | DetectedLanguage::Unknown => text,
        };

        Ok(NormalizedPage { text, language })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct FixedLanguage(pub DetectedLanguage);

    impl LanguageDetector for FixedLanguage {
        fn detect(&self, _text: &str) -> DetectedLanguage {
            self.0.clone()
        }
    }

    struct FailingDehyphenator;

    impl Dehyphenator for FailingDehyphenator {
        fn dehyphenate(&self, _paragraphs: Vec<Paragraph>) -> Result<Vec<Paragraph>, ExtractError> {
            Err(ExtractError::Pdf("model exploded".to_string()))
        }
    }

    fn english_normalizer() -> PageNormalizer<FixedLanguage, HeuristicDehyphenator> {
        PageNormalizer::new(
            FixedLanguage(DetectedLanguage::English),
            HeuristicDehyphenator,
        )
    }

    #[test]
    fn format_marks_line_ends_and_paragraph_breaks() {
        let format = text_to_format("first line\nsecond line\n\nnext paragraph");

        assert_eq!(format.len(), 2);
        assert_eq!(
            format[0],
            vec![
                vec!["first".to_string(), "line ".to_string()],
                vec!["second".to_string(), "line".to_string()],
            ]
        );
        assert_eq!(
            format[1],
            vec![vec!["next".to_string(), "paragraph".to_string()]]
        );
    }

    #[test]
    fn format_of_unbroken_text_is_one_paragraph() {
        let format = text_to_format("no breaks here");
        assert_eq!(format.len(), 1);
        assert_eq!(format[0].len(), 1);
    }

    #[test]
    fn heuristic_joins_wrapped_word() {
        let format = text_to_format("an experi-\nment with text");
        let repaired = HeuristicDehyphenator.dehyphenate(format).unwrap();
        assert_eq!(flatten(&repaired), "an experiment with text");
    }

    #[test]
    fn heuristic_keeps_hyphen_before_uppercase() {
        let format = text_to_format("the Jahn-\nTeller effect");
        let repaired = HeuristicDehyphenator.dehyphenate(format).unwrap();
        assert_eq!(flatten(&repaired), "the Jahn- Teller effect");
    }

    #[test]
    fn english_plain_text_only_collapses_whitespace() {
        let page = english_normalizer()
            .normalize("plain  text   without breaks")
            .unwrap();
        assert_eq!(page.text, "plain text without breaks");
        assert_eq!(page.language, DetectedLanguage::English);
    }

    #[test]
    fn replacement_character_is_stripped_and_nfkc_applied() {
        // U+FB01 is the "fi" ligature; NFKC expands it.
        let page = english_normalizer().normalize("\u{FFFD}de\u{FB01}ne").unwrap();
        assert_eq!(page.text, "define");
    }

    #[test]
    fn japanese_lines_join_without_space() {
        let normalizer = PageNormalizer::new(
            FixedLanguage(DetectedLanguage::Japanese),
            HeuristicDehyphenator,
        );
        let page = normalizer.normalize("これは長い\n文です").unwrap();
        assert_eq!(page.text, "これは長い文です");
    }

    #[test]
    fn japanese_ascii_boundary_keeps_a_space() {
        let normalizer = PageNormalizer::new(
            FixedLanguage(DetectedLanguage::Japanese),
            HeuristicDehyphenator,
        );
        let page = normalizer.normalize("文献[12]\n[13]も参照").unwrap();
        assert_eq!(page.text, "文献[12] [13]も参照");
    }

    #[test]
    fn unknown_language_passes_through() {
        let normalizer = PageNormalizer::new(
            FixedLanguage(DetectedLanguage::Unknown),
            HeuristicDehyphenator,
        );
        let page = normalizer.normalize("zeilen-\numbruch bleibt").unwrap();
        assert_eq!(page.text, "zeilen-\numbruch bleibt");
        assert_eq!(page.language.tag(), "unknown");
    }

    #[test]
    fn dehyphenator_failure_surfaces_the_structure() {
        let normalizer = PageNormalizer::new(
            FixedLanguage(DetectedLanguage::English),
            FailingDehyphenator,
        );

        let error = normalizer.normalize("some in-\nput").unwrap_err();
        match error {
            ExtractError::Dehyphenation { reason, structure } => {
                assert!(reason.contains("model exploded"));
                assert!(structure.contains("in-"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn whatlang_detector_maps_to_closed_variants() {
        let detector = WhatlangDetector;
        assert_eq!(
            detector.detect("The quick brown fox jumps over the lazy dog and keeps running."),
            DetectedLanguage::English
        );
        assert_eq!(detector.detect(""), DetectedLanguage::Unknown);
    }
}
