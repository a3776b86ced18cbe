//! Commercial-terms CSV report over every deck in a folder tree.

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::constants::PPTX_MIME_TYPE;
use crate::drive::{DriveApi, DriveError, RemoteFile};
use crate::fields::{
    normalize_key, CoordinateExtractor, FieldExtractor, FieldMap, KeyValueExtractor, NOT_FOUND,
};
use crate::links::sanitize_filename;
use crate::walker::{FolderHandler, TreeWalker, WalkError, WalkSummary};
use crate::{PptxContainer, ParserConfig, Slide};

/// Title (case-insensitive substring) of the slide holding the commercial terms.
pub const COMMERCIAL_TERMS_TITLE: &str = "Commercial Terms";

pub const SOURCE_COLUMN: &str = "Source File Name";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Drive(#[from] DriveError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid field pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl ReportError {
    fn is_auth(&self) -> bool {
        matches!(self, ReportError::Drive(e) if e.is_auth())
    }
}

/// One CSV row: either the extracted fields or the reason there are none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub source: String,
    pub fields: FieldMap,
    pub error: Option<String>,
}

impl ReportRow {
    fn record(&self, width: usize) -> Vec<String> {
        let mut record = vec![self.source.clone()];
        match &self.error {
            Some(error) => {
                record.push(error.clone());
                record.resize(width, String::new());
            }
            None => record.extend(self.fields.iter().map(|(_, v)| v.as_str().to_string())),
        }
        record
    }
}

/// Reads commercial terms and coordinates out of decks.
pub struct TermsExtractor {
    terms: KeyValueExtractor,
    coordinates: CoordinateExtractor,
}

impl TermsExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self { terms: KeyValueExtractor::commercial_terms()?, coordinates: CoordinateExtractor })
    }

    pub fn headers(&self) -> Vec<String> {
        std::iter::once(SOURCE_COLUMN.to_string())
            .chain(self.terms.keys().iter().map(|k| normalize_key(k)))
            .chain(self.coordinates.keys())
            .collect()
    }

    /// Extracts a row from already parsed slides.
    ///
    /// Terms come from the first slide titled [`COMMERCIAL_TERMS_TITLE`];
    /// coordinates from the first slides that carry them.
    pub fn extract_slides(&self, source: &str, slides: &[Slide]) -> ReportRow {
        let needle = COMMERCIAL_TERMS_TITLE.to_lowercase();
        let target = slides
            .iter()
            .find(|slide| slide.title().is_some_and(|title| title.to_lowercase().contains(&needle)));

        let Some(target) = target else {
            return ReportRow {
                source: source.to_string(),
                fields: FieldMap::default(),
                error: Some(format!("[ERROR: Slide with title '{COMMERCIAL_TERMS_TITLE}' not found]")),
            };
        };

        let mut fields = self.terms.extract(&target.text());
        let mut coordinates = self.coordinates.extract("");
        for slide in slides {
            if coordinates.all_found() {
                break;
            }
            coordinates.fill_missing(&self.coordinates.extract(&slide.text()));
        }
        fields.fill_missing(&coordinates);

        ReportRow { source: source.to_string(), fields, error: None }
    }

    /// Opens and parses the deck at `path`.
    pub fn extract_file(&self, source: &str, path: &Path) -> ReportRow {
        let slides = PptxContainer::open(path, ParserConfig::default())
            .and_then(|mut container| container.parse_all_multi_threaded());

        match slides {
            Ok(slides) => self.extract_slides(source, &slides),
            Err(e) => ReportRow {
                source: source.to_string(),
                fields: FieldMap::default(),
                error: Some(format!("[ERROR: Cannot open PPTX: {e}]")),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub walk: WalkSummary,
    pub decks: usize,
    /// Rows with an error or at least one field at the sentinel.
    pub incomplete: usize,
}

/// Walks `root_id`, downloading every deck into `scratch` and writing one CSV row per deck.
pub async fn scan_tree<W: Write + Send>(
    drive: &dyn DriveApi,
    root_id: &str,
    scratch: &Path,
    writer: &mut csv::Writer<W>,
) -> Result<ReportSummary, ReportError> {
    let extractor = TermsExtractor::new()?;
    writer.write_record(extractor.headers())?;

    let mut handler = ReportHandler { drive, extractor: &extractor, scratch, writer, decks: 0, incomplete: 0 };
    let walk = TreeWalker::new(drive, PPTX_MIME_TYPE)
        .every_trigger()
        .walk(root_id, &mut handler)
        .await
        .map_err(|e| match e {
            WalkError::Listing { source, .. } => ReportError::Drive(source),
            WalkError::Handler(e) => e,
        })?;

    let summary = ReportSummary { walk, decks: handler.decks, incomplete: handler.incomplete };
    writer.flush()?;
    info!(decks = summary.decks, incomplete = summary.incomplete, "report complete");
    Ok(summary)
}

struct ReportHandler<'r, W: Write> {
    drive: &'r dyn DriveApi,
    extractor: &'r TermsExtractor,
    scratch: &'r Path,
    writer: &'r mut csv::Writer<W>,
    decks: usize,
    incomplete: usize,
}

#[async_trait]
impl<W: Write + Send> FolderHandler for ReportHandler<'_, W> {
    type Error = ReportError;

    async fn handle(&mut self, _folder_id: &str, deck: &RemoteFile) -> Result<(), ReportError> {
        let local = self.scratch.join(format!("{}-{}", deck.id, sanitize_filename(&deck.name)));
        self.drive.download(&deck.id, &local).await?;

        let row = self.extractor.extract_file(&deck.name, &local);
        if let Err(e) = tokio::fs::remove_file(&local).await {
            warn!(path = %local.display(), error = %e, "could not remove deck");
        }

        let width = self.extractor.headers().len();
        let complete = row.error.is_none() && row.fields.iter().all(|(_, v)| v.as_str() != NOT_FOUND);
        if !complete {
            self.incomplete += 1;
            warn!(file_id = %deck.id, name = %deck.name, error = ?row.error, "deck has missing terms");
        }
        self.writer.write_record(row.record(width))?;
        self.decks += 1;
        Ok(())
    }

    fn is_fatal(error: &ReportError) -> bool {
        error.is_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TERMS_SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <p:cSld><p:spTree>
    <p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
    <p:grpSpPr/>
    <p:sp>
      <p:nvSpPr><p:cNvPr id="2" name="Title"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
      <p:txBody><a:p><a:r><a:t>Commercial Terms</a:t></a:r></a:p></p:txBody>
    </p:sp>
    <p:sp>
      <p:nvSpPr><p:cNvPr id="3" name="Body"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>
      <p:txBody>
        <a:p><a:r><a:t>Catchment Name : Indiranagar</a:t></a:r></a:p>
        <a:p><a:r><a:t>Store Size: 1200 sq.ft</a:t></a:r></a:p>
        <a:p><a:r><a:t>LAT: 12.97 LON: 77.64</a:t></a:r></a:p>
      </p:txBody>
    </p:sp>
  </p:spTree></p:cSld>
</p:sld>"#;

    #[test]
    fn test_headers() {
        let extractor = TermsExtractor::new().unwrap();
        let headers = extractor.headers();
        assert_eq!(headers[0], SOURCE_COLUMN);
        assert_eq!(headers[1], "Catchment Name");
        assert_eq!(&headers[headers.len() - 2..], ["LAT", "LON"]);
    }

    #[test]
    fn test_terms_row() {
        let extractor = TermsExtractor::new().unwrap();
        let slide = Slide::parse(TERMS_SLIDE.as_bytes(), "ppt/slides/slide2.xml".into(), None).unwrap();
        let row = extractor.extract_slides("deck.pptx", &[slide]);

        assert_eq!(row.error, None);
        assert_eq!(row.fields.value("Catchment Name"), Some("Indiranagar"));
        assert_eq!(row.fields.value("Store Size"), Some("1200 sq.ft"));
        assert_eq!(row.fields.value("Rent per Sq.ft"), None);
        assert_eq!(row.fields.value("LAT"), Some("12.97"));
        assert_eq!(row.fields.value("LON"), Some("77.64"));

        let record = row.record(extractor.headers().len());
        assert_eq!(record.len(), extractor.headers().len());
        assert_eq!(record[0], "deck.pptx");
        assert_eq!(record[3], NOT_FOUND);
    }

    #[test]
    fn test_missing_title_slide_is_an_error_row() {
        let extractor = TermsExtractor::new().unwrap();
        let row = extractor.extract_slides("deck.pptx", &[]);
        assert!(row.error.as_deref().is_some_and(|e| e.contains("Commercial Terms")));

        let record = row.record(10);
        assert_eq!(record.len(), 10);
        assert_eq!(record[2], "");
    }
}
