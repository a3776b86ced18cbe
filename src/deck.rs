//! Deck-level entry points used by the pipeline.
//!
//! These never fail: an unreadable deck or one without slides yields an empty
//! result and a log line, so a broken deck only costs its own folder.

use crate::links::ExtractedLink;
use crate::parser_config::ParserConfig;
use crate::{PptxContainer, Result, Slide};
use std::path::Path;
use tracing::{debug, warn};

/// Which slide's text to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideSelector {
    First,
    Last,
}

/// Flat text of the first or last slide, empty when the deck cannot be read.
pub fn slide_text(path: &Path, selector: SlideSelector) -> String {
    match read_slide(path, selector) {
        Ok(slide) => slide.text(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read slide text");
            String::new()
        }
    }
}

/// De-duplicated links with their table names, scanning the slides `config` asks for.
pub fn extract_links(path: &Path, config: &ParserConfig) -> Vec<ExtractedLink> {
    match try_extract_links(path, config) {
        Ok(links) => {
            debug!(path = %path.display(), count = links.len(), "extracted deck links");
            links
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not extract links from deck");
            Vec::new()
        }
    }
}

/// All slides of a deck, empty when the deck cannot be read.
pub fn slides(path: &Path) -> Vec<Slide> {
    PptxContainer::open(path, ParserConfig::default())
        .and_then(|mut container| container.parse_all_multi_threaded())
        .unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "could not parse deck");
            Vec::new()
        })
}

fn read_slide(path: &Path, selector: SlideSelector) -> Result<Slide> {
    let mut container = PptxContainer::open(path, ParserConfig::default())?;
    match selector {
        SlideSelector::First => container.first_slide(),
        SlideSelector::Last => container.last_slide(),
    }
}

fn try_extract_links(path: &Path, config: &ParserConfig) -> Result<Vec<ExtractedLink>> {
    PptxContainer::open(path, config.clone())?.links()
}
