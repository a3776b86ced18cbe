//! Walks a Google Drive folder tree, reads the PowerPoint decks it finds and
//! files the videos those decks link to next to them.
//!
//! The deck side (`PptxContainer`, `Slide`, [`deck`], [`fields`], [`links`]) is
//! synchronous and works on local files. The remote side ([`drive`], [`walker`],
//! [`uploader`], [`pipeline`], [`task`]) is async and goes through the
//! [`drive::DriveApi`] trait so it can run against an in-memory store in tests.

mod constants;
mod container;
mod parse_rels;
mod parse_xml;
mod parser_config;
mod slide;
mod types;

pub mod auth;
pub mod config;
pub mod deck;
pub mod drive;
pub mod fields;
pub mod links;
pub mod logging;
pub mod organize;
pub mod pipeline;
pub mod report;
pub mod task;
pub mod uploader;
pub mod video;
pub mod walker;

pub use constants::{FOLDER_MIME_TYPE, MIN_VIDEO_BYTES, PPTX_MIME_TYPE, VIDEO_MIME_TYPE};
pub use container::{PptxContainer, SlideIterator};
pub use parse_rels::Relationship;
pub use parser_config::{LinkScope, ParserConfig, ParserConfigBuilder};
pub use slide::Slide;
pub use types::*;

/// Errors from reading a deck.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Slide not found")]
    SlideNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
