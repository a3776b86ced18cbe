use super::{Error, Result, Slide};
use crate::links::{ExtractedLink, LinkCollector};
use crate::parser_config::{LinkScope, ParserConfig};
use rayon::prelude::*;
use std::{io::Read, path::Path};

/// Holds the internal representation of a loaded PowerPoint (pptx) container.
///
/// `PptxContainer` gives access to the slides of a deck and their relationship
/// parts directly from the zip archive. Slides are parsed lazily on request.
pub struct PptxContainer {
    pub config: ParserConfig,
    archive: zip::ZipArchive<std::fs::File>,
    pub slide_paths: Vec<String>,
    pub slide_count: u32,
}

impl PptxContainer {
    /// Opens a PowerPoint pptx file and indexes its slide parts.
    ///
    /// Slide paths are ordered by slide number, so `slide10.xml` comes after `slide9.xml`.
    ///
    /// # Errors
    ///
    /// Errors are returned on file access problems or if the file is not a zip archive.
    pub fn open(path: &Path, config: ParserConfig) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)?;

        let mut slide_paths: Vec<String> = Vec::new();

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            let name = file.name().to_string();

            if name.starts_with("ppt/slides/slide") && name.ends_with(".xml") {
                slide_paths.push(name);
            }
        }

        slide_paths.sort_by_key(|p| (Slide::extract_slide_number(p).unwrap_or(u32::MAX), p.clone()));
        let slide_count = slide_paths.len() as u32;

        Ok(Self { archive, slide_paths, config, slide_count })
    }

    /// Parses all slides in order.
    pub fn parse_all(&mut self) -> Result<Vec<Slide>> {
        let paths = self.slide_paths.clone();
        let mut slides = Vec::with_capacity(paths.len());

        for path in &paths {
            slides.push(self.load_slide(path)?);
        }

        Ok(slides)
    }

    /// Parses all slides with the XML work spread over rayon's pool.
    ///
    /// Archive reads happen sequentially first (the zip reader is not shareable),
    /// then the slide and relationship XML is parsed in parallel. Output order
    /// matches [`PptxContainer::parse_all`].
    pub fn parse_all_multi_threaded(&mut self) -> Result<Vec<Slide>> {
        let slide_paths = self.slide_paths.clone();
        let mut raw_data = Vec::with_capacity(slide_paths.len());

        for slide_path in slide_paths {
            let slide_xml = self.read_file_from_archive(&slide_path)?;
            let rels_path = self.get_slide_rels_path(&slide_path);
            let rels_data = self.read_file_from_archive(&rels_path).ok();
            raw_data.push((slide_path, slide_xml, rels_data));
        }

        raw_data
            .into_par_iter()
            .map(|(path, xml, rels)| Slide::parse(&xml, path, rels.as_deref()))
            .collect()
    }

    pub fn iter_slides(&mut self) -> SlideIterator {
        SlideIterator::new(self)
    }

    /// Loads the first slide of the deck.
    pub fn first_slide(&mut self) -> Result<Slide> {
        let path = self.slide_paths.first().cloned().ok_or(Error::SlideNotFound)?;
        self.load_slide(&path)
    }

    /// Loads the last slide of the deck.
    pub fn last_slide(&mut self) -> Result<Slide> {
        let path = self.slide_paths.last().cloned().ok_or(Error::SlideNotFound)?;
        self.load_slide(&path)
    }

    /// Video links of the deck, from the slides the container's [`LinkScope`] selects.
    ///
    /// Links repeated across slides are merged, keeping the first position and
    /// the first non-empty name.
    pub fn links(&mut self) -> Result<Vec<ExtractedLink>> {
        match self.config.link_scope {
            LinkScope::LastSlide => Ok(self.last_slide()?.links(&self.config)),
            LinkScope::AllSlides => {
                let mut collector = LinkCollector::new();
                for slide in self.parse_all_multi_threaded()? {
                    collector.extend(slide.links(&self.config));
                }
                Ok(collector.finish())
            }
        }
    }

    /// Loads a slide from the PPTX file by its internal path, together with its
    /// relationship part if the deck has one.
    pub fn load_slide(&mut self, slide_path: &str) -> Result<Slide> {
        let slide_data = self.read_file_from_archive(slide_path)?;

        let rels_path = self.get_slide_rels_path(slide_path);
        let rels_data = self.read_file_from_archive(&rels_path).ok();

        Slide::parse(&slide_data, slide_path.to_string(), rels_data.as_deref())
    }

    /// Reads a file from the PPTX archive by its internal path.
    pub fn read_file_from_archive(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(path)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Constructs the path to the relationships file for a given slide.
    ///
    /// `ppt/slides/slide1.xml` maps to `ppt/slides/_rels/slide1.xml.rels`.
    pub fn get_slide_rels_path(&self, slide_path: &str) -> String {
        let mut rels_path = slide_path.to_string();
        if let Some(pos) = rels_path.rfind('/') {
            rels_path.insert_str(pos + 1, "_rels/");
        }
        rels_path.push_str(".rels");
        rels_path
    }
}

/// Streams slides one by one, in slide-number order.
pub struct SlideIterator<'a> {
    container: &'a mut PptxContainer,
    current_paths: Vec<String>,
    current_index: usize,
}

impl<'a> SlideIterator<'a> {
    fn new(container: &'a mut PptxContainer) -> Self {
        let current_paths = container.slide_paths.clone();
        Self { container, current_paths, current_index: 0 }
    }
}

impl Iterator for SlideIterator<'_> {
    type Item = Result<Slide>;

    fn next(&mut self) -> Option<Self::Item> {
        let slide_path = self.current_paths.get(self.current_index)?;
        self.current_index += 1;
        Some(self.container.load_slide(slide_path))
    }
}
