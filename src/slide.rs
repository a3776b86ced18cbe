use crate::links::{ExtractedLink, LinkCollector};
use crate::parse_rels::Relationship;
use crate::parser_config::ParserConfig;
use crate::types::{Hyperlink, Paragraph, SlideElement, TableElement, TextElement};
use crate::{parse_rels, parse_xml, Result};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Slide {
    pub rel_path: String,
    pub slide_number: u32,
    pub elements: Vec<SlideElement>,
    pub relationships: Vec<Relationship>,
}

impl Slide {
    pub fn new(
        rel_path: String,
        slide_number: u32,
        elements: Vec<SlideElement>,
        relationships: Vec<Relationship>,
    ) -> Self {
        let mut slide = Slide { rel_path, slide_number, elements, relationships };
        slide.link_hyperlinks();
        slide
    }

    /// Parses one slide part and, if present, its relationships part.
    pub fn parse(xml: &[u8], rel_path: String, rels_data: Option<&[u8]>) -> Result<Slide> {
        let slide_number = Self::extract_slide_number(&rel_path).unwrap_or(0);
        let elements = parse_xml::parse_slide_xml(xml)?;
        let relationships = match rels_data {
            Some(data) => parse_rels::parse_slide_rels(data)?,
            None => Vec::new(),
        };

        Ok(Slide::new(rel_path, slide_number, elements, relationships))
    }

    pub(crate) fn extract_slide_number(path: &str) -> Option<u32> {
        path.split('/')
            .last()
            .and_then(|filename| filename.strip_prefix("slide").and_then(|s| s.strip_suffix(".xml")))
            .and_then(|num_str| num_str.parse::<u32>().ok())
    }

    /// Resolves every hyperlink relationship id to its target address.
    pub fn link_hyperlinks(&mut self) {
        let id_to_target: HashMap<String, String> = self
            .relationships
            .iter()
            .filter(|rel| rel.is_hyperlink())
            .map(|rel| (rel.id.clone(), rel.target.clone()))
            .collect();

        resolve_elements(&mut self.elements, &id_to_target);
    }

    /// Flat slide text: each text-shape paragraph followed by a newline, then each
    /// table cell followed by a newline, in shape order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        append_text(&self.elements, &mut out);
        out
    }

    /// The slide title: the title placeholder if there is one, else the first line
    /// of the first text shape.
    pub fn title(&self) -> Option<String> {
        let mut shapes = Vec::new();
        collect_text_shapes(&self.elements, &mut shapes);

        if let Some(title) = shapes.iter().find(|shape| shape.is_title()) {
            let text = title.text().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }

        shapes
            .first()
            .and_then(|shape| shape.text().trim().lines().next().map(str::to_string))
            .filter(|line| !line.is_empty())
    }

    /// Every link on the slide, de-duplicated.
    ///
    /// Links found in table data rows carry the text of the row's name column, the
    /// column being picked from the header row by `config`'s keywords.
    pub fn links(&self, config: &ParserConfig) -> Vec<ExtractedLink> {
        let mut collector = LinkCollector::new();
        collect_links(&self.elements, config, &mut collector);
        collector.finish()
    }
}

fn resolve(hyperlink: &mut Option<Hyperlink>, targets: &HashMap<String, String>) {
    if let Some(link) = hyperlink {
        link.target = targets.get(&link.rel_id).cloned();
    }
}

fn resolve_paragraphs(paragraphs: &mut [Paragraph], targets: &HashMap<String, String>) {
    for run in paragraphs.iter_mut().flat_map(|p| p.runs.iter_mut()) {
        resolve(&mut run.hyperlink, targets);
    }
}

fn resolve_elements(elements: &mut [SlideElement], targets: &HashMap<String, String>) {
    for element in elements {
        match element {
            SlideElement::Text(text) => {
                resolve(&mut text.action, targets);
                resolve_paragraphs(&mut text.paragraphs, targets);
            }
            SlideElement::Table(table) => {
                for cell in table.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                    resolve_paragraphs(&mut cell.paragraphs, targets);
                }
            }
            SlideElement::Image(image) => resolve(&mut image.hyperlink, targets),
            SlideElement::Group(inner) => resolve_elements(inner, targets),
            SlideElement::Unknown => {}
        }
    }
}

fn append_text(elements: &[SlideElement], out: &mut String) {
    for element in elements {
        match element {
            SlideElement::Text(text) => {
                for paragraph in &text.paragraphs {
                    out.push_str(&paragraph.text());
                    out.push('\n');
                }
            }
            SlideElement::Table(table) => {
                for cell in table.rows.iter().flat_map(|r| r.cells.iter()) {
                    out.push_str(&cell.text());
                    out.push('\n');
                }
            }
            SlideElement::Group(inner) => append_text(inner, out),
            SlideElement::Image(_) | SlideElement::Unknown => {}
        }
    }
}

fn collect_text_shapes<'a>(elements: &'a [SlideElement], out: &mut Vec<&'a TextElement>) {
    for element in elements {
        match element {
            SlideElement::Text(text) if !text.paragraphs.is_empty() => out.push(text),
            SlideElement::Group(inner) => collect_text_shapes(inner, out),
            _ => {}
        }
    }
}

fn collect_paragraph_links(paragraphs: &[Paragraph], name: Option<&str>, collector: &mut LinkCollector) {
    for paragraph in paragraphs {
        collector.push_text(&paragraph.text(), name);
        for run in &paragraph.runs {
            if let Some(address) = run.hyperlink.as_ref().and_then(Hyperlink::address) {
                collector.push(address, name);
            }
        }
    }
}

fn collect_table_links(table: &TableElement, config: &ParserConfig, collector: &mut LinkCollector) {
    let Some((header, data_rows)) = table.rows.split_first() else {
        return;
    };

    let name_column = header
        .cells
        .iter()
        .position(|cell| config.is_name_header(&cell.single_line()));

    for row in data_rows {
        let row_name = name_column
            .and_then(|idx| row.cells.get(idx))
            .map(|cell| cell.single_line())
            .filter(|name| !name.is_empty());

        for cell in &row.cells {
            collect_paragraph_links(&cell.paragraphs, row_name.as_deref(), collector);
        }
    }
}

fn collect_links(elements: &[SlideElement], config: &ParserConfig, collector: &mut LinkCollector) {
    for element in elements {
        match element {
            SlideElement::Text(text) => {
                if let Some(address) = text.action.as_ref().and_then(Hyperlink::address) {
                    collector.push(address, None);
                }
                collect_paragraph_links(&text.paragraphs, None, collector);
            }
            SlideElement::Table(table) => collect_table_links(table, config, collector),
            SlideElement::Image(image) => {
                if let Some(address) = image.hyperlink.as_ref().and_then(Hyperlink::address) {
                    collector.push(address, None);
                }
            }
            SlideElement::Group(inner) => collect_links(inner, config, collector),
            SlideElement::Unknown => {}
        }
    }
}
