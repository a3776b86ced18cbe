use crate::constants::HYPERLINK_REL_TYPE;
use crate::{Error, Result};
use roxmltree::Document;

/// One `<Relationship>` entry of a slide's `.rels` part.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub fn is_hyperlink(&self) -> bool {
        self.rel_type == HYPERLINK_REL_TYPE
    }
}

/// Parses relationship (`.rels`) XML data of a PPTX slide.
///
/// Every relationship is returned; callers pick the ones they care about
/// (hyperlinks for link discovery, media for embedded pictures).
///
/// # Errors
///
/// An error is returned if the data is not valid UTF-8 or the XML is malformed.
pub fn parse_slide_rels(xml_data: &[u8]) -> Result<Vec<Relationship>> {
    let xml_str = std::str::from_utf8(xml_data)?;
    let doc = Document::parse(xml_str)?;
    let root = doc.root_element();

    let mut relationships = Vec::new();
    for rel in root.children().filter(|n| n.is_element() && n.tag_name().name() == "Relationship") {
        let (Some(id), Some(rel_type), Some(target)) =
            (rel.attribute("Id"), rel.attribute("Type"), rel.attribute("Target"))
        else {
            continue;
        };

        relationships.push(Relationship {
            id: id.to_string(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external: rel.attribute("TargetMode") == Some("External"),
        });
    }

    Ok(relationships)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout2.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://youtu.be/abc123" TargetMode="External"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.png"/>
</Relationships>"#;

    #[test]
    fn test_parse_slide_rels_keeps_every_relationship() {
        let rels = parse_slide_rels(RELS.as_bytes()).unwrap();
        assert_eq!(rels.len(), 3);
        assert_eq!(rels[1].id, "rId2");
        assert!(rels[1].is_hyperlink());
        assert!(rels[1].external);
        assert_eq!(rels[1].target, "https://youtu.be/abc123");
        assert!(!rels[2].is_hyperlink());
        assert!(!rels[2].external);
    }

    #[test]
    fn test_parse_slide_rels_empty() {
        let xml = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#;
        assert!(parse_slide_rels(xml.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_slide_rels_rejects_malformed_xml() {
        assert!(parse_slide_rels(b"<Relationships>").is_err());
    }
}
