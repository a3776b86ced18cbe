use crate::constants::{A_NAMESPACE, P_NAMESPACE, RELS_NAMESPACE, TABLE_URI};
use crate::types::{
    Hyperlink, ImageElement, Paragraph, Run, SlideElement, TableCell, TableElement, TableRow,
    TextElement,
};
use crate::{Error, Result};
use roxmltree::{Document, Node};

/// Parses raw XML slide data from a PowerPoint (pptx) file and extracts all slide elements.
///
/// Text shapes, tables, pictures and group shapes are turned into [`SlideElement`] variants.
/// Hyperlinks are recorded by relationship id only; they are resolved against the slide's
/// `.rels` part afterwards.
///
/// # Errors
///
/// Parsing fails if:
/// - The provided XML data isn't valid UTF-8.
/// - The XML is malformed or lacks the `<p:cSld>` / `<p:spTree>` skeleton.
pub fn parse_slide_xml(xml_data: &[u8]) -> Result<Vec<SlideElement>> {
    let xml_str = std::str::from_utf8(xml_data)?;
    let doc = Document::parse(xml_str)?;
    let root = doc.root_element();

    let c_sld = root
        .descendants()
        .find(|n| is_tag(n, P_NAMESPACE, "cSld"))
        .ok_or(Error::ParseError("no <p:cSld> element in slide"))?;

    let sp_tree = child(&c_sld, P_NAMESPACE, "spTree")
        .ok_or(Error::ParseError("no <p:spTree> element in slide"))?;

    parse_shape_tree(&sp_tree)
}

/// Walks the direct children of a shape tree (`<p:spTree>` or `<p:grpSp>`).
fn parse_shape_tree(tree: &Node) -> Result<Vec<SlideElement>> {
    let mut elements = Vec::new();

    for child_node in tree.children().filter(|n| n.is_element()) {
        if child_node.tag_name().namespace() != Some(P_NAMESPACE) {
            continue;
        }
        match child_node.tag_name().name() {
            "sp" => elements.push(parse_sp(&child_node)),
            "graphicFrame" => {
                if let Some(element) = parse_graphic_frame(&child_node) {
                    elements.push(element);
                }
            }
            "pic" => elements.push(parse_pic(&child_node)),
            "grpSp" => elements.push(SlideElement::Group(parse_shape_tree(&child_node)?)),
            // properties of the tree itself
            "nvGrpSpPr" | "grpSpPr" => {}
            _ => elements.push(SlideElement::Unknown),
        }
    }

    Ok(elements)
}

/// Parses a shape node (`<p:sp>`): its placeholder type, click-action and text body.
/// Shapes without a text body become a text element with no paragraphs.
fn parse_sp(sp_node: &Node) -> SlideElement {
    let nv_sp_pr = child(sp_node, P_NAMESPACE, "nvSpPr");

    let action = nv_sp_pr
        .and_then(|n| child(&n, P_NAMESPACE, "cNvPr"))
        .and_then(|n| parse_hlink_click(&n));

    let placeholder = nv_sp_pr
        .and_then(|n| child(&n, P_NAMESPACE, "nvPr"))
        .and_then(|n| child(&n, P_NAMESPACE, "ph"))
        .map(|ph| ph.attribute("type").unwrap_or("obj").to_string());

    let paragraphs = child(sp_node, P_NAMESPACE, "txBody")
        .map(|tx_body| parse_paragraphs(&tx_body))
        .unwrap_or_default();

    SlideElement::Text(TextElement { paragraphs, placeholder, action })
}

/// Returns a table element for graphic frames that carry a table, `None` for charts,
/// diagrams and other graphic data.
fn parse_graphic_frame(node: &Node) -> Option<SlideElement> {
    let graphic_data = node.descendants().find(|n| {
        is_tag(n, A_NAMESPACE, "graphicData") && n.attribute("uri") == Some(TABLE_URI)
    })?;

    let tbl_node = child(&graphic_data, A_NAMESPACE, "tbl")?;
    Some(SlideElement::Table(parse_table(&tbl_node)))
}

/// Parses a table node (`<a:tbl>`) row by row (`<a:tr>`), cell by cell (`<a:tc>`).
fn parse_table(tbl_node: &Node) -> TableElement {
    let rows = children(tbl_node, A_NAMESPACE, "tr")
        .map(|tr_node| TableRow {
            cells: children(&tr_node, A_NAMESPACE, "tc")
                .map(|tc_node| TableCell {
                    paragraphs: child(&tc_node, A_NAMESPACE, "txBody")
                        .map(|tx_body| parse_paragraphs(&tx_body))
                        .unwrap_or_default(),
                })
                .collect(),
        })
        .collect();

    TableElement { rows }
}

/// Parses a picture node (`<p:pic>`) for its embedded blip and click hyperlink.
fn parse_pic(pic_node: &Node) -> SlideElement {
    let hyperlink = child(pic_node, P_NAMESPACE, "nvPicPr")
        .and_then(|n| child(&n, P_NAMESPACE, "cNvPr"))
        .and_then(|n| parse_hlink_click(&n));

    let embed_id = pic_node
        .descendants()
        .find(|n| is_tag(n, A_NAMESPACE, "blip"))
        .and_then(|blip| rel_id_attribute(&blip, "embed"))
        .map(str::to_string);

    SlideElement::Image(ImageElement { embed_id, hyperlink })
}

fn parse_paragraphs(tx_body_node: &Node) -> Vec<Paragraph> {
    children(tx_body_node, A_NAMESPACE, "p")
        .map(|p_node| parse_paragraph(&p_node))
        .collect()
}

/// Parses a paragraph node (`<a:p>`) into runs. Text fields (`<a:fld>`) read like runs,
/// line breaks (`<a:br>`) become a newline run.
fn parse_paragraph(p_node: &Node) -> Paragraph {
    let mut runs = Vec::new();

    for node in p_node.children().filter(|n| n.is_element()) {
        if node.tag_name().namespace() != Some(A_NAMESPACE) {
            continue;
        }
        match node.tag_name().name() {
            "r" | "fld" => runs.push(parse_run(&node)),
            "br" => runs.push(Run::plain("\n")),
            _ => {}
        }
    }

    Paragraph { runs }
}

/// Parses a text run (`<a:r>`): the text node (`<a:t>`) and a hyperlink on its
/// run properties (`<a:rPr><a:hlinkClick/></a:rPr>`).
fn parse_run(r_node: &Node) -> Run {
    let hyperlink = child(r_node, A_NAMESPACE, "rPr").and_then(|r_pr| parse_hlink_click(&r_pr));

    let text = child(r_node, A_NAMESPACE, "t")
        .and_then(|t| t.text())
        .unwrap_or_default()
        .to_string();

    Run { text, hyperlink }
}

fn parse_hlink_click(parent: &Node) -> Option<Hyperlink> {
    let hlink = child(parent, A_NAMESPACE, "hlinkClick")?;
    rel_id_attribute(&hlink, "id")
        .filter(|id| !id.is_empty())
        .map(Hyperlink::unresolved)
}

fn rel_id_attribute<'a>(node: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute((RELS_NAMESPACE, name))
}

fn is_tag(node: &Node, namespace: &str, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name && node.tag_name().namespace() == Some(namespace)
}

fn child<'a, 'input>(node: &Node<'a, 'input>, namespace: &str, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_tag(n, namespace, name))
}

fn children<'a, 'input: 'a>(
    node: &Node<'a, 'input>,
    namespace: &'a str,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| is_tag(n, namespace, name))
}
