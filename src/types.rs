/// A hyperlink reference attached to a run, a shape click-action or a picture.
///
/// `rel_id` points into the slide's relationship file; `target` is filled in by
/// [`crate::Slide::link_hyperlinks`] once the relationships are known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hyperlink {
    pub rel_id: String,
    pub target: Option<String>,
}

impl Hyperlink {
    pub fn unresolved(rel_id: impl Into<String>) -> Self {
        Self { rel_id: rel_id.into(), target: None }
    }

    pub fn address(&self) -> Option<&str> {
        self.target.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone)]
pub enum SlideElement {
    Text(TextElement),
    Table(TableElement),
    Image(ImageElement),
    Group(Vec<SlideElement>),
    Unknown,
}

/// A shape with a text body (`<p:sp>`).
#[derive(Debug, Clone, Default)]
pub struct TextElement {
    pub paragraphs: Vec<Paragraph>,
    /// Placeholder type (`title`, `ctrTitle`, `body`, ...) when the shape is a placeholder.
    pub placeholder: Option<String>,
    /// Click-action hyperlink of the shape itself.
    pub action: Option<Hyperlink>,
}

impl TextElement {
    pub fn is_title(&self) -> bool {
        matches!(self.placeholder.as_deref(), Some("title") | Some("ctrTitle"))
    }

    /// Paragraph texts joined with newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(Run::extract).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Run {
    pub text: String,
    pub hyperlink: Option<Hyperlink>,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), hyperlink: None }
    }

    pub fn extract(&self) -> String {
        self.text.to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableElement {
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
}

impl TableCell {
    /// Cell text with paragraphs separated by newlines, as it reads in the deck.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Cell text collapsed onto one line, used for header matching and row names.
    pub fn single_line(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}

/// A picture shape (`<p:pic>`).
#[derive(Debug, Clone, Default)]
pub struct ImageElement {
    pub embed_id: Option<String>,
    pub hyperlink: Option<Hyperlink>,
}
