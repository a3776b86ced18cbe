/// Which slides of a deck are scanned for video links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkScope {
    /// Only the last slide, where the decks keep their video table.
    #[default]
    LastSlide,
    /// Every slide in the deck.
    AllSlides,
}

impl std::str::FromStr for LinkScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last" | "last-slide" => Ok(LinkScope::LastSlide),
            "all" | "all-slides" => Ok(LinkScope::AllSlides),
            other => Err(format!("unknown link scope '{other}', expected 'last' or 'all'")),
        }
    }
}

/// Configuration options for deck scanning.
///
/// Use [`ParserConfig::builder()`] to create a configuration instance.
///
/// | Parameter | Type | Default | Description |
/// |-----------|------|---------|-------------|
/// | `link_scope` | [`LinkScope`] | `LastSlide` | Slides searched for links |
/// | `name_headers` | `Vec<String>` | `["name"]` | Lowercase keywords that mark a table's name column |
///
/// [`ParserConfig::all_slides()`] is the multi-slide preset which also accepts
/// `store` and `market` header cells.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub link_scope: LinkScope,
    pub name_headers: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            link_scope: LinkScope::LastSlide,
            name_headers: vec!["name".to_string()],
        }
    }
}

impl ParserConfig {
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::default()
    }

    pub fn all_slides() -> Self {
        Self {
            link_scope: LinkScope::AllSlides,
            name_headers: ["name", "store", "market"].iter().map(|s| s.to_string()).collect(),
        }
    }

    /// True if a header cell's text marks the name column.
    pub fn is_name_header(&self, cell_text: &str) -> bool {
        let lowered = cell_text.trim().to_lowercase();
        self.name_headers.iter().any(|keyword| lowered.contains(keyword.as_str()))
    }
}

/// Builder for [`ParserConfig`].
#[derive(Debug, Default)]
pub struct ParserConfigBuilder {
    link_scope: Option<LinkScope>,
    name_headers: Option<Vec<String>>,
}

impl ParserConfigBuilder {
    pub fn link_scope(mut self, scope: LinkScope) -> Self {
        self.link_scope = Some(scope);
        self
    }

    /// Replaces the header keywords; they are matched case-insensitively.
    pub fn name_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_headers = Some(headers.into_iter().map(|h| h.into().to_lowercase()).collect());
        self
    }

    pub fn build(self) -> ParserConfig {
        let defaults = ParserConfig::default();
        ParserConfig {
            link_scope: self.link_scope.unwrap_or(defaults.link_scope),
            name_headers: self.name_headers.unwrap_or(defaults.name_headers),
        }
    }
}
