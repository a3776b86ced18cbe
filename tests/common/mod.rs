#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use deck_vault::drive::{DriveApi, DriveError, DriveResult, FileList, FileQuery, RemoteFile};
use deck_vault::video::{VideoError, VideoHost};
use deck_vault::{FOLDER_MIME_TYPE, PPTX_MIME_TYPE};

pub const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const P_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const HYPERLINK_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const TABLE_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/table";

// ---------------------------------------------------------------------------
// Deck building
// ---------------------------------------------------------------------------

/// One slide part plus its hyperlink relationships (`rId` → URL).
pub struct SlideSpec {
    pub shapes: Vec<String>,
    pub links: Vec<(String, String)>,
}

impl SlideSpec {
    pub fn new(shapes: Vec<String>) -> Self {
        Self { shapes, links: Vec::new() }
    }

    pub fn link(mut self, rel_id: &str, url: &str) -> Self {
        self.links.push((rel_id.to_string(), url.to_string()));
        self
    }

    pub fn xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="{A_NS}" xmlns:p="{P_NS}" xmlns:r="{R_NS}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>"#,
            self.shapes.concat()
        )
    }

    pub fn rels_xml(&self) -> String {
        let rels: String = self
            .links
            .iter()
            .map(|(id, url)| {
                format!(r#"<Relationship Id="{id}" Type="{HYPERLINK_TYPE}" Target="{}" TargetMode="External"/>"#, escape(url))
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        )
    }
}

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn paragraph(line: &str) -> String {
    format!("<a:p><a:r><a:rPr lang=\"en-US\"/><a:t>{}</a:t></a:r></a:p>", escape(line))
}

/// A text box with one paragraph per line.
pub fn text_shape(lines: &[&str]) -> String {
    let body: String = lines.iter().map(|l| paragraph(l)).collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="TextBox"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/>{body}</p:txBody></p:sp>"#
    )
}

pub fn title_shape(title: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Title"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/>{}</p:txBody></p:sp>"#,
        paragraph(title)
    )
}

/// A run whose text is hyperlinked through `rel_id`.
pub fn linked_run_shape(text: &str, rel_id: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="4" name="Link"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:rPr lang="en-US"><a:hlinkClick r:id="{rel_id}"/></a:rPr><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>"#,
        escape(text)
    )
}

/// A picture with a click hyperlink.
pub fn linked_picture(rel_id: &str) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="5" name="Picture"><a:hlinkClick r:id="{rel_id}"/></p:cNvPr><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rIdImg"/></p:blipFill><p:spPr/></p:pic>"#
    )
}

/// A table cell: plain text, or text hyperlinked through a relationship id.
pub enum Cell<'a> {
    Text(&'a str),
    Link(&'a str, &'a str),
}

pub fn table(rows: &[Vec<Cell>]) -> String {
    let rows: String = rows
        .iter()
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|cell| {
                    let run = match cell {
                        Cell::Text(text) => format!("<a:r><a:t>{}</a:t></a:r>", escape(text)),
                        Cell::Link(text, rel_id) => format!(
                            r#"<a:r><a:rPr><a:hlinkClick r:id="{rel_id}"/></a:rPr><a:t>{}</a:t></a:r>"#,
                            escape(text)
                        ),
                    };
                    format!("<a:tc><a:txBody><a:bodyPr/><a:p>{run}</a:p></a:txBody></a:tc>")
                })
                .collect();
            format!(r#"<a:tr h="370840">{cells}</a:tr>"#)
        })
        .collect();

    format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="6" name="Table"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/><a:graphic><a:graphicData uri="{TABLE_URI}"><a:tbl><a:tblGrid/>{rows}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#
    )
}

/// Writes a `.pptx` zip holding `slides` in order, with their relationship parts.
pub fn write_deck(path: &Path, slides: &[SlideSpec]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();
    zip.start_file("ppt/presentation.xml", options).unwrap();
    zip.write_all(format!(r#"<p:presentation xmlns:p="{P_NS}"/>"#).as_bytes()).unwrap();

    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        zip.start_file(format!("ppt/slides/slide{n}.xml"), options).unwrap();
        zip.write_all(slide.xml().as_bytes()).unwrap();
        zip.start_file(format!("ppt/slides/_rels/slide{n}.xml.rels"), options).unwrap();
        zip.write_all(slide.rels_xml().as_bytes()).unwrap();
    }

    zip.finish().unwrap();
}

pub fn deck_bytes(slides: &[SlideSpec]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deck.pptx");
    write_deck(&path, slides);
    std::fs::read(path).unwrap()
}

/// The North / Store A deck: zone and market on the first slide, a named
/// external video in the last slide's table.
pub fn north_store_deck() -> Vec<u8> {
    let first = SlideSpec::new(vec![text_shape(&["ZONE : North", "North 1_Delhi_Market", "STATE : Delhi"])]);
    let last = SlideSpec::new(vec![table(&[
        vec![Cell::Text("Store Name"), Cell::Text("Video")],
        vec![Cell::Text("Store A"), Cell::Link("Watch", "rId2")],
    ])])
    .link("rId2", "https://youtu.be/abc123");
    deck_bytes(&[first, last])
}

// ---------------------------------------------------------------------------
// In-memory Drive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calls {
    pub list: usize,
    pub get: usize,
    pub download: usize,
    pub create_folder: usize,
    pub create_file: usize,
    pub update_file: usize,
}

struct Entry {
    file: RemoteFile,
    trashed: bool,
    content: Vec<u8>,
}

#[derive(Default)]
struct State {
    entries: Vec<Entry>,
    next_id: usize,
    calls: Calls,
    broken_folders: HashSet<String>,
    unauthorized: bool,
}

/// A `DriveApi` over a vector of entries. Listings are paged to exercise
/// continuation tokens.
pub struct FakeDrive {
    state: Mutex<State>,
    page_size: usize,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::with_page_size(2)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self { state: Mutex::new(State::default()), page_size: page_size.max(1) }
    }

    fn insert(&self, name: &str, parent: Option<&str>, mime: &str, content: Vec<u8>) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("id{}", state.next_id);
        state.entries.push(Entry {
            file: RemoteFile {
                id: id.clone(),
                name: name.to_string(),
                mime_type: mime.to_string(),
                parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
                size: (mime != FOLDER_MIME_TYPE).then_some(content.len() as u64),
            },
            trashed: false,
            content,
        });
        id
    }

    pub fn add_root(&self, name: &str) -> String {
        self.insert(name, None, FOLDER_MIME_TYPE, Vec::new())
    }

    pub fn add_folder(&self, name: &str, parent: &str) -> String {
        self.insert(name, Some(parent), FOLDER_MIME_TYPE, Vec::new())
    }

    pub fn add_file(&self, name: &str, parent: &str, mime: &str, content: Vec<u8>) -> String {
        self.insert(name, Some(parent), mime, content)
    }

    pub fn add_deck(&self, name: &str, parent: &str, content: Vec<u8>) -> String {
        self.add_file(name, parent, PPTX_MIME_TYPE, content)
    }

    pub fn trash(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.entries.iter_mut().find(|e| e.file.id == id) {
            entry.trashed = true;
        }
    }

    /// Listing this folder fails with a server error.
    pub fn break_folder(&self, id: &str) {
        self.state.lock().unwrap().broken_folders.insert(id.to_string());
    }

    /// Every call fails with 401 from now on.
    pub fn revoke(&self) {
        self.state.lock().unwrap().unauthorized = true;
    }

    /// Non-trashed children of `parent`, in insertion order.
    pub fn children(&self, parent: &str) -> Vec<RemoteFile> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .iter()
            .filter(|e| !e.trashed && e.file.parents.iter().any(|p| p == parent))
            .map(|e| e.file.clone())
            .collect()
    }

    pub fn names_in(&self, parent: &str) -> Vec<String> {
        self.children(parent).into_iter().map(|f| f.name).collect()
    }

    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.entries.iter().find(|e| e.file.id == id).map(|e| e.content.clone())
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    fn check_auth(state: &State) -> DriveResult<()> {
        if state.unauthorized {
            return Err(DriveError::from_http_status(401, "fake", "Invalid Credentials"));
        }
        Ok(())
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn list_page(&self, query: &FileQuery, page_token: Option<&str>) -> DriveResult<FileList> {
        let mut state = self.state.lock().unwrap();
        state.calls.list += 1;
        Self::check_auth(&state)?;

        if let Some(parent) = &query.parent {
            if state.broken_folders.contains(parent) {
                return Err(DriveError::from_http_status(500, format!("list {parent}"), "backend error"));
            }
        }

        let matching: Vec<RemoteFile> = state
            .entries
            .iter()
            .filter(|e| query.matches(&e.file, e.trashed))
            .map(|e| e.file.clone())
            .collect();

        let offset: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (offset + self.page_size).min(matching.len());
        let files = matching.get(offset..end).map(<[RemoteFile]>::to_vec).unwrap_or_default();
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        Ok(FileList { files, next_page_token })
    }

    async fn get_metadata(&self, file_id: &str) -> DriveResult<RemoteFile> {
        let mut state = self.state.lock().unwrap();
        state.calls.get += 1;
        Self::check_auth(&state)?;
        state
            .entries
            .iter()
            .find(|e| e.file.id == file_id)
            .map(|e| e.file.clone())
            .ok_or_else(|| DriveError::NotFound(file_id.to_string()))
    }

    async fn download(&self, file_id: &str, destination: &Path) -> DriveResult<u64> {
        let content = {
            let mut state = self.state.lock().unwrap();
            state.calls.download += 1;
            Self::check_auth(&state)?;
            state
                .entries
                .iter()
                .find(|e| e.file.id == file_id && e.file.mime_type != FOLDER_MIME_TYPE)
                .map(|e| e.content.clone())
                .ok_or_else(|| DriveError::NotFound(file_id.to_string()))?
        };
        tokio::fs::write(destination, &content).await?;
        Ok(content.len() as u64)
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> DriveResult<RemoteFile> {
        {
            let mut state = self.state.lock().unwrap();
            state.calls.create_folder += 1;
            Self::check_auth(&state)?;
        }
        let id = self.add_folder(name, parent_id);
        self.get_metadata(&id).await
    }

    async fn create_file(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        source: &Path,
    ) -> DriveResult<RemoteFile> {
        {
            let mut state = self.state.lock().unwrap();
            state.calls.create_file += 1;
            Self::check_auth(&state)?;
        }
        let content = tokio::fs::read(source).await?;
        let id = self.add_file(name, parent_id, mime_type, content);
        self.get_metadata(&id).await
    }

    async fn update_file(&self, file_id: &str, _mime_type: &str, source: &Path) -> DriveResult<RemoteFile> {
        let content = tokio::fs::read(source).await?;
        let mut state = self.state.lock().unwrap();
        state.calls.update_file += 1;
        Self::check_auth(&state)?;
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.file.id == file_id)
            .ok_or_else(|| DriveError::NotFound(file_id.to_string()))?;
        entry.file.size = Some(content.len() as u64);
        entry.content = content;
        Ok(entry.file.clone())
    }
}

// ---------------------------------------------------------------------------
// Video host
// ---------------------------------------------------------------------------

/// Serves canned bytes per URL and records what was fetched.
#[derive(Default)]
pub struct FakeVideoHost {
    videos: HashMap<String, Vec<u8>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeVideoHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.videos.insert(url.to_string(), bytes);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoHost for FakeVideoHost {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, VideoError> {
        self.fetched.lock().unwrap().push(url.to_string());
        let bytes = self
            .videos
            .get(url)
            .ok_or_else(|| VideoError::DownloadFailed { message: format!("video unavailable: {url}") })?;
        tokio::fs::write(destination, bytes).await?;
        Ok(bytes.len() as u64)
    }
}
