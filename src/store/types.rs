//! Wire types exchanged with the note and folder stores.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Node, decode_content};

/// Server-assigned note id. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

/// Server-assigned folder id. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(pub i64);

impl NoteId {
    /// In-app link target for this note.
    pub fn href(self) -> String {
        format!("/notes/{}", self.0)
    }

    pub fn from_href(href: &str) -> Option<Self> {
        href.strip_prefix("/notes/")?.parse().ok().map(Self)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Size figures the store derives from a note's visible text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMetrics {
    pub size_bytes: u64,
    pub line_count: u64,
    pub word_count: u64,
    pub char_count: u64,
}

impl NoteMetrics {
    /// Measure stored content, whichever format it is in.
    pub fn measure(content: &str) -> Self {
        let visible = decode_content(content).plain_text();
        Self {
            size_bytes: visible.len() as u64,
            line_count: visible.lines().count() as u64,
            word_count: visible.split_whitespace().count() as u64,
            char_count: visible.chars().count() as u64,
        }
    }
}

/// A note as listed in folders and search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub folder_id: FolderId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: NoteMetrics,
}

/// A single note fetched for editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDetail {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    #[serde(flatten)]
    pub metrics: NoteMetrics,
    #[serde(default)]
    pub internal_links: Vec<NoteId>,
    #[serde(default)]
    pub external_links: Vec<String>,
}

/// A folder as the store lists it: flat, nested through `parent_folder_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub color: String,
    pub parent_folder_id: Option<FolderId>,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default)]
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteQuery {
    pub folder_id: Option<FolderId>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    pub folder_id: FolderId,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    pub id: NoteId,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub name: String,
    pub color: String,
    pub parent_folder_id: Option<FolderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFolderRequest {
    pub id: FolderId,
    pub name: String,
    pub color: String,
}

/// Links found in note content: mentions of other notes and web links.
pub fn extract_links(content: &str) -> (Vec<NoteId>, Vec<String>) {
    let mut internal = Vec::new();
    let mut external = Vec::new();
    collect_links(&decode_content(content), &mut internal, &mut external);
    (internal, external)
}

fn collect_links(node: &Node, internal: &mut Vec<NoteId>, external: &mut Vec<String>) {
    if node.is("mention")
        && let Some(id) = node
            .attr_str("id")
            .and_then(|s| s.parse().ok())
            .or_else(|| node.attr("id").and_then(serde_json::Value::as_i64))
        && !internal.contains(&NoteId(id))
    {
        internal.push(NoteId(id));
    }
    for href in node.marks.iter().filter_map(|m| m.href()) {
        if let Some(id) = NoteId::from_href(href) {
            if !internal.contains(&id) {
                internal.push(id);
            }
        } else if (href.starts_with("http://") || href.starts_with("https://")) && !external.iter().any(|e| e == href) {
            external.push(href.to_string());
        }
    }
    for child in &node.content {
        collect_links(child, internal, external);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_href() {
        assert_eq!(NoteId(12).href(), "/notes/12");
        assert_eq!(NoteId::from_href("/notes/12"), Some(NoteId(12)));
        assert_eq!(NoteId::from_href("/notes/x"), None);
        assert_eq!(NoteId::from_href("https://x.dev/notes/12"), None);
    }

    #[test]
    fn test_metrics_count_visible_text_only() {
        let markdown = NoteMetrics::measure("# Title\n\nsome **bold** words");
        assert_eq!(markdown.line_count, 2);
        assert_eq!(markdown.word_count, 4);
        assert_eq!(markdown.char_count, "Title\nsome bold words".len() as u64);

        let json = NoteMetrics::measure(r#"{"type":"doc","content":[{"type":"paragraph","content":[{"type":"text","text":"héllo"}]}]}"#);
        assert_eq!(json.char_count, 5);
        assert_eq!(json.size_bytes, 6);
    }

    #[test]
    fn test_note_detail_wire_shape() {
        let raw = r#"{"id":4,"title":"t","content":"c","sizeBytes":1,"lineCount":1,"wordCount":1,"charCount":1,"internalLinks":[2],"externalLinks":["https://x.dev"]}"#;
        let detail: NoteDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.id, NoteId(4));
        assert_eq!(detail.metrics.size_bytes, 1);
        assert_eq!(detail.internal_links, vec![NoteId(2)]);
    }

    #[test]
    fn test_extract_links() {
        let content = r##"{"type":"doc","content":[{"type":"paragraph","content":[
            {"type":"mention","attrs":{"id":"7"}},
            {"type":"text","text":"site","marks":[{"type":"link","attrs":{"href":"https://x.dev"}}]},
            {"type":"text","text":"local","marks":[{"type":"link","attrs":{"href":"#anchor"}}]},
            {"type":"text","text":"Other","marks":[{"type":"link","attrs":{"href":"/notes/9"}}]}
        ]}]}"##;
        let (internal, external) = extract_links(content);
        assert_eq!(internal, vec![NoteId(7), NoteId(9)]);
        assert_eq!(external, vec!["https://x.dev"]);
    }
}
