//! Notion block model and plain-text rendering.
//!
//! Blocks arrive as JSON objects tagged by `type`, with the payload stored
//! under a key of the same name:
//!
//! ```json
//! { "id": "…", "type": "paragraph", "has_children": false,
//!   "paragraph": { "rich_text": [{ "plain_text": "Hello" }] } }
//! ```
//!
//! Kinds the renderer does not know deserialize to [`BlockKind::Unsupported`]
//! and are reported as [`BlockError::Unsupported`] so callers can log and
//! skip them.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("unsupported block type: {0}")]
    Unsupported(String),

    #[error("malformed block: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ToDoBody {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CodeBody {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UrlRef {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileBody {
    #[serde(default)]
    pub external: Option<UrlRef>,
    #[serde(default)]
    pub file: Option<UrlRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookmarkBody {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TableRowBody {
    #[serde(default)]
    pub cells: Vec<Vec<RichText>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TitleBody {
    #[serde(default)]
    pub title: String,
}

/// Known block kinds with their payloads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph {
        paragraph: TextBody,
    },
    #[serde(rename = "heading_1")]
    Heading1 {
        heading_1: TextBody,
    },
    #[serde(rename = "heading_2")]
    Heading2 {
        heading_2: TextBody,
    },
    #[serde(rename = "heading_3")]
    Heading3 {
        heading_3: TextBody,
    },
    BulletedListItem {
        bulleted_list_item: TextBody,
    },
    NumberedListItem {
        numbered_list_item: TextBody,
    },
    Quote {
        quote: TextBody,
    },
    Callout {
        callout: TextBody,
    },
    ToDo {
        to_do: ToDoBody,
    },
    Toggle {
        toggle: TextBody,
    },
    Code {
        code: CodeBody,
    },
    Divider {},
    Image {
        image: FileBody,
    },
    Bookmark {
        bookmark: BookmarkBody,
    },
    Table {},
    TableRow {
        table_row: TableRowBody,
    },
    ChildPage {
        child_page: TitleBody,
    },
    ChildDatabase {
        child_database: TitleBody,
    },
    ColumnList {},
    Column {},
    #[serde(other)]
    Unsupported,
}

/// A parsed block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl Block {
    /// Parse one block from the raw API object.
    pub fn parse(raw: &Value) -> Result<Self, BlockError> {
        let kind_name = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| BlockError::Malformed("missing `type`".into()))?
            .to_string();

        let block = Block::deserialize(raw).map_err(|e| BlockError::Malformed(format!("{kind_name}: {e}")))?;

        match block.kind {
            BlockKind::Unsupported => Err(BlockError::Unsupported(kind_name)),
            _ => Ok(block),
        }
    }

    /// Plain-text line for this block, or None when it carries no text of
    /// its own (structural blocks, empty paragraphs).
    pub fn render(&self) -> Option<String> {
        match &self.kind {
            BlockKind::Paragraph { paragraph: body }
            | BlockKind::Callout { callout: body }
            | BlockKind::Toggle { toggle: body } => join(&body.rich_text),
            BlockKind::Heading1 { heading_1: body } => prefixed("# ", &body.rich_text),
            BlockKind::Heading2 { heading_2: body } => prefixed("## ", &body.rich_text),
            BlockKind::Heading3 { heading_3: body } => prefixed("### ", &body.rich_text),
            BlockKind::BulletedListItem { bulleted_list_item: body } => prefixed("- ", &body.rich_text),
            BlockKind::NumberedListItem { numbered_list_item: body } => prefixed("1. ", &body.rich_text),
            BlockKind::Quote { quote: body } => prefixed("> ", &body.rich_text),
            BlockKind::ToDo { to_do } => {
                let mark = if to_do.checked { "- [x] " } else { "- [ ] " };
                prefixed(mark, &to_do.rich_text)
            }
            BlockKind::Code { code } => {
                let text = join(&code.rich_text)?;
                let language = code.language.as_deref().unwrap_or("");
                Some(format!("```{language}\n{text}\n```"))
            }
            BlockKind::Divider {} => Some("---".to_string()),
            BlockKind::Image { image } => {
                let url = image.external.as_ref().or(image.file.as_ref())?;
                Some(format!("![Image]({})", url.url))
            }
            BlockKind::Bookmark { bookmark } => {
                if bookmark.url.is_empty() {
                    return None;
                }
                match join(&bookmark.caption) {
                    Some(caption) => Some(format!("[{caption}]({})", bookmark.url)),
                    None => Some(bookmark.url.clone()),
                }
            }
            BlockKind::TableRow { table_row } => {
                let cells: Vec<String> = table_row.cells.iter().map(|cell| join(cell).unwrap_or_default()).collect();
                if cells.iter().all(String::is_empty) {
                    return None;
                }
                Some(cells.join(" | "))
            }
            BlockKind::ChildPage { child_page: body } | BlockKind::ChildDatabase { child_database: body } => {
                let title = body.title.trim();
                if title.is_empty() { None } else { Some(format!("## {title}")) }
            }
            BlockKind::Table {} | BlockKind::ColumnList {} | BlockKind::Column {} | BlockKind::Unsupported => None,
        }
    }
}

fn join(rich_text: &[RichText]) -> Option<String> {
    let text: String = rich_text.iter().map(|r| r.plain_text.as_str()).collect();
    let text = text.trim();
    if text.is_empty() { None } else { Some(text.to_string()) }
}

fn prefixed(prefix: &str, rich_text: &[RichText]) -> Option<String> {
    join(rich_text).map(|text| format!("{prefix}{text}"))
}
