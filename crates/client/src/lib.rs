//! Client code for rocky.
//!
//! This crate provides the Notion document source, page id resolution, the
//! keyword retriever and chat-completion query engine, and the assembled
//! [`Assistant`] shared by the server and CLI.

pub mod assistant;
pub mod llm;
pub mod notion;
pub mod pages;

pub use assistant::Assistant;
pub use llm::{ChatClient, ChatConfig, DocumentIndex, LlmError, RagEngine};
pub use notion::{Block, BlockError, BlockKind, NotionClient, NotionConfig, NotionError};
pub use pages::{extract_page_ids, load_page_ids, resolve_source_ids};
