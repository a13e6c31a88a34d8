use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// One block of a user prompt as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptBlock {
    Text {
        text: String,
    },
    ResourceLink {
        uri: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "mimeType")]
        mime_type: Option<String>,
    },
    /// Image, audio and embedded resources are not supported and are dropped.
    #[serde(other)]
    Unsupported,
}

impl PromptBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn resource_link(uri: impl Into<String>) -> Self {
        Self::ResourceLink {
            uri: uri.into(),
            name: None,
            mime_type: None,
        }
    }
}

/// Resolves a resource reference to text. `None` means unavailable.
pub trait ResourceReader: Send + Sync {
    fn read<'a>(&'a self, uri: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
}

/// Reads `file://` URIs from the local filesystem.
#[derive(Debug, Default)]
pub struct FileResourceReader;

impl ResourceReader for FileResourceReader {
    fn read<'a>(&'a self, uri: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            let path = uri.strip_prefix("file://")?;
            match tokio::fs::read_to_string(path).await {
                Ok(content) => Some(content),
                Err(e) => {
                    tracing::debug!(uri, "skipping unreadable resource: {e}");
                    None
                }
            }
        })
    }
}

struct Attachment {
    name: String,
    content: String,
}

/// Flatten prompt blocks into the text of one User message.
///
/// Text blocks are joined with newlines in order. Readable resources follow
/// as labelled fenced sections; unreadable ones are skipped.
pub async fn normalize_prompt(blocks: &[PromptBlock], reader: &dyn ResourceReader) -> String {
    let mut texts = Vec::new();
    let mut attachments = Vec::new();

    for block in blocks {
        match block {
            PromptBlock::Text { text } => texts.push(text.as_str()),
            PromptBlock::ResourceLink { uri, name, .. } => {
                if let Some(content) = reader.read(uri).await {
                    let name = name
                        .clone()
                        .unwrap_or_else(|| uri.rsplit('/').next().unwrap_or(uri).to_string());
                    attachments.push(Attachment { name, content });
                }
            }
            PromptBlock::Unsupported => {}
        }
    }

    let mut user_text = texts.join("\n");
    if !attachments.is_empty() {
        user_text.push_str("\n\n--- Attached Files ---\n");
        for attachment in attachments {
            user_text.push_str(&format!(
                "\n### {}\n```\n{}\n```\n",
                attachment.name, attachment.content
            ));
        }
    }
    user_text
}
