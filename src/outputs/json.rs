//! JSON-lines output.
//!
//! Each block becomes one object on its own line:
//!
//! ```text
//! {"index":0,"bytes":22,"lines":2,"content":"#EXTM3U\nhttp://x/1.ts\n"}
//! ```
//!
//! Unlike plain output, empty blocks are kept so consumers can count them.

use crate::models::FilteredContent;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Serialized form of one result block.
#[derive(Debug, Serialize)]
pub struct BlockRecord {
    pub index: usize,
    pub bytes: usize,
    pub lines: usize,
    pub content: String,
}

impl BlockRecord {
    pub fn new(index: usize, block: &FilteredContent) -> Self {
        Self {
            index,
            bytes: block.len(),
            lines: block.lines().count(),
            content: block.to_string_lossy(),
        }
    }
}

/// Write `block` as one JSON line numbered `index`. Always writes, so always
/// returns `true`.
pub async fn write_block<W>(out: &mut W, index: usize, block: &FilteredContent) -> std::io::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(&BlockRecord::new(index, block))?;
    line.push(b'\n');
    out.write_all(&line).await?;
    out.flush().await?;
    Ok(true)
}
