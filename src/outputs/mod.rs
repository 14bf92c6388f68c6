//! Rendering of result blocks for the command-line front end.
//!
//! # Submodules
//!
//! - [`json`]: one JSON object per line, for piping into other tools
//! - [`plain`]: the playlist lines as-is, blocks separated by a blank line

pub mod json;
pub mod plain;

use crate::models::FilteredContent;
use tokio::io::AsyncWrite;

/// How the binary prints each block it drains from the result stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
}

/// Writes drained blocks in one format, numbering them as it goes.
///
/// Plain output separates blocks by a blank line and skips empty ones, so the
/// separator depends on how many blocks were actually printed, not on how many
/// were received. JSON output keeps every block and numbers them in arrival
/// order.
#[derive(Debug)]
pub struct BlockWriter<W> {
    out: W,
    format: OutputFormat,
    received: usize,
    printed: usize,
}

impl<W> BlockWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            received: 0,
            printed: 0,
        }
    }

    /// Write the next block.
    pub async fn write(&mut self, block: &FilteredContent) -> std::io::Result<()> {
        let printed = match self.format {
            OutputFormat::Plain => plain::write_block(&mut self.out, self.printed, block).await?,
            OutputFormat::Json => json::write_block(&mut self.out, self.received, block).await?,
        };
        self.received += 1;
        if printed {
            self.printed += 1;
        }
        Ok(())
    }

    /// Blocks handed to [`BlockWriter::write`] so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Blocks that produced output so far.
    pub fn printed(&self) -> usize {
        self.printed
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
