//! Plain-text output: the filtered lines exactly as kept.

use crate::models::FilteredContent;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Write `block`, preceded by a blank separator line when `printed` earlier
/// blocks are already on `out`.
///
/// # Returns
///
/// `false` when `block` was empty and nothing was written.
pub async fn write_block<W>(out: &mut W, printed: usize, block: &FilteredContent) -> std::io::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    if block.is_empty() {
        return Ok(false);
    }
    if printed > 0 {
        out.write_all(b"\n").await?;
    }
    out.write_all(block.as_bytes()).await?;
    out.flush().await?;
    Ok(true)
}
