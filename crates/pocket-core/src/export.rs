use std::io::Write;

use thiserror::Error;
use tracing::{debug, info};

use crate::api::{Action, ApiError, Item, PocketApi, RetrieveOptions};

/// Errors raised while exporting items.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Org-mode TODO heading linking to the item.
pub fn org_entry(item: &Item) -> String {
    format!("** TODO [[{}][{}]]", item.url(), item.title())
}

/// Write one Org entry per retrieved item, archiving each one after it is written.
///
/// Items are handled strictly one at a time. Each line is flushed before the
/// item is archived, so an archived item has always been emitted. Returns the
/// number of items written.
pub async fn print_and_archive<A, W>(
    api: &A,
    options: &RetrieveOptions,
    out: &mut W,
    archive: bool,
) -> Result<usize, ExportError>
where
    A: PocketApi + ?Sized,
    W: Write,
{
    let items = api.retrieve(options).await?;
    for item in &items {
        writeln!(out, "{}", org_entry(item))?;
        out.flush()?;
        if archive {
            api.modify(&[Action::archive(item.item_id.clone())]).await?;
            debug!(item_id = %item.item_id, "archived item");
        }
    }
    info!(count = items.len(), archived = archive, "exported items");
    Ok(items.len())
}
