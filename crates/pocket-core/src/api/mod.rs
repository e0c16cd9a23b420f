mod client;
mod types;

pub use client::{ApiError, ApiResult, PocketApi, PocketClient};
pub use types::{Action, InvalidItemState, Item, ItemState, ModifyResult, RetrieveOptions};
