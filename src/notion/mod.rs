pub mod cleanup;
pub mod client;
pub mod properties;
pub mod sync;

pub use cleanup::{CleanupReport, NotionCleanup};
pub use client::{Database, NotionApi, NotionClient, NotionError, Page, Properties, QueryResponse};
pub use sync::{NotionSync, SyncOptions, SyncOutcome, SyncReport};
