use sea_orm::DbErr;

use crate::ports::plex::CatalogError;

/// Fatal failures of a reconciliation run. Nothing is written when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Listing the catalog failed or the fetch timed out. Raised before any write.
    #[error("Failed to fetch the Plex snapshot: {0}")]
    Connectivity(#[from] CatalogError),
    /// Reading the store or committing the changes failed. The transaction was rolled back.
    #[error("Failed to persist the reconciliation: {0}")]
    Persistence(#[from] DbErr),
}

/// Snapshot data that cannot be reconciled. The offending item or playlist is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown playlist type `{0}`")]
    UnknownPlaylistType(String),
    #[error("duplicate playlist title")]
    DuplicatePlaylistTitle,
    #[error("unknown item type `{0}`")]
    UnknownItemType(String),
    #[error("{item_type} item cannot belong to a {category} playlist")]
    CategoryMismatch {
        item_type: &'static str,
        category: &'static str,
    },
    #[error("duration {0} ms is out of range")]
    DurationOutOfRange(u64),
    #[error("{item_type} item is missing `{field}`")]
    MissingField {
        item_type: &'static str,
        field: &'static str,
    },
}
