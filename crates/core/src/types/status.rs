//! Status enums for sync runs and catalog items.

use serde::{Deserialize, Serialize};

/// Outcome of a single synchronization run.
///
/// Stored in the `sync_run_status` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sync_run_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Every attempted item was merged.
    Success,
    /// Some items merged, some failed, or the crawl ended early.
    Partial,
    /// Nothing merged, or no usable credential was obtained.
    Failed,
}

impl SyncStatus {
    /// Derive the status of a run from its counters.
    ///
    /// `crawl_complete` is false when the list phase ended early; such a run
    /// can never be reported as a clean success.
    #[must_use]
    pub const fn from_counts(synced: u64, failed: u64, crawl_complete: bool) -> Self {
        match (synced, failed, crawl_complete) {
            (_, 0, true) => Self::Success,
            (0, _, _) => Self::Failed,
            _ => Self::Partial,
        }
    }

    /// Lowercase name as stored and reported.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid sync status: {s}")),
        }
    }
}

/// Kind of synchronization a run performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sync_run_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Full list and detail crawl of the shop catalog.
    #[default]
    FullCatalog,
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullCatalog => write!(f, "full_catalog"),
        }
    }
}

/// Listing status of a marketplace item.
///
/// Used to filter the list phase of a crawl. The item status stored on a
/// catalog row stays a plain string so unknown remote values are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Normal,
    Unlist,
    Banned,
    Reviewing,
    SellerDelete,
    ShopeeDelete,
}

impl ItemStatus {
    /// Statuses fetched by a default crawl.
    pub const ACTIVE: [Self; 2] = [Self::Normal, Self::Unlist];

    /// Wire name used by the marketplace API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Unlist => "UNLIST",
            Self::Banned => "BANNED",
            Self::Reviewing => "REVIEWING",
            Self::SellerDelete => "SELLER_DELETE",
            Self::ShopeeDelete => "SHOPEE_DELETE",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(Self::Normal),
            "UNLIST" => Ok(Self::Unlist),
            "BANNED" => Ok(Self::Banned),
            "REVIEWING" => Ok(Self::Reviewing),
            "SELLER_DELETE" => Ok(Self::SellerDelete),
            "SHOPEE_DELETE" => Ok(Self::ShopeeDelete),
            other => Err(format!("invalid item status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_counts() {
        assert_eq!(SyncStatus::from_counts(120, 0, true), SyncStatus::Success);
        assert_eq!(SyncStatus::from_counts(0, 0, true), SyncStatus::Success);
        assert_eq!(SyncStatus::from_counts(70, 50, true), SyncStatus::Partial);
        assert_eq!(SyncStatus::from_counts(0, 3, true), SyncStatus::Failed);
    }

    #[test]
    fn test_aborted_crawl_is_never_success() {
        assert_eq!(SyncStatus::from_counts(50, 0, false), SyncStatus::Partial);
        assert_eq!(SyncStatus::from_counts(0, 0, false), SyncStatus::Failed);
    }

    #[test]
    fn test_sync_status_roundtrip() {
        for status in [SyncStatus::Success, SyncStatus::Partial, SyncStatus::Failed] {
            assert_eq!(status.to_string().parse::<SyncStatus>(), Ok(status));
        }
        assert!("done".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_item_status_wire_names() {
        assert_eq!(ItemStatus::Normal.as_str(), "NORMAL");
        assert_eq!("unlist".parse::<ItemStatus>(), Ok(ItemStatus::Unlist));
        assert_eq!(
            "SELLER_DELETE".parse::<ItemStatus>(),
            Ok(ItemStatus::SellerDelete)
        );
        assert!("GONE".parse::<ItemStatus>().is_err());
    }
}
