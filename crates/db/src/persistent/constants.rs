//! Constants of the on-disk layout and default configuration values.

/// Tree holding one watermark per chain.
pub(crate) const WATERMARK_TREE: &str = "watermarks";

/// Tree holding the retry records, keyed by raw transaction bytes.
pub(crate) const RETRY_TREE: &str = "retry";

/// Key of the Bitcoin observer's watermark.
pub(crate) const BTC_HEIGHT_KEY: &[u8] = b"btclast";

/// Key of the alliance observer's watermark.
pub(crate) const ALLIANCE_HEIGHT_KEY: &[u8] = b"allialast";

/// Name of the store directory created inside the data directory.
pub const DB_DIR_NAME: &str = "retry";

/// Default number of rebroadcast attempts given to a retry record.
pub const DEFAULT_MAX_ATTEMPTS: u16 = 3;

/// Default maximum number of key bytes read by a single retry scan.
pub const DEFAULT_MAX_READ_SIZE: u64 = 1024 * 1024;
