use std::time::Duration;

pub(crate) const DEFAULT_THREAD_COUNT: u8 = 4;

/// Pause before a failed fetch or broadcast is retried when the config does not set one.
pub(crate) const DEFAULT_BACKOFF: Duration = Duration::from_secs(10);

/// Delay before a transport failure puts an item back on its queue when the config does not set
/// one.
pub(crate) const DEFAULT_RESEND_DELAY: Duration = Duration::from_secs(10);
