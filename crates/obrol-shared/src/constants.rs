/// Application name
pub const APP_NAME: &str = "Obrol";

/// Name of the single global room (backend collection)
pub const ROOM_COLLECTION: &str = "messages";

/// Maximum message text size in bytes (4 KiB)
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

/// Prefix of locally generated (not yet server-assigned) message ids
pub const LOCAL_ID_PREFIX: &str = "local_";

/// Cache key namespaces
pub const MESSAGES_KEY_PREFIX: &str = "messages:";
pub const PENDING_KEY_PREFIX: &str = "pending:";
pub const SESSION_KEY: &str = "session";

/// Default capacity of the engine notification channel
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Default author when no identity is attached to a compose request
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";
