//! Protocol constants

/// Default listening port
pub const DEFAULT_PORT: u16 = 10000;

/// Close code sent to a producer replaced by a newer one (1012, "service restart")
pub const CLOSE_SUPERSEDED: u16 = 1012;

/// Close reason sent alongside [`CLOSE_SUPERSEDED`]
pub const SUPERSEDED_REASON: &str = "superseded by new producer";

/// Producer endpoint, parameterized by session id
pub const PRODUCER_ROUTE: &str = "/worker/{session_id}";

/// Shared viewer endpoint
pub const VIEWER_ROUTE: &str = "/view";

/// Multipart stream of a session's latest frame, for plain HTTP clients
pub const MJPEG_ROUTE: &str = "/mjpeg/{session_id}";

/// Part boundary used by the MJPEG stream
pub const MJPEG_BOUNDARY: &str = "frame";
