//! Constants for the download module (timeouts, buffers, temp files).

/// Upper bound on the TCP/TLS connect phase, regardless of the request timeout.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Write buffer size used while streaming a body to disk.
pub const WRITE_BUFFER_BYTES: usize = 8 * 1024;

/// Suffix for in-progress downloads before they are renamed into place.
pub const TEMP_SUFFIX: &str = ".part";

/// Longest file name (in characters) derived from a URL or header.
pub const MAX_FILENAME_CHARS: usize = 200;
