//! Line-protocol decode/encode for Holzworth instruments.
//!
//! Both command dialects (legacy HS and HSM) exchange newline-terminated
//! ASCII lines: every command produces exactly one reply line. An
//! instrument that cannot honor a command answers with a line starting
//! with `Invalid` or `Error`, which the decoder reports separately so the
//! IO task can surface it as [`Error::Rejected`](synthlib_core::Error).

/// The newline byte that terminates every command and reply.
pub const TERMINATOR: u8 = b'\n';

/// Reply prefixes (compared case-insensitively) that mark a rejected command.
pub const REJECTION_PREFIXES: &[&str] = &["invalid", "error"];

/// Result of attempting to decode one reply line from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete reply line was decoded.
    Line {
        /// Reply text with the terminator, trailing `\r`, NULs and
        /// surrounding whitespace removed.
        text: String,
        /// Number of bytes consumed from the input buffer.
        consumed: usize,
    },

    /// The instrument rejected the command (`Invalid ...` / `Error ...`).
    Rejected { text: String, consumed: usize },

    /// A terminated line that is not valid UTF-8.
    Malformed(usize),

    /// The buffer does not yet contain a complete non-empty line.
    Incomplete,
}

/// Decode one newline-terminated reply from a byte buffer.
///
/// Empty lines (including bare `\r\n` pairs some firmware emits before a
/// reply) are skipped and counted in `consumed` of the line that follows
/// them.
pub fn decode_line(buf: &[u8]) -> DecodeResult {
    let mut start = 0;

    loop {
        let Some(offset) = buf[start..].iter().position(|&b| b == TERMINATOR) else {
            return DecodeResult::Incomplete;
        };
        let term_pos = start + offset;
        let consumed = term_pos + 1;
        let body = &buf[start..term_pos];

        let text = match std::str::from_utf8(body) {
            Ok(s) => s.trim_matches(|c: char| c == '\0' || c.is_ascii_whitespace()),
            Err(_) => return DecodeResult::Malformed(consumed),
        };

        if text.is_empty() {
            start = consumed;
            continue;
        }

        let text = text.to_string();
        return if is_rejection(&text) {
            DecodeResult::Rejected { text, consumed }
        } else {
            DecodeResult::Line { text, consumed }
        };
    }
}

/// Whether a reply line is an instrument rejection.
pub fn is_rejection(line: &str) -> bool {
    let lower = line.trim_start().to_ascii_lowercase();
    REJECTION_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Encode a command string for the wire, appending the terminator if the
/// caller did not.
///
/// # Examples
///
/// ```
/// use synthlib_text_io::protocol::encode_command;
///
/// assert_eq!(encode_command(":CH1:FREQ?"), b":CH1:FREQ?\n".to_vec());
/// assert_eq!(encode_command("*IDN?\n"), b"*IDN?\n".to_vec());
/// ```
pub fn encode_command(cmd: &str) -> Vec<u8> {
    let trimmed = cmd.trim_end_matches(['\r', '\n']);
    let mut out = Vec::with_capacity(trimmed.len() + 1);
    out.extend_from_slice(trimmed.as_bytes());
    out.push(TERMINATOR);
    out
}

/// Whether an encoded command is a query. Only queries are safe to resend:
/// repeating a setter such as a list `ADD` changes instrument state twice.
pub fn is_query(cmd: &[u8]) -> bool {
    cmd.trim_ascii_end().ends_with(b"?")
}
