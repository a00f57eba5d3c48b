//! DNS message parsing and construction.
//!
//! Only the pieces a captive portal needs: pull the queried name out of a
//! standard query, and answer any query with a single A record pointing at
//! the portal.

use std::net::Ipv4Addr;

const HEADER_LEN: usize = 12;

/// Top two bits of a name byte set: a compression pointer, not a label length.
const POINTER_MASK: u8 = 0xC0;

/// TTL of the synthetic answer, in seconds.
pub const HIJACK_TTL: u32 = 60;

/// Result of parsing the question name of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A standard query with at least one label. The domain carries a trailing dot.
    Parsed { domain: String },
    /// Malformed, truncated, or not a standard query.
    Unparsed,
}

impl ParseOutcome {
    /// The parsed domain, or an empty string when parsing failed.
    pub fn domain(&self) -> &str {
        match self {
            ParseOutcome::Parsed { domain } => domain,
            ParseOutcome::Unparsed => "",
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed { .. })
    }
}

/// A DNS query received by the interceptor.
#[derive(Debug, Clone)]
pub struct DnsQuery<'a> {
    data: &'a [u8],
    outcome: ParseOutcome,
}

impl<'a> DnsQuery<'a> {
    /// Parse a DNS query from raw bytes.
    pub fn parse(data: &'a [u8]) -> Self {
        Self {
            data,
            outcome: parse(data),
        }
    }

    /// Transaction ID, if the header is long enough to carry one.
    pub fn id(&self) -> Option<u16> {
        (self.data.len() >= 2).then(|| u16::from_be_bytes([self.data[0], self.data[1]]))
    }

    /// Opcode from bits 3-6 of the third header byte.
    pub fn opcode(&self) -> Option<u8> {
        self.data.get(2).map(|flags| opcode(*flags))
    }

    pub fn outcome(&self) -> &ParseOutcome {
        &self.outcome
    }

    /// The parsed domain, empty when the query could not be interpreted.
    pub fn domain(&self) -> &str {
        self.outcome.domain()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data
    }

    /// Build a response resolving this query to `ip`.
    ///
    /// Empty when the query did not parse.
    pub fn hijack_response(&self, ip: Ipv4Addr) -> Vec<u8> {
        build_hijack_response(self.data, self.domain(), ip)
    }
}

fn opcode(flags: u8) -> u8 {
    (flags >> 3) & 0x0F
}

/// Extract the question name of a standard query.
///
/// Labels are read from offset 12 until the zero-length terminator and
/// joined with "." plus a trailing dot (`"www.example.com."`).
pub fn parse(data: &[u8]) -> ParseOutcome {
    let Some(&flags) = data.get(2) else {
        return ParseOutcome::Unparsed;
    };
    if opcode(flags) != 0 {
        return ParseOutcome::Unparsed;
    }

    let mut pos = HEADER_LEN;
    let mut domain = String::new();

    loop {
        let Some(&len) = data.get(pos) else {
            return ParseOutcome::Unparsed;
        };
        if len == 0 {
            break;
        }
        if len & POINTER_MASK == POINTER_MASK {
            return ParseOutcome::Unparsed;
        }
        let label_len = len as usize;
        pos += 1;
        let Some(raw) = data.get(pos..pos + label_len) else {
            return ParseOutcome::Unparsed;
        };
        let Ok(label) = std::str::from_utf8(raw) else {
            return ParseOutcome::Unparsed;
        };
        domain.push_str(label);
        domain.push('.');
        pos += label_len;
    }

    if domain.is_empty() {
        return ParseOutcome::Unparsed;
    }

    ParseOutcome::Parsed { domain }
}

/// Build a response answering `query` with a single A record for `ip`.
///
/// The transaction ID and everything from the question section onward are
/// copied from the query; the answer uses a compression pointer back to the
/// question name. Returns an empty payload when `domain` is empty.
pub fn build_hijack_response(query: &[u8], domain: &str, ip: Ipv4Addr) -> Vec<u8> {
    if domain.is_empty() || query.len() < HEADER_LEN {
        return Vec::new();
    }

    let mut data = Vec::with_capacity(query.len() + 16);

    // Header
    data.extend_from_slice(&query[0..2]);
    data.extend_from_slice(&[0x81, 0x80]); // Standard response, recursion available, no error
    data.extend_from_slice(&query[4..6]); // QDCOUNT
    data.extend_from_slice(&query[4..6]); // ANCOUNT mirrors QDCOUNT
    data.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
    data.extend_from_slice(&[0x00, 0x00]); // ARCOUNT

    // Question, verbatim
    data.extend_from_slice(&query[HEADER_LEN..]);

    // Answer
    data.extend_from_slice(&[0xC0, 0x0C]); // Pointer to offset 12
    data.extend_from_slice(&1u16.to_be_bytes()); // A
    data.extend_from_slice(&1u16.to_be_bytes()); // IN
    data.extend_from_slice(&HIJACK_TTL.to_be_bytes());
    data.extend_from_slice(&4u16.to_be_bytes());
    data.extend_from_slice(&ip.octets());

    data
}
