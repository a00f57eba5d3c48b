//! DNS query resolution logic.
//!
//! Decides, per query, whether the portal answers it or the upstream does:
//! 1. Parse the question name
//! 2. Whitelisted names are forwarded
//! 3. Everything else resolves to the portal
//!
//! The DNS loop handles the actual I/O, the resolver handles decisions.

use std::net::Ipv4Addr;

use crate::dns::DnsQuery;
use crate::filter::Whitelist;

/// Action to take for a DNS query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryAction {
    /// Query is answered locally with this response.
    ///
    /// The response is empty when the query could not be parsed.
    Hijack { response: Vec<u8>, domain: String },
    /// Query should be forwarded to upstream.
    Forward { domain: String },
}

/// Applies the whitelist policy to incoming queries.
pub struct Resolver {
    whitelist: Whitelist,
    portal_ip: Ipv4Addr,
}

impl Resolver {
    /// Create a new resolver answering non-whitelisted names with `portal_ip`.
    pub fn new(whitelist: Whitelist, portal_ip: Ipv4Addr) -> Self {
        Self {
            whitelist,
            portal_ip,
        }
    }

    /// Process a raw DNS query and decide what action to take.
    pub fn process_query(&self, query: &[u8]) -> QueryAction {
        let query = DnsQuery::parse(query);
        let domain = query.domain().to_string();

        if self.whitelist.matches(&domain) {
            return QueryAction::Forward { domain };
        }

        QueryAction::Hijack {
            response: query.hijack_response(self.portal_ip),
            domain,
        }
    }

    pub fn portal_ip(&self) -> Ipv4Addr {
        self.portal_ip
    }

    /// Returns the number of entries in the whitelist.
    pub fn whitelist_len(&self) -> usize {
        self.whitelist.len()
    }
}
