pub mod aggregate;
pub mod decision;

use std::fmt;

use chrono::{DateTime, Utc};
use log::trace;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::prefix::Prefix;

/// How a route entered routing: interior, exterior gateway, or unknown.
/// Ordered by preference, `Igp` best.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PathOrigin {
    Igp,
    Egp,
    Unk,
}

impl fmt::Display for PathOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            PathOrigin::Igp => "IGP",
            PathOrigin::Egp => "EGP",
            PathOrigin::Unk => "UNK",
        };
        write!(f, "{}", word)
    }
}

impl Serialize for PathOrigin {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PathOrigin {
    fn deserialize<D>(deserializer: D) -> Result<PathOrigin, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "IGP" => Ok(PathOrigin::Igp),
            "EGP" => Ok(PathOrigin::Egp),
            "UNK" => Ok(PathOrigin::Unk),
            _ => Err(de::Error::custom(format!("unsupported origin: '{}'", s))),
        }
    }
}

/// A learned path and its attributes, exactly as the neighbor sent them
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub prefix: Prefix,
    pub peer: String,
    pub local_pref: u32,
    pub self_origin: bool,
    pub as_path: Vec<u32>,
    pub origin: PathOrigin,
}

impl Route {
    /// Attribute equality for aggregation: everything but the prefix
    pub fn same_attributes(&self, other: &Route) -> bool {
        self.peer == other.peer
            && self.local_pref == other.local_pref
            && self.self_origin == other.self_origin
            && self.as_path == other.as_path
            && self.origin == other.origin
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.prefix, self.peer)
    }
}

/// A learned route plus its arrival time
#[derive(Clone, Debug)]
pub struct RibEntry {
    pub timestamp: DateTime<Utc>,
    pub route: Route,
}

impl RibEntry {
    fn new(route: Route) -> Self {
        RibEntry {
            timestamp: Utc::now(),
            route,
        }
    }
}

/// One received withdrawal message
#[derive(Clone, Debug)]
pub struct Withdrawal {
    pub timestamp: DateTime<Utc>,
    pub peer: String,
    pub prefixes: Vec<Prefix>,
}

/// The routing table. `raw` holds every learned route in arrival order
/// and is the source of truth; `fib` is the aggregated view rebuilt
/// after every change, and all destination lookups go through it.
#[derive(Debug, Default)]
pub struct Rib {
    raw: Vec<RibEntry>,
    fib: Vec<Route>,
    withdrawals: Vec<Withdrawal>,
}

impl Rib {
    pub fn new() -> Self {
        Rib::default()
    }

    /// Record a learned route and rebuild the aggregated view
    pub fn insert(&mut self, route: Route) {
        trace!("Learned {}", route);
        self.raw.push(RibEntry::new(route));
        self.rebuild();
    }

    /// Delete every raw entry matching this announcing peer and this
    /// exact (network, netmask) pair, then rebuild. Entries covered by
    /// a larger aggregate are left alone.
    pub fn remove(&mut self, peer: &str, prefix: Prefix) {
        let before = self.raw.len();
        self.raw
            .retain(|e| !(e.route.peer == peer && e.route.prefix == prefix));
        trace!(
            "Removed {} raw entries for {} {}",
            before - self.raw.len(),
            peer,
            prefix
        );
        self.rebuild();
    }

    /// Apply one withdrawal message: log it, then remove each prefix
    pub fn withdraw(&mut self, peer: &str, prefixes: Vec<Prefix>) {
        self.withdrawals.push(Withdrawal {
            timestamp: Utc::now(),
            peer: peer.to_string(),
            prefixes: prefixes.clone(),
        });
        for prefix in prefixes {
            self.remove(peer, prefix);
        }
    }

    /// Every aggregated route whose prefix contains `addr`
    pub fn lookup(&self, addr: u32) -> Vec<&Route> {
        self.fib.iter().filter(|r| r.prefix.contains(addr)).collect()
    }

    /// The aggregated view, in first-insertion order of each aggregate
    pub fn fib(&self) -> &[Route] {
        &self.fib
    }

    /// Snapshot of the aggregated view projected to (prefix, peer)
    pub fn dump(&self) -> Vec<(Prefix, &str)> {
        self.fib.iter().map(|r| (r.prefix, r.peer.as_str())).collect()
    }

    /// The raw learned set, arrival-ordered
    pub fn history(&self) -> &[RibEntry] {
        &self.raw
    }

    pub fn withdrawals(&self) -> &[Withdrawal] {
        &self.withdrawals
    }

    // Disaggregation works by replaying the raw set through the
    // aggregator rather than splitting aggregates in place.
    fn rebuild(&mut self) {
        let routes = self.raw.iter().map(|e| e.route.clone()).collect();
        self.fib = aggregate::aggregate(routes);
    }
}
