//! Best-route selection over the candidates a lookup returned.

use itertools::Itertools;

use crate::prefix;
use crate::rib::Route;

/// Run the tie-break ladder over `candidates` and pick the egress route.
///
/// Each rung keeps every candidate tying on its criterion and hands the
/// survivors to the next: highest local preference, self-originated
/// first, shortest AS path, best origin, lowest neighbor address. The
/// policy check runs after that, and longest-prefix-match runs last so
/// it ranks only what policy left standing. `None` means the
/// destination is unreachable.
pub fn best_route<'a, F>(candidates: Vec<&'a Route>, permitted: F) -> Option<&'a Route>
where
    F: Fn(&Route) -> bool,
{
    if candidates.is_empty() {
        return None;
    }
    let remaining = candidates.into_iter().max_set_by_key(|r| r.local_pref);
    let remaining = remaining.into_iter().max_set_by_key(|r| r.self_origin);
    let remaining = remaining.into_iter().min_set_by_key(|r| r.as_path.len());
    let remaining = remaining.into_iter().min_set_by_key(|r| r.origin);
    let remaining = remaining.into_iter().min_set_by_key(|r| peer_value(r));
    remaining
        .into_iter()
        .filter(|&r| permitted(r))
        .max_set_by_key(|r| r.prefix.len())
        .into_iter()
        .next()
}

// Numeric value of the announcing neighbor's address; unparseable
// addresses sort last
fn peer_value(route: &Route) -> u32 {
    prefix::parse_ip(&route.peer).unwrap_or(u32::MAX)
}
