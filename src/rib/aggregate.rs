//! Route aggregation: adjacent prefixes announced with identical
//! attributes collapse into their parent prefix.

use crate::rib::Route;

/// Coalesce a route set to its aggregation fixpoint.
///
/// A single pass cannot see that two freshly merged aggregates are
/// themselves siblings, so passes repeat until nothing changes. The
/// result keeps the first-insertion order of each surviving aggregate.
pub fn aggregate(routes: Vec<Route>) -> Vec<Route> {
    let mut table = routes;
    loop {
        let (coalesced, changed) = coalesce(table);
        table = coalesced;
        if !changed {
            return table;
        }
    }
}

// One pass: fold each route into the first earlier survivor it can
// merge with, or keep it as a new survivor.
fn coalesce(routes: Vec<Route>) -> (Vec<Route>, bool) {
    let mut survivors: Vec<Route> = Vec::with_capacity(routes.len());
    let mut changed = false;
    'next_route: for route in routes {
        for survivor in survivors.iter_mut() {
            if survivor.same_attributes(&route) && survivor.prefix.mergeable(&route.prefix) {
                survivor.prefix = survivor.prefix.merge(&route.prefix);
                changed = true;
                continue 'next_route;
            }
        }
        survivors.push(route);
    }
    (survivors, changed)
}
