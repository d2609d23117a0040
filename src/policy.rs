//! Commercial peering policy: who we forward data for, and who hears
//! our re-announcements. Customers pay for full service; peers and
//! providers only ever see customer traffic and customer routes.

use crate::config::Relation;

/// May data arriving from a `src`-related neighbor leave through a route
/// learned from a `dst`-related neighbor?
///
/// Everything is permitted except transit between non-customers where a
/// peer is involved: peer-to-peer, peer-to-provider, provider-to-peer.
pub fn forwardable(src: Relation, dst: Relation) -> bool {
    use Relation::*;
    !matches!((src, dst), (Peer, Peer) | (Peer, Prov) | (Prov, Peer))
}

/// Is an update or revoke learned from a `src`-related neighbor exported
/// to a `dst`-related neighbor? Customer announcements go to everyone;
/// peer and provider announcements go to customers only.
pub fn exports_to(src: Relation, dst: Relation) -> bool {
    src == Relation::Cust || dst == Relation::Cust
}
