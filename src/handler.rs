//! Message dispatch: every inbound envelope is handled to completion
//! here, and the result is the set of envelopes to put back on the
//! wire. Socket IO stays in the session layer so each rule below is
//! testable on its own.

use log::{debug, info, trace};
use serde_json::{json, Value};

use crate::config::{Relation, RouterConfig};
use crate::message::{
    router_side_addr, Envelope, MessageError, MessageKind, RouteParams, TableEntry,
};
use crate::policy;
use crate::prefix::{self, Prefix};
use crate::rib::{decision, Rib, Route};

/// An envelope addressed to one neighbor session
pub type Outbound = (String, Envelope);

pub struct Dispatcher {
    config: RouterConfig,
    rib: Rib,
    // Every update envelope as received, for the status surface
    updates: Vec<Envelope>,
}

impl Dispatcher {
    pub fn new(config: RouterConfig) -> Self {
        Dispatcher {
            config,
            rib: Rib::new(),
            updates: Vec::new(),
        }
    }

    pub fn rib(&self) -> &Rib {
        &self.rib
    }

    pub fn updates(&self) -> &[Envelope] {
        &self.updates
    }

    /// Decode one datagram from the neighbor on `srcif` and dispatch it
    pub fn handle_raw(&mut self, srcif: &str, bytes: &[u8]) -> Result<Vec<Outbound>, MessageError> {
        let envelope = Envelope::decode(bytes)?;
        self.handle(srcif, envelope)
    }

    pub fn handle(&mut self, srcif: &str, envelope: Envelope) -> Result<Vec<Outbound>, MessageError> {
        let src_rel = self
            .config
            .relation_of(srcif)
            .ok_or_else(|| MessageError::UnknownNeighbor(srcif.to_string()))?;
        trace!("Handling {} from {}", envelope, srcif);
        match envelope.kind {
            MessageKind::Update => self.handle_update(srcif, src_rel, envelope),
            MessageKind::Revoke => self.handle_revoke(srcif, src_rel, envelope),
            MessageKind::Data => self.handle_data(srcif, src_rel, envelope),
            MessageKind::Dump => self.handle_dump(srcif, &envelope),
            MessageKind::NoRoute | MessageKind::Table => {
                debug!("Dropping {} message from {}", envelope.kind, srcif);
                Ok(Vec::new())
            }
        }
    }

    fn handle_update(
        &mut self,
        srcif: &str,
        src_rel: Relation,
        envelope: Envelope,
    ) -> Result<Vec<Outbound>, MessageError> {
        let params: RouteParams = serde_json::from_value(envelope.msg.clone())?;
        debug!("Learned {} from {}", params.prefix, srcif);
        self.rib.insert(Route {
            prefix: params.prefix,
            peer: srcif.to_string(),
            local_pref: params.localpref,
            self_origin: params.self_origin,
            as_path: params.as_path.clone(),
            origin: params.origin,
        });
        self.updates.push(envelope);

        // Our ASN goes on the front of the outgoing copy only; the
        // stored route keeps the path as the neighbor sent it
        let mut outgoing = params;
        outgoing.as_path.insert(0, self.config.asn);
        let msg = serde_json::to_value(&outgoing)?;
        Ok(self.announce(srcif, src_rel, MessageKind::Update, msg))
    }

    fn handle_revoke(
        &mut self,
        srcif: &str,
        src_rel: Relation,
        envelope: Envelope,
    ) -> Result<Vec<Outbound>, MessageError> {
        let prefixes: Vec<Prefix> = serde_json::from_value(envelope.msg.clone())?;
        debug!("Withdrawing {} prefixes for {}", prefixes.len(), srcif);
        self.rib.withdraw(srcif, prefixes);

        // The withdrawn list propagates exactly as received
        Ok(self.announce(srcif, src_rel, MessageKind::Revoke, envelope.msg))
    }

    fn handle_data(
        &mut self,
        srcif: &str,
        src_rel: Relation,
        envelope: Envelope,
    ) -> Result<Vec<Outbound>, MessageError> {
        let dest = prefix::parse_ip(&envelope.dst)
            .map_err(|err| MessageError::Malformed(err.to_string()))?;
        let config = &self.config;
        let candidates = self.rib.lookup(dest);
        let best = decision::best_route(candidates, |r| {
            config
                .relation_of(&r.peer)
                .map(|dst_rel| policy::forwardable(src_rel, dst_rel))
                .unwrap_or(false)
        });
        match best {
            Some(route) => {
                debug!("Forwarding data for {} via {}", envelope.dst, route.peer);
                Ok(vec![(route.peer.clone(), envelope)])
            }
            None => {
                debug!("No route to {} for data from {}", envelope.dst, srcif);
                Ok(vec![(
                    srcif.to_string(),
                    Envelope {
                        src: router_side_addr(srcif),
                        dst: envelope.src,
                        kind: MessageKind::NoRoute,
                        msg: json!({}),
                    },
                )])
            }
        }
    }

    fn handle_dump(&self, srcif: &str, envelope: &Envelope) -> Result<Vec<Outbound>, MessageError> {
        let table: Vec<TableEntry> = self
            .rib
            .fib()
            .iter()
            .map(|r| TableEntry {
                prefix: r.prefix,
                peer: r.peer.clone(),
            })
            .collect();
        info!("Dumping {} table entries for {}", table.len(), srcif);
        Ok(vec![(
            srcif.to_string(),
            Envelope {
                src: envelope.dst.clone(),
                dst: envelope.src.clone(),
                kind: MessageKind::Table,
                msg: serde_json::to_value(&table)?,
            },
        )])
    }

    /// Re-announce an update or revoke to every neighbor the export
    /// policy allows, rewriting the envelope for each outgoing link
    fn announce(
        &self,
        srcif: &str,
        src_rel: Relation,
        kind: MessageKind,
        msg: Value,
    ) -> Vec<Outbound> {
        self.config
            .neighbors
            .iter()
            .filter(|n| n.addr != srcif && policy::exports_to(src_rel, n.relation))
            .map(|n| {
                (
                    n.addr.clone(),
                    Envelope {
                        src: router_side_addr(&n.addr),
                        dst: n.addr.clone(),
                        kind,
                        msg: msg.clone(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUST: &str = "192.168.0.2";
    const CUST2: &str = "172.16.0.2";
    const PEER: &str = "10.0.1.2";
    const PROV: &str = "10.0.4.2";

    fn dispatcher() -> Dispatcher {
        let descriptors = vec![
            format!("{}-cust", CUST),
            format!("{}-cust", CUST2),
            format!("{}-peer", PEER),
            format!("{}-prov", PROV),
        ];
        Dispatcher::new(RouterConfig::new(7, &descriptors).unwrap())
    }

    fn update(src: &str, network: &str, as_path: &[u32]) -> Envelope {
        Envelope {
            src: src.to_string(),
            dst: router_side_addr(src),
            kind: MessageKind::Update,
            msg: json!({
                "network": network,
                "netmask": "255.255.255.0",
                "localpref": 100,
                "selfOrigin": false,
                "ASPath": as_path,
                "origin": "EGP",
            }),
        }
    }

    fn data(src: &str, dst: &str) -> Envelope {
        Envelope {
            src: src.to_string(),
            dst: dst.to_string(),
            kind: MessageKind::Data,
            msg: json!("payload"),
        }
    }

    fn destinations(outbound: &[Outbound]) -> Vec<&str> {
        outbound.iter().map(|(dest, _)| dest.as_str()).collect()
    }

    #[test]
    fn test_customer_update_reaches_everyone_else() {
        let mut dispatcher = dispatcher();
        let outbound = dispatcher.handle(CUST, update(CUST, "10.1.0.0", &[2])).unwrap();
        assert_eq!(destinations(&outbound), vec![CUST2, PEER, PROV]);

        for (dest, envelope) in &outbound {
            assert_eq!(envelope.kind, MessageKind::Update);
            assert_eq!(&envelope.dst, dest);
            assert_eq!(envelope.src, router_side_addr(dest));
        }
    }

    #[test]
    fn test_peer_update_reaches_customers_only() {
        let mut dispatcher = dispatcher();
        let outbound = dispatcher.handle(PEER, update(PEER, "10.1.0.0", &[2])).unwrap();
        assert_eq!(destinations(&outbound), vec![CUST, CUST2]);
    }

    #[test]
    fn test_outgoing_as_path_is_prepended_stored_is_not() {
        let mut dispatcher = dispatcher();
        let outbound = dispatcher.handle(CUST, update(CUST, "10.1.0.0", &[2, 4])).unwrap();

        let (_, envelope) = &outbound[0];
        assert_eq!(envelope.msg["ASPath"], json!([7, 2, 4]));

        // The raw entry keeps the path exactly as received
        assert_eq!(dispatcher.rib().history()[0].route.as_path, vec![2, 4]);
        assert_eq!(dispatcher.updates().len(), 1);
    }

    #[test]
    fn test_revoke_propagates_verbatim_under_policy() {
        let mut dispatcher = dispatcher();
        dispatcher.handle(PROV, update(PROV, "10.1.0.0", &[2])).unwrap();

        let revoke = Envelope {
            src: PROV.to_string(),
            dst: router_side_addr(PROV),
            kind: MessageKind::Revoke,
            msg: json!([{"network": "10.1.0.0", "netmask": "255.255.255.0"}]),
        };
        let outbound = dispatcher.handle(PROV, revoke.clone()).unwrap();
        // Provider announcements only reach customers
        assert_eq!(destinations(&outbound), vec![CUST, CUST2]);
        for (_, envelope) in &outbound {
            assert_eq!(envelope.kind, MessageKind::Revoke);
            assert_eq!(envelope.msg, revoke.msg);
        }
        assert!(dispatcher.rib().fib().is_empty());
        assert_eq!(dispatcher.rib().withdrawals().len(), 1);
    }

    #[test]
    fn test_data_forwards_via_best_route() {
        let mut dispatcher = dispatcher();
        dispatcher.handle(CUST, update(CUST, "10.1.0.0", &[2, 4])).unwrap();
        dispatcher.handle(CUST2, update(CUST2, "10.1.0.0", &[9])).unwrap();

        // Shorter AS path wins the ladder
        let outbound = dispatcher.handle(PEER, data(PEER, "10.1.0.55")).unwrap();
        assert_eq!(destinations(&outbound), vec![CUST2]);
        assert_eq!(outbound[0].1.kind, MessageKind::Data);
        assert_eq!(outbound[0].1.msg, json!("payload"));
    }

    #[test]
    fn test_data_blocked_by_policy_gets_no_route() {
        let mut dispatcher = dispatcher();
        dispatcher.handle(PROV, update(PROV, "10.1.0.0", &[2])).unwrap();

        // peer -> prov transit is not allowed
        let outbound = dispatcher.handle(PEER, data(PEER, "10.1.0.55")).unwrap();
        assert_eq!(destinations(&outbound), vec![PEER]);
        let (_, reply) = &outbound[0];
        assert_eq!(reply.kind, MessageKind::NoRoute);
        assert_eq!(reply.src, router_side_addr(PEER));
        assert_eq!(reply.dst, PEER);
        assert_eq!(reply.msg, json!({}));

        // The same destination is reachable for a customer
        let outbound = dispatcher.handle(CUST, data(CUST, "10.1.0.55")).unwrap();
        assert_eq!(destinations(&outbound), vec![PROV]);
    }

    #[test]
    fn test_data_with_empty_table_gets_no_route() {
        let mut dispatcher = dispatcher();
        let outbound = dispatcher.handle(CUST, data(CUST, "172.31.0.1")).unwrap();
        let (dest, reply) = &outbound[0];
        assert_eq!(dest, CUST);
        assert_eq!(reply.kind, MessageKind::NoRoute);
        assert_eq!(reply.dst, CUST);
    }

    #[test]
    fn test_dump_returns_current_table() {
        let mut dispatcher = dispatcher();
        dispatcher.handle(CUST, update(CUST, "192.168.0.0", &[2])).unwrap();
        dispatcher.handle(CUST, update(CUST, "192.168.1.0", &[2])).unwrap();

        let dump = Envelope {
            src: CUST.to_string(),
            dst: router_side_addr(CUST),
            kind: MessageKind::Dump,
            msg: json!({}),
        };
        let outbound = dispatcher.handle(CUST, dump).unwrap();
        assert_eq!(destinations(&outbound), vec![CUST]);
        let (_, reply) = &outbound[0];
        assert_eq!(reply.kind, MessageKind::Table);
        assert_eq!(reply.src, router_side_addr(CUST));
        assert_eq!(reply.dst, CUST);
        // The two updates aggregated into a single row
        assert_eq!(
            reply.msg,
            json!([{"network": "192.168.0.0", "netmask": "255.255.254.0", "peer": CUST}])
        );
    }

    #[test]
    fn test_no_route_and_table_messages_are_dropped() {
        let mut dispatcher = dispatcher();
        let inbound = Envelope {
            src: CUST.to_string(),
            dst: router_side_addr(CUST),
            kind: MessageKind::NoRoute,
            msg: json!({}),
        };
        assert!(dispatcher.handle(CUST, inbound).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_neighbor_is_rejected() {
        let mut dispatcher = dispatcher();
        let result = dispatcher.handle("9.9.9.9", update("9.9.9.9", "10.1.0.0", &[2]));
        assert!(matches!(result, Err(MessageError::UnknownNeighbor(_))));
    }

    #[test]
    fn test_malformed_messages_are_rejected() {
        let mut dispatcher = dispatcher();
        assert!(dispatcher.handle_raw(CUST, b"not json").is_err());

        // Non-contiguous netmask inside an update
        let mut bad = update(CUST, "10.1.0.0", &[2]);
        bad.msg["netmask"] = json!("255.0.255.0");
        assert!(matches!(
            dispatcher.handle(CUST, bad),
            Err(MessageError::Malformed(_))
        ));
        // Nothing was recorded
        assert!(dispatcher.rib().history().is_empty());
    }

    #[test]
    fn test_export_policy_invariant() {
        // No envelope sourced from a peer or provider ever goes toward
        // a peer or provider
        let mut dispatcher = dispatcher();
        for src in [PEER, PROV] {
            let outbound = dispatcher.handle(src, update(src, "10.2.0.0", &[3])).unwrap();
            for (dest, _) in &outbound {
                assert!(
                    dest == CUST || dest == CUST2,
                    "{} update leaked to {}",
                    src,
                    dest
                );
            }
        }
    }
}
