//! subnet routes and primary election.
//!
//! a node advertises prefixes; an administrator enables them. the first node
//! to offer a non-exit prefix becomes its primary router and keeps that role
//! when other nodes start offering the same prefix.

use ipnet::IpNet;
use tracing::{debug, info};

use hubscale_db::query;
use hubscale_types::{NodeId, Route, StateUpdate};

use crate::nodes::require_node;
use crate::{Error, Result, State};

fn parse_prefixes<I>(prefixes: I) -> Result<Vec<IpNet>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<IpNet> = Vec::new();
    for raw in prefixes {
        let raw = raw.as_ref();
        let prefix: IpNet = raw
            .parse()
            .map_err(|_| Error::InvalidPrefix(raw.to_string()))?;
        if !out.contains(&prefix) {
            out.push(prefix);
        }
    }
    Ok(out)
}

impl State {
    /// prefixes the node currently advertises.
    pub async fn get_advertised_routes(&self, id: NodeId) -> Result<Vec<IpNet>> {
        let txn = self.db.read().await?;
        let node = require_node(txn.conn(), id).await?;
        Ok(node.advertised_routes().copied().collect())
    }

    /// prefixes that are advertised and enabled.
    pub async fn get_enabled_routes(&self, id: NodeId) -> Result<Vec<IpNet>> {
        let txn = self.db.read().await?;
        let node = require_node(txn.conn(), id).await?;
        Ok(node.enabled_routes().copied().collect())
    }

    /// whether `prefix` is enabled on the node. an unparseable prefix is
    /// simply not enabled.
    pub async fn is_route_enabled(&self, id: NodeId, prefix: &str) -> Result<bool> {
        let Ok(prefix) = prefix.parse::<IpNet>() else {
            return Ok(false);
        };
        Ok(self.get_enabled_routes(id).await?.contains(&prefix))
    }

    /// enable advertised prefixes on a node.
    ///
    /// every prefix is checked against the advertised set before anything is
    /// written; one unavailable prefix rejects the whole batch.
    pub async fn enable_routes<I>(&self, id: NodeId, prefixes: I) -> Result<StateUpdate>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let prefixes = parse_prefixes(prefixes)?;

        let txn = self.db.write().await?;
        let conn = txn.conn();
        let node = require_node(conn, id).await?;

        for prefix in &prefixes {
            if !node.advertised_routes().any(|p| p == prefix) {
                return Err(Error::RouteNotAvailable {
                    node_id: id,
                    prefix: *prefix,
                });
            }
        }

        for prefix in &prefixes {
            let Some(mut route) = node.routes().iter().find(|r| r.prefix == *prefix).cloned()
            else {
                continue;
            };
            route.enabled = true;
            if !route.is_exit_route() && !route.is_primary {
                route.is_primary = query::route::count_other_offerers(conn, prefix, id).await? == 0;
            }
            query::route::update(conn, &route).await?;
            debug!(
                node_id = %id,
                %prefix,
                is_primary = route.is_primary,
                "route enabled"
            );
        }

        let node = require_node(conn, id).await?;
        txn.commit().await?;

        info!(node_id = %id, count = prefixes.len(), "routes enabled");
        Ok(StateUpdate::peer_changed(node))
    }

    /// sync the node's advertised set with what the device announces.
    ///
    /// new prefixes get a route row, returning prefixes are advertised again
    /// and withdrawn prefixes lose their advertised, enabled and primary
    /// flags. returns `None` when nothing changed.
    pub async fn save_advertised_routes(
        &self,
        id: NodeId,
        prefixes: &[IpNet],
    ) -> Result<Option<StateUpdate>> {
        let txn = self.db.write().await?;
        let conn = txn.conn();
        let node = require_node(conn, id).await?;
        let mut wanted: Vec<IpNet> = Vec::with_capacity(prefixes.len());
        for prefix in prefixes {
            if !wanted.contains(prefix) {
                wanted.push(*prefix);
            }
        }
        let mut changed = false;

        for route in node.routes() {
            let withdrawn = !wanted.contains(&route.prefix);
            if withdrawn && (route.advertised || route.enabled || route.is_primary) {
                let mut route = route.clone();
                route.advertised = false;
                route.enabled = false;
                route.is_primary = false;
                query::route::update(conn, &route).await?;
                debug!(node_id = %id, prefix = %route.prefix, "route withdrawn");
                changed = true;
            }
        }

        for prefix in &wanted {
            match node.routes().iter().find(|r| r.prefix == *prefix) {
                Some(route) if route.advertised => {}
                Some(route) => {
                    let mut route = route.clone();
                    route.advertised = true;
                    query::route::update(conn, &route).await?;
                    changed = true;
                }
                None => {
                    query::route::insert(conn, &Route::advertised(id, *prefix)).await?;
                    debug!(node_id = %id, %prefix, "route advertised");
                    changed = true;
                }
            }
        }

        if !changed {
            return Ok(None);
        }

        let node = require_node(conn, id).await?;
        txn.commit().await?;
        Ok(Some(StateUpdate::peer_changed(node)))
    }
}
