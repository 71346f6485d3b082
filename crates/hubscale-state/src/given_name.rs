//! given name resolution.
//!
//! a node's given name is its hostname reduced to a dns label. when another
//! device already holds that label the name gets a random suffix; the same
//! machine key always keeps its name.

use sea_orm::ConnectionTrait;
use tracing::debug;

use hubscale_db::query;
use hubscale_types::dns_label::random_suffix;
use hubscale_types::{MachineKey, NodeName, NodeNameError};

use crate::{Error, Result, State};

/// length of the random suffix appended on collision.
pub const GIVEN_NAME_SUFFIX_LEN: usize = 8;

/// extra characters trimmed from the base name before a suffix is appended.
pub const GIVEN_NAME_TRIM_LEN: usize = 2;

const MAX_SUFFIX_ATTEMPTS: usize = 8;

/// whether `name` is free for the device holding `machine_key`.
async fn is_available<C: ConnectionTrait>(
    db: &C,
    name: &NodeName,
    machine_key: &MachineKey,
) -> Result<bool> {
    let holder = query::node::get_node_by_given_name(db, name.as_str()).await?;
    Ok(holder.is_none_or(|node| node.machine_key() == machine_key))
}

/// pick the given name for `machine_key` starting from `base`.
pub(crate) async fn resolve_given_name<C: ConnectionTrait>(
    db: &C,
    machine_key: &MachineKey,
    base: &NodeName,
) -> Result<NodeName> {
    if is_available(db, base, machine_key).await? {
        return Ok(base.clone());
    }

    for _ in 0..MAX_SUFFIX_ATTEMPTS {
        let candidate =
            base.with_suffix(&random_suffix(GIVEN_NAME_SUFFIX_LEN), GIVEN_NAME_TRIM_LEN)?;
        if is_available(db, &candidate, machine_key).await? {
            debug!(
                base = %base,
                given_name = %candidate,
                "given name taken, using suffixed name"
            );
            return Ok(candidate);
        }
    }

    Err(Error::GivenNameInUse(base.to_string()))
}

impl State {
    /// compute the given name a device would receive for `supplied_name`.
    ///
    /// the name is normalised to a dns label first; `InvalidName` if nothing
    /// usable is left.
    pub async fn generate_given_name(
        &self,
        machine_key: &MachineKey,
        supplied_name: &str,
    ) -> Result<NodeName> {
        let base = NodeName::sanitise(supplied_name).ok_or(NodeNameError::Empty)?;
        let txn = self.db.read().await?;
        resolve_given_name(txn.conn(), machine_key, &base).await
    }
}
