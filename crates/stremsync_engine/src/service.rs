//! End-to-end sync orchestration.
//!
//! [`SyncService`] wires the full pipeline for one trigger: resolve the
//! user's desired list, snapshot the remote collection, diff the two, then
//! hand the plan to the executor. Planning errors come back as `Err`;
//! failures while applying are folded into the returned [`SyncOutcome`].

use crate::client::AccountApi;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::executor::SyncExecutor;
use crate::reconcile::{Plan, Reconciler};
use crate::resolver::{DesiredStateResolver, DirectorySource};
use std::sync::Arc;
use stremsync_model::{AddonKey, AuthKey, GroupId, RemoteSnapshot, SyncOutcome, UserId};
use tracing::{info, warn};

/// A plan bundled with the snapshot it was computed against.
#[derive(Debug, Clone)]
pub struct PreparedSync {
    /// The user the plan is for.
    pub user_id: UserId,
    /// The reconciliation plan.
    pub plan: Plan,
    /// The remote collection the plan was diffed against.
    pub snapshot: RemoteSnapshot,
    /// Where the user's protected addons currently sit in the remote
    /// collection. The caller persists these so a later resolve can put a
    /// protected addon back near its old slot.
    pub observed_positions: Vec<(AddonKey, usize)>,
}

/// Resolve, snapshot, diff and execute for one user at a time.
pub struct SyncService<D: DirectorySource, A: AccountApi> {
    directory: Arc<D>,
    resolver: DesiredStateResolver<D>,
    api: Arc<A>,
    executor: SyncExecutor<A>,
}

impl<D: DirectorySource, A: AccountApi> SyncService<D, A> {
    /// Creates a service over a directory and a remote account client.
    pub fn new(directory: Arc<D>, api: Arc<A>, config: EngineConfig) -> Self {
        Self {
            resolver: DesiredStateResolver::new(Arc::clone(&directory)),
            executor: SyncExecutor::new(Arc::clone(&api), config),
            directory,
            api,
        }
    }

    /// Returns true if a sync for the user is currently in flight.
    pub fn is_syncing(&self, user_id: &UserId) -> bool {
        self.executor.is_syncing(user_id)
    }

    /// Computes the plan for one user without applying anything.
    ///
    /// The snapshot is fetched fresh on every call; plans are never computed
    /// against cached remote state.
    pub async fn plan_user_sync(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        auth: &AuthKey,
    ) -> EngineResult<PreparedSync> {
        let overrides = self.directory.overrides(user_id);
        let desired = self.resolver.resolve_for_user(group_id, user_id)?;

        let actual = self.api.fetch_collection(auth).await?;
        let snapshot = RemoteSnapshot::taken(*user_id, actual);

        let protected = overrides.effective_protected();
        let plan = Reconciler::diff(&desired, &snapshot.addons, &protected);

        let observed_positions = snapshot
            .addons
            .iter()
            .enumerate()
            .filter(|(_, d)| protected.contains(&d.key()))
            .map(|(position, d)| (d.key(), position))
            .collect();

        Ok(PreparedSync {
            user_id: *user_id,
            plan,
            snapshot,
            observed_positions,
        })
    }

    /// Plans and applies a sync for one user.
    ///
    /// Destructive plans are refused with
    /// [`EngineError::DestructiveNotConfirmed`](crate::EngineError::DestructiveNotConfirmed);
    /// collect a confirmation and call
    /// [`sync_user_confirmed`](Self::sync_user_confirmed) instead.
    pub async fn sync_user(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        auth: &AuthKey,
    ) -> EngineResult<SyncOutcome> {
        let prepared = self.plan_user_sync(group_id, user_id, auth).await?;
        self.executor.execute(*user_id, auth, &prepared.plan).await
    }

    /// Plans and applies a sync the caller has explicitly confirmed,
    /// including plans that wipe the whole collection.
    pub async fn sync_user_confirmed(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        auth: &AuthKey,
    ) -> EngineResult<SyncOutcome> {
        let prepared = self.plan_user_sync(group_id, user_id, auth).await?;
        self.executor
            .execute_destructive(*user_id, auth, &prepared.plan)
            .await
    }

    /// Syncs every credentialed member of a group, one user at a time.
    ///
    /// Users are independent: one member failing (or refusing a destructive
    /// plan) never blocks the others. Results come back in input order.
    pub async fn sync_group(
        &self,
        group_id: &GroupId,
        members: &[(UserId, AuthKey)],
    ) -> Vec<(UserId, EngineResult<SyncOutcome>)> {
        let mut results = Vec::with_capacity(members.len());
        for (user_id, auth) in members {
            let result = self.sync_user(group_id, user_id, auth).await;
            match &result {
                Ok(outcome) => {
                    info!(%user_id, status = ?outcome.status, "group member synced");
                }
                Err(error) => {
                    warn!(%user_id, %error, "group member sync failed");
                }
            }
            results.push((*user_id, result));
        }
        results
    }
}
