//! Sync execution.
//!
//! Applies a reconciliation [`Plan`] to the remote account: one
//! replace-whole-collection call, retried with backoff on transient
//! failures, under a per-user in-flight lock. The lock is the engine's only
//! shared mutable resource; syncs for different users run fully in parallel.

use crate::client::AccountApi;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::reconcile::Plan;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use stremsync_model::{AuthKey, SyncOutcome, SyncStatus, UserId};
use tracing::{debug, info, warn};

/// Applies plans against the remote account with per-user mutual exclusion.
pub struct SyncExecutor<A: AccountApi> {
    api: Arc<A>,
    config: EngineConfig,
    in_flight: Mutex<HashSet<UserId>>,
}

/// Releases the per-user slot on every exit path.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<UserId>>,
    user_id: UserId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.user_id);
    }
}

impl<A: AccountApi> SyncExecutor<A> {
    /// Creates an executor over a remote account client.
    pub fn new(api: Arc<A>, config: EngineConfig) -> Self {
        Self {
            api,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Returns true if a sync for the user is currently in flight.
    pub fn is_syncing(&self, user_id: &UserId) -> bool {
        self.in_flight.lock().contains(user_id)
    }

    /// Applies a non-destructive plan.
    ///
    /// Refuses destructive plans with
    /// [`EngineError::DestructiveNotConfirmed`]; callers must collect an
    /// explicit confirmation and use
    /// [`execute_destructive`](Self::execute_destructive). A second call for
    /// the same user while one is in flight fails immediately with
    /// [`EngineError::AlreadySyncing`] rather than queuing.
    pub async fn execute(
        &self,
        user_id: UserId,
        auth: &AuthKey,
        plan: &Plan,
    ) -> EngineResult<SyncOutcome> {
        if plan.is_destructive() {
            return Err(EngineError::DestructiveNotConfirmed);
        }
        self.run(user_id, auth, plan).await
    }

    /// Applies a plan the caller has explicitly confirmed, including
    /// destructive ones.
    pub async fn execute_destructive(
        &self,
        user_id: UserId,
        auth: &AuthKey,
        plan: &Plan,
    ) -> EngineResult<SyncOutcome> {
        self.run(user_id, auth, plan).await
    }

    fn acquire(&self, user_id: UserId) -> EngineResult<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(user_id) {
            return Err(EngineError::AlreadySyncing { user_id });
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            user_id,
        })
    }

    async fn run(&self, user_id: UserId, auth: &AuthKey, plan: &Plan) -> EngineResult<SyncOutcome> {
        let _guard = self.acquire(user_id)?;

        if plan.is_noop() {
            debug!(%user_id, "collection already converged, skipping remote call");
            return Ok(SyncOutcome::noop(user_id));
        }

        let mut retries = 0;
        loop {
            match self.api.replace_collection(auth, &plan.target).await {
                Ok(()) => {
                    info!(
                        %user_id,
                        added = plan.added().len(),
                        removed = plan.removed().len(),
                        reordered = plan.reordered(),
                        "collection replaced"
                    );
                    return Ok(SyncOutcome {
                        user_id,
                        added: plan.added(),
                        removed: plan.removed(),
                        reordered: plan.reordered(),
                        status: SyncStatus::Succeeded,
                        error: None,
                    });
                }
                Err(error) if error.is_retryable() && retries < self.config.retry.max_retries => {
                    retries += 1;
                    let delay = self.config.retry.delay_for_retry(retries);
                    warn!(%user_id, %error, retry = retries, ?delay, "transient failure, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(EngineError::Validation { addon, message }) => {
                    // The remote applied what it could; name the blocker so
                    // the operator can exclude it and retry.
                    return Ok(SyncOutcome {
                        user_id,
                        added: plan.added(),
                        removed: plan.removed(),
                        reordered: plan.reordered(),
                        status: SyncStatus::Partial,
                        error: Some(format!("addon {addon} blocked the sync: {message}")),
                    });
                }
                Err(error) => {
                    warn!(%user_id, %error, "sync failed");
                    return Ok(SyncOutcome {
                        user_id,
                        added: Vec::new(),
                        removed: Vec::new(),
                        reordered: false,
                        status: SyncStatus::Failed,
                        error: Some(error.to_string()),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockAccountApi;
    use crate::reconcile::Reconciler;
    use std::collections::BTreeSet;
    use stremsync_model::AddonDescriptor;
    use stremsync_testkit::fixtures::addon;
    use tokio::sync::Notify;

    fn executor(api: Arc<MockAccountApi>) -> SyncExecutor<MockAccountApi> {
        SyncExecutor::new(api, EngineConfig::default())
    }

    fn auth() -> AuthKey {
        AuthKey::new("test-key")
    }

    fn plan_for(
        desired: &[AddonDescriptor],
        actual: &[AddonDescriptor],
    ) -> crate::reconcile::Plan {
        Reconciler::diff(desired, actual, &BTreeSet::new())
    }

    #[tokio::test]
    async fn keep_only_plan_short_circuits() {
        let api = Arc::new(MockAccountApi::new());
        let a = addon("https://a.example/manifest.json");
        api.set_collection(vec![a.clone()]);

        let plan = plan_for(std::slice::from_ref(&a), &[a.clone()]);
        let outcome = executor(Arc::clone(&api))
            .execute(UserId::new(), &auth(), &plan)
            .await
            .unwrap();

        assert_eq!(outcome.status, SyncStatus::Succeeded);
        assert!(outcome.is_noop());
        assert_eq!(api.replace_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let api = Arc::new(MockAccountApi::new());
        api.fail_next_replace(EngineError::transient("reset"));
        api.fail_next_replace(EngineError::transient("reset again"));

        let a = addon("https://a.example/manifest.json");
        let plan = plan_for(std::slice::from_ref(&a), &[]);
        let outcome = executor(Arc::clone(&api))
            .execute(UserId::new(), &auth(), &plan)
            .await
            .unwrap();

        assert_eq!(outcome.status, SyncStatus::Succeeded);
        assert_eq!(outcome.added.len(), 1);
        assert_eq!(api.replace_calls(), 3);
        assert_eq!(api.collection().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_exhaustion_fails() {
        let api = Arc::new(MockAccountApi::new());
        for _ in 0..4 {
            api.fail_next_replace(EngineError::transient("still down"));
        }

        let a = addon("https://a.example/manifest.json");
        let plan = plan_for(std::slice::from_ref(&a), &[]);
        let user_id = UserId::new();
        let executor = executor(Arc::clone(&api));

        let outcome = executor.execute(user_id, &auth(), &plan).await.unwrap();
        assert_eq!(outcome.status, SyncStatus::Failed);
        assert_eq!(api.replace_calls(), 4);

        // Lock released on the failure path.
        assert!(!executor.is_syncing(&user_id));
    }

    #[tokio::test]
    async fn validation_failure_is_partial_and_names_the_addon() {
        let api = Arc::new(MockAccountApi::new());
        api.fail_next_replace(EngineError::Validation {
            addon: "https://bad.example/manifest.json".into(),
            message: "manifest unreachable".into(),
        });

        let a = addon("https://a.example/manifest.json");
        let bad = addon("https://bad.example/manifest.json");
        let plan = plan_for(&[a, bad], &[]);
        let outcome = executor(Arc::clone(&api))
            .execute(UserId::new(), &auth(), &plan)
            .await
            .unwrap();

        assert_eq!(outcome.status, SyncStatus::Partial);
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .contains("https://bad.example/manifest.json"));
        // Validation failures are not retried.
        assert_eq!(api.replace_calls(), 1);
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let api = Arc::new(MockAccountApi::new());
        api.fail_next_replace(EngineError::AuthExpired("session expired".into()));

        let a = addon("https://a.example/manifest.json");
        let plan = plan_for(std::slice::from_ref(&a), &[]);
        let outcome = executor(Arc::clone(&api))
            .execute(UserId::new(), &auth(), &plan)
            .await
            .unwrap();

        assert_eq!(outcome.status, SyncStatus::Failed);
        assert_eq!(api.replace_calls(), 1);
    }

    #[tokio::test]
    async fn destructive_plan_requires_confirmation() {
        let api = Arc::new(MockAccountApi::new());
        let x = addon("https://x.example/manifest.json");
        api.set_collection(vec![x.clone()]);

        let plan = plan_for(&[], &[x]);
        assert!(plan.is_destructive());

        let executor = executor(Arc::clone(&api));
        let err = executor
            .execute(UserId::new(), &auth(), &plan)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DestructiveNotConfirmed));
        assert_eq!(api.replace_calls(), 0);

        let outcome = executor
            .execute_destructive(UserId::new(), &auth(), &plan)
            .await
            .unwrap();
        assert_eq!(outcome.status, SyncStatus::Succeeded);
        assert!(api.collection().is_empty());
    }

    #[tokio::test]
    async fn removed_addons_are_handed_back() {
        let api = Arc::new(MockAccountApi::new());
        let a = addon("https://a.example/manifest.json");
        let b = addon("https://b.example/manifest.json");
        api.set_collection(vec![a.clone(), b.clone()]);

        let plan = plan_for(std::slice::from_ref(&a), &[a.clone(), b.clone()]);
        let outcome = executor(Arc::clone(&api))
            .execute(UserId::new(), &auth(), &plan)
            .await
            .unwrap();

        // The caller persists exclusions from this list when the drop was
        // intentional; the executor itself writes nothing.
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed[0].key(), b.key());
    }

    /// An API whose replace call blocks until released, for lock tests.
    struct BlockingApi {
        release: Notify,
    }

    impl crate::client::AccountApi for BlockingApi {
        async fn fetch_collection(
            &self,
            _auth: &AuthKey,
        ) -> EngineResult<Vec<AddonDescriptor>> {
            Ok(Vec::new())
        }

        async fn replace_collection(
            &self,
            _auth: &AuthKey,
            _addons: &[AddonDescriptor],
        ) -> EngineResult<()> {
            self.release.notified().await;
            Ok(())
        }

        async fn create_device_code(&self) -> EngineResult<crate::client::DeviceCode> {
            Err(EngineError::Protocol("not supported".into()))
        }

        async fn read_device_code(
            &self,
            _code: &str,
        ) -> EngineResult<crate::client::DeviceCodeStatus> {
            Err(EngineError::Protocol("not supported".into()))
        }
    }

    #[tokio::test]
    async fn concurrent_sync_for_same_user_is_rejected() {
        let api = Arc::new(BlockingApi {
            release: Notify::new(),
        });
        let executor = Arc::new(SyncExecutor::new(Arc::clone(&api), EngineConfig::default()));
        let user_id = UserId::new();

        let a = addon("https://a.example/manifest.json");
        let plan = plan_for(std::slice::from_ref(&a), &[]);

        let first = tokio::spawn({
            let executor = Arc::clone(&executor);
            let plan = plan.clone();
            async move { executor.execute(user_id, &auth(), &plan).await }
        });
        // Let the first sync reach the blocked remote call.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(executor.is_syncing(&user_id));

        let err = executor.execute(user_id, &auth(), &plan).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadySyncing { .. }));

        api.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.status, SyncStatus::Succeeded);
        assert!(!executor.is_syncing(&user_id));
    }
}
