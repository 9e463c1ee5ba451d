//! Notification fan-out
//!
//! A [`FanoutPlan`] lists `(audience, message)` pairs. The [`Notifier`]
//! resolves each audience when the detached task runs and writes one
//! notification row per recipient. A recipient matched by several audiences
//! of the same plan only gets the first matching message. Failures are
//! logged and counted, never returned to the operation that triggered the
//! plan.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::store::{NewNotification, WorkflowStore};
use crate::errors::Result;
use crate::metrics;
use crate::workflow::Role;

/// Who a message is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    User(Uuid),
    /// Every user holding the role at delivery time
    Role(Role),
    /// Every user who has reviewed the paper at delivery time
    ReviewersOf(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutPlan {
    pub paper_id: Option<Uuid>,
    pub entries: Vec<(Audience, String)>,
}

impl FanoutPlan {
    pub fn for_paper(paper_id: Uuid) -> Self {
        Self {
            paper_id: Some(paper_id),
            entries: Vec::new(),
        }
    }

    pub fn notify(mut self, audience: Audience, message: impl Into<String>) -> Self {
        self.entries.push((audience, message.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of delivering one plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
    /// Recipients already served by an earlier audience of the plan
    pub duplicates: usize,
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Detached broadcaster for fan-out plans
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn WorkflowStore>,
    in_flight: Arc<InFlight>,
}

impl Notifier {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            store,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Spawn delivery of `plan` and return immediately.
    ///
    /// The task is independent of the caller: dropping the handle or
    /// cancelling the request does not stop it.
    pub fn dispatch(&self, plan: FanoutPlan) -> JoinHandle<FanoutReport> {
        self.in_flight.count.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard(self.in_flight.clone());
        let store = self.store.clone();

        tokio::spawn(async move {
            let _guard = guard;
            deliver(store.as_ref(), plan).await
        })
    }

    /// Plans dispatched but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Wait until no plan is in flight
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

async fn resolve(store: &dyn WorkflowStore, audience: Audience) -> Result<Vec<Uuid>> {
    match audience {
        Audience::User(id) => Ok(vec![id]),
        Audience::Role(role) => store.user_ids_with_role(role).await,
        Audience::ReviewersOf(paper_id) => store.reviewer_ids(paper_id).await,
    }
}

/// Deliver a plan in the current task
pub async fn deliver(store: &dyn WorkflowStore, plan: FanoutPlan) -> FanoutReport {
    let started = Instant::now();
    let mut report = FanoutReport::default();
    let mut served: HashSet<Uuid> = HashSet::new();

    for (audience, message) in plan.entries {
        let recipients = match resolve(store, audience).await {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(
                    error = %e,
                    audience = ?audience,
                    paper_id = ?plan.paper_id,
                    "Failed to resolve notification audience"
                );
                report.failed += 1;
                continue;
            }
        };

        for user_id in recipients {
            if !served.insert(user_id) {
                report.duplicates += 1;
                continue;
            }

            let notification = NewNotification {
                user_id,
                message: message.clone(),
                paper_id: plan.paper_id,
            };
            match store.insert_notification(notification).await {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        error = %e,
                        user_id = %user_id,
                        paper_id = ?plan.paper_id,
                        "Failed to insert notification"
                    );
                    report.failed += 1;
                }
            }
        }
    }

    metrics::record_fanout(started.elapsed().as_secs_f64(), report.delivered, report.failed);
    debug!(
        paper_id = ?plan.paper_id,
        recipients = report.delivered,
        failed = report.failed,
        "Fan-out finished"
    );

    report
}
