//! In-memory ERP stores.
//!
//! `InMemoryErp` implements every read store the guards consult, plus a
//! small write side the scenarios use to seed state and persist approval
//! instances. All state sits behind one `Mutex` so a single value can be
//! shared as every store at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use permit_contracts::{
    error::{PermitError, PermitResult},
    external::{Ack, AckLink, AckRequest, LockScope, OpenApproval, PeriodLock},
    instance::{ApprovalInstance, InstanceStatus},
    request::TargetRef,
};
use permit_core::traits::{
    AckLinkStore, AckRequestStore, AckStore, ApprovalInstanceStore, Clock, PeriodLockStore,
    ProjectStore, WorklogSettingStore,
};
use permit_guard::GuardStores;

/// How many batched lookups each store has answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupCounts {
    pub period_locks: usize,
    pub ack_requests: usize,
    pub acks: usize,
}

#[derive(Default)]
struct ErpData {
    instances: Vec<ApprovalInstance>,
    /// Project id → lifecycle status.
    projects: HashMap<String, String>,
    locks: Vec<PeriodLock>,
    editable_days: Option<u32>,
    links: Vec<AckLink>,
    requests: Vec<AckRequest>,
    acks: Vec<Ack>,
    lookups: LookupCounts,
}

/// Every ERP store, in memory.
#[derive(Default)]
pub struct InMemoryErp {
    data: Mutex<ErpData>,
}

impl InMemoryErp {
    pub fn new() -> Self {
        Self::default()
    }

    /// The guard store bundle with every store backed by `erp`.
    pub fn guard_stores(erp: &Arc<Self>) -> GuardStores {
        GuardStores {
            approvals: erp.clone(),
            projects: erp.clone(),
            period_locks: erp.clone(),
            worklog_settings: erp.clone(),
            ack_links: erp.clone(),
            ack_requests: erp.clone(),
            acks: erp.clone(),
        }
    }

    fn read(&self, store: &str) -> PermitResult<MutexGuard<'_, ErpData>> {
        self.data
            .lock()
            .map_err(|e| PermitError::store(store, format!("lock poisoned: {e}")))
    }

    /// Seeding never fails; a poisoned lock is recovered.
    fn seed(&self) -> MutexGuard<'_, ErpData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Seeding ───────────────────────────────────────────────────────────────

    pub fn set_project_status(&self, project_id: &str, status: &str) {
        self.seed()
            .projects
            .insert(project_id.to_string(), status.to_string());
    }

    pub fn lock_period(&self, lock_id: &str, period_key: &str, scope: LockScope) {
        self.seed().locks.push(PeriodLock {
            id: lock_id.to_string(),
            period_key: period_key.to_string(),
            scope,
        });
    }

    pub fn set_editable_days(&self, days: Option<u32>) {
        self.seed().editable_days = days;
    }

    /// Post an acknowledgement request and link it to `target`.
    pub fn request_ack(&self, request: AckRequest, target: TargetRef) {
        let mut data = self.seed();
        data.links.push(AckLink {
            request_id: request.id.clone(),
            target,
        });
        data.requests.push(request);
    }

    /// Link `target` to a request id that has no request row.
    pub fn link_dangling(&self, request_id: &str, target: TargetRef) {
        self.seed().links.push(AckLink {
            request_id: request_id.to_string(),
            target,
        });
    }

    pub fn ack(&self, request_id: &str, user_id: &str, at: DateTime<Utc>) {
        self.seed().acks.push(Ack {
            request_id: request_id.to_string(),
            user_id: user_id.to_string(),
            acked_at: at,
        });
    }

    /// Insert or replace an approval instance by id.
    pub fn save_instance(&self, instance: &ApprovalInstance) {
        let mut data = self.seed();
        match data.instances.iter_mut().find(|i| i.id == instance.id) {
            Some(existing) => *existing = instance.clone(),
            None => data.instances.push(instance.clone()),
        }
        debug!(instance_id = %instance.id, status = %instance.status, "instance saved");
    }

    pub fn lookups(&self) -> LookupCounts {
        self.seed().lookups
    }

    pub fn reset_lookups(&self) {
        self.seed().lookups = LookupCounts::default();
    }
}

// ── Store implementations ─────────────────────────────────────────────────────

impl ApprovalInstanceStore for InMemoryErp {
    fn find_open(
        &self,
        flow_type: &str,
        target_table: &str,
        target_id: &str,
    ) -> PermitResult<Option<OpenApproval>> {
        let data = self.read("approval_instances")?;
        Ok(data
            .instances
            .iter()
            .find(|i| {
                i.status == InstanceStatus::Pending
                    && i.flow_type == flow_type
                    && i.target.table == target_table
                    && i.target.id == target_id
            })
            .map(|i| OpenApproval {
                id: i.id.to_string(),
                flow_type: i.flow_type.clone(),
                target: i.target.clone(),
            }))
    }
}

impl ProjectStore for InMemoryErp {
    fn find_closed_among(&self, project_ids: &[String]) -> PermitResult<Vec<String>> {
        let data = self.read("projects")?;
        Ok(project_ids
            .iter()
            .filter(|p| data.projects.get(*p).map(String::as_str) == Some("closed"))
            .cloned()
            .collect())
    }
}

impl PeriodLockStore for InMemoryErp {
    fn find_active(&self, period_keys: &[String], project_ids: &[String]) -> PermitResult<Vec<PeriodLock>> {
        let mut data = self.read("period_locks")?;
        data.lookups.period_locks += 1;
        Ok(data
            .locks
            .iter()
            .filter(|l| period_keys.contains(&l.period_key))
            .filter(|l| match &l.scope {
                LockScope::Global => true,
                LockScope::Project { project_id } => project_ids.contains(project_id),
            })
            .cloned()
            .collect())
    }
}

impl WorklogSettingStore for InMemoryErp {
    fn editable_days(&self) -> PermitResult<Option<u32>> {
        Ok(self.read("worklog_settings")?.editable_days)
    }
}

impl AckLinkStore for InMemoryErp {
    fn find_by_target(&self, target_table: &str, target_id: &str) -> PermitResult<Vec<AckLink>> {
        let data = self.read("ack_links")?;
        Ok(data
            .links
            .iter()
            .filter(|l| l.target.table == target_table && l.target.id == target_id)
            .cloned()
            .collect())
    }
}

impl AckRequestStore for InMemoryErp {
    fn find_by_ids(&self, request_ids: &[String]) -> PermitResult<Vec<AckRequest>> {
        let mut data = self.read("ack_requests")?;
        data.lookups.ack_requests += 1;
        Ok(data
            .requests
            .iter()
            .filter(|r| request_ids.contains(&r.id))
            .cloned()
            .collect())
    }
}

impl AckStore for InMemoryErp {
    fn find_by_requests(&self, request_ids: &[String]) -> PermitResult<Vec<Ack>> {
        let mut data = self.read("acks")?;
        data.lookups.acks += 1;
        Ok(data
            .acks
            .iter()
            .filter(|a| request_ids.contains(&a.request_id))
            .cloned()
            .collect())
    }
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// A settable clock for reproducible runs.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use permit_contracts::{external::LockScope, request::TargetRef};
    use permit_core::traits::{AckLinkStore, Clock, PeriodLockStore, ProjectStore};

    use super::{FixedClock, InMemoryErp};

    #[test]
    fn closed_projects_only() {
        let erp = InMemoryErp::new();
        erp.set_project_status("p-1", "active");
        erp.set_project_status("p-2", "closed");

        let closed = erp
            .find_closed_among(&["p-1".to_string(), "p-2".to_string(), "p-3".to_string()])
            .unwrap();
        assert_eq!(closed, vec!["p-2"]);
    }

    #[test]
    fn period_lookup_filters_scope_and_counts() {
        let erp = InMemoryErp::new();
        erp.lock_period("l-1", "2026-08", LockScope::Global);
        erp.lock_period("l-2", "2026-08", LockScope::Project { project_id: "p-9".to_string() });

        let locks = erp
            .find_active(&["2026-08".to_string()], &["p-1".to_string()])
            .unwrap();
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].id, "l-1");
        assert_eq!(erp.lookups().period_locks, 1);
    }

    #[test]
    fn dangling_links_are_returned() {
        let erp = InMemoryErp::new();
        erp.link_dangling("gone", TargetRef::new("invoices", "inv-1"));
        let links = erp.find_by_target("invoices", "inv-1").unwrap();
        assert_eq!(links[0].request_id, "gone");
    }

    #[test]
    fn fixed_clock_is_settable() {
        let t0 = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 10, 2, 0, 0, 0).unwrap();
        let clock = FixedClock::at(t0);
        assert_eq!(clock.now(), t0);
        clock.set(t1);
        assert_eq!(clock.now(), t1);
    }
}
