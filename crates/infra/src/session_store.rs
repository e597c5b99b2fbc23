use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use recount_engine::ExtractStatistics;
use recount_extract::DepotContext;
use recount_session::{AuditEntry, ReconciliationId, WorkflowStage};

/// Snapshot of a session as the external collaborator persists it.
///
/// Enough to resume the workflow at its last successful stage via
/// `Reconciliation::restore`; row sets live in artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: ReconciliationId,
    pub name: String,
    /// ERP-side session number recovered from the mask headers.
    pub session_number: String,
    pub context: DepotContext,
    pub stage: WorkflowStage,
    pub stats: Option<ExtractStatistics>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Kind of row artifact stored for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Mask,
    Template,
    Final,
}

impl core::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Mask => f.write_str("mask"),
            Self::Template => f.write_str("template"),
            Self::Final => f.write_str("final"),
        }
    }
}

/// Store-level error: persistence failures, not business rejections.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("session not found")]
    SessionNotFound,

    #[error("session already exists")]
    DuplicateSession,

    #[error("artifact {0} not found")]
    ArtifactNotFound(ArtifactKind),

    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Persistence port for sessions, audit trails and row artifacts.
///
/// The engine never calls this; the hosting process wires an
/// implementation and feeds persisted inputs back into the workflow
/// functions when a session resumes.
pub trait SessionStore {
    /// Insert a new session record. Fails on a duplicate id.
    fn create(&self, record: SessionRecord) -> Result<(), StoreError>;

    /// Overwrite an existing session record (stage advance, completion).
    fn save(&self, record: SessionRecord) -> Result<(), StoreError>;

    fn load(&self, id: ReconciliationId) -> Result<SessionRecord, StoreError>;

    /// Drop a session with its audits and artifacts.
    fn delete(&self, id: ReconciliationId) -> Result<(), StoreError>;

    /// Incomplete sessions, newest first.
    fn active_sessions(&self) -> Result<Vec<SessionRecord>, StoreError>;

    fn append_audits(
        &self,
        id: ReconciliationId,
        entries: Vec<AuditEntry>,
    ) -> Result<(), StoreError>;

    /// Audit trail in append order.
    fn audits(&self, id: ReconciliationId) -> Result<Vec<AuditEntry>, StoreError>;

    fn put_artifact(
        &self,
        id: ReconciliationId,
        kind: ArtifactKind,
        payload: JsonValue,
    ) -> Result<(), StoreError>;

    fn artifact(
        &self,
        id: ReconciliationId,
        kind: ArtifactKind,
    ) -> Result<JsonValue, StoreError>;
}

#[derive(Debug)]
struct StoredSession {
    record: SessionRecord,
    audits: Vec<AuditEntry>,
    artifacts: HashMap<ArtifactKind, JsonValue>,
}

/// In-memory session store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<ReconciliationId, StoredSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, record: SessionRecord) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        if sessions.contains_key(&record.id) {
            return Err(StoreError::DuplicateSession);
        }
        sessions.insert(
            record.id,
            StoredSession {
                record,
                audits: Vec::new(),
                artifacts: HashMap::new(),
            },
        );
        Ok(())
    }

    fn save(&self, record: SessionRecord) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        let stored = sessions
            .get_mut(&record.id)
            .ok_or(StoreError::SessionNotFound)?;
        stored.record = record;
        Ok(())
    }

    fn load(&self, id: ReconciliationId) -> Result<SessionRecord, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockPoisoned)?;
        sessions
            .get(&id)
            .map(|s| s.record.clone())
            .ok_or(StoreError::SessionNotFound)
    }

    fn delete(&self, id: ReconciliationId) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        sessions
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::SessionNotFound)
    }

    fn active_sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut active: Vec<SessionRecord> = sessions
            .values()
            .filter(|s| !s.record.completed)
            .map(|s| s.record.clone())
            .collect();
        // Newest first; id as a deterministic tie-break.
        active.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        });
        Ok(active)
    }

    fn append_audits(
        &self,
        id: ReconciliationId,
        entries: Vec<AuditEntry>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        let stored = sessions.get_mut(&id).ok_or(StoreError::SessionNotFound)?;
        stored.audits.extend(entries);
        Ok(())
    }

    fn audits(&self, id: ReconciliationId) -> Result<Vec<AuditEntry>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockPoisoned)?;
        sessions
            .get(&id)
            .map(|s| s.audits.clone())
            .ok_or(StoreError::SessionNotFound)
    }

    fn put_artifact(
        &self,
        id: ReconciliationId,
        kind: ArtifactKind,
        payload: JsonValue,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        let stored = sessions.get_mut(&id).ok_or(StoreError::SessionNotFound)?;
        stored.artifacts.insert(kind, payload);
        Ok(())
    }

    fn artifact(
        &self,
        id: ReconciliationId,
        kind: ArtifactKind,
    ) -> Result<JsonValue, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockPoisoned)?;
        let stored = sessions.get(&id).ok_or(StoreError::SessionNotFound)?;
        stored
            .artifacts
            .get(&kind)
            .cloned()
            .ok_or(StoreError::ArtifactNotFound(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use recount_core::AggregateId;
    use recount_engine::AuditAction;

    fn record(id: ReconciliationId, created_at: DateTime<Utc>, completed: bool) -> SessionRecord {
        SessionRecord {
            id,
            name: "Janvier".to_string(),
            session_number: "SES001".to_string(),
            context: DepotContext::Conforme,
            stage: WorkflowStage::ContextSelected,
            stats: None,
            completed,
            created_at,
        }
    }

    fn time(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, hour, 0, 0).unwrap()
    }

    fn test_id() -> ReconciliationId {
        ReconciliationId::new(AggregateId::new())
    }

    #[test]
    fn create_load_round_trip() {
        let store = InMemorySessionStore::new();
        let id = test_id();
        let rec = record(id, time(8), false);

        store.create(rec.clone()).unwrap();
        assert_eq!(store.load(id).unwrap(), rec);
    }

    #[test]
    fn create_rejects_duplicates() {
        let store = InMemorySessionStore::new();
        let id = test_id();
        store.create(record(id, time(8), false)).unwrap();
        assert_eq!(
            store.create(record(id, time(9), false)),
            Err(StoreError::DuplicateSession)
        );
    }

    #[test]
    fn save_updates_the_stage() {
        let store = InMemorySessionStore::new();
        let id = test_id();
        store.create(record(id, time(8), false)).unwrap();

        let mut advanced = record(id, time(8), false);
        advanced.stage = WorkflowStage::AwaitingCounts;
        store.save(advanced).unwrap();

        assert_eq!(store.load(id).unwrap().stage, WorkflowStage::AwaitingCounts);
    }

    #[test]
    fn save_requires_an_existing_session() {
        let store = InMemorySessionStore::new();
        assert_eq!(
            store.save(record(test_id(), time(8), false)),
            Err(StoreError::SessionNotFound)
        );
    }

    #[test]
    fn active_sessions_excludes_completed_and_sorts_newest_first() {
        let store = InMemorySessionStore::new();
        let older = test_id();
        let newer = test_id();
        let done = test_id();
        store.create(record(older, time(8), false)).unwrap();
        store.create(record(newer, time(10), false)).unwrap();
        store.create(record(done, time(9), true)).unwrap();

        let active = store.active_sessions().unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, newer);
        assert_eq!(active[1].id, older);
    }

    #[test]
    fn audits_append_in_order() {
        let store = InMemorySessionStore::new();
        let id = test_id();
        store.create(record(id, time(8), false)).unwrap();

        let entries = vec![
            AuditEntry {
                action: AuditAction::QuarantineDetected,
                details: "lot LQ".to_string(),
                recorded_at: time(8),
            },
            AuditEntry {
                action: AuditAction::LotExhausted,
                details: "lot L1".to_string(),
                recorded_at: time(9),
            },
        ];
        store.append_audits(id, entries.clone()).unwrap();

        assert_eq!(store.audits(id).unwrap(), entries);
    }

    #[test]
    fn artifacts_round_trip_and_report_missing_kinds() {
        let store = InMemorySessionStore::new();
        let id = test_id();
        store.create(record(id, time(8), false)).unwrap();

        let payload = serde_json::json!({ "rows": [{ "product": "ART001" }] });
        store
            .put_artifact(id, ArtifactKind::Template, payload.clone())
            .unwrap();

        assert_eq!(store.artifact(id, ArtifactKind::Template).unwrap(), payload);
        assert_eq!(
            store.artifact(id, ArtifactKind::Final),
            Err(StoreError::ArtifactNotFound(ArtifactKind::Final))
        );
    }

    #[test]
    fn a_loaded_record_restores_a_resumable_session() {
        use recount_session::Reconciliation;

        let store = InMemorySessionStore::new();
        let id = test_id();
        let mut rec = record(id, time(8), false);
        rec.stage = WorkflowStage::AwaitingCounts;
        store.create(rec).unwrap();

        let loaded = store.load(id).unwrap();
        let session = Reconciliation::restore(
            loaded.id,
            loaded.name,
            loaded.context,
            loaded.stage,
            loaded.stats,
        );
        assert_eq!(session.stage(), WorkflowStage::AwaitingCounts);
        assert!(!session.is_completed());
    }

    #[test]
    fn delete_removes_the_whole_session() {
        let store = InMemorySessionStore::new();
        let id = test_id();
        store.create(record(id, time(8), false)).unwrap();
        store.delete(id).unwrap();
        assert_eq!(store.load(id), Err(StoreError::SessionNotFound));
    }
}
