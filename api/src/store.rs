//! Storage boundary. The engine only needs CRUD-by-key plus a few
//! secondary-index lookups over four record kinds; how records are
//! physically stored is a collaborator concern. `MemoryStore` is the
//! in-process implementation backing the service.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use conduct_core::incident::Incident;
use conduct_core::methodology::{CategoryId, MethodologyConfig};
use conduct_core::session::{Session, Student};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Filters for the incident listing. All criteria are ANDed.
#[derive(Debug, Default, Clone)]
pub struct IncidentFilter {
    pub session_id: Option<Uuid>,
    pub category: Option<CategoryId>,
    pub since: Option<DateTime<Utc>>,
}

/// The persistence contract the engine requires. Writes to one record are
/// serialized; there is no cross-record transaction because a single local
/// operator never races themself.
#[allow(async_fn_in_trait)]
pub trait Store {
    async fn put_student(&self, student: Student);
    async fn student(&self, id: Uuid) -> Option<Student>;

    async fn put_session(&self, session: Session);
    async fn session(&self, id: Uuid) -> Option<Session>;
    /// The single live (active or paused) session, if any.
    async fn active_session(&self) -> Option<Session>;

    async fn put_incident(&self, incident: Incident);
    async fn incident(&self, id: Uuid) -> Option<Incident>;
    /// Apply a closure to one incident under the write lock.
    async fn update_incident<F>(&self, id: Uuid, apply: F) -> Option<Incident>
    where
        F: FnOnce(&mut Incident) + Send;
    /// Incidents matching the filter, newest first.
    async fn list_incidents(&self, filter: &IncidentFilter) -> Vec<Incident>;

    async fn put_config(&self, config: MethodologyConfig);
    async fn config(&self) -> Option<MethodologyConfig>;
}

#[derive(Default)]
pub struct MemoryStore {
    students: RwLock<HashMap<Uuid, Student>>,
    sessions: RwLock<HashMap<Uuid, Session>>,
    incidents: RwLock<HashMap<Uuid, Incident>>,
    config: RwLock<Option<MethodologyConfig>>,
}

impl Store for MemoryStore {
    async fn put_student(&self, student: Student) {
        self.students.write().await.insert(student.id, student);
    }

    async fn student(&self, id: Uuid) -> Option<Student> {
        self.students.read().await.get(&id).cloned()
    }

    async fn put_session(&self, session: Session) {
        self.sessions.write().await.insert(session.id, session);
    }

    async fn session(&self, id: Uuid) -> Option<Session> {
        self.sessions.read().await.get(&id).cloned()
    }

    async fn active_session(&self) -> Option<Session> {
        self.sessions
            .read()
            .await
            .values()
            .find(|s| s.is_live())
            .cloned()
    }

    async fn put_incident(&self, incident: Incident) {
        self.incidents.write().await.insert(incident.id, incident);
    }

    async fn incident(&self, id: Uuid) -> Option<Incident> {
        self.incidents.read().await.get(&id).cloned()
    }

    async fn update_incident<F>(&self, id: Uuid, apply: F) -> Option<Incident>
    where
        F: FnOnce(&mut Incident) + Send,
    {
        let mut incidents = self.incidents.write().await;
        let incident = incidents.get_mut(&id)?;
        apply(incident);
        Some(incident.clone())
    }

    async fn list_incidents(&self, filter: &IncidentFilter) -> Vec<Incident> {
        let incidents = self.incidents.read().await;
        let mut matching: Vec<Incident> = incidents
            .values()
            .filter(|i| filter.session_id.is_none_or(|s| i.session_id == s))
            .filter(|i| filter.category.is_none_or(|c| i.category == c))
            .filter(|i| filter.since.is_none_or(|t| i.logged_at >= t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
        matching
    }

    async fn put_config(&self, config: MethodologyConfig) {
        *self.config.write().await = Some(config);
    }

    async fn config(&self) -> Option<MethodologyConfig> {
        self.config.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduct_core::session::SessionPhase;

    fn session(grade: u8, now_ms: i64) -> Session {
        Session::start(
            Uuid::now_v7(),
            grade,
            "one_on_one".to_string(),
            vec![],
            Utc::now(),
            now_ms,
        )
    }

    fn incident(session_id: Uuid, category: CategoryId, offset: u64) -> Incident {
        Incident {
            id: Uuid::now_v7(),
            session_id,
            category,
            severity: 2,
            description: "test".to_string(),
            context: None,
            offset_seconds: offset,
            logged_at: Utc::now(),
            advisory: None,
            resolution: None,
        }
    }

    #[tokio::test]
    async fn active_session_returns_the_live_one() {
        let store = MemoryStore::default();
        assert!(store.active_session().await.is_none());

        let mut old = session(4, 0);
        old.end(Utc::now(), 1_000).expect("end");
        store.put_session(old).await;
        assert!(store.active_session().await.is_none());

        let live = session(4, 0);
        let live_id = live.id;
        store.put_session(live).await;
        let found = store.active_session().await.expect("live session");
        assert_eq!(found.id, live_id);
        assert_eq!(found.phase, SessionPhase::Active);
    }

    #[tokio::test]
    async fn incident_filters_are_anded() {
        let store = MemoryStore::default();
        let s1 = Uuid::now_v7();
        let s2 = Uuid::now_v7();
        store.put_incident(incident(s1, CategoryId::Disruption, 10)).await;
        store.put_incident(incident(s1, CategoryId::OffTask, 20)).await;
        store.put_incident(incident(s2, CategoryId::Disruption, 30)).await;

        let by_session = store
            .list_incidents(&IncidentFilter {
                session_id: Some(s1),
                ..Default::default()
            })
            .await;
        assert_eq!(by_session.len(), 2);

        let by_both = store
            .list_incidents(&IncidentFilter {
                session_id: Some(s1),
                category: Some(CategoryId::Disruption),
                ..Default::default()
            })
            .await;
        assert_eq!(by_both.len(), 1);
        assert_eq!(by_both[0].category, CategoryId::Disruption);
    }

    #[tokio::test]
    async fn update_incident_mutates_in_place() {
        let store = MemoryStore::default();
        let record = incident(Uuid::now_v7(), CategoryId::Other, 0);
        let id = record.id;
        store.put_incident(record).await;

        let updated = store
            .update_incident(id, |i| i.severity = 3)
            .await
            .expect("incident exists");
        assert_eq!(updated.severity, 3);
        assert_eq!(store.incident(id).await.expect("still there").severity, 3);

        assert!(store.update_incident(Uuid::now_v7(), |_| {}).await.is_none());
    }
}
