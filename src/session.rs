use tracing::info;

/// A live port-forwarding channel opened from a container page.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Session {
    pub id: String,
    pub local_port: u16,
    pub remote_port: u16,
    /// `cluster.container` composite identifier.
    pub container_id: String,
    pub pid: Option<u32>,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
}

impl SessionRegistry {
    pub fn register(&mut self, session: Session) {
        info!(
            session = %session.id,
            container = %session.container_id,
            local_port = session.local_port,
            "port forward registered"
        );
        self.sessions.push(session);
    }

    /// Removes and returns every session of the container. Callers terminate the
    /// returned sessions with the provider; the registry forgets them either way.
    pub fn terminate_by_container(&mut self, container_id: &str) -> Vec<Session> {
        let (removed, kept): (Vec<Session>, Vec<Session>) = std::mem::take(&mut self.sessions)
            .into_iter()
            .partition(|session| session.container_id == container_id);
        self.sessions = kept;
        removed
    }

    pub fn terminate_all(&mut self) -> Vec<Session> {
        std::mem::take(&mut self.sessions)
    }

    pub fn remove_by_pid(&mut self, pid: u32) -> Option<Session> {
        let index = self
            .sessions
            .iter()
            .position(|session| session.pid == Some(pid))?;
        Some(self.sessions.remove(index))
    }

    pub fn for_container(&self, container_id: &str) -> Vec<&Session> {
        self.sessions
            .iter()
            .filter(|session| session.container_id == container_id)
            .collect()
    }

    pub fn is_local_port_taken(&self, port: u16) -> bool {
        self.sessions.iter().any(|session| session.local_port == port)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionRegistry};

    fn session(id: &str, container_id: &str, local_port: u16, pid: u32) -> Session {
        Session {
            id: id.to_string(),
            local_port,
            remote_port: 80,
            container_id: container_id.to_string(),
            pid: Some(pid),
        }
    }

    #[test]
    fn terminating_a_container_removes_all_of_its_sessions() {
        let mut registry = SessionRegistry::default();
        registry.register(session("s-1", "cluster1.c1", 8080, 10));
        registry.register(session("s-2", "cluster1.c1", 9090, 11));
        registry.register(session("s-3", "cluster1.c2", 7070, 12));

        let removed = registry.terminate_by_container("cluster1.c1");
        let ports = removed
            .iter()
            .map(|session| session.local_port)
            .collect::<Vec<_>>();
        assert_eq!(ports, vec![8080, 9090]);
        assert!(registry.for_container("cluster1.c1").is_empty());
        assert!(registry.terminate_by_container("cluster1.c1").is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn exited_process_drops_its_session() {
        let mut registry = SessionRegistry::default();
        registry.register(session("s-1", "cluster1.c1", 8080, 10));
        assert!(registry.is_local_port_taken(8080));
        assert_eq!(
            registry.remove_by_pid(10).map(|session| session.id),
            Some("s-1".to_string())
        );
        assert!(registry.remove_by_pid(10).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn terminate_all_empties_the_registry() {
        let mut registry = SessionRegistry::default();
        registry.register(session("s-1", "a.b", 8080, 10));
        registry.register(session("s-2", "c.d", 8081, 11));
        assert_eq!(registry.terminate_all().len(), 2);
        assert!(registry.is_empty());
    }
}
