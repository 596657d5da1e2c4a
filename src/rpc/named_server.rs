//! `LocalNamedServer` — the same registry as `LocalServer`, keyed by
//! slash-separated paths instead of flat names (§4.7: "services may be
//! nested under a path, e.g. `document/cursor`").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::NetError;
use crate::rpc::pipe::{pipe_pair, Pipe, Service};
use crate::task::TaskResult;

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Path-addressed variant of `LocalServer` (§4.7). `registered` answers
/// both an exact path and "is anything registered under this prefix",
/// mirroring a directory listing.
#[derive(Default)]
pub struct LocalNamedServer {
    services: Mutex<HashMap<String, Arc<dyn Service>>>,
}

impl LocalNamedServer {
    pub fn new() -> Self {
        LocalNamedServer { services: Mutex::new(HashMap::new()) }
    }

    pub fn register(&self, path: &str, service: Arc<dyn Service>) -> Result<(), NetError> {
        let path = normalize(path);
        let mut services = self.services.lock().unwrap();
        if services.contains_key(&path) {
            return Err(NetError::NameExists(path));
        }
        services.insert(path, service);
        Ok(())
    }

    pub fn deregister(&self, path: &str) -> Result<(), NetError> {
        let path = normalize(path);
        self.services
            .lock()
            .unwrap()
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| NetError::UnknownService(path))
    }

    /// True for an exact registration, or for any registered path nested
    /// underneath `path`.
    pub fn registered(&self, path: &str) -> bool {
        let path = normalize(path);
        let services = self.services.lock().unwrap();
        if services.contains_key(&path) {
            return true;
        }
        let prefix = format!("{path}/");
        services.keys().any(|key| key.starts_with(&prefix))
    }

    /// Registered paths nested directly or transitively under `path`.
    pub fn children(&self, path: &str) -> Vec<String> {
        let path = normalize(path);
        let prefix = if path.is_empty() { String::new() } else { format!("{path}/") };
        self.services.lock().unwrap().keys().filter(|key| key.starts_with(&prefix) && **key != path).cloned().collect()
    }

    pub fn connect(&self, path: &str) -> Result<(Pipe, TaskResult<(), NetError>), NetError> {
        let path = normalize(path);
        let service = {
            let services = self.services.lock().unwrap();
            services.get(&path).cloned().ok_or_else(|| NetError::UnknownService(path.clone()))?
        };
        let (client, server) = pipe_pair();
        let attached = service.attach(server);
        Ok((client, attached))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::task_result;

    struct NullService;

    impl Service for NullService {
        fn attach(&self, _pipe: Pipe) -> TaskResult<(), NetError> {
            let (supplier, result) = task_result();
            supplier.set_result(()).unwrap();
            result
        }
    }

    #[test]
    fn nested_paths_are_distinct_registrations() {
        let server = LocalNamedServer::new();
        server.register("document/cursor", Arc::new(NullService)).unwrap();
        server.register("document/search", Arc::new(NullService)).unwrap();
        assert!(server.registered("document"));
        assert!(server.registered("document/cursor"));
        assert!(!server.registered("document/missing"));
    }

    #[test]
    fn children_lists_nested_paths_only() {
        let server = LocalNamedServer::new();
        server.register("a/b", Arc::new(NullService)).unwrap();
        server.register("a/c", Arc::new(NullService)).unwrap();
        server.register("z", Arc::new(NullService)).unwrap();
        let mut kids = server.children("a");
        kids.sort();
        assert_eq!(kids, vec!["a/b".to_string(), "a/c".to_string()]);
    }

    #[test]
    fn leading_and_trailing_slashes_are_normalized() {
        let server = LocalNamedServer::new();
        server.register("/a/b/", Arc::new(NullService)).unwrap();
        assert!(server.registered("a/b"));
        assert!(server.connect("a/b").is_ok());
    }
}
