//! `LocalServer` — an in-process named-service registry (§3, §4.7).
//!
//! Mirrors the broker's connection table (`other_examples` broker/mod.rs:
//! `Arc<Mutex<HashMap<name, handler>>>`, one thread-per-connection) but
//! in-process: `connect` hands the caller one end of a fresh `Pipe` and
//! attaches the registered `Service` to the other end directly, no socket
//! or thread involved.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::NetError;
use crate::rpc::pipe::{pipe_pair, Pipe, Service};
use crate::task::TaskResult;

/// Registers `Service`s under plain names and connects clients to them
/// in-process (§4.7: "LocalServer: Register/Deregister/Connect").
#[derive(Default)]
pub struct LocalServer {
    services: Mutex<HashMap<String, Arc<dyn Service>>>,
}

impl LocalServer {
    pub fn new() -> Self {
        LocalServer { services: Mutex::new(HashMap::new()) }
    }

    pub fn register(&self, name: impl Into<String>, service: Arc<dyn Service>) -> Result<(), NetError> {
        let name = name.into();
        let mut services = self.services.lock().unwrap();
        if services.contains_key(&name) {
            return Err(NetError::NameExists(name));
        }
        services.insert(name, service);
        Ok(())
    }

    pub fn deregister(&self, name: &str) -> Result<(), NetError> {
        self.services
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| NetError::UnknownService(name.to_string()))
    }

    pub fn registered(&self, name: &str) -> bool {
        self.services.lock().unwrap().contains_key(name)
    }

    /// Connect to `name`: attaches its `Service` to a fresh pipe pair and
    /// gives the caller the other end, alongside the service's attach
    /// outcome so the caller can tell a refused handshake from a live one.
    pub fn connect(&self, name: &str) -> Result<(Pipe, TaskResult<(), NetError>), NetError> {
        let service = {
            let services = self.services.lock().unwrap();
            services.get(name).cloned().ok_or_else(|| NetError::UnknownService(name.to_string()))?
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

    struct EchoService;

    impl Service for EchoService {
        fn attach(&self, pipe: Pipe) -> TaskResult<(), NetError> {
            let (supplier, result) = task_result();
            std::thread::spawn(move || {
                while let Ok(value) = pipe.read() {
                    if pipe.write(value).is_err() {
                        break;
                    }
                }
                let _ = supplier.set_result(());
            });
            result
        }
    }

    #[test]
    fn connect_to_unknown_service_fails() {
        let server = LocalServer::new();
        assert!(matches!(server.connect("nope"), Err(NetError::UnknownService(_))));
    }

    #[test]
    fn double_register_fails() {
        let server = LocalServer::new();
        server.register("echo", Arc::new(EchoService)).unwrap();
        assert!(matches!(server.register("echo", Arc::new(EchoService)), Err(NetError::NameExists(_))));
    }

    #[test]
    fn connect_relays_through_attached_service() {
        let server = LocalServer::new();
        server.register("echo", Arc::new(EchoService)).unwrap();
        let (client, _attached) = server.connect("echo").unwrap();
        client.write(crate::rpc::value::KgrValue::Int(5)).unwrap();
        assert_eq!(client.read().unwrap(), crate::rpc::value::KgrValue::Int(5));
        client.close();
    }

    #[test]
    fn deregister_then_connect_fails() {
        let server = LocalServer::new();
        server.register("echo", Arc::new(EchoService)).unwrap();
        server.deregister("echo").unwrap();
        assert!(matches!(server.connect("echo"), Err(NetError::UnknownService(_))));
    }
}
