//! `SlaveNetServer` — the "client" side of the net connection (§4.9).

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::EditorConfig;
use crate::crypto::cipher::Cipher;
use crate::error::NetError;
use crate::lifetime::SlokedLifetime;
use crate::net::connection::{Connection, Dispatcher};
use crate::net::pipe_table::PipeTable;
use crate::rpc::named_server::LocalNamedServer;
use crate::rpc::pipe::{pipe_pair, Pipe};
use crate::rpc::value::KgrValue;
use crate::task::{task_result, Outcome, TaskResult};

pub struct SlaveNetServer {
    connection: Arc<Connection>,
    local_server: Arc<LocalNamedServer>,
    pipes: Arc<PipeTable>,
    cipher: Arc<dyn Cipher>,
    config: EditorConfig,
}

impl SlaveNetServer {
    pub fn new(socket: Arc<crate::crypto::socket::CryptoSocket>, local_server: Arc<LocalNamedServer>, cipher: Arc<dyn Cipher>, config: EditorConfig) -> Arc<Self> {
        Arc::new(SlaveNetServer { connection: Connection::new(socket), local_server, pipes: Arc::new(PipeTable::new()), cipher, config })
    }

    pub fn serve(self: &Arc<Self>) {
        self.connection.clone().run(self.clone() as Arc<dyn Dispatcher>);
        self.pipes.close_all();
    }

    /// The underlying connection, shared with the read loop `serve()`
    /// drives. Exposed so a caller can run the login handshake
    /// (`net::slave::login`) against the same request/reply channel.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn cipher(&self) -> &Arc<dyn Cipher> {
        &self.cipher
    }

    /// Connects to a service hosted under `path` on the master, per
    /// §4.9's slave-initiated `connect` flow.
    pub fn connect(self: &Arc<Self>, path: &str) -> TaskResult<Pipe, NetError> {
        let (client_pipe, service_pipe) = pipe_pair();
        let id = self.pipes.insert(service_pipe);
        let pipes = self.pipes.clone();
        let connection = self.connection.clone();
        let lifetime = SlokedLifetime::new();
        let (supplier, result) = task_result();

        connection.clone().call("connect", KgrValue::String(path.to_string())).notify(
            move |outcome| match outcome {
                Outcome::Ready(value) => match value.field("pipe").and_then(KgrValue::as_i64) {
                    Some(master_id) => {
                        pipes.activate(connection.clone(), id, master_id);
                        let activate_params = crate::kgr_object! { "pipe" => master_id, "peer" => id };
                        let _ = connection.call("activate", activate_params);
                        let _ = supplier.set_result(client_pipe.clone());
                    }
                    None => {
                        pipes.close(id);
                        let _ = supplier.set_error(NetError::Protocol("master connect reply missing pipe id".to_string()));
                    }
                },
                Outcome::Error(e) => {
                    pipes.close(id);
                    let _ = supplier.set_error(e.clone());
                }
                Outcome::Cancelled => {
                    pipes.close(id);
                    let _ = supplier.cancel();
                }
            },
            &lifetime,
        );
        result
    }

    pub fn bind(self: &Arc<Self>, path: &str) -> TaskResult<KgrValue, NetError> {
        self.connection.call("bind", KgrValue::String(path.to_string()))
    }

    pub fn unbind(self: &Arc<Self>, path: &str) -> TaskResult<KgrValue, NetError> {
        self.connection.call("unbind", KgrValue::String(path.to_string()))
    }

    pub fn bound(self: &Arc<Self>, path: &str) -> TaskResult<KgrValue, NetError> {
        self.connection.call("bound", KgrValue::String(path.to_string()))
    }

    pub fn ping(self: &Arc<Self>) -> Result<KgrValue, NetError> {
        self.connection.call_with_timeout("ping", KgrValue::Null, self.config.response_timeout)
    }
}

impl Dispatcher for SlaveNetServer {
    fn dispatch(&self, _connection: &Arc<Connection>, _id: i64, method: &str, params: KgrValue) -> TaskResult<KgrValue, NetError> {
        let (supplier, result) = task_result();
        match method {
            "ping" => {
                let _ = supplier.set_result(KgrValue::String("pong".to_string()));
            }
            "send" => {
                let pipe_id = params.field("pipe").and_then(KgrValue::as_i64);
                let data = params.field("data").cloned().unwrap_or(KgrValue::Null);
                let delivered = pipe_id.map(|id| self.pipes.deliver(id, data)).unwrap_or(false);
                let _ = supplier.set_result(KgrValue::Bool(delivered));
            }
            "close" => {
                if let Some(id) = params.as_i64() {
                    self.pipes.close(id);
                }
                let _ = supplier.set_result(KgrValue::Null);
            }
            "connect" => {
                let service = params.field("service").and_then(KgrValue::as_str).unwrap_or_default().to_string();
                let master_id = params.field("pipe").and_then(KgrValue::as_i64);
                match (master_id, self.local_server.connect(&service)) {
                    (Some(master_id), Ok((pipe, _attached))) => {
                        let id = self.pipes.insert(pipe);
                        self.pipes.activate(self.connection.clone(), id, master_id);
                        let _ = supplier.set_result(crate::kgr_object! { "pipe" => id });
                    }
                    (None, _) => {
                        let _ = supplier.set_error(NetError::Protocol("connect missing master pipe id".to_string()));
                    }
                    (_, Err(e)) => {
                        let _ = supplier.set_error(e);
                    }
                }
            }
            other => {
                let _ = supplier.set_error(NetError::UnknownService(other.to_string()));
            }
        }
        result
    }
}

/// Performs the slave side of the challenge/response login against the
/// master's `auth-request`/`auth-response` methods (§4.10).
pub fn login(connection: &Arc<Connection>, cipher: Arc<dyn Cipher>, account: &str, password: &[u8], timeout: Duration, on_session_key: impl Fn(&crate::crypto::key::Key) + Send + Sync + 'static) -> Result<(), NetError> {
    let slave_auth = crate::auth::SlaveAuthenticator::new(cipher, on_session_key);
    let nonce_reply = connection.call_with_timeout("auth-request", KgrValue::Null, timeout)?;
    let nonce_b64 = nonce_reply.field("nonce").and_then(KgrValue::as_str).ok_or_else(|| NetError::Protocol("auth-request reply missing nonce".to_string()))?;
    let nonce = base64_decode(nonce_b64)?;
    let token = slave_auth.initiate_login(&nonce, password).map_err(|e| NetError::Protocol(e.to_string()))?;
    let params = crate::kgr_object! { "id" => account, "result" => token };
    let reply = connection.call_with_timeout("auth-response", params, timeout)?;
    if reply.field("ok").map(|v| matches!(v, KgrValue::Bool(true))).unwrap_or(false) {
        let salt_b64 = reply.field("salt").and_then(KgrValue::as_str).ok_or_else(|| NetError::Protocol("auth-response reply missing salt".to_string()))?;
        let salt = base64_decode(salt_b64)?;
        slave_auth.confirm(password, &salt);
        Ok(())
    } else {
        warn!(account, "net connection: login rejected");
        Err(NetError::Protocol("login rejected".to_string()))
    }
}

fn base64_decode(value: &str) -> Result<Vec<u8>, NetError> {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    BASE64.decode(value).map_err(|_| NetError::Protocol("invalid base64".to_string()))
}
