//! `MasterNetServer` — the "server" side of the net connection (§4.9).
//!
//! Accepts a `CryptoSocket` per connection, dispatches the shared method
//! table, and is the side `CredentialMaster`/`MasterAuthenticator`
//! belong to.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::auth::{CredentialMaster, MasterAuthenticator};
use crate::config::EditorConfig;
use crate::crypto::cipher::Cipher;
use crate::crypto::random::Random;
use crate::crypto::socket::CryptoSocket;
use crate::error::{AuthError, NetError};
use crate::net::connection::{Connection, Dispatcher};
use crate::net::pipe_table::PipeTable;
use crate::net::slave_service::SlaveService;
use crate::rpc::named_server::LocalNamedServer;
use crate::rpc::value::KgrValue;
use crate::task::{task_result, TaskResult};

/// One accepted connection's server-side state. A process typically owns
/// many of these, one per slave.
pub struct MasterNetServer {
    connection: Arc<Connection>,
    local_server: Arc<LocalNamedServer>,
    credential_master: Arc<CredentialMaster>,
    authenticator: Arc<MasterAuthenticator>,
    pipes: Arc<PipeTable>,
    slave_services: Mutex<Vec<String>>,
    config: EditorConfig,
}

impl MasterNetServer {
    pub fn new(
        socket: Arc<CryptoSocket>,
        local_server: Arc<LocalNamedServer>,
        credential_master: Arc<CredentialMaster>,
        cipher: Arc<dyn Cipher>,
        random: Arc<dyn Random>,
        config: EditorConfig,
    ) -> Arc<Self> {
        let connection = Connection::new(socket.clone());
        let socket_for_auth = socket;
        let authenticator = MasterAuthenticator::new(credential_master.clone(), cipher, random, move |key| {
            socket_for_auth.set_encryption(key.clone());
        });
        Arc::new(MasterNetServer {
            connection,
            local_server,
            credential_master,
            authenticator,
            pipes: Arc::new(PipeTable::new()),
            slave_services: Mutex::new(Vec::new()),
            config,
        })
    }

    pub fn credential_master(&self) -> &Arc<CredentialMaster> {
        &self.credential_master
    }

    /// The currently bound account (the default account pre-login),
    /// for a host that wants to report who a connection authenticated
    /// as without reaching into the authenticator directly.
    pub fn bound_account(&self) -> Arc<crate::auth::Account> {
        self.authenticator.bound_account()
    }

    /// Runs the read/dispatch loop and the inactivity timer on the
    /// caller's thread pair; blocks until the connection closes.
    pub fn serve(self: &Arc<Self>) {
        let timer_server = self.clone();
        let timer_handle = std::thread::spawn(move || timer_server.run_inactivity_timer());
        self.connection.clone().run(self.clone() as Arc<dyn Dispatcher>);
        self.pipes.close_all();
        // §4.9: "The master server detaches all slave-registered services
        // when the connection dies."
        for path in self.slave_services.lock().unwrap().drain(..) {
            let _ = self.local_server.deregister(&path);
        }
        let _ = timer_handle.join();
    }

    fn run_inactivity_timer(self: &Arc<Self>) {
        loop {
            std::thread::sleep(self.config.inactivity_timeout);
            if self.connection_closed() {
                return;
            }
            let idle = self.connection.idle_for();
            if idle >= self.config.inactivity_threshold {
                warn!(?idle, "net connection: inactivity threshold exceeded, disconnecting");
                self.connection.close();
                return;
            }
            if idle >= self.config.inactivity_timeout {
                if self.connection.call_with_timeout("ping", KgrValue::Null, self.config.response_timeout).is_err() {
                    warn!("net connection: ping unanswered, disconnecting");
                    self.connection.close();
                    return;
                }
            }
        }
    }

    fn connection_closed(&self) -> bool {
        self.connection.idle_for() > self.config.inactivity_threshold * 4
    }

    fn check_allowed(&self, path: &str, modification: bool) -> Result<(), AuthError> {
        let account = self.authenticator.bound_account();
        let restriction = if modification { &account.modification } else { &account.access };
        if restriction.is_allowed(path) {
            Ok(())
        } else {
            Err(AuthError::Restricted(path.to_string()))
        }
    }
}

impl Dispatcher for MasterNetServer {
    fn dispatch(&self, connection: &Arc<Connection>, id: i64, method: &str, params: KgrValue) -> TaskResult<KgrValue, NetError> {
        let (supplier, result) = task_result();
        match method {
            "ping" => {
                let _ = supplier.set_result(KgrValue::String("pong".to_string()));
            }
            "connect" => {
                let service = params.as_str().map(str::to_string).unwrap_or_default();
                match self.check_allowed(&service, false) {
                    Err(e) => {
                        let _ = supplier.set_error(NetError::Protocol(e.to_string()));
                    }
                    Ok(()) => match self.local_server.connect(&service) {
                        Ok((pipe, _attached)) => {
                            let id = self.pipes.insert(pipe);
                            let _ = supplier.set_result(crate::kgr_object! { "pipe" => id });
                        }
                        Err(e) => {
                            let _ = supplier.set_error(e);
                        }
                    },
                }
            }
            "activate" => {
                let pipe_id = params.field("pipe").and_then(KgrValue::as_i64);
                let peer_id = params.field("peer").and_then(KgrValue::as_i64);
                match (pipe_id, peer_id) {
                    (Some(pipe_id), Some(peer_id)) => {
                        self.pipes.activate(self.connection.clone(), pipe_id, peer_id);
                        let _ = supplier.set_result(KgrValue::Bool(true));
                    }
                    _ => {
                        let _ = supplier.set_error(NetError::Protocol("activate requires pipe and peer".to_string()));
                    }
                }
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
            "bind" => {
                let path = params.as_str().unwrap_or_default().to_string();
                match self.check_allowed(&path, true) {
                    Err(e) => {
                        let _ = supplier.set_error(NetError::Protocol(e.to_string()));
                    }
                    Ok(()) => {
                        let service = Arc::new(SlaveService::new(self.connection.clone(), self.pipes.clone(), path.clone()));
                        match self.local_server.register(&path, service) {
                            Ok(()) => {
                                self.slave_services.lock().unwrap().push(path);
                                let _ = supplier.set_result(KgrValue::Bool(true));
                            }
                            Err(e) => {
                                let _ = supplier.set_error(e);
                            }
                        }
                    }
                }
            }
            "unbind" => {
                let path = params.as_str().unwrap_or_default().to_string();
                match self.check_allowed(&path, true) {
                    Err(e) => {
                        let _ = supplier.set_error(NetError::Protocol(e.to_string()));
                    }
                    Ok(()) => {
                        let _ = self.local_server.deregister(&path);
                        self.slave_services.lock().unwrap().retain(|p| p != &path);
                        let _ = supplier.set_result(KgrValue::Bool(true));
                    }
                }
            }
            "bound" => {
                let path = params.as_str().unwrap_or_default().to_string();
                match self.check_allowed(&path, false) {
                    Err(e) => {
                        let _ = supplier.set_error(NetError::Protocol(e.to_string()));
                    }
                    Ok(()) => {
                        let _ = supplier.set_result(KgrValue::Bool(self.local_server.registered(&path)));
                    }
                }
            }
            "auth-request" => match self.authenticator.initiate_login() {
                Ok(nonce) => {
                    let _ = supplier.set_result(crate::kgr_object! { "nonce" => base64_encode(&nonce) });
                }
                Err(e) => {
                    let _ = supplier.set_error(NetError::Protocol(e.to_string()));
                }
            },
            "auth-response" => {
                let account_name = params.field("id").and_then(KgrValue::as_str).unwrap_or_default();
                let token = params.field("result").and_then(KgrValue::as_str).unwrap_or_default();
                match self.authenticator.continue_login(account_name, token).and_then(|_| self.authenticator.finalize_login()) {
                    Ok(salt) => {
                        info!(account = account_name, "net connection: authenticated");
                        // Reply under the still-current key (the peer can't
                        // derive the new one until it reads this salt), then
                        // rotate (§4.8, §4.10).
                        let authenticator = self.authenticator.clone();
                        connection.reply_result_then(
                            id,
                            crate::kgr_object! { "ok" => true, "salt" => base64_encode(&salt) },
                            move || authenticator.commit_session_key(),
                        );
                        return result;
                    }
                    Err(e) => {
                        let _ = supplier.set_error(NetError::Protocol(e.to_string()));
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

fn base64_encode(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    BASE64.encode(bytes)
}
