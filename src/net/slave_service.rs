//! `SlaveService` — the master-side stand-in registered by `bind` (§4.9:
//! "master registers a SlaveService that tunnels attach requests back
//! over the connection").

use std::sync::Arc;

use crate::error::NetError;
use crate::net::connection::Connection;
use crate::net::pipe_table::PipeTable;
use crate::rpc::pipe::{Pipe, Service};
use crate::rpc::value::KgrValue;
use crate::task::{task_result, Outcome, TaskResult};

pub struct SlaveService {
    connection: Arc<Connection>,
    pipes: Arc<PipeTable>,
    path: String,
}

impl SlaveService {
    pub fn new(connection: Arc<Connection>, pipes: Arc<PipeTable>, path: String) -> Self {
        SlaveService { connection, pipes, path }
    }
}

impl Service for SlaveService {
    fn attach(&self, pipe: Pipe) -> TaskResult<(), NetError> {
        let (supplier, result) = task_result();
        let id = self.pipes.insert(pipe);
        let pipes = self.pipes.clone();
        let connection = self.connection.clone();
        let lifetime = crate::lifetime::SlokedLifetime::new();
        connection
            .call("connect", crate::kgr_object! { "service" => self.path.as_str(), "pipe" => id })
            .notify(
                move |outcome| match outcome {
                    Outcome::Ready(value) => match value.field("pipe").and_then(KgrValue::as_i64) {
                        Some(peer_id) => {
                            pipes.activate(connection.clone(), id, peer_id);
                            let _ = supplier.set_result(());
                        }
                        None => {
                            pipes.close(id);
                            let _ = supplier.set_error(NetError::Protocol("slave connect reply missing pipe id".to_string()));
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
}
