//! Master/slave net servers (§3, §4.9): request/response correlation over a
//! `CryptoSocket`, the pipe-id table each side multiplexes logical pipes
//! through, and the two connection roles built on top of them.

pub mod connection;
pub mod master;
pub mod pipe_table;
pub mod slave;
pub mod slave_service;

pub use connection::{Connection, Dispatcher};
pub use master::MasterNetServer;
pub use pipe_table::PipeTable;
pub use slave::{login, SlaveNetServer};
pub use slave_service::SlaveService;
