pub mod deployment;
pub mod gateway;
pub mod identity;
pub mod objects;
pub mod synchronizer;
pub mod wallet;

pub mod test_helpers;

pub use gateway::rpc::SuiRpcGateway;
pub use synchronizer::{
    InventorySynchronizer,
    SyncError,
};
