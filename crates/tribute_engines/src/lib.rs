#![forbid(unsafe_code)]

pub mod envelope;
pub mod remote_store;

pub use remote_store::{
    DeleteOutcome, HttpTributeStore, HttpTributeStoreConfig, RemoteStoreError,
    RemoteTributeStore,
};
