#![forbid(unsafe_code)]

pub mod render;
pub mod telemetry;
pub mod wall_sync;

pub use wall_sync::{
    DeleteReport, NoopWallView, SnapshotSource, SyncError, WallSnapshot, WallSynchronizer,
    WallView,
};
