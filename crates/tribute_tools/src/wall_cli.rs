#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;
use tribute_contracts::RecordId;
use tribute_engines::{
    DeleteOutcome, HttpTributeStore, HttpTributeStoreConfig, RemoteTributeStore,
};
use tribute_os::render::render_wall_page;
use tribute_os::{NoopWallView, SnapshotSource, WallSynchronizer};
use tribute_storage::{FileSlotStore, IdentityProvider, RecordCache, SlotStore};

pub const WALL_PAGE_TITLE: &str = "Tribute Wall";

#[derive(Debug, Parser)]
#[command(name = "tribute")]
#[command(about = "Operate the tribute wall from a terminal")]
pub struct WallCli {
    #[command(subcommand)]
    pub command: WallCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum WallCommand {
    /// Print this profile's client id, creating it on first use.
    Whoami,
    /// Fetch the wall and print its markup.
    Load {
        /// Write a standalone HTML page here instead of printing.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Post a tribute and print the id it was stored under.
    Post {
        #[arg(long)]
        message: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        relation: String,
    },
    /// Delete one of your own tributes.
    Delete {
        id: String,
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Drop the local snapshot. The remote wall is untouched.
    Clear {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// One line per cached tribute.
    List,
}

impl WallCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Whoami => "whoami",
            Self::Load { .. } => "load",
            Self::Post { .. } => "post",
            Self::Delete { .. } => "delete",
            Self::Clear { .. } => "clear",
            Self::List => "list",
        }
    }
}

/// Opens the wall over the default state directory. Remote mode when
/// `TRIBUTE_REMOTE_ENDPOINT` is set, local-only otherwise.
pub fn open_default_wall() -> Result<WallSynchronizer, String> {
    let slots: Arc<dyn SlotStore> = Arc::new(FileSlotStore::default_local());
    let remote = HttpTributeStoreConfig::from_env()
        .map(|config| Arc::new(HttpTributeStore::new(config)) as Arc<dyn RemoteTributeStore>);
    open_wall(slots, remote)
}

pub fn open_wall(
    slots: Arc<dyn SlotStore>,
    remote: Option<Arc<dyn RemoteTributeStore>>,
) -> Result<WallSynchronizer, String> {
    let client_id = IdentityProvider::new(slots.clone())
        .get_or_create_client_id()
        .map_err(|e| format!("failed to resolve client id: {e}"))?;
    Ok(WallSynchronizer::new(
        remote,
        RecordCache::new(slots),
        client_id,
        Arc::new(NoopWallView),
    ))
}

pub fn execute_wall_command(
    wall: &WallSynchronizer,
    command: &WallCommand,
) -> Result<String, String> {
    debug!(command = command.name(), local_only = wall.is_local_only(), "running wall command");
    let result = run_wall_command(wall, command);
    match &result {
        Ok(_) => debug!(command = command.name(), "wall command finished"),
        Err(err) => debug!(command = command.name(), error = %err, "wall command failed"),
    }
    result
}

fn run_wall_command(wall: &WallSynchronizer, command: &WallCommand) -> Result<String, String> {
    match command {
        WallCommand::Whoami => Ok(wall.client_id().to_string()),
        WallCommand::Load { out } => {
            let snapshot = wall.load();
            match out {
                Some(path) => {
                    let page = render_wall_page(WALL_PAGE_TITLE, &snapshot.markup);
                    fs::write(path, page).map_err(|e| {
                        format!("failed to write wall page {}: {e}", path.display())
                    })?;
                    Ok(format!(
                        "wrote {} tributes ({}) to {}",
                        snapshot.records.len(),
                        source_label(snapshot.source),
                        path.display()
                    ))
                }
                None => Ok(snapshot.markup.trim_end().to_string()),
            }
        }
        WallCommand::Post {
            message,
            name,
            relation,
        } => {
            let record = wall
                .submit(name, relation, message)
                .map_err(|e| format!("failed to post tribute: {e}"))?;
            Ok(record.id.map(|id| id.to_string()).unwrap_or_default())
        }
        WallCommand::Delete { id, yes } => {
            let id = RecordId::parse(id).ok_or_else(|| "missing tribute id".to_string())?;
            if !yes {
                return Err(format!("refusing to delete tribute {id} without --yes"));
            }
            let report = wall
                .delete(&id)
                .map_err(|e| format!("failed to delete tribute: {e}"))?;
            let remote = match &report.remote {
                None => "local-only".to_string(),
                Some(DeleteOutcome::Confirmed) => "remote confirmed".to_string(),
                Some(DeleteOutcome::Unconfirmed(err)) => format!("remote unconfirmed: {err}"),
            };
            Ok(format!("deleted {id} ({remote})"))
        }
        WallCommand::Clear { yes } => {
            if !yes {
                return Err(
                    "refusing to clear the local tribute snapshot without --yes".to_string(),
                );
            }
            wall.clear_local()
                .map_err(|e| format!("failed to clear local tributes: {e}"))?;
            Ok("OK".to_string())
        }
        WallCommand::List => {
            let lines: Vec<String> = wall
                .cached_records()
                .iter()
                .map(|record| {
                    let id = record
                        .id
                        .as_ref()
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    let owned = if record.is_owned_by(wall.client_id()) {
                        "\tyours"
                    } else {
                        ""
                    };
                    format!("{id}\t{}{owned}", record.name)
                })
                .collect();
            Ok(lines.join("\n"))
        }
    }
}

fn source_label(source: SnapshotSource) -> &'static str {
    match source {
        SnapshotSource::Remote => "remote",
        SnapshotSource::CacheFallback => "cached fallback",
        SnapshotSource::LocalOnly => "local-only",
    }
}
