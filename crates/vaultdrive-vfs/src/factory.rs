//! Stack factory
//!
//! Builds the full decorator stacks for one mapping-set generation. The
//! per-mapping stack is data, not inheritance: an ordered list of decorator
//! constructors folded over a base client. The sync engine calls
//! [`build_file_stacks`] again whenever the mapping set changes and swaps
//! the returned composite; generations never share mutable state beyond the
//! process-wide protection tracker.

use std::collections::BTreeMap;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use vaultdrive_core::config::{AdapterConfig, MappingConfig};
use vaultdrive_core::ports::file_client::FileClient;
use vaultdrive_core::ports::placeholder::PlaceholderApi;
use vaultdrive_core::ports::protector::FolderProtector;
use vaultdrive_core::{FsError, NodeId, RelativePath, RootId, RootInfo, ScopeId, VolumeId};

use crate::decorators::{AbortingClient, BackupClient, ReadOnlyClient, TrashFallbackClient};
use crate::dispatch::DispatchingClient;
use crate::hydration::OnDemandClient;
use crate::native::{map_io_error, NativeFileClient};
use crate::protect::tracker::ProtectionTracker;
use crate::protecting::{ProtectingFileClient, ProtectingFolderClient};
use crate::rooted::RootedClient;
use crate::virtual_root::SingleFileRootClient;

/// One decorator step in the composition pipeline.
type DecoratorFn = Box<dyn FnOnce(Arc<dyn FileClient>) -> Arc<dyn FileClient>>;

/// Fold an ordered pipeline of decorator constructors over a base client.
fn compose(base: Arc<dyn FileClient>, pipeline: Vec<DecoratorFn>) -> Arc<dyn FileClient> {
    pipeline.into_iter().fold(base, |client, wrap| wrap(client))
}

/// One mapping-set generation of file stacks.
pub struct FileStacks {
    /// The composite client the sync engine issues operations against.
    pub client: Arc<DispatchingClient>,
    /// The rebuilt root set, for the event-side factory.
    pub roots: Vec<RootInfo>,
    aborters: Vec<Arc<AbortingClient>>,
}

impl std::fmt::Debug for FileStacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStacks")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl FileStacks {
    /// Actively cancel every in-flight transfer across all roots.
    pub fn abort_transfers(&self) {
        for aborter in &self.aborters {
            aborter.abort_all();
        }
    }
}

/// Anchor all volumes at the filesystem root; per-mapping prefixes carry the
/// rest of the path.
const VOLUME_ANCHOR: &str = "/";

async fn stat_node_id(path: &Path) -> Result<NodeId, FsError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(NodeId::new(metadata.ino())),
        Err(e) => Err(map_io_error(&e, path)),
    }
}

fn root_info_for(mapping: &MappingConfig, node_id: NodeId) -> RootInfo {
    RootInfo {
        root_id: mapping.root_id,
        node_id,
        volume_id: VolumeId::new(mapping.volume_id.clone()),
        scope: ScopeId::new(mapping.scope.clone()),
        local_path: mapping.local_path.clone(),
        on_demand: mapping.on_demand,
        enabled: mapping.enabled,
    }
}

/// Build the composite file client for the given mapping set.
///
/// # Errors
/// Fails if the configuration is invalid, a local anchor does not exist, or
/// a virtual-file projection is malformed.
pub async fn build_file_stacks(
    config: &AdapterConfig,
    placeholders: Arc<dyn PlaceholderApi>,
    protector: Arc<dyn FolderProtector>,
) -> Result<FileStacks, FsError> {
    config
        .validate()
        .map_err(|e| FsError::Unknown(e.to_string()))?;

    let tracker = ProtectionTracker::new(Arc::clone(&protector));
    let mut physical: BTreeMap<(String, bool), Arc<dyn FileClient>> = BTreeMap::new();
    let mut stacks: BTreeMap<RootId, Arc<dyn FileClient>> = BTreeMap::new();
    let mut aborters = Vec::new();
    let mut roots = Vec::new();

    for mapping in config.enabled_mappings() {
        let node_id = stat_node_id(&mapping.local_path).await?;
        let root = root_info_for(mapping, node_id);
        debug!(root = %root.root_id, path = %root.local_path.display(), "building stack");

        // Roots on the same volume in the same mode share one physical
        // client, so the refcounted demand channel is opened once for them.
        let physical_key = (mapping.volume_id.clone(), mapping.on_demand);
        let base = match physical.get(&physical_key) {
            Some(client) => Arc::clone(client),
            None => {
                let trash_dir = mapping
                    .local_path
                    .parent()
                    .unwrap_or(Path::new(VOLUME_ANCHOR))
                    .join(&config.tuning.trash_dir_name);
                let native: Arc<dyn FileClient> = Arc::new(NativeFileClient::new(
                    VOLUME_ANCHOR,
                    trash_dir,
                    Arc::clone(&placeholders),
                ));
                let client: Arc<dyn FileClient> = if mapping.on_demand {
                    Arc::new(OnDemandClient::new(
                        native,
                        Arc::clone(&placeholders),
                        VOLUME_ANCHOR,
                        config.tuning.demand_channel_capacity,
                    ))
                } else {
                    native
                };
                physical.insert(physical_key, Arc::clone(&client));
                client
            }
        };

        let prefix = RelativePath::strip_root(Path::new(VOLUME_ANCHOR), &mapping.local_path)?;
        let rooted: Arc<dyn FileClient> =
            Arc::new(RootedClient::new(base, root.clone(), prefix)?);

        // The per-mapping pipeline, innermost decorator first.
        let mut pipeline: Vec<DecoratorFn> = Vec::new();
        {
            let tracker = Arc::clone(&tracker);
            let protector = Arc::clone(&protector);
            let root = root.clone();
            pipeline.push(Box::new(move |inner| {
                Arc::new(ProtectingFolderClient::new(inner, tracker, protector, root))
                    as Arc<dyn FileClient>
            }));
        }
        {
            let protector = Arc::clone(&protector);
            let root = root.clone();
            pipeline.push(Box::new(move |inner| {
                Arc::new(ProtectingFileClient::new(inner, protector, root)) as Arc<dyn FileClient>
            }));
        }
        pipeline.push(Box::new(|inner| {
            Arc::new(TrashFallbackClient::new(inner)) as Arc<dyn FileClient>
        }));
        if mapping.backup_writes {
            pipeline.push(Box::new(|inner| {
                Arc::new(BackupClient::new(inner)) as Arc<dyn FileClient>
            }));
        }
        if let Some(virtual_file) = &mapping.virtual_file {
            let virtual_root = mapping.root_id;
            let parent_path = if virtual_file.parent_path.is_empty() {
                RelativePath::root()
            } else {
                RelativePath::new(virtual_file.parent_path.clone())?
            };
            let file_name = virtual_file.file_name.clone();
            pipeline.push(Box::new(move |inner| {
                // Root ids were validated non-default with the config.
                Arc::new(
                    SingleFileRootClient::new(
                        inner,
                        virtual_root,
                        virtual_root,
                        parent_path,
                        file_name,
                    )
                    .expect("root id validated by config"),
                ) as Arc<dyn FileClient>
            }));
        }
        if mapping.read_only {
            pipeline.push(Box::new(|inner| {
                Arc::new(ReadOnlyClient::new(inner)) as Arc<dyn FileClient>
            }));
        }

        let stacked = compose(rooted, pipeline);
        let aborting = AbortingClient::new(stacked);
        aborters.push(Arc::clone(&aborting));
        stacks.insert(mapping.root_id, aborting);
        roots.push(root);
    }

    info!(roots = roots.len(), "file stacks built");
    Ok(FileStacks {
        client: Arc::new(DispatchingClient::new(stacks)),
        roots,
        aborters,
    })
}
