//! Test doubles shared by the decorator unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::HydrationHandler;
use vaultdrive_core::{
    FsError, NodeAttributes, NodeId, NodeInfo, NodeKind, RelativePath, RootId,
};

/// Build a resolved node value for scripting.
pub(crate) fn make_node(root: RootId, path: &str, id: u64, kind: NodeKind) -> NodeInfo {
    let path = if path.is_empty() {
        RelativePath::root()
    } else {
        RelativePath::new(path).unwrap()
    };
    let name = path.file_name().unwrap_or_default().to_string();
    NodeInfo {
        id: NodeId::new(id),
        parent_id: NodeId::UNKNOWN,
        root,
        path,
        name,
        kind,
        size: 0,
        attributes: NodeAttributes {
            directory: kind == NodeKind::Directory,
            ..NodeAttributes::default()
        },
        last_write: None,
        revision: None,
    }
}

/// Scriptable [`FileClient`] recording every call it receives.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    pub calls: Mutex<Vec<String>>,
    pub nodes: Mutex<HashMap<String, NodeInfo>>,
    pub children: Mutex<HashMap<String, Vec<NodeInfo>>>,
    pub contents: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_next: Mutex<Option<FsError>>,
    pub connect_count: AtomicUsize,
    pub disconnect_count: AtomicUsize,
    next_id: AtomicU64,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(100),
            ..Self::default()
        }
    }

    pub fn put_node(&self, node: NodeInfo) {
        self.nodes
            .lock()
            .unwrap()
            .insert(node.path.as_str().to_string(), node);
    }

    pub fn put_children(&self, path: &str, children: Vec<NodeInfo>) {
        self.children
            .lock()
            .unwrap()
            .insert(path.to_string(), children);
    }

    pub fn fail_next(&self, err: FsError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_failure(&self) -> Option<FsError> {
        self.fail_next.lock().unwrap().take()
    }

    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FileClient for ScriptedClient {
    async fn get_info(&self, node: &NodeInfo) -> Result<NodeInfo, FsError> {
        self.record(format!("get_info {}", node.path));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.nodes
            .lock()
            .unwrap()
            .get(node.path.as_str())
            .cloned()
            .ok_or_else(|| FsError::ObjectNotFound(node.path.as_str().to_string()))
    }

    async fn enumerate(&self, dir: &NodeInfo) -> Result<Vec<NodeInfo>, FsError> {
        self.record(format!("enumerate {}", dir.path));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self
            .children
            .lock()
            .unwrap()
            .get(dir.path.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn create_directory(&self, parent: &NodeInfo, name: &str) -> Result<NodeInfo, FsError> {
        self.record(format!("create_directory {} {name}", parent.path));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let node = make_node(
            parent.root,
            parent.path.join(name)?.as_str(),
            self.fresh_id(),
            NodeKind::Directory,
        );
        self.put_node(node.clone());
        Ok(node)
    }

    async fn create_file(
        &self,
        parent: &NodeInfo,
        name: &str,
        content: &[u8],
    ) -> Result<NodeInfo, FsError> {
        self.record(format!("create_file {} {name}", parent.path));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let mut node = make_node(
            parent.root,
            parent.path.join(name)?.as_str(),
            self.fresh_id(),
            NodeKind::File,
        );
        node.size = content.len() as u64;
        self.contents
            .lock()
            .unwrap()
            .insert(node.path.as_str().to_string(), content.to_vec());
        self.put_node(node.clone());
        Ok(node)
    }

    async fn read_file(&self, node: &NodeInfo) -> Result<Vec<u8>, FsError> {
        self.record(format!("read_file {}", node.path));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.contents
            .lock()
            .unwrap()
            .get(node.path.as_str())
            .cloned()
            .ok_or_else(|| FsError::ObjectNotFound(node.path.as_str().to_string()))
    }

    async fn write_file(
        &self,
        node: &NodeInfo,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<NodeInfo, FsError> {
        self.record(format!(
            "write_file {} archive={}",
            node.path, options.archive
        ));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.contents
            .lock()
            .unwrap()
            .insert(node.path.as_str().to_string(), content.to_vec());
        let mut written = self
            .nodes
            .lock()
            .unwrap()
            .get(node.path.as_str())
            .cloned()
            .unwrap_or_else(|| node.clone());
        written.size = content.len() as u64;
        Ok(written)
    }

    async fn move_node(
        &self,
        node: &NodeInfo,
        new_parent: &NodeInfo,
        new_name: &str,
    ) -> Result<NodeInfo, FsError> {
        self.record(format!(
            "move_node {} -> {} {new_name}",
            node.path, new_parent.path
        ));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(node.clone().with_path(new_parent.path.join(new_name)?))
    }

    async fn delete(&self, node: &NodeInfo, mode: DeleteMode) -> Result<(), FsError> {
        self.record(format!("delete {} {mode:?}", node.path));
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(())
    }

    async fn set_pin_state(&self, node: &NodeInfo, pinned: bool) -> Result<(), FsError> {
        self.record(format!("set_pin_state {} {pinned}", node.path));
        Ok(())
    }

    async fn set_in_sync(&self, node: &NodeInfo) -> Result<(), FsError> {
        self.record(format!("set_in_sync {}", node.path));
        Ok(())
    }

    async fn hydrate(&self, node: &NodeInfo, cancel: &CancellationToken) -> Result<(), FsError> {
        self.record(format!("hydrate {}", node.path));
        if cancel.is_cancelled() {
            return Err(FsError::Aborted(node.path.as_str().to_string()));
        }
        Ok(())
    }

    async fn connect(&self, _handler: Arc<dyn HydrationHandler>) -> Result<(), FsError> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), FsError> {
        self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
