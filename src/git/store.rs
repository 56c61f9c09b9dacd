//! Git-backed document store.
//!
//! Documents are JSON blobs at `<collection>/<key>.json` in the tree of the
//! `main` branch. Each transaction gets its own branch (`tx/{id}`) where its
//! writes accumulate as commits. Commit publishes the branch to `main`
//! (fast-forward when `main` has not moved, a merge commit when the two
//! sides touched different documents, a conflict error otherwise); rollback
//! deletes the branch.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use git2::{FileMode, ObjectType, Oid, Repository, Signature, TreeBuilder};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::git::error::{GitError, GitResult};
use crate::git::refs::RefManager;
use crate::git::types::{BranchName, CommitId, DocName};
use crate::transaction::{current, Context, Transactional, Tx};

/// Native transaction of a [`GitStore`]: a branch forked from `main`.
pub struct GitTx {
    store_id: Ulid,
    id: String,
    repo: Arc<Mutex<Repository>>,
    branch: BranchName,
    base: CommitId,
    head: CommitId,
}

impl GitTx {
    /// Transaction id (also the branch suffix).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The transaction branch.
    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// The `main` commit the transaction started from.
    pub fn base(&self) -> CommitId {
        self.base
    }

    /// The latest commit on the transaction branch.
    pub fn head(&self) -> CommitId {
        self.head
    }

    /// Read a document as seen by this transaction (including own writes).
    pub fn get<T: DeserializeOwned>(&self, collection: &str, key: &str) -> GitResult<Option<T>> {
        let (collection, key) = doc_names(collection, key)?;
        let repo = self.repo.lock();
        read_doc(&repo, self.head, &collection, &key)
    }

    /// Write a document on the transaction branch.
    pub fn put<T: Serialize>(&mut self, collection: &str, key: &str, value: &T) -> GitResult<()> {
        let (collection, key) = doc_names(collection, key)?;
        let bytes = serde_json::to_vec_pretty(value)?;
        let repo = self.repo.lock();
        let message = format!("put {}/{} [tx:{}]", collection, key, self.id);
        if let Some(tree) = put_doc(&repo, self.head, &collection, &key, &bytes)? {
            self.head = commit_tree(&repo, tree, self.head, &self.branch, &message)?;
        }
        Ok(())
    }

    /// Delete a document on the transaction branch.
    ///
    /// Returns false if the document did not exist.
    pub fn delete(&mut self, collection: &str, key: &str) -> GitResult<bool> {
        let (collection, key) = doc_names(collection, key)?;
        let repo = self.repo.lock();
        let message = format!("delete {}/{} [tx:{}]", collection, key, self.id);
        match remove_doc(&repo, self.head, &collection, &key)? {
            Some(tree) => {
                self.head = commit_tree(&repo, tree, self.head, &self.branch, &message)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// List document keys of a collection.
    pub fn keys(&self, collection: &str) -> GitResult<Vec<DocName>> {
        let collection = DocName::new(collection)?;
        let repo = self.repo.lock();
        list_keys(&repo, self.head, &collection)
    }
}

impl std::fmt::Debug for GitTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitTx")
            .field("id", &self.id)
            .field("base", &self.base.short())
            .field("head", &self.head.short())
            .finish()
    }
}

/// Git-backed implementation of [`Transactional`].
///
/// Thread-safe: can be shared across threads via Clone (uses Arc internally).
#[derive(Clone)]
pub struct GitStore {
    inner: Arc<GitStoreInner>,
}

struct GitStoreInner {
    id: Ulid,
    path: PathBuf,
    repo: Arc<Mutex<Repository>>,
    /// Ids of transactions begun and not yet finished.
    active: RwLock<HashSet<String>>,
}

impl GitStore {
    /// Initialize a new store with an empty initial commit on `main`.
    pub fn init(path: impl AsRef<Path>) -> GitResult<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;
        let repo = Repository::init(path)?;

        {
            let main = BranchName::main().as_ref_path();
            let tree_id = repo.treebuilder(None)?.write()?;
            let tree = repo.find_tree(tree_id)?;
            let sig = signature()?;
            repo.commit(Some(main.as_str()), &sig, &sig, "[txkit] initialize store", &tree, &[])?;
            repo.set_head(&main)?;
        }

        info!(path = %path.display(), "git store initialized");
        Ok(Self::from_repo(path, repo))
    }

    /// Open an existing store.
    pub fn open(path: impl AsRef<Path>) -> GitResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path)?;
        RefManager::main_commit(&repo)?;

        info!(path = %path.display(), "git store opened");
        Ok(Self::from_repo(path, repo))
    }

    /// Open a store, initializing it if needed.
    pub fn open_or_init(path: impl AsRef<Path>) -> GitResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open(path)
        } else {
            Self::init(path)
        }
    }

    fn from_repo(path: &Path, repo: Repository) -> Self {
        Self {
            inner: Arc::new(GitStoreInner {
                id: Ulid::new(),
                path: path.to_path_buf(),
                repo: Arc::new(Mutex::new(repo)),
                active: RwLock::new(HashSet::new()),
            }),
        }
    }

    /// Get the repository path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Current tip of `main`.
    pub fn head(&self) -> GitResult<CommitId> {
        RefManager::main_commit(&self.inner.repo.lock())
    }

    /// The transaction of this store active in `ctx`, if any.
    fn joined(&self, ctx: &Context) -> Option<Arc<Tx<GitTx>>> {
        current::<GitTx>(ctx).filter(|tx| tx.native().store_id == self.inner.id)
    }

    /// Check if `ctx` carries a transaction begun by this store.
    pub fn in_transaction(&self, ctx: &Context) -> bool {
        self.joined(ctx).is_some()
    }

    /// Read a document, through the active transaction if there is one.
    pub fn get<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        collection: &str,
        key: &str,
    ) -> GitResult<Option<T>> {
        if let Some(tx) = self.joined(ctx) {
            return tx.native().get(collection, key);
        }
        let (collection, key) = doc_names(collection, key)?;
        let repo = self.inner.repo.lock();
        let head = RefManager::main_commit(&repo)?;
        read_doc(&repo, head, &collection, &key)
    }

    /// Write a document, through the active transaction if there is one.
    ///
    /// Without a transaction the write is committed to `main` directly.
    pub fn put<T: Serialize>(
        &self,
        ctx: &Context,
        collection: &str,
        key: &str,
        value: &T,
    ) -> GitResult<()> {
        if let Some(tx) = self.joined(ctx) {
            return tx.native().put(collection, key, value);
        }
        let (collection, key) = doc_names(collection, key)?;
        let bytes = serde_json::to_vec_pretty(value)?;
        let repo = self.inner.repo.lock();
        let head = RefManager::main_commit(&repo)?;
        if let Some(tree) = put_doc(&repo, head, &collection, &key, &bytes)? {
            let message = format!("put {}/{}", collection, key);
            commit_tree(&repo, tree, head, &BranchName::main(), &message)?;
        }
        Ok(())
    }

    /// Delete a document, through the active transaction if there is one.
    pub fn delete(&self, ctx: &Context, collection: &str, key: &str) -> GitResult<bool> {
        if let Some(tx) = self.joined(ctx) {
            return tx.native().delete(collection, key);
        }
        let (collection, key) = doc_names(collection, key)?;
        let repo = self.inner.repo.lock();
        let head = RefManager::main_commit(&repo)?;
        match remove_doc(&repo, head, &collection, &key)? {
            Some(tree) => {
                let message = format!("delete {}/{}", collection, key);
                commit_tree(&repo, tree, head, &BranchName::main(), &message)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// List document keys of a collection.
    pub fn keys(&self, ctx: &Context, collection: &str) -> GitResult<Vec<DocName>> {
        if let Some(tx) = self.joined(ctx) {
            return tx.native().keys(collection);
        }
        let collection = DocName::new(collection)?;
        let repo = self.inner.repo.lock();
        let head = RefManager::main_commit(&repo)?;
        list_keys(&repo, head, &collection)
    }

    /// Get the number of active transactions.
    pub fn active_count(&self) -> usize {
        self.inner.active.read().len()
    }

    /// List all transaction branches in the repository.
    pub fn transaction_branches(&self) -> GitResult<Vec<BranchName>> {
        RefManager::list_transaction_branches(&self.inner.repo.lock())
    }

    /// Delete transaction branches older than `min_age` that this handle
    /// does not own.
    ///
    /// Leftovers come from processes that exited mid-transaction. Other
    /// processes may share the repository, so a branch only counts as
    /// abandoned once its transaction id (a ULID) is at least `min_age` old.
    /// Branches whose id is not a ULID are left alone.
    pub fn cleanup_abandoned(&self, min_age: Duration) -> GitResult<usize> {
        let active = self.inner.active.read().clone();
        let repo = self.inner.repo.lock();
        let now_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let min_age_ms = u64::try_from(min_age.as_millis()).unwrap_or(u64::MAX);

        let mut cleaned = 0;
        for branch in RefManager::list_transaction_branches(&repo)? {
            let Some(tx_id) = branch.transaction_id() else {
                continue;
            };
            if active.contains(tx_id) {
                continue;
            }
            let Ok(ulid) = Ulid::from_string(tx_id) else {
                continue;
            };
            if now_ms.saturating_sub(ulid.timestamp_ms()) < min_age_ms {
                continue;
            }
            if RefManager::delete_branch(&repo, &branch).is_ok() {
                debug!(branch = %branch, "git: abandoned transaction branch deleted");
                cleaned += 1;
            }
        }

        Ok(cleaned)
    }

    /// Delete the branch of a finished transaction and stop tracking it.
    fn finish(&self, repo: &Repository, native: &GitTx) -> GitResult<()> {
        self.inner.active.write().remove(&native.id);
        RefManager::delete_branch(repo, &native.branch)
    }
}

impl Transactional for GitStore {
    type Native = GitTx;
    type Error = GitError;

    fn begin(&self, ctx: &Context) -> GitResult<GitTx> {
        if ctx.is_expired() {
            return Err(GitError::DeadlineExceeded);
        }

        let id = Ulid::new().to_string().to_lowercase();
        let branch = BranchName::for_transaction(&id);
        let base = {
            let repo = self.inner.repo.lock();
            let base = RefManager::main_commit(&repo)?;
            RefManager::create_branch(&repo, &branch, base)?;
            base
        };
        self.inner.active.write().insert(id.clone());

        debug!(branch = %branch, base = %base.short(), "git: transaction begun");

        Ok(GitTx {
            store_id: self.inner.id,
            id,
            repo: Arc::clone(&self.inner.repo),
            branch,
            base,
            head: base,
        })
    }

    fn commit(&self, tx: &Tx<GitTx>) -> GitResult<()> {
        let native = tx.native();
        let repo = self.inner.repo.lock();

        let published = publish(&repo, &native);
        if let Err(e) = self.finish(&repo, &native) {
            warn!(branch = %native.branch, error = %e, "git: failed to delete transaction branch");
        }

        let head = published?;
        debug!(branch = %native.branch, head = %head.short(), "git: transaction published");
        Ok(())
    }

    fn rollback(&self, tx: &Tx<GitTx>) -> GitResult<()> {
        let native = tx.native();
        let repo = self.inner.repo.lock();
        self.finish(&repo, &native)
    }
}

impl std::fmt::Debug for GitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitStore")
            .field("path", &self.inner.path)
            .field("active_count", &self.active_count())
            .finish()
    }
}

fn signature() -> GitResult<Signature<'static>> {
    Ok(Signature::now("txkit", "txkit@localhost")?)
}

fn doc_names(collection: &str, key: &str) -> GitResult<(DocName, DocName)> {
    Ok((DocName::new(collection)?, DocName::new(key)?))
}

fn read_doc<T: DeserializeOwned>(
    repo: &Repository,
    at: CommitId,
    collection: &DocName,
    key: &DocName,
) -> GitResult<Option<T>> {
    let tree = repo.find_commit(at.raw())?.tree()?;
    let path = format!("{}/{}", collection, key.file_name());
    let entry = match tree.get_path(Path::new(&path)) {
        Ok(entry) => entry,
        Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let blob = repo.find_blob(entry.id())?;
    Ok(Some(serde_json::from_slice(blob.content())?))
}

fn list_keys(repo: &Repository, at: CommitId, collection: &DocName) -> GitResult<Vec<DocName>> {
    let root = repo.find_commit(at.raw())?.tree()?;
    let Some(entry) = root.get_name(collection.as_str()) else {
        return Ok(Vec::new());
    };
    if entry.kind() != Some(ObjectType::Tree) {
        return Ok(Vec::new());
    }

    let tree = repo.find_tree(entry.id())?;
    let mut keys = Vec::new();
    for entry in tree.iter() {
        if let Some(stem) = entry.name().and_then(|n| n.strip_suffix(".json")) {
            if let Ok(key) = DocName::new(stem) {
                keys.push(key);
            }
        }
    }
    keys.sort();
    Ok(keys)
}

/// Apply `edit` to a collection subtree and rebuild the root tree.
///
/// `edit` returns false when it changed nothing; no tree is written then.
fn edit_collection<F>(
    repo: &Repository,
    at: CommitId,
    collection: &DocName,
    edit: F,
) -> GitResult<Option<Oid>>
where
    F: FnOnce(&mut TreeBuilder<'_>) -> GitResult<bool>,
{
    let root = repo.find_commit(at.raw())?.tree()?;
    let existing = match root.get_name(collection.as_str()) {
        Some(entry) if entry.kind() == Some(ObjectType::Tree) => Some(repo.find_tree(entry.id())?),
        _ => None,
    };

    let mut builder = repo.treebuilder(existing.as_ref())?;
    if !edit(&mut builder)? {
        return Ok(None);
    }

    let mut root_builder = repo.treebuilder(Some(&root))?;
    if builder.len() == 0 {
        if existing.is_some() {
            root_builder.remove(collection.as_str())?;
        }
    } else {
        let subtree = builder.write()?;
        root_builder.insert(collection.as_str(), subtree, FileMode::Tree.into())?;
    }
    Ok(Some(root_builder.write()?))
}

fn put_doc(
    repo: &Repository,
    at: CommitId,
    collection: &DocName,
    key: &DocName,
    bytes: &[u8],
) -> GitResult<Option<Oid>> {
    let blob = repo.blob(bytes)?;
    let file_name = key.file_name();
    edit_collection(repo, at, collection, |builder| {
        if let Some(entry) = builder.get(file_name.as_str())? {
            if entry.id() == blob {
                return Ok(false);
            }
        }
        builder.insert(file_name.as_str(), blob, FileMode::Blob.into())?;
        Ok(true)
    })
}

fn remove_doc(
    repo: &Repository,
    at: CommitId,
    collection: &DocName,
    key: &DocName,
) -> GitResult<Option<Oid>> {
    let file_name = key.file_name();
    edit_collection(repo, at, collection, |builder| {
        if builder.get(file_name.as_str())?.is_none() {
            return Ok(false);
        }
        builder.remove(file_name.as_str())?;
        Ok(true)
    })
}

/// Commit `tree` on top of `parent` and move `branch` to it.
///
/// Fails with `ConcurrentModification` if `branch` no longer points at
/// `parent`.
fn commit_tree(
    repo: &Repository,
    tree: Oid,
    parent: CommitId,
    branch: &BranchName,
    message: &str,
) -> GitResult<CommitId> {
    let tree = repo.find_tree(tree)?;
    let parent_commit = repo.find_commit(parent.raw())?;
    let sig = signature()?;
    let oid = repo.commit(None, &sig, &sig, message, &tree, &[&parent_commit])?;
    let commit = CommitId::new(oid);
    RefManager::update_branch_if_unchanged(repo, branch, parent, commit)?;
    Ok(commit)
}

/// Paths that differ between two commits.
fn changed_paths(repo: &Repository, from: CommitId, to: CommitId) -> GitResult<HashSet<String>> {
    let old_tree = repo.find_commit(from.raw())?.tree()?;
    let new_tree = repo.find_commit(to.raw())?.tree()?;
    let diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?;

    let mut paths = HashSet::new();
    for delta in diff.deltas() {
        for file in [delta.old_file(), delta.new_file()] {
            if let Some(path) = file.path() {
                paths.insert(path.to_string_lossy().into_owned());
            }
        }
    }
    Ok(paths)
}

/// Publish a transaction branch to `main`. Returns the new `main` tip.
fn publish(repo: &Repository, native: &GitTx) -> GitResult<CommitId> {
    let main = BranchName::main();
    let main_head = RefManager::main_commit(repo)?;

    if native.head == native.base {
        return Ok(main_head);
    }

    if main_head == native.base {
        RefManager::update_branch_if_unchanged(repo, &main, native.base, native.head)?;
        return Ok(native.head);
    }

    // Main moved: only documents untouched by the other side may be merged.
    let ours = changed_paths(repo, native.base, main_head)?;
    let theirs = changed_paths(repo, native.base, native.head)?;
    let overlap: BTreeSet<String> = ours.intersection(&theirs).cloned().collect();
    if !overlap.is_empty() {
        return Err(GitError::Conflict {
            paths: overlap.into_iter().collect(),
        });
    }

    let ancestor = repo.find_commit(native.base.raw())?.tree()?;
    let main_commit = repo.find_commit(main_head.raw())?;
    let tx_commit = repo.find_commit(native.head.raw())?;
    let mut index = repo.merge_trees(&ancestor, &main_commit.tree()?, &tx_commit.tree()?, None)?;
    if index.has_conflicts() {
        let mut paths = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
                paths.push(String::from_utf8_lossy(&entry.path).into_owned());
            }
        }
        return Err(GitError::Conflict { paths });
    }

    let tree = repo.find_tree(index.write_tree_to(repo)?)?;
    let sig = signature()?;
    let message = format!("merge {}", native.branch);
    let oid = repo.commit(None, &sig, &sig, &message, &tree, &[&main_commit, &tx_commit])?;
    let merged = CommitId::new(oid);
    RefManager::update_branch_if_unchanged(repo, &main, main_head, merged)?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    use crate::transaction::TxError;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        value: i64,
    }

    fn setup() -> (TempDir, GitStore) {
        let dir = TempDir::new().unwrap();
        let store = GitStore::init(dir.path()).unwrap();
        (dir, store)
    }

    fn doc(store: &GitStore, key: &str) -> Option<Doc> {
        store.get(&Context::background(), "docs", key).unwrap()
    }

    fn begin(store: &GitStore) -> Tx<GitTx> {
        Tx::wrap(store.begin(&Context::background()).unwrap())
    }

    #[test]
    fn test_init_and_reopen() {
        let (dir, store) = setup();
        store
            .put(&Context::background(), "docs", "a", &Doc { value: 1 })
            .unwrap();
        drop(store);

        let reopened = GitStore::open_or_init(dir.path()).unwrap();
        assert_eq!(doc(&reopened, "a"), Some(Doc { value: 1 }));
        assert_eq!(doc(&reopened, "missing"), None);
    }

    #[test]
    fn test_run_tx_commits() {
        let (_dir, store) = setup();

        store
            .run_tx(&Context::background(), |ctx| {
                assert!(store.in_transaction(ctx));
                store.put(ctx, "docs", "a", &Doc { value: 1 })?;
                store.put(ctx, "docs", "b", &Doc { value: 2 })?;

                // Own writes are visible, main is untouched until commit.
                assert_eq!(store.get::<Doc>(ctx, "docs", "a")?, Some(Doc { value: 1 }));
                assert_eq!(doc(&store, "a"), None);
                Ok::<_, GitError>(())
            })
            .unwrap();

        assert_eq!(doc(&store, "a"), Some(Doc { value: 1 }));
        assert_eq!(doc(&store, "b"), Some(Doc { value: 2 }));
        assert_eq!(store.active_count(), 0);
        assert!(store.transaction_branches().unwrap().is_empty());
    }

    #[test]
    fn test_run_tx_rollback() {
        let (_dir, store) = setup();
        let initial = store.head().unwrap();

        let result: Result<(), TxError<GitError, GitError>> =
            store.run_tx(&Context::background(), |ctx| {
                store.put(ctx, "docs", "a", &Doc { value: 1 })?;
                Err(GitError::EmptyRepository)
            });

        assert!(matches!(result, Err(TxError::Work(GitError::EmptyRepository))));
        assert_eq!(store.head().unwrap(), initial);
        assert_eq!(doc(&store, "a"), None);
        assert_eq!(store.active_count(), 0);
        assert!(store.transaction_branches().unwrap().is_empty());
    }

    #[test]
    fn test_delete_and_keys() {
        let (_dir, store) = setup();
        let ctx = Context::background();
        store.put(&ctx, "docs", "b", &Doc { value: 2 }).unwrap();
        store.put(&ctx, "docs", "a", &Doc { value: 1 }).unwrap();

        let keys: Vec<String> = store
            .keys(&ctx, "docs")
            .unwrap()
            .into_iter()
            .map(|k| k.as_str().to_string())
            .collect();
        assert_eq!(keys, vec!["a", "b"]);

        store
            .run_tx(&ctx, |tx_ctx| {
                assert!(store.delete(tx_ctx, "docs", "a")?);
                assert!(!store.delete(tx_ctx, "docs", "missing")?);
                Ok::<_, GitError>(())
            })
            .unwrap();

        assert_eq!(doc(&store, "a"), None);
        assert_eq!(store.keys(&ctx, "docs").unwrap().len(), 1);
        assert!(store.keys(&ctx, "empty").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_names() {
        let (_dir, store) = setup();
        let result = store.put(&Context::background(), "docs", "../escape", &Doc { value: 1 });
        assert!(matches!(result, Err(GitError::InvalidName(_))));
    }

    #[test]
    fn test_disjoint_transactions_merge() {
        let (_dir, store) = setup();

        let tx1 = begin(&store);
        let tx2 = begin(&store);
        assert_eq!(store.active_count(), 2);

        tx1.native().put("docs", "a", &Doc { value: 1 }).unwrap();
        tx2.native().put("docs", "b", &Doc { value: 2 }).unwrap();

        store.commit(&tx1).unwrap();
        store.commit(&tx2).unwrap();

        assert_eq!(doc(&store, "a"), Some(Doc { value: 1 }));
        assert_eq!(doc(&store, "b"), Some(Doc { value: 2 }));
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_conflicting_transactions() {
        let (_dir, store) = setup();

        let tx1 = begin(&store);
        let tx2 = begin(&store);

        tx1.native().put("docs", "a", &Doc { value: 1 }).unwrap();
        tx2.native().put("docs", "a", &Doc { value: 2 }).unwrap();

        store.commit(&tx1).unwrap();
        let result = store.commit(&tx2);

        match result {
            Err(GitError::Conflict { paths }) => assert_eq!(paths, vec!["docs/a.json"]),
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(doc(&store, "a"), Some(Doc { value: 1 }));
        assert!(store.transaction_branches().unwrap().is_empty());
    }

    #[test]
    fn test_commit_without_writes() {
        let (_dir, store) = setup();
        let initial = store.head().unwrap();

        store
            .run_tx(&Context::background(), |_| Ok::<_, GitError>(()))
            .unwrap();

        assert_eq!(store.head().unwrap(), initial);
    }

    fn plant_branch(store: &GitStore, tx_id: &str) {
        let repo = store.inner.repo.lock();
        let head = RefManager::main_commit(&repo).unwrap();
        RefManager::create_branch(&repo, &BranchName::for_transaction(tx_id), head).unwrap();
    }

    #[test]
    fn test_cleanup_abandoned() {
        let (_dir, store) = setup();

        // A begun transaction that is never finished keeps its branch.
        let live = begin(&store);
        let old_id = Ulid::from_parts(0, 1).to_string().to_lowercase();
        plant_branch(&store, &old_id);
        plant_branch(&store, "not-a-ulid");

        assert_eq!(store.transaction_branches().unwrap().len(), 3);
        assert_eq!(store.cleanup_abandoned(Duration::ZERO).unwrap(), 1);
        assert_eq!(store.transaction_branches().unwrap().len(), 2);

        store.rollback(&live).unwrap();
        assert_eq!(store.transaction_branches().unwrap().len(), 1);
    }

    #[test]
    fn test_cleanup_spares_other_handles_transactions() {
        let dir = TempDir::new().unwrap();
        let first = GitStore::init(dir.path()).unwrap();
        let second = GitStore::open(dir.path()).unwrap();

        let tx = begin(&first);
        tx.native().put("docs", "a", &Doc { value: 1 }).unwrap();

        // The second handle does not know the transaction, but it is fresh.
        assert_eq!(second.cleanup_abandoned(Duration::from_secs(3600)).unwrap(), 0);

        tx.native().put("docs", "b", &Doc { value: 2 }).unwrap();
        first.commit(&tx).unwrap();
        assert_eq!(doc(&second, "a"), Some(Doc { value: 1 }));
        assert_eq!(doc(&second, "b"), Some(Doc { value: 2 }));
    }

    #[test]
    fn test_expired_context() {
        let (_dir, store) = setup();
        let ctx = Context::background().with_timeout(Duration::ZERO);
        assert!(matches!(store.begin(&ctx), Err(GitError::DeadlineExceeded)));
        assert_eq!(store.active_count(), 0);
    }
}
