//! Branch and reference management.
//!
//! Transaction branches use a namespaced pattern: `tx/{transaction_id}`.
//! This makes them easy to identify and clean up.

use git2::{BranchType, Repository};

use crate::git::error::{GitError, GitResult};
use crate::git::types::{BranchName, CommitId};

/// Manages git references (branches).
pub(crate) struct RefManager;

impl RefManager {
    /// Resolve a branch name to its current commit id.
    pub fn resolve_branch(repo: &Repository, branch: &BranchName) -> GitResult<CommitId> {
        let reference = repo
            .find_reference(&branch.as_ref_path())
            .map_err(|_| GitError::RefNotFound(branch.to_string()))?;

        let commit = reference
            .peel_to_commit()
            .map_err(|_| GitError::RefNotFound(branch.to_string()))?;

        Ok(CommitId::new(commit.id()))
    }

    /// Current tip of the main branch.
    pub fn main_commit(repo: &Repository) -> GitResult<CommitId> {
        Self::resolve_branch(repo, &BranchName::main()).map_err(|e| match e {
            GitError::RefNotFound(_) => GitError::EmptyRepository,
            other => other,
        })
    }

    /// Check if a branch exists.
    #[cfg(test)]
    pub fn branch_exists(repo: &Repository, branch: &BranchName) -> bool {
        repo.find_reference(&branch.as_ref_path()).is_ok()
    }

    /// Create a new branch pointing to the given commit.
    pub fn create_branch(repo: &Repository, branch: &BranchName, target: CommitId) -> GitResult<()> {
        let commit = repo.find_commit(target.raw())?;
        repo.branch(branch.as_str(), &commit, false)?;
        Ok(())
    }

    /// Move a branch only if it still points to `expected`.
    ///
    /// Compare-and-swap: fails with `ConcurrentModification` if another
    /// writer moved the branch in between.
    pub fn update_branch_if_unchanged(
        repo: &Repository,
        branch: &BranchName,
        expected: CommitId,
        new_target: CommitId,
    ) -> GitResult<()> {
        let message = format!("move {} to {}", branch, new_target.short());
        repo.reference_matching(
            &branch.as_ref_path(),
            new_target.raw(),
            true,
            expected.raw(),
            &message,
        )
        .map_err(|e| {
            if e.code() == git2::ErrorCode::Modified || e.code() == git2::ErrorCode::Locked {
                GitError::ConcurrentModification {
                    branch: branch.to_string(),
                }
            } else {
                GitError::Git(e)
            }
        })?;
        Ok(())
    }

    /// Delete a branch.
    pub fn delete_branch(repo: &Repository, branch: &BranchName) -> GitResult<()> {
        let mut git_branch = repo
            .find_branch(branch.as_str(), BranchType::Local)
            .map_err(|_| GitError::RefNotFound(branch.to_string()))?;

        git_branch.delete()?;
        Ok(())
    }

    /// List all transaction branches.
    pub fn list_transaction_branches(repo: &Repository) -> GitResult<Vec<BranchName>> {
        let mut result = Vec::new();
        for branch_result in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch_result?;
            if let Some(name) = branch.name()? {
                if name.starts_with(BranchName::TX_PREFIX) {
                    if let Ok(branch_name) = BranchName::new(name) {
                        result.push(branch_name);
                    }
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_repo_with_commit() -> (TempDir, Repository, CommitId) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let commit_id = {
            let tree_id = repo.treebuilder(None).unwrap().write().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = git2::Signature::now("Test", "test@test.com").unwrap();
            let oid = repo
                .commit(Some("refs/heads/main"), &sig, &sig, "Initial commit", &tree, &[])
                .unwrap();
            CommitId::new(oid)
        };

        (dir, repo, commit_id)
    }

    fn empty_commit_on(repo: &Repository, parent: CommitId) -> CommitId {
        let tree_id = repo.treebuilder(None).unwrap().write().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Test", "test@test.com").unwrap();
        let parent = repo.find_commit(parent.raw()).unwrap();
        let oid = repo
            .commit(None, &sig, &sig, "Next commit", &tree, &[&parent])
            .unwrap();
        CommitId::new(oid)
    }

    #[test]
    fn test_main_commit() {
        let (_dir, repo, expected) = setup_repo_with_commit();
        assert_eq!(RefManager::main_commit(&repo).unwrap(), expected);
    }

    #[test]
    fn test_main_commit_empty_repository() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert!(matches!(
            RefManager::main_commit(&repo),
            Err(GitError::EmptyRepository)
        ));
    }

    #[test]
    fn test_branch_lifecycle() {
        let (_dir, repo, base) = setup_repo_with_commit();
        let branch = BranchName::for_transaction("tx001");

        assert!(!RefManager::branch_exists(&repo, &branch));
        RefManager::create_branch(&repo, &branch, base).unwrap();
        assert!(RefManager::branch_exists(&repo, &branch));
        assert_eq!(RefManager::resolve_branch(&repo, &branch).unwrap(), base);

        let listed = RefManager::list_transaction_branches(&repo).unwrap();
        assert_eq!(listed, vec![branch.clone()]);

        RefManager::delete_branch(&repo, &branch).unwrap();
        assert!(!RefManager::branch_exists(&repo, &branch));
        assert!(RefManager::list_transaction_branches(&repo).unwrap().is_empty());
    }

    #[test]
    fn test_update_branch_if_unchanged() {
        let (_dir, repo, commit1) = setup_repo_with_commit();
        let main = BranchName::main();
        let commit2 = empty_commit_on(&repo, commit1);

        RefManager::update_branch_if_unchanged(&repo, &main, commit1, commit2).unwrap();
        assert_eq!(RefManager::main_commit(&repo).unwrap(), commit2);

        // Stale expectation is rejected.
        let commit3 = empty_commit_on(&repo, commit1);
        let result = RefManager::update_branch_if_unchanged(&repo, &main, commit1, commit3);
        assert!(matches!(result, Err(GitError::ConcurrentModification { .. })));
        assert_eq!(RefManager::main_commit(&repo).unwrap(), commit2);
    }
}
