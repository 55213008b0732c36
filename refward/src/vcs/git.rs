//! A `git2`-backed [`ReadVcs`] implementation.
//!
//! This is the reference backend: a thin, read-only wrapper over a bare
//! `git2::Repository`. It is the only place in the crate that knows git
//! concepts (commits, trees, tags); everything above [`vcs`](crate::vcs)
//! only sees [`Oid`]s and [`RefName`]s.

use std::path::Path;

use refward_crypto::{Key, KeyType};

use crate::vcs::{CommitLog, Oid, ReadVcs, RefName, VcsError};

fn to_git(oid: Oid) -> git2::Oid {
    git2::Oid::from_bytes(oid.as_bytes()).expect("Oid always holds a valid git2::Oid byte width")
}

fn from_git(oid: git2::Oid) -> Oid {
    Oid::from_bytes(oid.as_bytes())
}

/// A read-only handle onto a git repository.
pub struct GitVcs {
    repo: git2::Repository,
}

impl GitVcs {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VcsError> {
        let repo = git2::Repository::open_ext(
            path,
            git2::RepositoryOpenFlags::empty(),
            std::iter::empty::<&std::ffi::OsStr>(),
        )?;
        Ok(Self { repo })
    }

    pub fn from_repository(repo: git2::Repository) -> Self {
        Self { repo }
    }

    fn commit(&self, id: Oid) -> Result<git2::Commit<'_>, VcsError> {
        self.repo
            .find_commit(to_git(id))
            .map_err(|_| VcsError::NotFound(id))
    }
}

impl ReadVcs for GitVcs {
    fn read_object(&self, id: Oid) -> Result<Vec<u8>, VcsError> {
        let obj = self
            .repo
            .find_object(to_git(id), None)
            .map_err(|_| VcsError::NotFound(id))?;
        match obj.as_blob() {
            Some(blob) => Ok(blob.content().to_vec()),
            None => Ok(obj.peel_to_blob()?.content().to_vec()),
        }
    }

    fn resolve_path(&self, tree: Oid, path: &str) -> Result<Option<Oid>, VcsError> {
        let tree = self
            .repo
            .find_tree(to_git(tree))
            .map_err(|_| VcsError::NotFound(tree))?;
        match tree.get_path(Path::new(path)) {
            Ok(entry) => Ok(Some(from_git(entry.id()))),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_tree(&self, tree: Oid, prefix: &str) -> Result<Vec<String>, VcsError> {
        let root = self
            .repo
            .find_tree(to_git(tree))
            .map_err(|_| VcsError::NotFound(tree))?;

        let subtree_id = match root.get_path(Path::new(prefix)) {
            Ok(entry) => entry.id(),
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let subtree = self.repo.find_tree(subtree_id)?;

        let mut paths = Vec::new();
        subtree.walk(git2::TreeWalkMode::PreOrder, |parent, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                let name = entry.name().unwrap_or_default();
                let full = if parent.is_empty() {
                    format!("{prefix}/{name}")
                } else {
                    format!("{prefix}/{}{name}", parent)
                };
                paths.push(full);
            }
            git2::TreeWalkResult::Ok
        })?;
        Ok(paths)
    }

    fn verify_signature(&self, id: Oid, key: &Key) -> bool {
        let KeyType::Ed25519(pk) = &key.key_type else {
            return false;
        };
        let Ok(commit) = self.commit(id) else {
            return false;
        };
        let Ok((sig, signed_data)) = self.repo.extract_signature(&to_git(id), None) else {
            return false;
        };
        // git2 hands back the raw signature block including armor; the
        // concrete signature format (ed25519/ssh/pgp) is parsed by the
        // caller that knows which one it is. Here we only cover the case
        // this crate implements natively: a raw 64-byte ed25519 signature
        // over the commit's canonical bytes.
        let _ = commit;
        refward_crypto::Signature::try_from(sig.as_ref())
            .ok()
            .map(|parsed| pk.verify(signed_data.as_ref(), &parsed).is_ok())
            .unwrap_or(false)
    }

    fn commit_tree_id(&self, commit: Oid) -> Result<Oid, VcsError> {
        let c = self.commit(commit)?;
        Ok(from_git(c.tree_id()))
    }

    fn merge_tree(&self, a: Oid, b: Oid) -> Result<Oid, VcsError> {
        let ca = self.commit(a)?;
        let cb = self.commit(b)?;
        let mut index = self.repo.merge_commits(&ca, &cb, None)?;
        let oid = index.write_tree_to(&self.repo)?;
        Ok(from_git(oid))
    }

    fn changed_paths(&self, commit: Oid) -> Result<Vec<String>, VcsError> {
        let c = self.commit(commit)?;
        let tree = c.tree()?;
        let parent_tree = c.parents().next().map(|p| p.tree()).transpose()?;
        let diff =
            self.repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        let mut paths = Vec::new();
        diff.foreach(
            &mut |delta, _| {
                if let Some(path) = delta.new_file().path().and_then(|p| p.to_str()) {
                    paths.push(path.to_owned());
                }
                true
            },
            None,
            None,
            None,
        )?;
        Ok(paths)
    }

    fn commits_between(&self, old: Oid, new: Oid) -> Result<Vec<Oid>, VcsError> {
        let mut walk = self.repo.revwalk()?;
        walk.push(to_git(new))?;
        if !old.is_zero() {
            walk.hide(to_git(old))?;
        }
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)?;
        let mut out = Vec::new();
        for oid in walk {
            out.push(from_git(oid?));
        }
        Ok(out)
    }

    fn knows_commit(&self, descendant: Oid, ancestor: Oid) -> Result<bool, VcsError> {
        if ancestor.is_zero() {
            return Ok(true);
        }
        Ok(self
            .repo
            .graph_descendant_of(to_git(descendant), to_git(ancestor))?)
    }

    fn tag_target(&self, tag: Oid) -> Result<Oid, VcsError> {
        match self.repo.find_tag(to_git(tag)) {
            Ok(t) => Ok(from_git(t.target_id())),
            Err(_) => {
                // Lightweight tags point straight at the commit.
                self.commit(tag).map(|c| from_git(c.id()))
            }
        }
    }

    fn get_reference(&self, name: &RefName) -> Result<Oid, VcsError> {
        let reference = self
            .repo
            .find_reference(name.as_str())
            .map_err(|_| VcsError::RefNotFound(name.clone()))?;
        reference
            .target()
            .map(from_git)
            .ok_or_else(|| VcsError::RefNotFound(name.clone()))
    }
}

impl CommitLog for GitVcs {
    fn parent_of(&self, id: Oid) -> Result<Option<Oid>, VcsError> {
        let c = self.commit(id)?;
        Ok(c.parent_id(0).ok().map(from_git))
    }

    fn message_of(&self, id: Oid) -> Result<String, VcsError> {
        let c = self.commit(id)?;
        Ok(c.message_raw().unwrap_or_default().to_owned())
    }

    fn reference_tip(&self, name: &RefName) -> Result<Oid, VcsError> {
        self.get_reference(name)
    }
}
