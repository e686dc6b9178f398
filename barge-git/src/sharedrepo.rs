//! The staged write area.
//!
//! A short-lived bare repository whose object store is linked to the
//! target repository through `objects/info/alternates`: everything
//! already in the target resolves without copying, while new objects
//! land only in the staging directory. On success the staged objects
//! are migrated into the target; on any failure, including a hook veto,
//! the whole directory is dropped and the target never saw a thing.
//!
//! The alternates file is written one absolute path per line and is
//! read by native git tooling directly.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::command::Command;
use crate::error::Error;
use crate::hook::RefUpdater;
use crate::identity::Signature;
use crate::repo;
use crate::sha::Sha;

/// Default file mode for staged regular files.
pub const FILE_MODE: &str = "100644";
/// File mode for staged executable files.
pub const FILE_MODE_EXEC: &str = "100755";
const FILE_MODE_SYMLINK: &str = "120000";
const TREE_MODE: &str = "040000";

/// One entry of a tree, as returned by [`SharedRepo::file_entry`].
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub mode: String,
    pub kind: String,
    pub sha: Sha,
    pub path: String,
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        self.mode == TREE_MODE
    }

    pub fn is_link(&self) -> bool {
        self.mode == FILE_MODE_SYMLINK
    }

    pub fn is_executable(&self) -> bool {
        self.mode == FILE_MODE_EXEC
    }
}

/// An isolated, alternates-linked object store for building new
/// objects.
///
/// Exclusively owned by the operation that created it. [`close`] is
/// idempotent and a drop backstop removes the directory on early-error
/// paths, so failed operations leak no disk state.
///
/// [`close`]: SharedRepo::close
pub struct SharedRepo {
    source_repo_path: PathBuf,
    repo_path: PathBuf,
    temp: Option<tempfile::TempDir>,
}

impl SharedRepo {
    /// Create the staging directory under `staging_root`.
    pub fn new(staging_root: &Path, source_repo_path: &Path) -> Result<Self, Error> {
        if source_repo_path.as_os_str().is_empty() {
            return Err(Error::invalid_argument("repository path must not be empty"));
        }
        std::fs::create_dir_all(staging_root)
            .map_err(|err| Error::io("failed to create staging root", err))?;
        let temp = tempfile::Builder::new()
            .prefix("shared-")
            .tempdir_in(staging_root)
            .map_err(|err| Error::io("failed to create staging directory", err))?;
        let repo_path = temp.path().to_path_buf();
        Ok(Self {
            source_repo_path: source_repo_path.to_path_buf(),
            repo_path,
            temp: Some(temp),
        })
    }

    /// Initialize the bare repository and link it to the target's
    /// object store, plus any extra alternate directories.
    pub fn init(&self, alternates: &[PathBuf]) -> Result<(), Error> {
        Command::new("init")
            .flag("--bare")
            .flag("--quiet")
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to initialize staging repository", err))?;

        let alternates_path = self.repo_path.join("objects").join("info").join("alternates");
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&alternates_path)
            .map_err(|err| Error::io("failed to open alternates file", err))?;
        let mut write_line = |path: &Path| -> Result<(), Error> {
            writeln!(file, "{}", path.display())
                .map_err(|err| Error::io("failed to write alternates file", err))
        };
        write_line(&self.source_repo_path.join("objects"))?;
        for alternate in alternates {
            write_line(alternate)?;
        }
        Ok(())
    }

    pub fn directory(&self) -> &Path {
        &self.repo_path
    }

    /// The staged object directory, for use as an alternate during the
    /// hook window.
    pub fn objects_dir(&self) -> PathBuf {
        self.repo_path.join("objects")
    }

    /// Set the git index to our HEAD.
    pub fn set_default_index(&self) -> Result<(), Error> {
        Command::new("read-tree")
            .arg("HEAD")
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to set staging index to HEAD", err))?;
        Ok(())
    }

    /// Set the git index to the given treeish.
    pub fn set_index(&self, treeish: Sha) -> Result<(), Error> {
        Command::new("read-tree")
            .arg(treeish.to_string())
            .run(&self.repo_path)
            .map_err(|err| Error::git(format!("failed to set staging index to {treeish}"), err))?;
        Ok(())
    }

    /// Clear the git index.
    pub fn clear_index(&self) -> Result<(), Error> {
        Command::new("read-tree")
            .flag("--empty")
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to clear staging index", err))?;
        Ok(())
    }

    /// List index entries matching the given paths.
    pub fn ls_files(&self, paths: &[&str]) -> Result<Vec<String>, Error> {
        let mut cmd = Command::new("ls-files").flag("-z");
        for path in paths {
            cmd = cmd.post_sep_arg(*path);
        }
        let out = cmd
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to list files in staging index", err))?;
        Ok(out
            .stdout
            .split(|b| *b == 0)
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect())
    }

    /// Remove the given files from the index.
    pub fn remove_files_from_index(&self, paths: &[&str]) -> Result<(), Error> {
        let mut stdin = Vec::new();
        for path in paths {
            if path.is_empty() {
                continue;
            }
            stdin.extend_from_slice(b"0 ");
            stdin.extend_from_slice("0".repeat(40).as_bytes());
            stdin.push(b'\t');
            stdin.extend_from_slice(path.as_bytes());
            stdin.push(0);
        }
        Command::new("update-index")
            .flag("--remove")
            .flag("-z")
            .flag("--index-info")
            .stdin(stdin)
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to remove files from staging index", err))?;
        Ok(())
    }

    /// Hash the given content into the staged object store.
    pub fn write_git_object(&self, content: &[u8]) -> Result<Sha, Error> {
        let out = Command::new("hash-object")
            .flag("-w")
            .flag("--stdin")
            .stdin(content.to_vec())
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to hash object in staging repository", err))?;
        Sha::from_hex(&out.stdout_trimmed())
    }

    /// Add an already-hashed object to the index at the given path.
    pub fn add_object_to_index(&self, mode: &str, object: Sha, path: &str) -> Result<(), Error> {
        let result = Command::new("update-index")
            .flag("--add")
            .flag("--replace")
            .flag("--cacheinfo")
            .arg(format!("{mode},{object},{path}"))
            .run(&self.repo_path);
        match result {
            Ok(_) => Ok(()),
            Err(err) if err.stderr().contains("Invalid path") => Err(Error::invalid_argument(
                format!("invalid path {path:?}"),
            )),
            Err(err) => Err(Error::git(
                format!("failed to add object to staging index at {path:?}"),
                err,
            )),
        }
    }

    /// Write the current index as a tree object.
    pub fn write_tree(&self) -> Result<Sha, Error> {
        let out = Command::new("write-tree")
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to write tree in staging repository", err))?;
        Sha::from_hex(&out.stdout_trimmed())
    }

    /// Apply a text diff to the index (`git apply --cached`).
    pub fn apply_to_index(&self, patch: &[u8]) -> Result<(), Error> {
        Command::new("apply")
            .flag("--cached")
            .stdin(patch.to_vec())
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to apply patch to staging index", err))?;
        Ok(())
    }

    /// Create a commit from the given tree with explicit identities,
    /// dates, parents and message.
    pub fn commit_tree(
        &self,
        author: &Signature,
        committer: &Signature,
        tree: Sha,
        message: &str,
        parents: &[Sha],
    ) -> Result<Sha, Error> {
        let mut cmd = Command::new("commit-tree")
            .arg(tree.to_string())
            .env("GIT_AUTHOR_NAME", author.identity.name.as_str())
            .env("GIT_AUTHOR_EMAIL", author.identity.email.as_str())
            .env("GIT_AUTHOR_DATE", author.git_date())
            .env("GIT_COMMITTER_NAME", committer.identity.name.as_str())
            .env("GIT_COMMITTER_EMAIL", committer.identity.email.as_str())
            .env("GIT_COMMITTER_DATE", committer.git_date());
        for parent in parents {
            cmd = cmd.flag("-p").flag(parent.to_string());
        }
        cmd = cmd.flag("--no-gpg-sign");

        let mut body = message.trim_end().to_string();
        body.push('\n');

        let out = cmd
            .stdin(body.into_bytes())
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to commit tree in staging repository", err))?;
        Sha::from_hex(&out.stdout_trimmed())
    }

    /// Write an annotated tag object pointing at `target`.
    pub fn write_tag(
        &self,
        name: &str,
        target: Sha,
        tagger: &Signature,
        message: &str,
    ) -> Result<Sha, Error> {
        let mut payload = String::new();
        payload.push_str(&format!("object {target}\n"));
        payload.push_str("type commit\n");
        payload.push_str(&format!("tag {name}\n"));
        payload.push_str(&format!("tagger {} {}\n", tagger.identity, tagger.git_date()));
        payload.push('\n');
        payload.push_str(message.trim_end());
        payload.push('\n');

        let out = Command::new("hash-object")
            .flag("-t")
            .flag("tag")
            .flag("-w")
            .flag("--stdin")
            .stdin(payload.into_bytes())
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to write tag object", err))?;
        Sha::from_hex(&out.stdout_trimmed())
    }

    /// Merge `source` onto `target` at tree level.
    ///
    /// Returns the merged tree and, when the merge has conflicts, the
    /// conflicting paths; conflicts are a result, not an error. An exit
    /// status that signals the operation itself was blocked is an
    /// internal error.
    pub fn merge_tree(
        &self,
        merge_base: Sha,
        target: Sha,
        source: Sha,
    ) -> Result<(Sha, Vec<String>), Error> {
        let mut cmd = Command::new("merge-tree")
            .flag("--write-tree")
            .flag("--name-only")
            .flag("--no-messages");
        if merge_base.is_value() {
            cmd = cmd.flag(format!("--merge-base={merge_base}"));
        }
        cmd = cmd.arg(target.to_string()).arg(source.to_string());

        match cmd.run(&self.repo_path) {
            Ok(out) => Ok((Sha::from_hex(&out.stdout_trimmed())?, Vec::new())),
            Err(err) if err.is_exit_code(1) => {
                let stdout = String::from_utf8_lossy(err.stdout()).into_owned();
                let mut lines = stdout.lines();
                let Some(tree) = lines.next() else {
                    return Err(Error::internal(
                        "unexpected empty merge-tree conflict output",
                    ));
                };
                let tree = Sha::from_hex(tree)?;
                let conflicts = lines
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(ToString::to_string)
                    .collect();
                Ok((tree, conflicts))
            }
            Err(err) => Err(Error::git(
                format!("failed to merge trees of {target} and {source}"),
                err,
            )),
        }
    }

    /// Commits to replay for a rebase of `source` onto `target`, oldest
    /// first.
    ///
    /// Matches `git rebase`'s commit selection except for `--date-order`
    /// instead of `--topo-order`.
    pub fn commits_for_rebase(&self, target: Sha, source: Sha) -> Result<Vec<Sha>, Error> {
        let out = Command::new("rev-list")
            .flag("--max-parents=1")
            .flag("--cherry-pick")
            .flag("--reverse")
            .flag("--right-only")
            .flag("--date-order")
            .arg(format!("{target}...{source}"))
            .run(&self.repo_path)
            .map_err(|err| Error::git("failed to list commits for rebase", err))?;
        out.stdout_trimmed()
            .lines()
            .filter(|line| !line.is_empty())
            .map(Sha::from_hex)
            .collect()
    }

    /// Read and parse one commit, resolving through the alternates.
    pub fn read_commit(&self, rev: Sha) -> Result<repo::Commit, Error> {
        repo::read_commit(&self.repo_path, &[], &rev.to_string())
    }

    /// Look up one tree entry, optionally verifying it matches an
    /// expected object id.
    pub fn file_entry(
        &self,
        treeish: Sha,
        path: &str,
        expected_sha: Sha,
    ) -> Result<TreeEntry, Error> {
        let out = Command::new("ls-tree")
            .arg(treeish.to_string())
            .post_sep_arg(path)
            .run(&self.repo_path)
            .map_err(|err| Error::git(format!("failed to look up tree entry {path:?}"), err))?;
        let line = out.stdout_trimmed();
        let Some((meta, entry_path)) = line.split_once('\t') else {
            return Err(Error::not_found(format!("path {path:?} not found")));
        };
        let mut fields = meta.split(' ');
        let (Some(mode), Some(kind), Some(sha)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::internal(format!(
                "unexpected ls-tree output {line:?}"
            )));
        };
        let entry = TreeEntry {
            mode: mode.to_string(),
            kind: kind.to_string(),
            sha: Sha::from_hex(sha)?,
            path: entry_path.to_string(),
        };
        if expected_sha.is_value() && expected_sha != entry.sha {
            return Err(Error::invalid_argument(format!(
                "sha does not match for path {path:?} [given: {expected_sha}, expected: {}]",
                entry.sha
            )));
        }
        Ok(entry)
    }

    /// Ensure `path` is free to be written to: no intermediate part may
    /// be an existing file or link, and nothing may sit at the path
    /// itself.
    fn check_path_availability(&self, treeish: Sha, path: &str) -> Result<(), Error> {
        let parts: Vec<&str> = path.split('/').collect();
        let mut sub_path = String::new();
        for (index, part) in parts.iter().enumerate() {
            if !sub_path.is_empty() {
                sub_path.push('/');
            }
            sub_path.push_str(part);

            let entry = match self.file_entry(treeish, &sub_path, Sha::EMPTY) {
                Ok(entry) => entry,
                Err(err) if err.is_not_found() => break,
                Err(err) => return Err(err),
            };

            if index < parts.len() - 1 {
                if !entry.is_dir() {
                    return Err(Error::conflict(format!(
                        "a file already exists where a directory is needed [path: {sub_path}]"
                    )));
                }
            } else if entry.is_link() {
                return Err(Error::conflict(format!(
                    "a symbolic link already exists at {sub_path:?}"
                )));
            } else if entry.is_dir() {
                return Err(Error::conflict(format!(
                    "a directory already exists at {sub_path:?}"
                )));
            } else {
                return Err(Error::conflict(format!("file path {path:?} already exists")));
            }
        }
        Ok(())
    }

    /// Stage a new file.
    pub fn create_file(
        &self,
        treeish: Sha,
        path: &str,
        mode: &str,
        payload: &[u8],
    ) -> Result<Sha, Error> {
        // an empty repository has no tree to check against
        if treeish.is_value() {
            self.check_path_availability(treeish, path)?;
        }
        let object = self.write_git_object(payload)?;
        self.add_object_to_index(mode, object, path)?;
        Ok(object)
    }

    /// Stage new content for an existing file, keeping an executable
    /// mode if the file had one.
    pub fn update_file(
        &self,
        treeish: Sha,
        path: &str,
        expected_sha: Sha,
        mode: &str,
        payload: &[u8],
    ) -> Result<Sha, Error> {
        let entry = self.file_entry(treeish, path, expected_sha)?;
        let mode = if entry.is_executable() { FILE_MODE_EXEC } else { mode };
        let object = self.write_git_object(payload)?;
        self.add_object_to_index(mode, object, path)?;
        Ok(object)
    }

    /// Stage a file move, optionally replacing the content.
    pub fn move_file(
        &self,
        treeish: Sha,
        path: &str,
        expected_sha: Sha,
        mode: &str,
        new_path: &str,
        new_payload: Option<&[u8]>,
    ) -> Result<Sha, Error> {
        if new_path.is_empty() {
            return Err(Error::invalid_argument("new path must not be empty"));
        }
        let entry = self.file_entry(treeish, path, expected_sha)?;
        self.check_path_availability(treeish, new_path)?;

        let (object, mode) = match new_payload {
            Some(payload) => {
                let object = self.write_git_object(payload)?;
                let mode = if entry.is_executable() { FILE_MODE_EXEC } else { mode };
                (object, mode.to_string())
            }
            None => (entry.sha, entry.mode.clone()),
        };

        self.add_object_to_index(&mode, object, new_path)?;
        self.remove_files_from_index(&[path])?;
        Ok(object)
    }

    /// Remove a file from the index.
    pub fn delete_file(&self, path: &str) -> Result<(), Error> {
        let staged = self.ls_files(&[path])?;
        if !staged.iter().any(|file| file == path) {
            return Err(Error::not_found(format!("file path {path:?} not found")));
        }
        self.remove_files_from_index(&[path])
    }

    /// Move every staged object into the target repository's object
    /// store.
    ///
    /// Files move in pack-safety priority order (non-pack objects
    /// first, then `.keep`, `.pack`, `.rev`, `.idx`) so an interrupted
    /// migration leaves the target readable: a pack without its index
    /// is ignored, an index without its pack is not.
    pub fn move_objects(&self) -> Result<(), Error> {
        let src_dir = self.repo_path.join("objects");
        let dst_dir = self.source_repo_path.join("objects");

        let mut files = Vec::new();
        collect_object_files(&src_dir, &src_dir, &mut files)?;
        files.sort_by_key(|entry| entry.priority);

        for entry in files {
            let dst_path = dst_dir.join(&entry.rel_path);
            if let Some(parent) = dst_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| Error::io("failed to create object directory", err))?;
            }

            match std::fs::rename(&entry.full_path, &dst_path) {
                Ok(()) => {
                    tracing::debug!(object = %entry.rel_path.display(), "moved git object");
                    continue;
                }
                Err(rename_err) => {
                    // rename can fail across devices; fall back to copy + remove
                    if let Err(copy_err) = std::fs::copy(&entry.full_path, &dst_path) {
                        // never leave a partial file behind in the target
                        match std::fs::remove_file(&dst_path) {
                            Ok(()) => {}
                            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                            Err(err) => {
                                tracing::warn!(
                                    object = %entry.rel_path.display(),
                                    error = %err,
                                    "failed to remove partially copied git object"
                                );
                            }
                        }
                        return Err(Error::io(
                            format!(
                                "failed to move or copy git object {} (rename: {rename_err})",
                                entry.rel_path.display()
                            ),
                            copy_err,
                        ));
                    }
                    std::fs::remove_file(&entry.full_path)
                        .map_err(|err| Error::io("failed to remove moved git object", err))?;
                    tracing::warn!(
                        object = %entry.rel_path.display(),
                        rename_error = %rename_err,
                        "copied git object"
                    );
                }
            }
        }
        Ok(())
    }

    /// Remove the staging directory. Idempotent; safe to call on every
    /// exit path.
    pub fn close(&mut self) {
        if let Some(temp) = self.temp.take() {
            let path = temp.path().to_path_buf();
            if let Err(err) = temp.close() {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove staging directory");
            }
        }
    }
}

struct ObjectFile {
    full_path: PathBuf,
    rel_path: PathBuf,
    priority: u8,
}

fn collect_object_files(
    root: &Path,
    dir: &Path,
    files: &mut Vec<ObjectFile>,
) -> Result<(), Error> {
    let entries =
        std::fs::read_dir(dir).map_err(|err| Error::io("failed to list staged objects", err))?;
    for entry in entries {
        let entry = entry.map_err(|err| Error::io("failed to list staged objects", err))?;
        let path = entry.path();
        let rel_path = path
            .strip_prefix(root)
            .map_err(|err| Error::internal(format!("unexpected object path: {err}")))?
            .to_path_buf();
        // info/ holds the alternates file, never migrate it
        if rel_path.starts_with("info") {
            continue;
        }
        if path.is_dir() {
            collect_object_files(root, &path, files)?;
        } else {
            let name = entry.file_name().to_string_lossy().into_owned();
            files.push(ObjectFile {
                full_path: path,
                rel_path,
                priority: file_priority(&name),
            });
        }
    }
    Ok(())
}

// priority table from git's tmp-objdir migration
fn file_priority(name: &str) -> u8 {
    if !name.starts_with("pack") {
        0
    } else if name.ends_with(".keep") {
        1
    } else if name.ends_with(".pack") {
        2
    } else if name.ends_with(".rev") {
        3
    } else if name.ends_with(".idx") {
        4
    } else {
        5
    }
}

/// Drive a complete staged write.
///
/// `build` constructs the new objects inside the staging area and must
/// initialize the updater once old and new values are known; leaving
/// the updater uninitialized means "update nothing" (used when a merge
/// reports conflicts as data). If `build` fails, nothing past `init` is
/// ever invoked. The staging directory is removed on every path.
pub fn run<'a, F>(
    updater: &mut RefUpdater<'a>,
    staging_root: &Path,
    repo_path: &Path,
    build: F,
) -> Result<(), Error>
where
    F: FnOnce(&SharedRepo, &mut RefUpdater<'a>) -> Result<(), Error>,
{
    let mut shared = SharedRepo::new(staging_root, repo_path)?;
    let result = (|| {
        shared.init(&[])?;
        build(&shared, &mut *updater)?;
        if !updater.is_initialized() {
            return Ok(());
        }
        updater.pre(&[shared.objects_dir()])?;
        shared.move_objects()?;
        updater.update_ref()?;
        updater.post(&[])
    })();
    shared.close();
    result
}
