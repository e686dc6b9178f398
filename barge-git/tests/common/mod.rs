//! Helpers for driving real git repositories in temp directories.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use barge_git::{Identity, Sha, Signature};
use chrono::DateTime;
use tempfile::TempDir;

/// Run a git command, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test Author")
        .env("GIT_AUTHOR_EMAIL", "author@example.com")
        .env("GIT_COMMITTER_NAME", "Test Committer")
        .env("GIT_COMMITTER_EMAIL", "committer@example.com")
        .output()
        .expect("failed to run git");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// A work clone, a bare target repository and a staging root.
pub struct Fixture {
    _root: TempDir,
    pub work: PathBuf,
    pub bare: PathBuf,
    pub staging: PathBuf,
}

/// A work repository with one commit on `main`, cloned into a bare
/// target.
pub fn fixture() -> Fixture {
    let root = TempDir::new().unwrap();
    let work = root.path().join("work");
    std::fs::create_dir(&work).unwrap();
    git(&work, &["init", "-q", "-b", "main"]);
    commit_file(&work, "a.txt", "alpha\n", "initial commit");

    git(
        root.path(),
        &["clone", "--quiet", "--bare", "work", "repo.git"],
    );
    let bare = root.path().join("repo.git");
    let staging = root.path().join("staging");

    Fixture {
        _root: root,
        work,
        bare,
        staging,
    }
}

/// Write a file in the work repository and commit it; returns the
/// commit id.
pub fn commit_file(work: &Path, path: &str, content: &str, message: &str) -> Sha {
    let file = work.join(path);
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&file, content).unwrap();
    git(work, &["add", "."]);
    git(work, &["commit", "-q", "-m", message]);
    Sha::from_hex(&git(work, &["rev-parse", "HEAD"])).unwrap()
}

/// Push a work revision into the bare repository's object store
/// without leaving a reference behind.
pub fn push_objects(fixture: &Fixture, rev: Sha) {
    let bare = fixture.bare.to_str().unwrap().to_string();
    git(
        &fixture.work,
        &["push", "-q", &bare, &format!("{rev}:refs/heads/barge-tmp")],
    );
    git(&fixture.bare, &["update-ref", "-d", "refs/heads/barge-tmp"]);
}

pub fn resolve(bare: &Path, ref_name: &str) -> Option<Sha> {
    barge_git::repo::resolve_ref(bare, ref_name).ok()
}

pub fn signature(name: &str, email: &str) -> Signature {
    Signature::new(
        Identity::new(name, email),
        DateTime::parse_from_rfc3339("2024-06-01T10:00:00+00:00").unwrap(),
    )
}
