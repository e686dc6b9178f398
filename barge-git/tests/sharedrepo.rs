//! Staged write area behavior against real repositories.

mod common;

use barge_git::hook::{
    HookClient, NoopHooks, Output, PostReceiveInput, PreReceiveInput, RefUpdater, UpdateInput,
};
use barge_git::sharedrepo::{self, SharedRepo, FILE_MODE};
use barge_git::{repo, Error, Kind, Sha};
use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn alternates_make_target_objects_visible() {
    let fx = fixture();
    let head = resolve(&fx.bare, "refs/heads/main").unwrap();

    let mut shared = SharedRepo::new(&fx.staging, &fx.bare).unwrap();
    shared.init(&[]).unwrap();

    // the target's commit resolves inside the staging area without copying
    let seen = repo::rev_parse(shared.directory(), &[], &head.to_string()).unwrap();
    assert_eq!(seen, head);

    let alternates = std::fs::read_to_string(shared.directory().join("objects/info/alternates"))
        .unwrap();
    assert!(alternates.contains(&fx.bare.join("objects").display().to_string()));

    shared.close();
}

#[test]
fn staged_objects_stay_invisible_until_moved() {
    let fx = fixture();
    let mut shared = SharedRepo::new(&fx.staging, &fx.bare).unwrap();
    shared.init(&[]).unwrap();

    let blob = shared.write_git_object(b"staged content\n").unwrap();

    // visible in the staging area, not in the target
    assert!(repo::read_blob(shared.directory(), &[], blob).is_ok());
    assert!(repo::read_blob(&fx.bare, &[], blob).is_err());

    shared.move_objects().unwrap();
    let content = repo::read_blob(&fx.bare, &[], blob).unwrap();
    assert_eq!(content, b"staged content\n");

    shared.close();
}

#[test]
fn close_after_move_objects_does_not_resurrect() {
    let fx = fixture();
    let mut shared = SharedRepo::new(&fx.staging, &fx.bare).unwrap();
    shared.init(&[]).unwrap();
    shared.write_git_object(b"x\n").unwrap();
    shared.move_objects().unwrap();

    let dir = shared.directory().to_path_buf();
    shared.close();
    assert!(!dir.exists());
    shared.close();
    assert!(!dir.exists());
}

#[test]
fn builds_a_commit_on_top_of_the_target_tip() {
    let fx = fixture();
    let head = resolve(&fx.bare, "refs/heads/main").unwrap();

    let mut shared = SharedRepo::new(&fx.staging, &fx.bare).unwrap();
    shared.init(&[]).unwrap();
    shared.set_index(head).unwrap();
    shared
        .create_file(head, "docs/new.txt", FILE_MODE, b"fresh\n")
        .unwrap();
    let tree = shared.write_tree().unwrap();

    let author = signature("Jo", "jo@example.com");
    let committer = signature("Barge", "noreply@barge.dev");
    let commit = shared
        .commit_tree(&author, &committer, tree, "add docs", &[head])
        .unwrap();

    let parsed = shared.read_commit(commit).unwrap();
    assert_eq!(parsed.parents, vec![head]);
    assert_eq!(parsed.tree, tree);
    assert_eq!(parsed.message.trim(), "add docs");
    assert_eq!(parsed.author.identity.email, "jo@example.com");
    assert_eq!(parsed.committer.identity.name, "Barge");

    shared.move_objects().unwrap();
    assert!(repo::read_commit(&fx.bare, &[], &commit.to_string()).is_ok());
    shared.close();
}

#[test]
fn create_file_rejects_existing_paths() {
    let fx = fixture();
    let head = resolve(&fx.bare, "refs/heads/main").unwrap();
    let mut shared = SharedRepo::new(&fx.staging, &fx.bare).unwrap();
    shared.init(&[]).unwrap();
    shared.set_index(head).unwrap();

    let err = shared
        .create_file(head, "a.txt", FILE_MODE, b"clobber\n")
        .unwrap_err();
    assert_eq!(err.kind(), Kind::Conflict);
    shared.close();
}

#[test]
fn update_file_verifies_the_expected_blob() {
    let fx = fixture();
    let head = resolve(&fx.bare, "refs/heads/main").unwrap();
    let mut shared = SharedRepo::new(&fx.staging, &fx.bare).unwrap();
    shared.init(&[]).unwrap();
    shared.set_index(head).unwrap();

    let bogus = Sha::from_hex(&"9".repeat(40)).unwrap();
    let err = shared
        .update_file(head, "a.txt", bogus, FILE_MODE, b"update\n")
        .unwrap_err();
    assert_eq!(err.kind(), Kind::InvalidArgument);

    shared
        .update_file(head, "a.txt", Sha::EMPTY, FILE_MODE, b"update\n")
        .unwrap();
    shared.close();
}

#[test]
fn delete_file_requires_presence_in_index() {
    let fx = fixture();
    let head = resolve(&fx.bare, "refs/heads/main").unwrap();
    let mut shared = SharedRepo::new(&fx.staging, &fx.bare).unwrap();
    shared.init(&[]).unwrap();
    shared.set_index(head).unwrap();

    let err = shared.delete_file("missing.txt").unwrap_err();
    assert_eq!(err.kind(), Kind::NotFound);

    shared.delete_file("a.txt").unwrap();
    assert!(shared.ls_files(&["a.txt"]).unwrap().is_empty());
    shared.close();
}

/// Hook client that counts invocations.
#[derive(Default)]
struct CountingHooks {
    pre: AtomicUsize,
    post: AtomicUsize,
}

impl HookClient for CountingHooks {
    fn pre_receive(&self, _input: PreReceiveInput) -> Result<Output, Error> {
        self.pre.fetch_add(1, Ordering::SeqCst);
        Ok(Output::default())
    }

    fn update(&self, _input: UpdateInput) -> Result<Output, Error> {
        Ok(Output::default())
    }

    fn post_receive(&self, _input: PostReceiveInput) -> Result<Output, Error> {
        self.post.fetch_add(1, Ordering::SeqCst);
        Ok(Output::default())
    }
}

#[test]
fn run_cleans_up_when_the_build_step_fails() {
    let fx = fixture();
    let hooks = CountingHooks::default();
    let mut updater = RefUpdater::new(&hooks, &fx.bare, "refs/heads/main").unwrap();

    let result = sharedrepo::run(&mut updater, &fx.staging, &fx.bare, |_shared, _updater| {
        Err(Error::internal("build step exploded"))
    });
    assert!(result.is_err());

    // no hooks fired, no staging directory left behind
    assert_eq!(hooks.pre.load(Ordering::SeqCst), 0);
    assert_eq!(hooks.post.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read_dir(&fx.staging).unwrap().count(), 0);
}

#[test]
fn run_without_initialized_updater_updates_nothing() {
    let fx = fixture();
    let old = resolve(&fx.bare, "refs/heads/main").unwrap();
    let hooks = CountingHooks::default();
    let mut updater = RefUpdater::new(&hooks, &fx.bare, "refs/heads/main").unwrap();

    sharedrepo::run(&mut updater, &fx.staging, &fx.bare, |_shared, _updater| {
        // conflicts reported as data: the updater is left untouched
        Ok(())
    })
    .unwrap();

    assert_eq!(hooks.pre.load(Ordering::SeqCst), 0);
    assert_eq!(resolve(&fx.bare, "refs/heads/main"), Some(old));
}

#[test]
fn run_drives_the_full_sequence() {
    let fx = fixture();
    let old = resolve(&fx.bare, "refs/heads/main").unwrap();
    let hooks = CountingHooks::default();
    let mut updater = RefUpdater::new(&hooks, &fx.bare, "refs/heads/main").unwrap();

    let author = signature("Jo", "jo@example.com");
    let committer = author.clone();
    let mut produced = Sha::EMPTY;
    sharedrepo::run(&mut updater, &fx.staging, &fx.bare, |shared, updater| {
        shared.set_index(old).unwrap();
        shared
            .create_file(old, "from-staging.txt", FILE_MODE, b"hello\n")
            .unwrap();
        let tree = shared.write_tree()?;
        produced = shared.commit_tree(&author, &committer, tree, "staged commit", &[old])?;
        updater.init(old, produced)
    })
    .unwrap();

    assert_eq!(hooks.pre.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.post.load(Ordering::SeqCst), 1);
    assert_eq!(resolve(&fx.bare, "refs/heads/main"), Some(produced));
    // the produced commit now lives in the target repository
    assert!(repo::read_commit(&fx.bare, &[], &produced.to_string()).is_ok());
    // and the staging directory is gone
    assert_eq!(std::fs::read_dir(&fx.staging).unwrap().count(), 0);
}
