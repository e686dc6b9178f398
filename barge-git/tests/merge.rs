//! Merge engine and merge/revert operations against real repositories.

mod common;

use barge_git::hook::NoopHooks;
use barge_git::merge::{self, Params, Strategy};
use barge_git::service::{MergeParams, RevertParams, Service};
use barge_git::sharedrepo::SharedRepo;
use barge_git::{repo, Kind, Sha};
use common::*;

struct MergeFixture {
    fx: Fixture,
    base: Sha,
    head: Sha,
    merge_base: Sha,
}

/// `main` and `feature` diverge from the initial commit with
/// non-overlapping changes.
fn merge_fixture() -> MergeFixture {
    let fx = fixture();
    let merge_base = resolve(&fx.bare, "refs/heads/main").unwrap();

    git(&fx.work, &["checkout", "-q", "-b", "feature"]);
    let head = commit_file(&fx.work, "b.txt", "beta\n", "feature work");
    git(&fx.work, &["checkout", "-q", "main"]);
    let base = commit_file(&fx.work, "c.txt", "gamma\n", "main work");

    let bare = fx.bare.to_str().unwrap().to_string();
    git(
        &fx.work,
        &["push", "-q", &bare, "refs/heads/main", "refs/heads/feature"],
    );

    MergeFixture {
        fx,
        base,
        head,
        merge_base,
    }
}

fn merge_params(mf: &MergeFixture, ref_name: Option<&str>, strategy: Strategy) -> MergeParams {
    MergeParams {
        repo_path: mf.fx.bare.clone(),
        base_branch: "main".to_string(),
        base_sha: Sha::EMPTY,
        head_branch: "feature".to_string(),
        head_sha: Sha::EMPTY,
        head_expected_sha: Sha::EMPTY,
        message: "merge feature into main".to_string(),
        author: None,
        committer: signature("Barge", "noreply@barge.dev"),
        ref_name: ref_name.map(ToString::to_string),
        strategy,
    }
}

#[test]
fn merge_commits_with_both_parents_in_order() {
    let mf = merge_fixture();
    let service = Service::new(&mf.fx.staging, NoopHooks);

    let out = service
        .merge(&merge_params(&mf, Some("refs/heads/main"), Strategy::Merge))
        .unwrap();

    assert!(out.conflict_files.is_empty());
    assert!(out.merge_sha.is_value());
    assert_eq!(out.base_sha, mf.base);
    assert_eq!(out.head_sha, mf.head);
    assert_eq!(out.merge_base_sha, mf.merge_base);
    assert_eq!(out.commit_count, 1);
    assert_eq!(out.changed_file_count, 1);

    let commit = repo::read_commit(&mf.fx.bare, &[], &out.merge_sha.to_string()).unwrap();
    assert_eq!(commit.parents, vec![mf.base, mf.head]);
    assert_eq!(resolve(&mf.fx.bare, "refs/heads/main"), Some(out.merge_sha));
}

#[test]
fn squash_produces_the_same_tree_with_one_parent() {
    let mf = merge_fixture();
    let service = Service::new(&mf.fx.staging, NoopHooks);

    let merged = service
        .merge(&merge_params(&mf, Some("refs/heads/merged"), Strategy::Merge))
        .unwrap();
    let squashed = service
        .merge(&merge_params(&mf, Some("refs/heads/squashed"), Strategy::Squash))
        .unwrap();

    let merge_commit = repo::read_commit(&mf.fx.bare, &[], &merged.merge_sha.to_string()).unwrap();
    let squash_commit =
        repo::read_commit(&mf.fx.bare, &[], &squashed.merge_sha.to_string()).unwrap();

    // identical content, differing parent lists
    assert_eq!(merge_commit.tree, squash_commit.tree);
    assert_eq!(merge_commit.parents.len(), 2);
    assert_eq!(squash_commit.parents, vec![mf.base]);
}

#[test]
fn rebase_preserves_author_and_message_with_new_committer() {
    let mf = merge_fixture();
    let service = Service::new(&mf.fx.staging, NoopHooks);

    let out = service
        .merge(&merge_params(&mf, Some("refs/heads/rebased"), Strategy::Rebase))
        .unwrap();
    assert!(out.conflict_files.is_empty());

    let replayed = repo::read_commit(&mf.fx.bare, &[], &out.merge_sha.to_string()).unwrap();
    assert_eq!(replayed.parents, vec![mf.base]);
    assert_eq!(replayed.message.trim(), "feature work");
    // the fixture commits as author@example.com; the rebase committer is ours
    assert_eq!(replayed.author.identity.email, "author@example.com");
    assert_eq!(replayed.committer.identity.email, "noreply@barge.dev");
}

#[test]
fn rebase_of_an_empty_range_yields_the_target() {
    let mf = merge_fixture();
    let mut shared = SharedRepo::new(&mf.fx.staging, &mf.fx.bare).unwrap();
    shared.init(&[]).unwrap();

    let committer = signature("Barge", "noreply@barge.dev");
    // the merge base is already contained in the target: nothing to replay
    let outcome = merge::rebase(
        &shared,
        &Params {
            author: &committer,
            committer: &committer,
            message: "unused",
            merge_base: mf.merge_base,
            target: mf.base,
            source: mf.merge_base,
        },
    )
    .unwrap();

    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.merge_sha, mf.base);
    shared.close();
}

#[test]
fn merge_check_mode_writes_nothing() {
    let mf = merge_fixture();
    let service = Service::new(&mf.fx.staging, NoopHooks);

    let out = service.merge(&merge_params(&mf, None, Strategy::Merge)).unwrap();

    assert!(out.conflict_files.is_empty());
    assert!(out.merge_sha.is_empty());
    assert_eq!(out.commit_count, 1);
    assert_eq!(resolve(&mf.fx.bare, "refs/heads/main"), Some(mf.base));
}

#[test]
fn conflicting_merge_reports_paths_and_leaves_refs_alone() {
    let fx = fixture();

    git(&fx.work, &["checkout", "-q", "-b", "feature"]);
    commit_file(&fx.work, "a.txt", "feature version\n", "feature edit");
    git(&fx.work, &["checkout", "-q", "main"]);
    let base = commit_file(&fx.work, "a.txt", "main version\n", "main edit");

    let bare = fx.bare.to_str().unwrap().to_string();
    git(
        &fx.work,
        &["push", "-q", &bare, "refs/heads/main", "refs/heads/feature"],
    );

    let service = Service::new(&fx.staging, NoopHooks);
    let out = service
        .merge(&MergeParams {
            repo_path: fx.bare.clone(),
            base_branch: "main".to_string(),
            base_sha: Sha::EMPTY,
            head_branch: "feature".to_string(),
            head_sha: Sha::EMPTY,
            head_expected_sha: Sha::EMPTY,
            message: "doomed merge".to_string(),
            author: None,
            committer: signature("Barge", "noreply@barge.dev"),
            ref_name: Some("refs/heads/main".to_string()),
            strategy: Strategy::Merge,
        })
        .unwrap();

    assert_eq!(out.conflict_files, vec!["a.txt".to_string()]);
    assert!(out.merge_sha.is_empty());
    assert_eq!(resolve(&fx.bare, "refs/heads/main"), Some(base));
}

#[test]
fn merging_a_branch_into_itself_is_rejected() {
    let mf = merge_fixture();
    let service = Service::new(&mf.fx.staging, NoopHooks);

    let mut params = merge_params(&mf, Some("refs/heads/main"), Strategy::Merge);
    params.head_branch = "main".to_string();
    let err = service.merge(&params).unwrap_err();
    assert_eq!(err.kind(), Kind::InvalidArgument);
}

#[test]
fn head_without_new_commits_is_rejected() {
    let mf = merge_fixture();
    let service = Service::new(&mf.fx.staging, NoopHooks);

    // merging an ancestor of main brings nothing new
    let mut params = merge_params(&mf, Some("refs/heads/main"), Strategy::Merge);
    params.head_branch = String::new();
    params.head_sha = mf.merge_base;
    let err = service.merge(&params).unwrap_err();
    assert_eq!(err.kind(), Kind::InvalidArgument);
}

#[test]
fn stale_expected_head_fails_the_precondition() {
    let mf = merge_fixture();
    let service = Service::new(&mf.fx.staging, NoopHooks);

    let mut params = merge_params(&mf, Some("refs/heads/main"), Strategy::Merge);
    params.head_expected_sha = mf.merge_base; // stale: feature moved on
    let err = service.merge(&params).unwrap_err();
    assert_eq!(err.kind(), Kind::PreconditionFailed);
    assert_eq!(resolve(&mf.fx.bare, "refs/heads/main"), Some(mf.base));
}

#[test]
fn revert_removes_the_commits_changes() {
    let mf = merge_fixture();
    let service = Service::new(&mf.fx.staging, NoopHooks);

    // revert the tip of main, which added c.txt
    let out = service
        .revert(&RevertParams {
            repo_path: mf.fx.bare.clone(),
            branch_name: "main".to_string(),
            commit_sha: mf.base,
            message: "revert main work".to_string(),
            author: None,
            committer: signature("Barge", "noreply@barge.dev"),
        })
        .unwrap();

    assert!(out.conflict_files.is_empty());
    assert!(out.revert_sha.is_value());
    assert_eq!(resolve(&mf.fx.bare, "refs/heads/main"), Some(out.revert_sha));

    let commit = repo::read_commit(&mf.fx.bare, &[], &out.revert_sha.to_string()).unwrap();
    assert_eq!(commit.parents, vec![mf.base]);
    // the reverted commit's tree matches the state before it
    let before = repo::read_commit(&mf.fx.bare, &[], &mf.merge_base.to_string()).unwrap();
    assert_eq!(commit.tree, before.tree);
}
