//! Read-side plumbing against a bare repository.
//!
//! These helpers cover the lookups the mutation pipeline needs before
//! and around a reference update: resolving refs, merge bases and
//! ancestry, enumerating the objects a push makes newly reachable, and
//! reading commits (parsed with `gix-object`) for policy checks.
//!
//! Everything accepts alternate object directories so it can see
//! staged-but-not-yet-moved objects during the hook window; the list is
//! exported through `GIT_ALTERNATE_OBJECT_DIRECTORIES`, which git reads
//! natively.

use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use gix_object::CommitRef;

use crate::command::Command;
use crate::error::Error;
use crate::identity::{Identity, Signature};
use crate::sha::Sha;

/// Prefix of branch references.
pub const BRANCH_PREFIX: &str = "refs/heads/";
/// Prefix of tag references.
pub const TAG_PREFIX: &str = "refs/tags/";

/// Name of the environment variable git reads extra object directories from.
pub const ALTERNATES_ENV: &str = "GIT_ALTERNATE_OBJECT_DIRECTORIES";

pub use gix_object::Kind as ObjectKind;

/// A parsed commit as the pipeline needs it.
#[derive(Debug, Clone)]
pub struct Commit {
    pub sha: Sha,
    pub tree: Sha,
    pub parents: Vec<Sha>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

/// Files/insertions/deletions summary of a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShortStat {
    pub files: usize,
    pub additions: usize,
    pub deletions: usize,
}

/// Type and size of one object, as reported by `cat-file --batch-check`.
#[derive(Debug, Clone, Copy)]
pub struct ObjectInfo {
    pub sha: Sha,
    pub kind: gix_object::Kind,
    pub size: u64,
}

fn with_alternates(cmd: Command, alternates: &[PathBuf]) -> Command {
    if alternates.is_empty() {
        return cmd;
    }
    let joined = alternates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(":");
    cmd.env(ALTERNATES_ENV, joined)
}

/// Read a reference's current value directly from the repository.
pub fn resolve_ref(repo_path: &Path, ref_name: &str) -> Result<Sha, Error> {
    let result = Command::new("show-ref")
        .flag("--verify")
        .flag("--hash")
        .arg(ref_name)
        .run(repo_path);
    match result {
        Ok(out) => Sha::from_hex(&out.stdout_trimmed()),
        // `--verify` reports a missing ref as a fatal error
        Err(err) if err.is_exit_code(1) || err.stderr().contains("not a valid ref") => {
            Err(Error::not_found(format!("reference {ref_name:?} not found")))
        }
        Err(err) => Err(Error::git(
            format!("failed to resolve reference {ref_name:?}"),
            err,
        )),
    }
}

/// Resolve a revision expression to the commit it names, peeling tags.
///
/// The `^{commit}` suffix makes git verify the object actually exists:
/// a bare 40-hex digest would otherwise parse without any lookup.
pub fn rev_parse(repo_path: &Path, alternates: &[PathBuf], rev: &str) -> Result<Sha, Error> {
    let cmd = Command::new("rev-parse")
        .flag("--verify")
        .flag("--quiet")
        .arg(format!("{rev}^{{commit}}"));
    match with_alternates(cmd, alternates).run(repo_path) {
        Ok(out) => Sha::from_hex(&out.stdout_trimmed()),
        Err(err) if err.is_exit_code(1) => {
            Err(Error::not_found(format!("revision {rev:?} not found")))
        }
        Err(err) => Err(Error::git(format!("failed to resolve revision {rev:?}"), err)),
    }
}

/// The most recent common ancestor of two revisions.
pub fn merge_base(repo_path: &Path, alternates: &[PathBuf], a: Sha, b: Sha) -> Result<Sha, Error> {
    let cmd = Command::new("merge-base")
        .arg(a.to_string())
        .arg(b.to_string());
    match with_alternates(cmd, alternates).run(repo_path) {
        Ok(out) => Sha::from_hex(&out.stdout_trimmed()),
        Err(err) if err.is_exit_code(1) => Err(Error::not_found(format!(
            "no merge base between {a} and {b}"
        ))),
        Err(err) => Err(Error::git(
            format!("failed to find merge base of {a} and {b}"),
            err,
        )),
    }
}

/// Whether `ancestor` is reachable from `descendant`.
pub fn is_ancestor(
    repo_path: &Path,
    alternates: &[PathBuf],
    ancestor: Sha,
    descendant: Sha,
) -> Result<bool, Error> {
    let cmd = Command::new("merge-base")
        .flag("--is-ancestor")
        .arg(ancestor.to_string())
        .arg(descendant.to_string());
    match with_alternates(cmd, alternates).run(repo_path) {
        Ok(_) => Ok(true),
        Err(err) if err.is_exit_code(1) => Ok(false),
        Err(err) => Err(Error::git(
            format!("failed to check whether {ancestor} is an ancestor of {descendant}"),
            err,
        )),
    }
}

/// The full ref name HEAD points at, e.g. `refs/heads/main`.
pub fn default_branch(repo_path: &Path) -> Result<String, Error> {
    let out = Command::new("symbolic-ref")
        .arg("HEAD")
        .run(repo_path)
        .map_err(|err| Error::git("failed to read default branch", err))?;
    Ok(out.stdout_trimmed())
}

/// Diff summary between the merge base of `base` and `head`, and `head`.
pub fn diff_short_stat(
    repo_path: &Path,
    alternates: &[PathBuf],
    base: Sha,
    head: Sha,
) -> Result<ShortStat, Error> {
    let cmd = Command::new("diff")
        .flag("--shortstat")
        .arg(format!("{base}...{head}"));
    let out = with_alternates(cmd, alternates)
        .run(repo_path)
        .map_err(|err| Error::git(format!("failed to diff {base} and {head}"), err))?;
    Ok(parse_short_stat(&out.stdout_trimmed()))
}

fn parse_short_stat(line: &str) -> ShortStat {
    let mut stat = ShortStat::default();
    for part in line.split(',') {
        let part = part.trim();
        let Some(number) = part.split(' ').next().and_then(|n| n.parse::<usize>().ok()) else {
            continue;
        };
        if part.contains("file") {
            stat.files = number;
        } else if part.contains("insertion") {
            stat.additions = number;
        } else if part.contains("deletion") {
            stat.deletions = number;
        }
    }
    stat
}

/// Number of commits reachable from `head` but not from `base`.
pub fn commit_count(
    repo_path: &Path,
    alternates: &[PathBuf],
    base: Option<Sha>,
    head: Sha,
) -> Result<usize, Error> {
    let mut cmd = Command::new("rev-list").flag("--count");
    cmd = match base {
        Some(base) => cmd.arg(format!("{base}..{head}")),
        None => cmd.arg(head.to_string()),
    };
    let out = with_alternates(cmd, alternates)
        .run(repo_path)
        .map_err(|err| Error::git("failed to count commits", err))?;
    out.stdout_trimmed()
        .parse()
        .map_err(|err| Error::internal(format!("unexpected rev-list --count output: {err}")))
}

/// Commit ids reachable from `head` but not from `base`, newest first.
pub fn rev_list(
    repo_path: &Path,
    alternates: &[PathBuf],
    base: Option<Sha>,
    head: Sha,
) -> Result<Vec<Sha>, Error> {
    let mut cmd = Command::new("rev-list");
    cmd = match base {
        Some(base) => cmd.arg(format!("{base}..{head}")),
        None => cmd.arg(head.to_string()),
    };
    let out = with_alternates(cmd, alternates)
        .run(repo_path)
        .map_err(|err| Error::git("failed to list commits", err))?;
    out.stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| Sha::from_hex(&line.to_str_lossy()))
        .collect()
}

/// Enumerate objects reachable from `heads` but from no existing
/// reference, with their type and size.
///
/// This is the object set a push introduces: during pre-receive the
/// pushed refs are not updated yet, so `--not --all` subtracts exactly
/// the pre-push state.
pub fn list_new_objects(
    repo_path: &Path,
    alternates: &[PathBuf],
    heads: &[Sha],
) -> Result<Vec<ObjectInfo>, Error> {
    if heads.is_empty() {
        return Ok(Vec::new());
    }

    let mut cmd = Command::new("rev-list").flag("--objects");
    for head in heads {
        cmd = cmd.arg(head.to_string());
    }
    cmd = cmd.arg("--not").arg("--all");
    let out = with_alternates(cmd, alternates)
        .run(repo_path)
        .map_err(|err| Error::git("failed to enumerate pushed objects", err))?;

    let mut batch_input = Vec::new();
    for line in out.stdout.lines() {
        if let Some(sha) = line.fields().next() {
            batch_input.extend_from_slice(sha);
            batch_input.push(b'\n');
        }
    }
    if batch_input.is_empty() {
        return Ok(Vec::new());
    }

    let cmd = Command::new("cat-file")
        .flag("--batch-check")
        .stdin(batch_input);
    let out = with_alternates(cmd, alternates)
        .run(repo_path)
        .map_err(|err| Error::git("failed to inspect pushed objects", err))?;

    let mut objects = Vec::new();
    for line in out.stdout.lines() {
        let mut fields = line.fields();
        let (Some(sha), Some(kind), Some(size)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if kind == b"missing" {
            return Err(Error::internal(format!(
                "pushed object {} is missing from the object store",
                sha.to_str_lossy()
            )));
        }
        let kind = match kind {
            b"blob" => gix_object::Kind::Blob,
            b"tree" => gix_object::Kind::Tree,
            b"commit" => gix_object::Kind::Commit,
            b"tag" => gix_object::Kind::Tag,
            other => {
                return Err(Error::internal(format!(
                    "unexpected object type {:?} from cat-file",
                    other.to_str_lossy()
                )))
            }
        };
        objects.push(ObjectInfo {
            sha: Sha::from_hex(&sha.to_str_lossy())?,
            kind,
            size: size
                .to_str_lossy()
                .parse()
                .map_err(|err| Error::internal(format!("unexpected object size: {err}")))?,
        });
    }
    Ok(objects)
}

/// Read and parse one commit.
pub fn read_commit(repo_path: &Path, alternates: &[PathBuf], rev: &str) -> Result<Commit, Error> {
    let sha = rev_parse(repo_path, alternates, rev)?;
    let cmd = Command::new("cat-file").arg("commit").arg(sha.to_string());
    let out = with_alternates(cmd, alternates)
        .run(repo_path)
        .map_err(|err| Error::git(format!("failed to read commit {sha}"), err))?;
    parse_commit(sha, &out.stdout)
}

/// Read and parse all commits in `base..head` (or everything reachable
/// from `head` when no base is available), newest first.
pub fn read_commits(
    repo_path: &Path,
    alternates: &[PathBuf],
    base: Option<Sha>,
    head: Sha,
) -> Result<Vec<Commit>, Error> {
    rev_list(repo_path, alternates, base, head)?
        .into_iter()
        .map(|sha| read_commit(repo_path, alternates, &sha.to_string()))
        .collect()
}

/// Read a blob's content.
pub fn read_blob(repo_path: &Path, alternates: &[PathBuf], sha: Sha) -> Result<Vec<u8>, Error> {
    let cmd = Command::new("cat-file").arg("blob").arg(sha.to_string());
    let out = with_alternates(cmd, alternates)
        .run(repo_path)
        .map_err(|err| Error::git(format!("failed to read blob {sha}"), err))?;
    Ok(out.stdout)
}

fn parse_commit(sha: Sha, payload: &[u8]) -> Result<Commit, Error> {
    let commit = CommitRef::from_bytes(payload)
        .map_err(|err| Error::internal(format!("failed to parse commit {sha}: {err}")))?;
    Ok(Commit {
        sha,
        tree: commit.tree().into(),
        parents: commit.parents().map(Sha::from).collect(),
        author: convert_signature(commit.author.name, commit.author.email, commit.author.time)?,
        committer: convert_signature(
            commit.committer.name,
            commit.committer.email,
            commit.committer.time,
        )?,
        message: commit.message.to_str_lossy().into_owned(),
    })
}

fn convert_signature(
    name: &bstr::BStr,
    email: &bstr::BStr,
    time: &bstr::BStr,
) -> Result<Signature, Error> {
    let raw = time.to_str_lossy();
    let when = parse_git_date(&raw)
        .ok_or_else(|| Error::internal(format!("unparseable signature date {raw:?}")))?;
    Ok(Signature {
        identity: Identity::new(name.to_str_lossy(), email.to_str_lossy()),
        when,
    })
}

/// Parse git's raw date format, `<unix seconds> <utc offset>`.
fn parse_git_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let mut parts = raw.split_whitespace();
    let seconds: i64 = parts.next()?.parse().ok()?;
    let offset = parts.next().unwrap_or("+0000");
    let sign = if offset.starts_with('-') { -1 } else { 1 };
    let digits = offset.trim_start_matches(['+', '-']);
    let (hours, minutes) = if digits.len() == 4 {
        (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?)
    } else {
        (0, 0)
    };
    let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
    let utc = Utc.timestamp_opt(seconds, 0).single()?;
    Some(utc.with_timezone(&offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_stat_parsing() {
        assert_eq!(
            parse_short_stat(" 3 files changed, 9 insertions(+), 2 deletions(-)"),
            ShortStat {
                files: 3,
                additions: 9,
                deletions: 2
            }
        );
        assert_eq!(
            parse_short_stat(" 1 file changed, 1 deletion(-)"),
            ShortStat {
                files: 1,
                additions: 0,
                deletions: 1
            }
        );
        assert_eq!(parse_short_stat(""), ShortStat::default());
    }

    #[test]
    fn git_date_parsing() {
        let when = parse_git_date("1709287200 +0200").unwrap();
        assert_eq!(when.timestamp(), 1_709_287_200);
        assert_eq!(when.offset().local_minus_utc(), 2 * 3600);

        let when = parse_git_date("1709287200 -0330").unwrap();
        assert_eq!(when.offset().local_minus_utc(), -(3 * 3600 + 30 * 60));

        assert!(parse_git_date("garbage").is_none());
    }

    #[test]
    fn commit_payload_parsing() {
        let payload = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
parent 2d5a1e1b58b15e89d4d732252debaf550acc6e2a\n\
author Jo <jo@example.com> 1709287200 +0200\n\
committer Barge <noreply@barge.dev> 1709290800 +0000\n\n\
Add a file\n";
        let sha = Sha::from_hex("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        let commit = parse_commit(sha, payload).unwrap();
        assert_eq!(commit.parents.len(), 1);
        assert_eq!(commit.author.identity.email, "jo@example.com");
        assert_eq!(commit.committer.identity.name, "Barge");
        assert_eq!(commit.message, "Add a file\n");
        assert_eq!(commit.author.when.timestamp(), 1_709_287_200);
    }
}
