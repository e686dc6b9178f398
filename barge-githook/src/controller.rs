//! Hook entry points.
//!
//! One [`Controller`] serves the pre-receive, update and post-receive
//! callbacks for every repository. Pre-receive is the gate: it groups
//! the pushed reference updates, guards the default branch, evaluates
//! the enabled policy checks and composes the single veto error in a
//! fixed priority order. Post-receive only observes: reference events
//! and pull-request suggestions run as independent best-effort tasks
//! whose failures are logged and never propagate.

use std::path::PathBuf;
use std::sync::Arc;

use barge_git::hook::{
    HookClient, Output, PostReceiveInput, PreReceiveInput, ReferenceUpdate, UpdateInput,
};
use barge_git::{repo, Error, Sha};

use crate::checks::{committer, lfs, secrets, size, Violations};
use crate::refs::{self, ChangedRefs, RefKind};
use crate::settings::{PushSettings, SettingsStore};

/// The repository a hook invocation concerns.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Repo {
    pub id: i64,
    pub path: PathBuf,
    /// Default branch name without the `refs/heads/` prefix.
    pub default_branch: String,
}

impl Repo {
    pub fn default_branch_ref(&self) -> String {
        format!("{}{}", repo::BRANCH_PREFIX, self.default_branch)
    }
}

/// The authenticated user driving the push.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Principal {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Sink for reference events reported after post-receive.
///
/// Implementations deliver to the rest of the platform; failures are
/// contained by the controller's per-task error boundary.
pub trait EventReporter {
    fn branch_created(&self, repo_id: i64, ref_name: &str, sha: Sha) -> Result<(), Error>;
    fn branch_updated(
        &self,
        repo_id: i64,
        ref_name: &str,
        old: Sha,
        new: Sha,
        forced: bool,
    ) -> Result<(), Error>;
    fn branch_deleted(&self, repo_id: i64, ref_name: &str, old: Sha) -> Result<(), Error>;
    fn tag_created(&self, repo_id: i64, ref_name: &str, sha: Sha) -> Result<(), Error>;
    fn tag_updated(&self, repo_id: i64, ref_name: &str, old: Sha, new: Sha) -> Result<(), Error>;
    fn tag_deleted(&self, repo_id: i64, ref_name: &str, old: Sha) -> Result<(), Error>;
}

/// Reporter that drops every event; for tests and minimal deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl EventReporter for NoopEvents {
    fn branch_created(&self, _: i64, _: &str, _: Sha) -> Result<(), Error> {
        Ok(())
    }
    fn branch_updated(&self, _: i64, _: &str, _: Sha, _: Sha, _: bool) -> Result<(), Error> {
        Ok(())
    }
    fn branch_deleted(&self, _: i64, _: &str, _: Sha) -> Result<(), Error> {
        Ok(())
    }
    fn tag_created(&self, _: i64, _: &str, _: Sha) -> Result<(), Error> {
        Ok(())
    }
    fn tag_updated(&self, _: i64, _: &str, _: Sha, _: Sha) -> Result<(), Error> {
        Ok(())
    }
    fn tag_deleted(&self, _: i64, _: &str, _: Sha) -> Result<(), Error> {
        Ok(())
    }
}

const POLICY_BLOCK_PREFIX: &str = "Push blocked by repository policy: ";

/// The push-acceptance controller.
///
/// All dependencies arrive at construction; nothing is wired in after
/// the fact.
pub struct Controller {
    settings: Box<dyn SettingsStore + Send + Sync>,
    scanner: Box<dyn secrets::SecretScanner + Send + Sync>,
    lfs: Box<dyn lfs::LfsStore + Send + Sync>,
    events: Box<dyn EventReporter + Send + Sync>,
    /// Base URL for pull-request suggestion messages; suggestions are
    /// skipped when unset.
    pr_url_base: Option<String>,
}

impl Controller {
    pub fn new(
        settings: Box<dyn SettingsStore + Send + Sync>,
        scanner: Box<dyn secrets::SecretScanner + Send + Sync>,
        lfs: Box<dyn lfs::LfsStore + Send + Sync>,
        events: Box<dyn EventReporter + Send + Sync>,
    ) -> Self {
        Self {
            settings,
            scanner,
            lfs,
            events,
            pr_url_base: None,
        }
    }

    pub fn with_pr_suggestions(mut self, url_base: impl Into<String>) -> Self {
        self.pr_url_base = Some(url_base.into());
        self
    }

    /// The pre-receive gate.
    ///
    /// A veto is returned through [`Output::error`], not as an `Err`;
    /// `Err` means a check could not run at all.
    pub fn pre_receive(
        &self,
        repo: &Repo,
        principal: &Principal,
        input: &PreReceiveInput,
    ) -> Result<Output, Error> {
        let mut output = Output::default();
        let updates = &input.ref_updates;

        let mut forced = Vec::with_capacity(updates.len());
        for update in updates {
            forced.push(refs::is_force_push(
                &repo.path,
                &input.environment.alternate_object_dirs,
                update,
            )?);
        }
        let changed = ChangedRefs::group(updates, &forced);

        // the default branch guard runs before everything else and is
        // not subject to any setting
        if changed
            .branches
            .deleted
            .iter()
            .any(|name| *name == repo.default_branch)
        {
            output.error = Some(format!(
                "The default branch {:?} of this repository cannot be deleted.",
                repo.default_branch
            ));
            return Ok(output);
        }

        let settings = PushSettings::load(self.settings.as_ref(), repo.id)?;
        let default_branch_ref = repo.default_branch_ref();
        let mut violations = Violations::default();

        if settings.secret_scanning_enabled {
            secrets::run(
                self.scanner.as_ref(),
                &repo.path,
                updates,
                &default_branch_ref,
                &mut violations,
            )?;
            if violations.secrets.is_empty() {
                output.messages.push("No secrets found.".to_string());
            }
        }

        size::run(
            &repo.path,
            &input.environment,
            updates,
            settings.file_size_limit,
            &mut violations,
        )?;

        if settings.principal_committer_match {
            committer::run(
                &repo.path,
                &input.environment,
                updates,
                &default_branch_ref,
                &principal.email,
                &mut violations,
            )?;
        }

        if settings.git_lfs_enabled {
            lfs::run(
                self.lfs.as_ref(),
                repo.id,
                &repo.path,
                &input.environment,
                updates,
                &mut violations,
            )?;
        }

        compose_output(&mut output, &settings, &violations);
        Ok(output)
    }

    /// The per-reference update callback.
    ///
    /// All policy runs in pre-receive with the full picture of the
    /// push; this point exists for transports that need it and stays an
    /// extension seam.
    pub fn update(&self, repo: &Repo, input: &UpdateInput) -> Result<Output, Error> {
        tracing::debug!(
            repo_id = repo.id,
            ref_name = %input.ref_update.ref_name,
            "update hook invoked"
        );
        Ok(Output::default())
    }

    /// The post-receive notification point.
    ///
    /// By now every reference has moved; nothing here can or should
    /// unwind the push. Each side effect runs in its own error
    /// boundary: the main operation succeeds even if any of them fails.
    pub fn post_receive(
        &self,
        repo: &Repo,
        principal: &Principal,
        input: &PostReceiveInput,
    ) -> Result<Output, Error> {
        let mut output = Output::default();

        let side_effects: [(&str, Result<(), Error>); 2] = [
            (
                "report reference events",
                self.report_reference_events(repo, input),
            ),
            (
                "suggest pull requests",
                self.suggest_pull_requests(repo, input, &mut output),
            ),
        ];
        for (task, result) in side_effects {
            if let Err(err) = result {
                tracing::warn!(
                    repo_id = repo.id,
                    principal_id = principal.id,
                    task,
                    error = %err,
                    "post-receive side effect failed"
                );
            }
        }

        Ok(output)
    }

    fn report_reference_events(&self, repo: &Repo, input: &PostReceiveInput) -> Result<(), Error> {
        for update in &input.ref_updates {
            match refs::classify(&update.ref_name).0 {
                RefKind::Branch => self.report_branch_event(repo, input, update)?,
                RefKind::Tag => self.report_tag_event(repo, update)?,
                RefKind::Other => {}
            }
        }
        Ok(())
    }

    fn report_branch_event(
        &self,
        repo: &Repo,
        input: &PostReceiveInput,
        update: &ReferenceUpdate,
    ) -> Result<(), Error> {
        let events = self.events.as_ref();
        if update.old.is_nil() {
            return events.branch_created(repo.id, &update.ref_name, update.new);
        }
        if update.new.is_nil() {
            return events.branch_deleted(repo.id, &update.ref_name, update.old);
        }
        let forced = match refs::is_force_push(
            &repo.path,
            &input.environment.alternate_object_dirs,
            update,
        ) {
            Ok(forced) => forced,
            Err(err) => {
                // the reference has already moved; classifying the
                // update as forced is the safe direction
                tracing::warn!(ref_name = %update.ref_name, error = %err, "failed to check ancestry");
                true
            }
        };
        events.branch_updated(repo.id, &update.ref_name, update.old, update.new, forced)
    }

    fn report_tag_event(&self, repo: &Repo, update: &ReferenceUpdate) -> Result<(), Error> {
        let events = self.events.as_ref();
        if update.old.is_nil() {
            return events.tag_created(repo.id, &update.ref_name, update.new);
        }
        if update.new.is_nil() {
            return events.tag_deleted(repo.id, &update.ref_name, update.old);
        }
        events.tag_updated(repo.id, &update.ref_name, update.old, update.new)
    }

    fn suggest_pull_requests(
        &self,
        repo: &Repo,
        input: &PostReceiveInput,
        output: &mut Output,
    ) -> Result<(), Error> {
        let Some(url_base) = &self.pr_url_base else {
            return Ok(());
        };
        for update in &input.ref_updates {
            let (kind, name) = refs::classify(&update.ref_name);
            if kind != RefKind::Branch || name == repo.default_branch || update.new.is_nil() {
                continue;
            }
            output.messages.push(format!(
                "To create a pull request for {name:?}, visit {url_base}/compare/{name}"
            ));
        }
        Ok(())
    }
}

/// Compose the final output from the violation set.
///
/// Messages for every violated category are appended; the single veto
/// error names the highest-priority violated category so the outcome
/// does not depend on check evaluation order.
fn compose_output(output: &mut Output, settings: &PushSettings, violations: &Violations) {
    if !violations.secrets.is_empty() {
        output
            .messages
            .push(format!("Push contains {} secret(s):", violations.secrets.len()));
        for finding in &violations.secrets {
            output.messages.push(format!(
                "  {} in {}:{} (commit {}, author {})",
                finding.rule,
                finding.path,
                finding.line,
                short(finding.commit_sha),
                finding.author,
            ));
        }
    }

    if violations.oversize_total > 0 {
        output.messages.push(format!(
            "Push contains files exceeding the size limit of {} bytes:",
            settings.file_size_limit
        ));
        for file in &violations.oversize_files {
            output
                .messages
                .push(format!("  {} ({} bytes)", short(file.sha), file.size));
        }
        let unreported = violations.oversize_total - violations.oversize_files.len();
        if unreported > 0 {
            output.messages.push(format!("  ... and {unreported} more"));
        }
    }

    if violations.committer_mismatch_total > 0 {
        output
            .messages
            .push("Push contains commits with a foreign committer email:".to_string());
        for mismatch in &violations.committer_mismatches {
            output.messages.push(format!(
                "  {} committed by {}",
                short(mismatch.commit_sha),
                mismatch.committer_email
            ));
        }
        let unreported =
            violations.committer_mismatch_total - violations.committer_mismatches.len();
        if unreported > 0 {
            output.messages.push(format!("  ... and {unreported} more"));
        }
    }

    if !violations.missing_lfs_objects.is_empty() {
        output
            .messages
            .push("Push references LFS objects that were never uploaded:".to_string());
        for oid in &violations.missing_lfs_objects {
            output.messages.push(format!("  {oid}"));
        }
        output
            .messages
            .push("hint: run `git lfs push --all` before pushing again.".to_string());
    }

    // deterministic veto priority: secrets, file size, committer
    // mismatch, LFS (the default-branch guard already returned earlier)
    output.error = if !violations.secrets.is_empty() {
        Some(format!("{POLICY_BLOCK_PREFIX}secrets detected."))
    } else if violations.oversize_total > 0 {
        Some(format!("{POLICY_BLOCK_PREFIX}file size limit exceeded."))
    } else if violations.committer_mismatch_total > 0 {
        Some(format!("{POLICY_BLOCK_PREFIX}committer mismatch."))
    } else if !violations.missing_lfs_objects.is_empty() {
        Some(format!("{POLICY_BLOCK_PREFIX}unknown Git LFS objects."))
    } else {
        None
    };
}

fn short(sha: Sha) -> String {
    let hex = sha.to_string();
    hex.chars().take(12).collect()
}

/// In-process hook client: routes the reference updater's hook calls
/// straight into a controller, no process boundary involved.
pub struct InProcessHooks {
    controller: Arc<Controller>,
    repo: Repo,
    principal: Principal,
}

impl InProcessHooks {
    pub fn new(controller: Arc<Controller>, repo: Repo, principal: Principal) -> Self {
        Self {
            controller,
            repo,
            principal,
        }
    }
}

impl HookClient for InProcessHooks {
    fn pre_receive(&self, input: PreReceiveInput) -> Result<Output, Error> {
        self.controller
            .pre_receive(&self.repo, &self.principal, &input)
    }

    fn update(&self, input: UpdateInput) -> Result<Output, Error> {
        self.controller.update(&self.repo, &input)
    }

    fn post_receive(&self, input: PostReceiveInput) -> Result<Output, Error> {
        self.controller
            .post_receive(&self.repo, &self.principal, &input)
    }
}
