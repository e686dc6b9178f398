//! Environment variables carrying hook state across a process boundary.
//!
//! Out-of-process hooks receive the acting user's identity, the
//! repository identifier and a request correlation id through the
//! environment. Staged object directories travel in
//! `GIT_ALTERNATE_OBJECT_DIRECTORIES` so every git subprocess spawned
//! by a hook can see quarantined objects.

use super::Environment;

pub const ENV_ACTOR_ID: &str = "BARGE_HOOK_ACTOR_ID";
pub const ENV_ACTOR_NAME: &str = "BARGE_HOOK_ACTOR_NAME";
pub const ENV_ACTOR_EMAIL: &str = "BARGE_HOOK_ACTOR_EMAIL";
pub const ENV_REPO_ID: &str = "BARGE_HOOK_REPO_ID";
pub const ENV_REQUEST_ID: &str = "BARGE_HOOK_REQUEST_ID";
pub const ENV_ALTERNATE_OBJECT_DIRS: &str = "GIT_ALTERNATE_OBJECT_DIRECTORIES";

/// Builder for the hook execution environment.
#[derive(Debug, Clone, Default)]
pub struct HookEnvironment {
    actor_id: Option<String>,
    actor_name: Option<String>,
    actor_email: Option<String>,
    repo_id: Option<String>,
    request_id: Option<String>,
    additional: Vec<(String, String)>,
}

impl HookEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        self.actor_id = Some(id.into());
        self.actor_name = Some(name.into());
        self.actor_email = Some(email.into());
        self
    }

    pub fn with_repo_id(mut self, repo_id: impl Into<String>) -> Self {
        self.repo_id = Some(repo_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional.push((key.into(), value.into()));
        self
    }

    /// Assemble the variables for one hook invocation, including the
    /// alternate object directories of the given environment.
    pub fn build(&self, environment: &Environment) -> Vec<(String, String)> {
        let mut vars = Vec::new();
        if let Some(id) = &self.actor_id {
            vars.push((ENV_ACTOR_ID.to_string(), id.clone()));
        }
        if let Some(name) = &self.actor_name {
            vars.push((ENV_ACTOR_NAME.to_string(), name.clone()));
        }
        if let Some(email) = &self.actor_email {
            vars.push((ENV_ACTOR_EMAIL.to_string(), email.clone()));
        }
        if let Some(repo_id) = &self.repo_id {
            vars.push((ENV_REPO_ID.to_string(), repo_id.clone()));
        }
        if let Some(request_id) = &self.request_id {
            vars.push((ENV_REQUEST_ID.to_string(), request_id.clone()));
        }
        if !environment.alternate_object_dirs.is_empty() {
            let joined = environment
                .alternate_object_dirs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(":");
            vars.push((ENV_ALTERNATE_OBJECT_DIRS.to_string(), joined));
        }
        vars.extend(self.additional.iter().cloned());
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lookup<'a>(vars: &'a [(String, String)], key: &str) -> Option<&'a str> {
        vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn builds_actor_and_repo_vars() {
        let vars = HookEnvironment::new()
            .with_actor("42", "Jo", "jo@example.com")
            .with_repo_id("7")
            .with_request_id("req-1")
            .build(&Environment::default());

        assert_eq!(lookup(&vars, ENV_ACTOR_ID), Some("42"));
        assert_eq!(lookup(&vars, ENV_ACTOR_EMAIL), Some("jo@example.com"));
        assert_eq!(lookup(&vars, ENV_REPO_ID), Some("7"));
        assert_eq!(lookup(&vars, ENV_REQUEST_ID), Some("req-1"));
        assert_eq!(lookup(&vars, ENV_ALTERNATE_OBJECT_DIRS), None);
    }

    #[test]
    fn joins_alternate_dirs() {
        let environment = Environment {
            alternate_object_dirs: vec![PathBuf::from("/a/objects"), PathBuf::from("/b/objects")],
        };
        let vars = HookEnvironment::new().build(&environment);
        assert_eq!(
            lookup(&vars, ENV_ALTERNATE_OBJECT_DIRS),
            Some("/a/objects:/b/objects")
        );
    }

    #[test]
    fn additional_vars_pass_through() {
        let vars = HookEnvironment::new()
            .with_var("EXTRA", "value")
            .build(&Environment::default());
        assert_eq!(lookup(&vars, "EXTRA"), Some("value"));
    }
}
