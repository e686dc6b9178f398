//! Explicitly constructed hook registry.
//!
//! The composition root builds one registry and hands it to whatever
//! transport dispatches hook invocations (an HTTP endpoint, a CLI
//! subcommand run by a hook script). There is no ambient global
//! registration; a registry without a handler simply answers
//! `NotFound`.

use std::collections::HashMap;
use std::sync::Arc;

use barge_git::hook::{
    Environment, Output, PostReceiveInput, PreReceiveInput, ReferenceUpdate, UpdateInput,
};
use barge_git::Error;

use crate::controller::{Controller, Principal, Repo};

/// The three hook points a transport can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    PreReceive,
    Update,
    PostReceive,
}

impl HookKind {
    /// The conventional hook script name.
    pub fn name(self) -> &'static str {
        match self {
            HookKind::PreReceive => "pre-receive",
            HookKind::Update => "update",
            HookKind::PostReceive => "post-receive",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pre-receive" => Some(HookKind::PreReceive),
            "update" => Some(HookKind::Update),
            "post-receive" => Some(HookKind::PostReceive),
            _ => None,
        }
    }
}

/// One decoded hook invocation, independent of transport.
///
/// For [`HookKind::Update`], `ref_updates` carries exactly one entry.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub repo: Repo,
    pub principal: Principal,
    pub ref_updates: Vec<ReferenceUpdate>,
    pub environment: Environment,
}

type Handler = Box<dyn Fn(&Invocation) -> Result<Output, Error> + Send + Sync>;

/// Maps hook kinds to handlers.
pub struct HookRegistry {
    handlers: HashMap<HookKind, Handler>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, kind: HookKind, handler: F)
    where
        F: Fn(&Invocation) -> Result<Output, Error> + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Build a registry whose three handlers call into the controller.
    pub fn for_controller(controller: Arc<Controller>) -> Self {
        let mut registry = Self::new();

        let pre = Arc::clone(&controller);
        registry.register(HookKind::PreReceive, move |invocation| {
            pre.pre_receive(
                &invocation.repo,
                &invocation.principal,
                &PreReceiveInput {
                    ref_updates: invocation.ref_updates.clone(),
                    environment: invocation.environment.clone(),
                },
            )
        });

        let update = Arc::clone(&controller);
        registry.register(HookKind::Update, move |invocation| {
            let Some(ref_update) = invocation.ref_updates.first() else {
                return Err(Error::invalid_argument(
                    "update hook requires exactly one reference update",
                ));
            };
            update.update(
                &invocation.repo,
                &UpdateInput {
                    ref_update: ref_update.clone(),
                    environment: invocation.environment.clone(),
                },
            )
        });

        let post = controller;
        registry.register(HookKind::PostReceive, move |invocation| {
            post.post_receive(
                &invocation.repo,
                &invocation.principal,
                &PostReceiveInput {
                    ref_updates: invocation.ref_updates.clone(),
                    environment: invocation.environment.clone(),
                },
            )
        });

        registry
    }

    pub fn dispatch(&self, kind: HookKind, invocation: &Invocation) -> Result<Output, Error> {
        let Some(handler) = self.handlers.get(&kind) else {
            return Err(Error::not_found(format!(
                "no handler registered for hook {:?}",
                kind.name()
            )));
        };
        handler(invocation)
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
