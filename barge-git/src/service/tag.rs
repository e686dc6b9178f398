//! Tag creation and deletion.

use std::path::PathBuf;

use super::Service;
use crate::error::Error;
use crate::hook::{HookClient, RefUpdater};
use crate::identity::Signature;
use crate::repo;
use crate::sha::Sha;
use crate::sharedrepo;

#[derive(Debug, Clone)]
pub struct CreateTagParams {
    pub repo_path: PathBuf,
    /// Tag name without the `refs/tags/` prefix.
    pub tag_name: String,
    /// Revision the tag should point at.
    pub target: String,
    /// Non-empty message makes this an annotated tag object.
    pub message: String,
    pub tagger: Signature,
}

#[derive(Debug, Clone)]
pub struct DeleteTagParams {
    pub repo_path: PathBuf,
    pub tag_name: String,
}

#[derive(Debug, Clone)]
pub struct Tag {
    pub name: String,
    /// The tag object for annotated tags, the target commit otherwise.
    pub sha: Sha,
    pub target: Sha,
    pub is_annotated: bool,
}

fn validate_tag_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::invalid_argument("tag name must not be empty"));
    }
    if name.starts_with("refs/") {
        return Err(Error::invalid_argument(
            "tag name must not carry a refs/ prefix",
        ));
    }
    Ok(())
}

impl<C: HookClient> Service<C> {
    /// Create a lightweight or annotated tag.
    ///
    /// An annotated tag's object is built in a staged write area and
    /// only migrated once the pre-receive gate has passed.
    pub fn create_tag(&self, params: &CreateTagParams) -> Result<Tag, Error> {
        validate_tag_name(&params.tag_name)?;
        let ref_name = format!("{}{}", repo::TAG_PREFIX, params.tag_name);

        let target = repo::rev_parse(&params.repo_path, &[], &params.target).map_err(|err| {
            if err.is_not_found() {
                Error::not_found(format!("target revision {:?} not found", params.target))
            } else {
                err
            }
        })?;

        match repo::resolve_ref(&params.repo_path, &ref_name) {
            Ok(_) => {
                return Err(Error::conflict(format!(
                    "tag {:?} already exists",
                    params.tag_name
                )))
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        if params.message.trim().is_empty() {
            // lightweight: nothing to stage, the commit already exists
            let mut updater = RefUpdater::new(self.hooks(), &params.repo_path, ref_name.as_str())?;
            updater.run(Sha::nil(), target, &[])?;
            return Ok(Tag {
                name: params.tag_name.clone(),
                sha: target,
                target,
                is_annotated: false,
            });
        }

        let mut updater = RefUpdater::new(self.hooks(), &params.repo_path, ref_name.as_str())?;
        let mut tag_sha = Sha::EMPTY;
        sharedrepo::run(
            &mut updater,
            self.staging_root(),
            &params.repo_path,
            |shared, updater| {
                tag_sha =
                    shared.write_tag(&params.tag_name, target, &params.tagger, &params.message)?;
                updater.init(Sha::nil(), tag_sha)
            },
        )?;

        Ok(Tag {
            name: params.tag_name.clone(),
            sha: tag_sha,
            target,
            is_annotated: true,
        })
    }

    /// Delete a tag, compare-and-swapped against its current value.
    pub fn delete_tag(&self, params: &DeleteTagParams) -> Result<(), Error> {
        validate_tag_name(&params.tag_name)?;
        let ref_name = format!("{}{}", repo::TAG_PREFIX, params.tag_name);

        let current = repo::resolve_ref(&params.repo_path, &ref_name).map_err(|err| {
            if err.is_not_found() {
                Error::not_found(format!("tag {:?} not found", params.tag_name))
            } else {
                err
            }
        })?;

        let mut updater = RefUpdater::new(self.hooks(), &params.repo_path, ref_name.as_str())?;
        updater.run(current, Sha::nil(), &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_name_validation() {
        assert!(validate_tag_name("v1.0.0").is_ok());
        assert!(validate_tag_name("").is_err());
        assert!(validate_tag_name("refs/tags/v1").is_err());
    }
}
