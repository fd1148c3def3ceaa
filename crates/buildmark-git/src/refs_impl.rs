//! gix-backed rev-parse.

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::GitOid;

/// Convert a `gix::oid` to a `GitOid`.
pub(crate) fn from_gix_oid(oid: &gix::oid) -> Result<GitOid, GitError> {
    Ok(GitOid::from_slice(oid.as_bytes())?)
}

/// Convert a `GitOid` to a `gix::ObjectId`.
pub(crate) fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::from_bytes_or_panic(oid.as_bytes())
}

pub fn rev_parse_opt(repo: &GixRepo, spec: &str) -> Result<Option<GitOid>, GitError> {
    match repo.repo.rev_parse_single(spec) {
        Ok(id) => from_gix_oid(id.as_ref()).map(Some),
        Err(e) => {
            // gix rev_parse errors are all resolution failures: malformed
            // specs, missing refs, unborn HEAD. All map to None.
            tracing::trace!(spec, error = %e, "rev-parse did not resolve");
            Ok(None)
        }
    }
}
