//! Current-request context supplied by the host.

use uam_common::Requester;

/// Provides the identity and address of the request being served.
///
/// The host implements this over its session/request types; the engine only
/// needs the resulting [`Requester`].
pub trait RequestContext: Send + Sync {
    fn requester(&self) -> Requester;
}

impl RequestContext for Requester {
    fn requester(&self) -> Requester {
        self.clone()
    }
}
