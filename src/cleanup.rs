use crate::handler::RequestCleanup;
use crate::message::HttpRequest;
use crate::shared_state::{SharedRequestState, HTTP_REQUEST};
use tracing::debug;

/// Releases the upload streams of a finished request.
///
/// Safe to run more than once: closing a closed upload does nothing.
#[derive(Debug, Default)]
pub struct RequestDestroyHandler;

impl RequestCleanup for RequestDestroyHandler {
    fn destroy(&self, shared: &mut SharedRequestState) {
        let Some(request) = shared.get_mut::<HttpRequest>(HTTP_REQUEST) else {
            return;
        };
        let mut closed = 0;
        for file in &mut request.multipart_files {
            if file.close() {
                closed += 1;
            }
        }
        if closed > 0 {
            debug!(closed, "Closed upload streams");
        }
    }
}
