use crate::handler::{Connection, HandlerOutcome, RequestHandler};
use crate::message::HttpResponse;
use crate::shared_state::{SharedRequestState, HTTP_RESPONSE};
use http::StatusCode;
use std::io;

pub const NOT_FOUND_MESSAGE: &str = "The resource you are looking for could not be found!";

/// Last link of the chain: answers 404 to whatever nobody else claimed.
#[derive(Debug, Default)]
pub struct FallbackHandler;

impl RequestHandler for FallbackHandler {
    fn handle_request(
        &self,
        conn: &mut Connection<'_>,
        shared: &mut SharedRequestState,
    ) -> io::Result<HandlerOutcome> {
        // A request that failed to parse never stored a response.
        let mut fresh = HttpResponse::new();
        let response = shared
            .get_mut::<HttpResponse>(HTTP_RESPONSE)
            .unwrap_or(&mut fresh);
        response.set_status(StatusCode::NOT_FOUND);
        response.set_content(NOT_FOUND_MESSAGE);
        conn.send(response)?;
        Ok(HandlerOutcome::Handled)
    }

    fn order(&self) -> i32 {
        i32::MAX
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
