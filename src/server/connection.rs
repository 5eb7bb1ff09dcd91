//! Per-connection orchestration: the handler chain, then every cleanup.
//!
//! A panic anywhere in the chain is caught here. Cleanups still run, and the
//! panic becomes an I/O error that ends only this connection.

use crate::handler::{Connection, Duplex, HandlerOutcome, RequestCleanup, RequestHandler};
use crate::shared_state::SharedRequestState;
use std::any::Any;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

/// Runs the handler chain and the cleanup phase for one connection.
///
/// Handlers are kept sorted by [`RequestHandler::order`]; equal orders keep
/// their registration order.
pub struct ConnectionHandler {
    handlers: Vec<Box<dyn RequestHandler>>,
    cleanups: Vec<Box<dyn RequestCleanup>>,
}

impl ConnectionHandler {
    pub fn new(
        mut handlers: Vec<Box<dyn RequestHandler>>,
        cleanups: Vec<Box<dyn RequestCleanup>>,
    ) -> Self {
        handlers.sort_by_key(|h| h.order());
        Self { handlers, cleanups }
    }

    /// Handler names in chain order.
    pub fn chain(&self) -> Vec<(&str, i32)> {
        self.handlers.iter().map(|h| (h.name(), h.order())).collect()
    }

    /// Serve one request from `stream`.
    ///
    /// Cleanup runs whatever the chain did, including panicking. Only I/O
    /// failures and panics are reported back, and only to end this connection.
    pub fn handle(&self, stream: &mut dyn Duplex) -> io::Result<HandlerOutcome> {
        let mut shared = SharedRequestState::new();
        let mut conn = Connection::new(stream);

        let result = catch_unwind(AssertUnwindSafe(|| self.run_chain(&mut conn, &mut shared)));

        for cleanup in &self.cleanups {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| cleanup.destroy(&mut shared))) {
                error!(panic = %panic_message(&*panic), "Request cleanup panicked");
            }
        }

        match result {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(panic = %message, "Request handler panicked");
                Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("request handler panicked: {message}"),
                ))
            }
        }
    }

    fn run_chain(
        &self,
        conn: &mut Connection<'_>,
        shared: &mut SharedRequestState,
    ) -> io::Result<HandlerOutcome> {
        for handler in &self.handlers {
            let outcome = handler.handle_request(conn, shared)?;
            match &outcome {
                HandlerOutcome::NotHandled => continue,
                HandlerOutcome::Handled => {
                    debug!(handler = handler.name(), "Request handled");
                }
                HandlerOutcome::HandledWithError(err) => {
                    warn!(handler = handler.name(), error = %err, "Request handled with error");
                }
            }
            return Ok(outcome);
        }
        Ok(HandlerOutcome::NotHandled)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Claims with `outcome`, or panics when `outcome` is `None`.
    struct Fixed {
        order: i32,
        outcome: Option<HandlerOutcome>,
        calls: Arc<AtomicUsize>,
    }

    impl RequestHandler for Fixed {
        fn handle_request(
            &self,
            _conn: &mut Connection<'_>,
            _shared: &mut SharedRequestState,
        ) -> io::Result<HandlerOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Some(outcome) => Ok(outcome.clone()),
                None => panic!("handler exploded"),
            }
        }

        fn order(&self) -> i32 {
            self.order
        }
    }

    struct Count(Arc<AtomicUsize>);

    impl RequestCleanup for Count {
        fn destroy(&self, _shared: &mut SharedRequestState) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Explode;

    impl RequestCleanup for Explode {
        fn destroy(&self, _shared: &mut SharedRequestState) {
            panic!("cleanup exploded");
        }
    }

    fn fixed(order: i32, outcome: Option<HandlerOutcome>, calls: &Arc<AtomicUsize>) -> Box<dyn RequestHandler> {
        Box::new(Fixed {
            order,
            outcome,
            calls: Arc::clone(calls),
        })
    }

    #[test]
    fn test_first_claim_stops_chain_in_order() {
        let early = Arc::new(AtomicUsize::new(0));
        let late = Arc::new(AtomicUsize::new(0));
        let handler = ConnectionHandler::new(
            vec![
                fixed(5, Some(HandlerOutcome::Handled), &late),
                fixed(1, Some(HandlerOutcome::NotHandled), &early),
                fixed(3, Some(HandlerOutcome::HandledWithError("bad".into())), &early),
            ],
            Vec::new(),
        );
        let outcome = handler.handle(&mut Cursor::new(Vec::new())).unwrap();
        assert_eq!(outcome, HandlerOutcome::HandledWithError("bad".into()));
        assert_eq!(early.load(Ordering::SeqCst), 2);
        assert_eq!(late.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panic_still_runs_every_cleanup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cleaned = Arc::new(AtomicUsize::new(0));
        let handler = ConnectionHandler::new(
            vec![fixed(0, None, &calls)],
            vec![
                Box::new(Explode),
                Box::new(Count(Arc::clone(&cleaned))),
            ],
        );
        let err = handler.handle(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(err.to_string().contains("handler exploded"));
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }
}
