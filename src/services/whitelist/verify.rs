//! Dispatch of the caller-supplied verification callback.
//!
//! The callback receives a [`Verified`] continuation that it may resolve right away or later
//! from another task. The first resolution is authoritative; later ones are ignored.
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;
use tower::BoxError;

use super::identity::Identity;
use super::outcome::{AuthOutcome, FailInfo, VerifyError};
use super::request::AuthRequest;

/// Result of the synchronous part of a callback. `Err` is reported as an internal error.
pub type VerifyResult = Result<(), BoxError>;

type RequestAwareFn = dyn Fn(&AuthRequest, Identity, Verified) -> VerifyResult + Send + Sync;
type RequestUnawareFn = dyn Fn(Identity, Verified) -> VerifyResult + Send + Sync;

/// Verification callback, with its calling convention fixed at construction.
#[derive(Clone)]
pub enum Verify {
    RequestAware(Arc<RequestAwareFn>),
    RequestUnaware(Arc<RequestUnawareFn>),
}

impl Verify {
    pub fn request_aware<F>(f: F) -> Self
    where
        F: Fn(&AuthRequest, Identity, Verified) -> VerifyResult + Send + Sync + 'static,
    {
        Self::RequestAware(Arc::new(f))
    }

    pub fn request_unaware<F>(f: F) -> Self
    where
        F: Fn(Identity, Verified) -> VerifyResult + Send + Sync + 'static,
    {
        Self::RequestUnaware(Arc::new(f))
    }

    pub fn passes_request(&self) -> bool {
        matches!(self, Self::RequestAware(_))
    }
}

impl fmt::Debug for Verify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestAware(_) => f.write_str("Verify::RequestAware"),
            Self::RequestUnaware(_) => f.write_str("Verify::RequestUnaware"),
        }
    }
}

#[derive(Debug)]
enum Verdict {
    Error(BoxError),
    Fail(Option<Value>),
    Success(Identity, Option<Value>),
}

/// Single-shot continuation handed to the verification callback.
#[derive(Clone)]
pub struct Verified {
    slot: Arc<Mutex<Option<oneshot::Sender<Verdict>>>>,
}

impl Verified {
    fn channel() -> (Self, oneshot::Receiver<Verdict>) {
        let (tx, rx) = oneshot::channel();
        let verified = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (verified, rx)
    }

    /// Resolve the attempt.
    ///
    /// A cause reports an error; otherwise an absent user fails with `info`, and a present user
    /// succeeds.
    pub fn done(&self, cause: Option<BoxError>, user: Option<Identity>, info: Option<Value>) {
        let verdict = match (cause, user) {
            (Some(err), _) => Verdict::Error(err),
            (None, None) => Verdict::Fail(info),
            (None, Some(user)) => Verdict::Success(user, info),
        };
        self.resolve(verdict);
    }

    pub fn success(&self, user: Identity, info: Option<Value>) {
        self.done(None, Some(user), info);
    }

    pub fn fail(&self, info: Option<Value>) {
        self.done(None, None, info);
    }

    pub fn error(&self, cause: impl Into<BoxError>) {
        self.done(Some(cause.into()), None, None);
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.lock().map_or(true, |slot| slot.is_none())
    }

    fn resolve(&self, verdict: Verdict) {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => {
                // receiver gone means the attempt was cancelled by the host
                let _ = tx.send(verdict);
            }
            None => tracing::debug!("verification already resolved; ignoring"),
        }
    }
}

impl fmt::Debug for Verified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verified")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Invoke `verify` with the resolved identity and wait for the continuation.
pub async fn dispatch(verify: &Verify, req: &AuthRequest, identity: Identity) -> AuthOutcome {
    let (verified, rx) = Verified::channel();
    let handle = verified.clone();

    let called = panic::catch_unwind(AssertUnwindSafe(|| match verify {
        Verify::RequestAware(f) => f(req, identity, verified),
        Verify::RequestUnaware(f) => f(identity, verified),
    }));

    match called {
        Ok(Ok(())) => {}
        Ok(Err(err)) => handle.resolve(Verdict::Error(err)),
        Err(payload) => {
            let message = panic_message(&*payload);
            tracing::error!(panic = %message, "verification callback panicked");
            if !handle.is_resolved() {
                return AuthOutcome::Error(VerifyError::Panicked(message));
            }
        }
    }
    drop(handle);

    match rx.await {
        Ok(Verdict::Error(err)) => AuthOutcome::Error(VerifyError::Callback(err)),
        Ok(Verdict::Fail(info)) => AuthOutcome::Fail(FailInfo::Verifier(info)),
        Ok(Verdict::Success(identity, info)) => AuthOutcome::Success { identity, info },
        Err(_) => AuthOutcome::Error(VerifyError::Abandoned),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
