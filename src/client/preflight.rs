//! Rate-limited sending shared by every request the clients make.
//!
//! Each attempt waits on the limiter first. A server-reported rate violation
//! waits out one per-minute period and resends once; a second violation is
//! returned as [`Error::RequestFailed`](crate::Error::RequestFailed).

use super::core::ClientCore;
use crate::dispatch::{CallState, CallTracker};
use crate::pipeline::Outcome;
use crate::transport::{
    BlockingHttpExecutor, BlockingHttpResponse, HttpExecutor, HttpRequest, HttpResponse,
};
use crate::Result;
use tracing::{info, warn};

pub(crate) async fn send(
    core: &ClientCore,
    transport: &dyn HttpExecutor,
    request: &HttpRequest,
    mut call: Option<&mut CallTracker>,
) -> Result<HttpResponse> {
    let mut retried = false;
    loop {
        core.limiter.acquire().await?;
        advance(&mut call, CallState::RateAdmitted);
        advance(&mut call, CallState::InFlight);

        let resp = transport.execute(request.clone()).await?;
        if resp.is_success() {
            return Ok(resp);
        }
        let status = resp.status;
        let body = resp.bytes().await?;
        match Outcome::classify(status, &body) {
            Outcome::RateViolation if !retried => {
                warn!(url = %request.url, "Space-Track reported a query rate limit violation");
                retried = true;
                core.limiter.back_off().await;
            }
            outcome => return Err(failure(outcome, status)),
        }
    }
}

pub(crate) fn send_blocking(
    core: &ClientCore,
    transport: &dyn BlockingHttpExecutor,
    request: &HttpRequest,
    mut call: Option<&mut CallTracker>,
) -> Result<BlockingHttpResponse> {
    let mut retried = false;
    loop {
        core.limiter.acquire_blocking()?;
        advance(&mut call, CallState::RateAdmitted);
        advance(&mut call, CallState::InFlight);

        let resp = transport.execute(request.clone())?;
        if resp.is_success() {
            return Ok(resp);
        }
        let status = resp.status;
        let body = resp.bytes()?;
        match Outcome::classify(status, &body) {
            Outcome::RateViolation if !retried => {
                warn!(url = %request.url, "Space-Track reported a query rate limit violation");
                retried = true;
                core.limiter.back_off_blocking();
            }
            outcome => return Err(failure(outcome, status)),
        }
    }
}

fn advance(call: &mut Option<&mut CallTracker>, next: CallState) {
    if let Some(call) = call.as_deref_mut() {
        call.advance(next);
    }
}

fn failure(outcome: Outcome, status: u16) -> crate::Error {
    info!(http_status = status, "Space-Track request failed");
    outcome.into_error().unwrap_or(crate::Error::RequestFailed {
        status,
        message: String::new(),
    })
}
