use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::StateInformationMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as KeyedRateLimiter};
use http::header::RETRY_AFTER;
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode};
use http_body::Body;
use pin_project::pin_project;
use tokio::task::JoinHandle;
use tower::{Layer, Service};
use tracing::{debug, warn};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

type ClientLimiter = KeyedRateLimiter<
    String,
    DefaultKeyedStateStore<String>,
    DefaultClock,
    StateInformationMiddleware,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

/// Per-client token bucket: `max_requests` may burst at once and one more
/// becomes available every `window / max_requests`.
#[derive(Clone)]
pub struct RateLimiter {
    limit: NonZeroU32,
    replenish_every: Duration,
    clients: Arc<ClientLimiter>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let limit = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let replenish_every = window / limit.get();
        let quota = Quota::with_period(replenish_every)
            .unwrap_or_else(|| Quota::per_second(limit))
            .allow_burst(limit);

        Self {
            limit,
            replenish_every,
            clients: Arc::new(
                KeyedRateLimiter::keyed(quota).with_middleware::<StateInformationMiddleware>(),
            ),
        }
    }

    /// Counts one request for `key` and reports whether it may proceed.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let limit = self.limit.get();

        match self.clients.check_key(&key.to_string()) {
            Ok(snapshot) => {
                let remaining = snapshot.remaining_burst_capacity();
                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining,
                    reset_after: self.replenish_every * limit.saturating_sub(remaining),
                }
            }
            Err(not_until) => RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_after: not_until.wait_time_from(self.clients.clock().now()),
            },
        }
    }

    /// Number of clients with tracked state.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets clients whose budget has fully refilled.
    pub fn prune(&self) {
        self.clients.retain_recent();
    }

    /// Prunes on a fixed interval for as long as the runtime lives.
    pub fn spawn_pruner(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                limiter.prune();
                debug!(clients = limiter.len(), "Pruned rate limit state");
            }
        })
    }
}

/// Client key taken from proxy headers; requests without one share a bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or("anonymous")
        .to_string()
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let reset_secs = decision.reset_after.as_secs()
        + u64::from(decision.reset_after.subsec_nanos() > 0);

    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_secs));
    if !decision.allowed {
        headers.insert(RETRY_AFTER, HeaderValue::from(reset_secs));
    }
}

/// Tower layer that rejects clients over their request budget with 429
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: RateLimiter,
}

impl RateLimitLayer {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RateLimitService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: Body + Default,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = RateLimitFuture<S::Future, ResBody, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let key = client_key(req.headers());
        let decision = self.limiter.check(&key);

        if !decision.allowed {
            warn!(client = %key, limit = decision.limit, "Rate limit exceeded");

            let mut response = Response::new(ResBody::default());
            *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
            apply_headers(response.headers_mut(), &decision);

            return RateLimitFuture {
                kind: FutureKind::Immediate(Some(Ok(response))),
                decision,
            };
        }

        RateLimitFuture {
            kind: FutureKind::Inner(self.inner.call(req)),
            decision,
        }
    }
}

#[pin_project]
pub struct RateLimitFuture<F, B, E> {
    #[pin]
    kind: FutureKind<F, B, E>,
    decision: RateLimitDecision,
}

#[pin_project(project = FutureKindProj)]
enum FutureKind<F, B, E> {
    Inner(#[pin] F),
    Immediate(Option<Result<Response<B>, E>>),
}

impl<F, B, E> Future for RateLimitFuture<F, B, E>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: Body,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.kind.project() {
            FutureKindProj::Inner(fut) => match fut.poll(cx) {
                Poll::Ready(Ok(mut response)) => {
                    apply_headers(response.headers_mut(), this.decision);
                    Poll::Ready(Ok(response))
                }
                other => other,
            },
            FutureKindProj::Immediate(response) => Poll::Ready(
                response
                    .take()
                    .expect("rate limit future polled after completion"),
            ),
        }
    }
}
