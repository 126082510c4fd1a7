use std::collections::HashMap;
use std::future::{ready, Ready};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use futures::future::LocalBoxFuture;

use crate::handlers::error::HttpErrorResponse;

const SHARD_COUNT: usize = 16;

#[derive(Debug)]
struct LimiterEntry {
    count: u64,
    window_start: Instant,
}

struct LimiterShard {
    map: HashMap<IpAddr, LimiterEntry>,
    last_clear: Instant,
}

impl LimiterShard {
    fn new() -> Self {
        LimiterShard {
            map: HashMap::new(),
            last_clear: Instant::now(),
        }
    }
}

/// Fixed-window request limiter keyed by client IP. Clones share their counters, so one
/// `Limiter` wrapped around several routes enforces a single budget across them.
#[derive(Clone)]
pub struct Limiter {
    max_per_period: u64,
    period: Duration,
    clear_frequency: Duration,
    shards: Arc<[Mutex<LimiterShard>; SHARD_COUNT]>,
}

impl Limiter {
    /// A clear frequency shorter than the period is raised to the period.
    pub fn new(max_per_period: u64, period: Duration, clear_frequency: Duration) -> Self {
        Limiter {
            max_per_period,
            period,
            clear_frequency: clear_frequency.max(period),
            shards: Arc::new(std::array::from_fn(|_| Mutex::new(LimiterShard::new()))),
        }
    }

    /// Counts a request from `ip`. Returns false once the window's budget is spent.
    fn admit(&self, ip: IpAddr) -> bool {
        let final_octet = match ip {
            IpAddr::V4(ip) => ip.octets()[3],
            IpAddr::V6(ip) => ip.octets()[15],
        };

        let shard = &self.shards[(final_octet as usize) % SHARD_COUNT];
        let Ok(mut shard) = shard.lock() else {
            log::error!("Rate limiter lock was poisoned");
            return true;
        };

        let now = Instant::now();

        if now.duration_since(shard.last_clear) > self.clear_frequency {
            let period = self.period;
            shard
                .map
                .retain(|_, entry| now.duration_since(entry.window_start) <= period);
            shard.map.shrink_to_fit();
            shard.last_clear = now;
        }

        let entry = shard.map.entry(ip).or_insert(LimiterEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) > self.period {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= self.max_per_period {
            return false;
        }

        entry.count += 1;
        true
    }
}

impl<S, B> Transform<S, ServiceRequest> for Limiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = LimiterMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct LimiterMiddleware<S> {
    service: S,
    limiter: Limiter,
}

impl<S, B> Service<ServiceRequest> for LimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let ip = client_ip(&req);

        if !self.limiter.admit(ip) {
            return Box::pin(async move {
                Err(HttpErrorResponse::TooManyRequested(String::from(
                    "Too many requests. Please try again later.",
                ))
                .into())
            });
        }

        let req_fut = self.service.call(req);
        Box::pin(req_fut)
    }
}

fn client_ip(req: &ServiceRequest) -> IpAddr {
    if cfg!(test) {
        if let Some(test_ip) = req
            .headers()
            .get("test-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.parse::<IpAddr>().ok())
        {
            return test_ip;
        }
    }

    // peer_addr() is only missing for requests built in tests
    req.peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};
    use tokio::time::sleep;

    #[actix_web::test]
    async fn test_limiter() {
        let limiter = Limiter::new(2, Duration::from_millis(50), Duration::from_secs(60));

        let app =
            test::init_service(App::new().wrap(limiter).service(
                web::resource("/").to(|| async { HttpResponse::Ok().body("Hello world") }),
            ))
            .await;

        let req = test::TestRequest::default().to_request();
        assert!(app.call(req).await.is_ok());

        let req = test::TestRequest::default().to_request();
        assert!(app.call(req).await.is_ok());

        let req = test::TestRequest::default().to_request();
        assert!(app.call(req).await.is_err());

        // Other IPs keep their own budget
        let req = test::TestRequest::default()
            .append_header(("test-ip", "192.167.0.5"))
            .to_request();
        assert!(app.call(req).await.is_ok());

        sleep(Duration::from_millis(60)).await;

        let req = test::TestRequest::default().to_request();
        assert!(app.call(req).await.is_ok());

        let req = test::TestRequest::default().to_request();
        assert!(app.call(req).await.is_ok());

        let req = test::TestRequest::default().to_request();
        assert!(app.call(req).await.is_err());
    }

    #[test]
    fn test_shared_shard_keeps_separate_counts() {
        let limiter = Limiter::new(1, Duration::from_secs(60), Duration::from_secs(60));
        let blocked = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let neighbour = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 17));

        assert!(limiter.admit(blocked));
        assert!(!limiter.admit(blocked));

        // Same shard as `blocked`
        assert!(limiter.admit(neighbour));
        assert!(!limiter.admit(blocked));
    }
}
