//! Liveness and readiness probes.

use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::{HttpResponse, get, web};
use serde::Serialize;

/// Readiness flag shared between the server bootstrap and the probes.
///
/// Liveness is unconditional; readiness flips on once the coupon store is
/// reachable and seeded.
#[derive(Debug, Default)]
pub struct HealthState {
    ready: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[derive(Serialize)]
struct ProbeBody {
    status: &'static str,
}

#[get("/healthz/live")]
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(ProbeBody { status: "ok" })
}

#[get("/healthz/ready")]
pub async fn readiness(state: web::Data<HealthState>) -> HttpResponse {
    if state.is_ready() {
        HttpResponse::Ok().json(ProbeBody { status: "ok" })
    } else {
        HttpResponse::ServiceUnavailable().json(ProbeBody {
            status: "starting",
        })
    }
}
