//! Health checks for the status board.
//!
//! The store itself is always probed; configured HTTP targets are
//! probed with a bounded timeout so a hung dependency cannot stall
//! the pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bumphub_core::config::HealthTarget;
use bumphub_core::types::HealthCheck;
use bumphub_store::BumpStore;

/// Run all checks: store ping first, then each HTTP target.
pub async fn run_checks(
    store: &Arc<BumpStore>,
    targets: &[HealthTarget],
    timeout: Duration,
) -> Vec<HealthCheck> {
    let mut checks = Vec::with_capacity(targets.len() + 1);
    checks.push(check_store(store));

    let client = reqwest::Client::new();
    for target in targets {
        checks.push(check_http(&client, target, timeout).await);
    }
    checks
}

fn check_store(store: &Arc<BumpStore>) -> HealthCheck {
    let started = Instant::now();
    let result = store.ping();
    HealthCheck {
        name: "store".to_string(),
        healthy: result.is_ok(),
        elapsed_ms: started.elapsed().as_millis() as i64,
        detail: result.err().map(|e| e.to_string()).unwrap_or_default(),
        status_code: None,
    }
}

async fn check_http(
    client: &reqwest::Client,
    target: &HealthTarget,
    timeout: Duration,
) -> HealthCheck {
    let started = Instant::now();
    match client.get(&target.url).timeout(timeout).send().await {
        Ok(resp) => {
            let status = resp.status();
            HealthCheck {
                name: target.name.clone(),
                healthy: status.is_success(),
                elapsed_ms: started.elapsed().as_millis() as i64,
                detail: if status.is_success() {
                    String::new()
                } else {
                    status.to_string()
                },
                status_code: Some(status.as_u16()),
            }
        }
        Err(e) => HealthCheck {
            name: target.name.clone(),
            healthy: false,
            elapsed_ms: started.elapsed().as_millis() as i64,
            detail: e.to_string(),
            status_code: None,
        },
    }
}
