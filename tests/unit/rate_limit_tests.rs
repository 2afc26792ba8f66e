/*!
 * Tests for the sliding-window rate limiter
 */

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use dataset_translator::translation::RateLimiter;

fn max_in_window(mut instants: Vec<Instant>, period: Duration) -> usize {
    instants.sort();
    let mut max = 0;
    for (end, t) in instants.iter().enumerate() {
        let count = instants[..=end].iter().filter(|c| t.duration_since(**c) < period).count();
        max = max.max(count);
    }
    max
}

#[tokio::test(start_paused = true)]
async fn test_acquire_withManyConcurrentCallers_shouldNeverExceedWindow() {
    let period = Duration::from_secs(60);
    let limiter = Arc::new(RateLimiter::new(5, period).unwrap());
    let admitted = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..23 {
        let limiter = limiter.clone();
        let admitted = admitted.clone();
        handles.push(tokio::spawn(async move {
            limiter.acquire().await;
            admitted.lock().push(Instant::now());
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let admitted = admitted.lock().clone();
    assert_eq!(admitted.len(), 23);
    assert!(max_in_window(admitted, period) <= 5);
    // 23 calls at 5 per minute need five windows
    assert!(start.elapsed() >= Duration::from_secs(4 * 60));
}

#[tokio::test(start_paused = true)]
async fn test_acquire_fromLoopingWorkers_shouldShareOneWindow() {
    let period = Duration::from_secs(1);
    let limiter = Arc::new(RateLimiter::new(3, period).unwrap());
    let admitted = Arc::new(Mutex::new(Vec::new()));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let limiter = limiter.clone();
            let admitted = admitted.clone();
            tokio::spawn(async move {
                for _ in 0..3 {
                    limiter.acquire().await;
                    admitted.lock().push(Instant::now());
                }
            })
        })
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }

    let admitted = admitted.lock().clone();
    assert_eq!(admitted.len(), 12);
    assert!(max_in_window(admitted, period) <= 3);
}
