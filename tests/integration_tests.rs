use std::sync::Arc;
use std::time::Duration;

use floodgate::{CounterStore, Error, MemoryStore, RateLimitPolicy, RateLimiter, RedisStore};
use tokio_test::{assert_err, assert_ok};

fn limiter_on(store: Arc<dyn CounterStore>, prefix: &str, rate: u64, period: Duration) -> RateLimiter {
    RateLimiter::new(store, RateLimitPolicy::new(prefix, rate, period)).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_eleven_calls_against_ten_per_minute() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
    let policy = RateLimitPolicy::new("api", 10, Duration::from_secs(60))
        .with_retry_after(Duration::from_secs(20));
    let limiter = RateLimiter::new(store, policy).unwrap();

    for _ in 0..10 {
        assert_ok!(limiter.acquire("X").await);
    }

    let err = assert_err!(limiter.acquire("X").await);
    let wait = err.flood_wait().unwrap().clone();
    assert_eq!(wait.identifier, "X");
    assert!(wait.wait_time > Duration::ZERO);
    assert!(wait.wait_time <= Duration::from_secs(60));

    tokio::time::sleep(wait.wait_time).await;
    assert_ok!(limiter.acquire("X").await);
}

#[tokio::test]
async fn test_exhausting_one_identifier_leaves_others_alone() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
    let limiter = limiter_on(store, "api", 2, Duration::from_secs(60));

    for _ in 0..2 {
        assert_ok!(limiter.acquire("id1").await);
    }
    assert_err!(limiter.acquire("id1").await);

    for _ in 0..2 {
        assert_ok!(limiter.acquire("id2").await);
    }
}

#[tokio::test]
async fn test_limiters_with_same_policy_share_quota() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
    let first = limiter_on(store.clone(), "api", 3, Duration::from_secs(60));
    let second = limiter_on(store.clone(), "api", 3, Duration::from_secs(60));

    assert_ok!(first.acquire("X").await);
    assert_ok!(second.acquire("X").await);
    assert_ok!(first.acquire("X").await);
    assert!(assert_err!(second.acquire("X").await).is_flood_wait());
    assert_eq!(first.usage("X").await.unwrap(), 4);
}

#[tokio::test]
async fn test_prefixes_isolate_limiters() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
    let login = limiter_on(store.clone(), "login", 1, Duration::from_secs(60));
    let search = limiter_on(store, "search", 1, Duration::from_secs(60));

    assert_ok!(login.acquire("user").await);
    assert_err!(login.acquire("user").await);
    assert_ok!(search.acquire("user").await);
}

#[tokio::test]
async fn test_concurrent_calls_never_both_denied() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
    let limiter = limiter_on(store, "api", 1, Duration::from_secs(1));

    let (a, b) = tokio::join!(limiter.acquire("Y"), limiter.acquire("Y"));
    let admitted = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(admitted, 1);
}

#[tokio::test]
async fn test_many_tasks_admit_exactly_rate() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
    let limiter = limiter_on(store, "api", 25, Duration::from_secs(60));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire("burst").await })
        })
        .collect();

    let mut admitted = 0;
    let mut denied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(Error::FloodWait(_)) => denied += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(admitted, 25);
    assert_eq!(denied, 75);
}

#[tokio::test(start_paused = true)]
async fn test_flood_wait_is_bounded_by_period() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
    let limiter = limiter_on(store, "api", 1, Duration::from_secs(10));

    assert_ok!(limiter.acquire("X").await);
    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(1)).await;
        let err = assert_err!(limiter.acquire("X").await);
        let wait_time = err.flood_wait().unwrap().wait_time;
        assert!(wait_time > Duration::ZERO && wait_time <= Duration::from_secs(10));
    }
}

// The Redis tests run only when a disposable server is provided, e.g.
// FLOODGATE_TEST_REDIS_URL=redis://127.0.0.1:6379 cargo test
async fn redis_store() -> Option<Arc<dyn CounterStore>> {
    let url = std::env::var("FLOODGATE_TEST_REDIS_URL").ok()?;
    let store = RedisStore::connect(&url).await.unwrap();
    Some(Arc::new(store))
}

fn unique_prefix() -> String {
    format!("floodgate-test:{}", uuid::Uuid::new_v4())
}

#[tokio::test]
async fn test_redis_admits_rate_then_denies() {
    let Some(store) = redis_store().await else {
        return;
    };
    let limiter = limiter_on(store, &unique_prefix(), 3, Duration::from_secs(60));

    for _ in 0..3 {
        assert_ok!(limiter.acquire("X").await);
    }
    let err = assert_err!(limiter.acquire("X").await);
    let wait_time = err.flood_wait().unwrap().wait_time;
    assert!(wait_time > Duration::from_secs(55) && wait_time <= Duration::from_secs(60));

    assert!(limiter.reset("X").await.unwrap());
}

#[tokio::test]
async fn test_redis_window_expires() {
    let Some(store) = redis_store().await else {
        return;
    };
    let limiter = limiter_on(store, &unique_prefix(), 1, Duration::from_millis(200));

    assert_ok!(limiter.acquire("X").await);
    assert_err!(limiter.acquire("X").await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let admission = assert_ok!(limiter.acquire("X").await);
    assert_eq!(admission.count, 1);
}

#[tokio::test]
async fn test_redis_concurrent_increments_attach_one_expiry() {
    let Some(store) = redis_store().await else {
        return;
    };
    let prefix = unique_prefix();
    let limiter = limiter_on(store.clone(), &prefix, 1000, Duration::from_secs(30));

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire("race").await })
        })
        .collect();
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    let key = format!("{}:race", prefix);
    assert_eq!(store.get(&key).await.unwrap(), Some(50));
    let ttl = store.ttl(&key).await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(30));

    store.delete(&key).await.unwrap();
}
