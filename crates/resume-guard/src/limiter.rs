//! Per-IP request and login-attempt limiting.
//!
//! [`RateLimiter::evaluate`] runs the full per-request pipeline; the
//! individual checks are public so callers can compose them differently.

use std::sync::Arc;

use http::{HeaderMap, Method};

use crate::client_ip::resolve_client_ip;
use crate::settings::{Locale, RateLimitSettings};
use crate::store::{CounterOutcome, CounterStore};

/// Counter namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    General,
    Login,
}

impl Scope {
    pub fn key(self, ip: &str) -> String {
        match self {
            Scope::General => format!("rate_limit:{ip}"),
            Scope::Login => format!("login_attempt:{ip}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// A request rejected for exceeding a limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimited {
    General,
    Login { window_minutes: u64 },
}

impl RateLimited {
    pub fn message(&self, locale: Locale) -> String {
        match (self, locale) {
            (RateLimited::General, Locale::En) => {
                "Too many requests, please try again later".to_string()
            }
            (RateLimited::General, Locale::Zh) => "请求过于频繁，请稍后再试".to_string(),
            (RateLimited::Login { window_minutes }, Locale::En) => format!(
                "Too many login attempts, please try again in {window_minutes} minutes"
            ),
            (RateLimited::Login { window_minutes }, Locale::Zh) => {
                format!("登录尝试次数过多，请{window_minutes}分钟后再试")
            }
        }
    }
}

/// Outcome of [`RateLimiter::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Limiting is disabled or the client is whitelisted; nothing was counted.
    Bypass,
    /// The request was counted and may proceed.
    Allow { ip: String },
    /// The request must be answered with a rejection.
    Reject { ip: String, reason: RateLimited },
}

/// The parts of an inbound request the limiter looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    pub headers: &'a HeaderMap,
    pub method: &'a Method,
    pub path: &'a str,
    pub remote_addr: Option<&'a str>,
}

pub struct RateLimiter {
    settings: Arc<RateLimitSettings>,
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(settings: Arc<RateLimitSettings>, store: Arc<dyn CounterStore>) -> Self {
        Self { settings, store }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    pub fn is_whitelisted(&self, ip: &str) -> bool {
        self.settings.whitelist.contains(ip)
    }

    /// A login attempt is a `POST` under the configured login prefix.
    pub fn is_login_request(&self, method: &Method, path: &str) -> bool {
        method == Method::POST && path.starts_with(&self.settings.login_path_prefix)
    }

    /// Counts one general request for `ip` unless it is already at the limit.
    pub fn check_general(&self, ip: &str) -> Decision {
        let outcome = self.store.increment_if_below(
            &Scope::General.key(ip),
            self.settings.general_limit,
            self.settings.general_window(),
            self.settings.window_mode,
        );
        match outcome {
            Ok(CounterOutcome::Allowed(count)) => {
                tracing::trace!(ip, count, "general request counted");
                Decision::Allow
            }
            Ok(CounterOutcome::Limited(count)) => {
                tracing::debug!(ip, count, "general rate limit reached");
                Decision::Deny
            }
            Err(e) => self.on_store_error("general check", ip, &e),
        }
    }

    /// Read-only: whether `ip` has login attempts left in its window.
    pub fn check_login(&self, ip: &str) -> Decision {
        match self.store.get(&Scope::Login.key(ip)) {
            Ok(count) if count.unwrap_or(0) >= self.settings.login_limit => {
                tracing::debug!(ip, "login rate limit reached");
                Decision::Deny
            }
            Ok(_) => Decision::Allow,
            Err(e) => self.on_store_error("login check", ip, &e),
        }
    }

    pub fn record_login_attempt(&self, ip: &str) {
        let result = self.store.increment(
            &Scope::Login.key(ip),
            self.settings.login_window(),
            self.settings.window_mode,
        );
        match result {
            Ok(count) => tracing::debug!(ip, count, "login attempt recorded"),
            Err(e) => tracing::warn!(ip, "failed to record login attempt: {e}"),
        }
    }

    /// Runs the per-request pipeline: whitelist, general limit, then the
    /// login limit for login attempts. An attempt rejected by the login
    /// check is not recorded.
    pub fn evaluate(&self, req: &RequestInfo<'_>) -> Verdict {
        if !self.settings.enabled {
            return Verdict::Bypass;
        }

        let ip = resolve_client_ip(req.headers, req.remote_addr);
        if self.is_whitelisted(&ip) {
            return Verdict::Bypass;
        }

        if !self.check_general(&ip).is_allowed() {
            return Verdict::Reject {
                ip,
                reason: RateLimited::General,
            };
        }

        if self.is_login_request(req.method, req.path) {
            if !self.check_login(&ip).is_allowed() {
                return Verdict::Reject {
                    ip,
                    reason: RateLimited::Login {
                        window_minutes: self.settings.login_window_minutes(),
                    },
                };
            }
            self.record_login_attempt(&ip);
        }

        Verdict::Allow { ip }
    }

    fn on_store_error(&self, op: &str, ip: &str, err: &crate::GuardError) -> Decision {
        if self.settings.fail_open {
            tracing::warn!(ip, "{op} failed, allowing request: {err}");
            Decision::Allow
        } else {
            tracing::warn!(ip, "{op} failed, rejecting request: {err}");
            Decision::Deny
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GuardError, GuardResult};
    use crate::settings::WindowMode;
    use crate::store::MemoryStore;
    use http::HeaderValue;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::time::advance;

    fn limiter_with(settings: RateLimitSettings) -> (RateLimiter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(Arc::new(settings), store.clone());
        (limiter, store)
    }

    fn forwarded(ip: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("x-forwarded-for", HeaderValue::from_static(ip));
        h
    }

    static GET: Method = Method::GET;
    static POST: Method = Method::POST;

    fn get<'a>(headers: &'a HeaderMap, path: &'a str) -> RequestInfo<'a> {
        RequestInfo {
            headers,
            method: &GET,
            path,
            remote_addr: Some("10.0.0.1"),
        }
    }

    fn post<'a>(headers: &'a HeaderMap, path: &'a str) -> RequestInfo<'a> {
        RequestInfo {
            headers,
            method: &POST,
            path,
            remote_addr: Some("10.0.0.1"),
        }
    }

    struct BrokenStore;

    impl CounterStore for BrokenStore {
        fn get(&self, _key: &str) -> GuardResult<Option<u64>> {
            Err(GuardError::Store("offline".to_string()))
        }
        fn set(&self, _key: &str, _value: u64, _ttl: Duration) -> GuardResult<()> {
            Err(GuardError::Store("offline".to_string()))
        }
        fn increment(&self, _key: &str, _ttl: Duration, _mode: WindowMode) -> GuardResult<u64> {
            Err(GuardError::Store("offline".to_string()))
        }
        fn increment_if_below(
            &self,
            _key: &str,
            _limit: u64,
            _ttl: Duration,
            _mode: WindowMode,
        ) -> GuardResult<CounterOutcome> {
            Err(GuardError::Store("offline".to_string()))
        }
        fn purge_expired(&self) -> usize {
            0
        }
    }

    #[test]
    fn scope_keys() {
        assert_eq!(Scope::General.key("1.2.3.4"), "rate_limit:1.2.3.4");
        assert_eq!(Scope::Login.key("1.2.3.4"), "login_attempt:1.2.3.4");
    }

    #[test]
    fn login_classification() {
        let (limiter, _) = limiter_with(RateLimitSettings::default());
        assert!(limiter.is_login_request(&Method::POST, "/login/"));
        assert!(limiter.is_login_request(&Method::POST, "/login/submit"));
        assert!(!limiter.is_login_request(&Method::GET, "/login/"));
        assert!(!limiter.is_login_request(&Method::PUT, "/login/"));
        assert!(!limiter.is_login_request(&Method::POST, "/login"));
        assert!(!limiter.is_login_request(&Method::POST, "/articles/"));
    }

    #[test]
    fn whitelisted_ip_always_bypasses() {
        let (limiter, store) = limiter_with(RateLimitSettings {
            general_limit: 1,
            login_limit: 1,
            ..Default::default()
        });
        store
            .set(&Scope::General.key("127.0.0.1"), 1_000, Duration::from_secs(60))
            .unwrap();
        store
            .set(&Scope::Login.key("127.0.0.1"), 1_000, Duration::from_secs(300))
            .unwrap();

        let h = forwarded("127.0.0.1");
        for _ in 0..5 {
            assert_eq!(limiter.evaluate(&post(&h, "/login/")), Verdict::Bypass);
        }
        // Untouched by the bypassed requests.
        assert_eq!(
            store.get(&Scope::Login.key("127.0.0.1")).unwrap(),
            Some(1_000)
        );
    }

    #[test]
    fn disabled_limiter_bypasses_everything() {
        let (limiter, store) = limiter_with(RateLimitSettings {
            enabled: false,
            general_limit: 0,
            ..Default::default()
        });
        let h = forwarded("9.9.9.9");
        assert_eq!(limiter.evaluate(&get(&h, "/")), Verdict::Bypass);
        assert!(store.is_empty());
    }

    #[test]
    fn general_limit_denies_request_after_limit() {
        let (limiter, store) = limiter_with(RateLimitSettings {
            general_limit: 2,
            ..Default::default()
        });
        let h = forwarded("9.9.9.9");

        for _ in 0..2 {
            assert_eq!(
                limiter.evaluate(&get(&h, "/")),
                Verdict::Allow {
                    ip: "9.9.9.9".to_string()
                }
            );
        }
        assert_eq!(
            limiter.evaluate(&get(&h, "/")),
            Verdict::Reject {
                ip: "9.9.9.9".to_string(),
                reason: RateLimited::General,
            }
        );
        assert_eq!(store.get(&Scope::General.key("9.9.9.9")).unwrap(), Some(2));
    }

    #[test]
    fn clients_are_counted_separately() {
        let (limiter, _) = limiter_with(RateLimitSettings {
            general_limit: 1,
            ..Default::default()
        });
        let a = forwarded("1.1.1.1");
        let b = forwarded("2.2.2.2");
        assert!(matches!(limiter.evaluate(&get(&a, "/")), Verdict::Allow { .. }));
        assert!(matches!(limiter.evaluate(&get(&b, "/")), Verdict::Allow { .. }));
        assert!(matches!(limiter.evaluate(&get(&a, "/")), Verdict::Reject { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn general_window_resets_after_idle_period() {
        let (limiter, store) = limiter_with(RateLimitSettings {
            general_limit: 2,
            general_window_seconds: 60,
            ..Default::default()
        });
        assert!(limiter.check_general("9.9.9.9").is_allowed());
        assert!(limiter.check_general("9.9.9.9").is_allowed());
        assert!(!limiter.check_general("9.9.9.9").is_allowed());

        advance(Duration::from_secs(60)).await;
        assert!(limiter.check_general("9.9.9.9").is_allowed());
        assert_eq!(store.get(&Scope::General.key("9.9.9.9")).unwrap(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn renewing_window_keeps_busy_client_tracked() {
        let (limiter, store) = limiter_with(RateLimitSettings {
            general_limit: 100,
            general_window_seconds: 60,
            window_mode: WindowMode::Renewing,
            ..Default::default()
        });
        for _ in 0..4 {
            assert!(limiter.check_general("9.9.9.9").is_allowed());
            advance(Duration::from_secs(45)).await;
        }
        assert_eq!(store.get(&Scope::General.key("9.9.9.9")).unwrap(), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_window_resets_despite_activity() {
        let (limiter, store) = limiter_with(RateLimitSettings {
            general_limit: 100,
            general_window_seconds: 60,
            window_mode: WindowMode::Fixed,
            ..Default::default()
        });
        for _ in 0..4 {
            assert!(limiter.check_general("9.9.9.9").is_allowed());
            advance(Duration::from_secs(45)).await;
        }
        // Windows started at t=0 and t=90; the latter saw t=90 and t=135.
        assert_eq!(store.get(&Scope::General.key("9.9.9.9")).unwrap(), None);
        assert!(limiter.check_general("9.9.9.9").is_allowed());
        assert_eq!(store.get(&Scope::General.key("9.9.9.9")).unwrap(), Some(1));
    }

    #[test]
    fn login_attempts_limited_and_message_names_minutes() {
        let (limiter, store) = limiter_with(RateLimitSettings {
            login_limit: 1,
            login_window_seconds: 300,
            ..Default::default()
        });
        let h = forwarded("8.8.8.8");

        assert!(matches!(
            limiter.evaluate(&post(&h, "/login/")),
            Verdict::Allow { .. }
        ));
        assert_eq!(store.get(&Scope::Login.key("8.8.8.8")).unwrap(), Some(1));

        let verdict = limiter.evaluate(&post(&h, "/login/"));
        let Verdict::Reject { reason, .. } = verdict else {
            panic!("expected rejection, got {verdict:?}");
        };
        assert_eq!(reason, RateLimited::Login { window_minutes: 5 });
        assert!(reason.message(Locale::En).contains('5'));
        assert!(reason.message(Locale::Zh).contains('5'));
    }

    #[test]
    fn login_message_floors_partial_minutes() {
        let (limiter, _) = limiter_with(RateLimitSettings {
            login_limit: 1,
            login_window_seconds: 90,
            ..Default::default()
        });
        let h = forwarded("8.8.4.4");
        limiter.evaluate(&post(&h, "/login/"));

        let verdict = limiter.evaluate(&post(&h, "/login/"));
        let Verdict::Reject { reason, .. } = verdict else {
            panic!("expected rejection, got {verdict:?}");
        };
        assert_eq!(reason, RateLimited::Login { window_minutes: 1 });
        assert_eq!(
            reason.message(Locale::En),
            "Too many login attempts, please try again in 1 minutes"
        );
        assert_eq!(reason.message(Locale::Zh), "登录尝试次数过多，请1分钟后再试");
    }

    #[test]
    fn rejected_login_attempt_is_not_recorded() {
        let (limiter, store) = limiter_with(RateLimitSettings {
            login_limit: 2,
            ..Default::default()
        });
        let h = forwarded("8.8.8.8");
        let key = Scope::Login.key("8.8.8.8");

        limiter.evaluate(&post(&h, "/login/"));
        limiter.evaluate(&post(&h, "/login/"));
        assert_eq!(store.get(&key).unwrap(), Some(2));

        for _ in 0..3 {
            assert!(matches!(
                limiter.evaluate(&post(&h, "/login/")),
                Verdict::Reject { .. }
            ));
        }
        assert_eq!(store.get(&key).unwrap(), Some(2));
    }

    #[test]
    fn non_login_requests_do_not_touch_login_counter() {
        let (limiter, store) = limiter_with(RateLimitSettings::default());
        let h = forwarded("8.8.8.8");
        limiter.evaluate(&get(&h, "/login/"));
        limiter.evaluate(&post(&h, "/articles/"));
        assert_eq!(store.get(&Scope::Login.key("8.8.8.8")).unwrap(), None);
    }

    #[test]
    fn general_denial_happens_before_login_accounting() {
        let (limiter, store) = limiter_with(RateLimitSettings {
            general_limit: 1,
            ..Default::default()
        });
        let h = forwarded("8.8.8.8");
        limiter.evaluate(&get(&h, "/"));

        assert_eq!(
            limiter.evaluate(&post(&h, "/login/")),
            Verdict::Reject {
                ip: "8.8.8.8".to_string(),
                reason: RateLimited::General,
            }
        );
        assert_eq!(store.get(&Scope::Login.key("8.8.8.8")).unwrap(), None);
    }

    #[test]
    fn login_check_is_idempotent() {
        let (limiter, store) = limiter_with(RateLimitSettings {
            login_limit: 3,
            ..Default::default()
        });
        assert_eq!(limiter.check_login("7.7.7.7"), limiter.check_login("7.7.7.7"));

        store
            .set(&Scope::Login.key("7.7.7.7"), 3, Duration::from_secs(300))
            .unwrap();
        assert_eq!(limiter.check_login("7.7.7.7"), Decision::Deny);
        assert_eq!(limiter.check_login("7.7.7.7"), Decision::Deny);
        assert_eq!(store.get(&Scope::Login.key("7.7.7.7")).unwrap(), Some(3));
    }

    #[test]
    fn remote_addr_used_when_no_proxy_headers() {
        let (limiter, store) = limiter_with(RateLimitSettings::default());
        let h = HeaderMap::new();
        assert_eq!(
            limiter.evaluate(&get(&h, "/")),
            Verdict::Allow {
                ip: "10.0.0.1".to_string()
            }
        );
        assert_eq!(store.get(&Scope::General.key("10.0.0.1")).unwrap(), Some(1));
    }

    #[test]
    fn unknown_clients_share_one_bucket() {
        let (limiter, _) = limiter_with(RateLimitSettings {
            general_limit: 1,
            ..Default::default()
        });
        let h = HeaderMap::new();
        let req = RequestInfo {
            headers: &h,
            method: &GET,
            path: "/",
            remote_addr: None,
        };
        assert_eq!(
            limiter.evaluate(&req),
            Verdict::Allow {
                ip: "unknown".to_string()
            }
        );
        assert!(matches!(limiter.evaluate(&req), Verdict::Reject { .. }));
    }

    #[test]
    fn store_failure_fails_open_by_default() {
        let limiter = RateLimiter::new(Arc::new(RateLimitSettings::default()), Arc::new(BrokenStore));
        let h = forwarded("6.6.6.6");
        assert!(matches!(
            limiter.evaluate(&post(&h, "/login/")),
            Verdict::Allow { .. }
        ));
    }

    #[test]
    fn store_failure_can_fail_closed() {
        let settings = RateLimitSettings {
            fail_open: false,
            ..Default::default()
        };
        let limiter = RateLimiter::new(Arc::new(settings), Arc::new(BrokenStore));
        let h = forwarded("6.6.6.6");
        assert_eq!(
            limiter.evaluate(&get(&h, "/")),
            Verdict::Reject {
                ip: "6.6.6.6".to_string(),
                reason: RateLimited::General,
            }
        );
        assert_eq!(limiter.check_login("6.6.6.6"), Decision::Deny);
    }

    #[test]
    fn custom_whitelist_replaces_default() {
        let (limiter, _) = limiter_with(RateLimitSettings {
            whitelist: HashSet::from(["10.1.1.1".to_string()]),
            ..Default::default()
        });
        assert!(limiter.is_whitelisted("10.1.1.1"));
        assert!(!limiter.is_whitelisted("127.0.0.1"));
    }

    #[test]
    fn general_message_per_locale() {
        assert_eq!(
            RateLimited::General.message(Locale::En),
            "Too many requests, please try again later"
        );
        assert_eq!(
            RateLimited::General.message(Locale::Zh),
            "请求过于频繁，请稍后再试"
        );
    }
}
