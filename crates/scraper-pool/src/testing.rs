//! Scriptable upstream doubles shared by the pool tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use upstream::{
    BoxFuture, ClientFactory, LoginCredentials, Profile, SearchMode, Tweet, UpstreamClient,
};

/// Mock upstream client.
///
/// `resolve_screen_name` and `login` pop scripted outcomes; with an
/// empty script they succeed. Scraping operations are driven by the
/// test's thunk instead and always fail if called directly.
pub(crate) struct MockUpstream {
    cookies: Mutex<Vec<String>>,
    verify_script: Mutex<VecDeque<Result<String, String>>>,
    login_script: Mutex<VecDeque<Result<(), String>>>,
    login_delay: Mutex<Option<Duration>>,
    pub login_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
}

impl MockUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cookies: Mutex::new(Vec::new()),
            verify_script: Mutex::new(VecDeque::new()),
            login_script: Mutex::new(VecDeque::new()),
            login_delay: Mutex::new(None),
            login_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        })
    }

    pub fn script_verify(&self, outcome: Result<&str, &str>) {
        self.verify_script.lock().unwrap().push_back(
            outcome
                .map(str::to_string)
                .map_err(str::to_string),
        );
    }

    pub fn script_login(&self, outcome: Result<(), &str>) {
        self.login_script
            .lock()
            .unwrap()
            .push_back(outcome.map_err(str::to_string));
    }

    pub fn delay_login(&self, delay: Duration) {
        *self.login_delay.lock().unwrap() = Some(delay);
    }
}

impl UpstreamClient for MockUpstream {
    fn set_cookies(&self, cookies: &[String]) {
        *self.cookies.lock().unwrap() = cookies.to_vec();
    }

    fn cookies(&self) -> Vec<String> {
        self.cookies.lock().unwrap().clone()
    }

    fn login<'a>(&'a self, _credentials: &'a LoginCredentials) -> BoxFuture<'a, upstream::Result<()>> {
        Box::pin(async move {
            let delay = *self.login_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.login_script.lock().unwrap().pop_front();
            match scripted {
                Some(Err(message)) => Err(upstream::Error::Auth(message)),
                _ => {
                    let session = vec!["auth_token=mock; Path=/".to_string()];
                    self.set_cookies(&session);
                    Ok(())
                }
            }
        })
    }

    fn resolve_screen_name<'a>(&'a self, _screen_name: &'a str) -> BoxFuture<'a, upstream::Result<String>> {
        Box::pin(async move {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.verify_script.lock().unwrap().pop_front();
            match scripted {
                Some(Ok(id)) => Ok(id),
                Some(Err(message)) => Err(upstream::Error::Api(message)),
                None => Ok("100".to_string()),
            }
        })
    }

    fn user_tweets<'a>(&'a self, _: &'a str, _: u32) -> BoxFuture<'a, upstream::Result<Vec<Tweet>>> {
        Box::pin(async { Err(upstream::Error::Api("user_tweets not scripted".into())) })
    }

    fn user_tweets_and_replies<'a>(
        &'a self,
        _: &'a str,
        _: u32,
    ) -> BoxFuture<'a, upstream::Result<Vec<Tweet>>> {
        Box::pin(async { Err(upstream::Error::Api("user_tweets_and_replies not scripted".into())) })
    }

    fn latest_tweet<'a>(&'a self, _: &'a str) -> BoxFuture<'a, upstream::Result<Option<Tweet>>> {
        Box::pin(async { Err(upstream::Error::Api("latest_tweet not scripted".into())) })
    }

    fn search_tweets<'a>(
        &'a self,
        _: &'a str,
        _: u32,
        _: SearchMode,
    ) -> BoxFuture<'a, upstream::Result<Vec<Tweet>>> {
        Box::pin(async { Err(upstream::Error::Api("search_tweets not scripted".into())) })
    }

    fn profile<'a>(&'a self, _: &'a str) -> BoxFuture<'a, upstream::Result<Profile>> {
        Box::pin(async { Err(upstream::Error::Api("profile not scripted".into())) })
    }

    fn followers<'a>(&'a self, _: &'a str, _: u32) -> BoxFuture<'a, upstream::Result<Vec<Profile>>> {
        Box::pin(async { Err(upstream::Error::Api("followers not scripted".into())) })
    }

    fn following<'a>(&'a self, _: &'a str, _: u32) -> BoxFuture<'a, upstream::Result<Vec<Profile>>> {
        Box::pin(async { Err(upstream::Error::Api("following not scripted".into())) })
    }

    fn tweet<'a>(&'a self, _: &'a str) -> BoxFuture<'a, upstream::Result<Tweet>> {
        Box::pin(async { Err(upstream::Error::Api("tweet not scripted".into())) })
    }
}

/// Factory handing out one shared [`MockUpstream`], recording the proxy
/// each build was bound to.
pub(crate) struct MockFactory {
    pub client: Arc<MockUpstream>,
    pub proxies_seen: Mutex<Vec<Option<String>>>,
}

impl MockFactory {
    pub fn new(client: Arc<MockUpstream>) -> Arc<Self> {
        Arc::new(Self {
            client,
            proxies_seen: Mutex::new(Vec::new()),
        })
    }
}

impl ClientFactory for MockFactory {
    fn build(&self, proxy_url: Option<&str>) -> upstream::Result<Arc<dyn UpstreamClient>> {
        self.proxies_seen
            .lock()
            .unwrap()
            .push(proxy_url.map(str::to_string));
        Ok(self.client.clone())
    }
}
