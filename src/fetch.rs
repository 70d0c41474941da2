//! Page retrieval.
//!
//! Two interchangeable fetchers feed the same extractor: a plain HTTP GET of
//! the page source and a DOM dump from a headless browser for pages that only
//! fill in their port calls from script.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, sleep};
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::config::{Args, FetchMode};
use crate::error::{Error, Result};

static DESKTOP_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
];

static MOBILE_AGENT: &str = "Mozilla/5.0 (Linux; Android 12; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Mobile Safari/537.36";

/// Which flavour of the site a request pretends to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Desktop,
    Mobile,
}

impl Profile {
    pub fn user_agent(self) -> &'static str {
        match self {
            Profile::Desktop => {
                let mut rng = thread_rng();
                DESKTOP_AGENTS
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or(DESKTOP_AGENTS[0])
            }
            Profile::Mobile => MOBILE_AGENT,
        }
    }
}

/// Source of page HTML.
pub trait Fetch {
    fn fetch(&self, url: &Url, profile: Profile) -> Result<String>;
}

/// Build the fetcher selected on the command line.
pub fn from_args(args: &Args) -> Result<Box<dyn Fetch>> {
    let timeout = Duration::from_secs(args.timeout_secs);
    let fetcher: Box<dyn Fetch> = match args.fetcher {
        FetchMode::Http => Box::new(HttpFetcher::new(timeout)?),
        FetchMode::Rendered => Box::new(RenderedFetcher::new(&args.browser, timeout)),
    };
    Ok(fetcher)
}

/// The same page on the mobile site: `url` with its host swapped.
pub fn mobile_url(url: &Url, mobile_host: &str) -> Option<Url> {
    if url.host_str() == Some(mobile_host) {
        return None;
    }
    let mut mobile = url.clone();
    mobile.set_host(Some(mobile_host)).ok()?;
    Some(mobile)
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &Url, profile: Profile) -> Result<String> {
        maybe_sleep();

        let resp = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, profile.user_agent())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(CONNECTION, "keep-alive")
            .send()?;

        if !resp.status().is_success() {
            return Err(Error::Status {
                status: resp.status(),
                url: url.to_string(),
            });
        }

        Ok(resp.text()?)
    }
}

// Sleep a small randomized amount between requests (200-600ms)
fn maybe_sleep() {
    let mut rng = thread_rng();
    let ms = rng.gen_range(200..=600);
    sleep(Duration::from_millis(ms));
}

/// Runs a headless Chromium-compatible browser and returns the DOM it
/// serializes after loading the page.
pub struct RenderedFetcher {
    browser: String,
    timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(browser: &str, timeout: Duration) -> Self {
        Self {
            browser: browser.to_string(),
            timeout,
        }
    }

    fn command(&self, url: &Url, profile: Profile) -> Command {
        let mut cmd = Command::new(&self.browser);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--hide-scrollbars")
            .arg("--window-size=1280,2000")
            .arg("--virtual-time-budget=8000")
            .arg(format!("--user-agent={}", profile.user_agent()))
            .arg("--dump-dom")
            .arg(url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd
    }
}

impl Fetch for RenderedFetcher {
    fn fetch(&self, url: &Url, profile: Profile) -> Result<String> {
        debug!(browser = %self.browser, url = %url, "rendering page");
        let mut child = self
            .command(url, profile)
            .spawn()
            .map_err(|e| Error::Browser(format!("could not start {}: {e}", self.browser)))?;

        // Drain stdout on the side so a large DOM cannot fill the pipe and
        // stall the browser while we wait on it.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Browser("browser stdout not captured".into()))?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let status = wait_with_deadline(&mut child, self.timeout).map_err(|e| match e {
            WaitError::TimedOut => Error::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            },
            WaitError::Io(e) => Error::Browser(e.to_string()),
        })?;

        let bytes = reader
            .join()
            .map_err(|_| Error::Browser("stdout reader panicked".into()))?
            .map_err(|e| Error::Browser(e.to_string()))?;

        if !status.success() {
            return Err(Error::Browser(format!("{} exited with {status}", self.browser)));
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

enum WaitError {
    TimedOut,
    Io(std::io::Error),
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> core::result::Result<std::process::ExitStatus, WaitError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(WaitError::TimedOut);
            }
            Ok(None) => sleep(Duration::from_millis(100)),
            Err(e) => return Err(WaitError::Io(e)),
        }
    }
}
