//! Configuration constants, client settings and input validation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::{HarvesterError, Result};

/// HTTP timeout in seconds.
///
/// Large item reports can take minutes to be generated server side.
pub const HTTP_TIMEOUT_SECS: u64 = 120;

/// Environment flag selecting the long date encoding as the first attempt.
pub const LONG_DATE_FORMAT_ENV: &str = "COUNTER_LONG_DATE_FORMAT_FIRST";

/// Environment variable with per-host proxies.
///
/// Entries are separated by `;`, each entry is
/// `host,proxy_host,proxy_port,username,password`.
pub const PROXIES_ENV: &str = "SUSHI_PROXIES";

/// Month pattern: YYYY-MM.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static MONTH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("valid regex"));

/// Validate and parse a month argument (YYYY-MM).
///
/// # Returns
/// The first day of the month.
///
/// # Examples
/// ```
/// use counter_harvester::config::parse_month;
///
/// assert!(parse_month("2025-01").is_ok());
/// assert!(parse_month("2025-13").is_err());
/// assert!(parse_month("2025-01-01").is_err());
/// ```
pub fn parse_month(text: &str) -> Result<NaiveDate> {
    if !MONTH_PATTERN.is_match(text) {
        return Err(HarvesterError::InvalidDate(text.to_string()));
    }
    NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d")
        .map_err(|_| HarvesterError::InvalidDate(text.to_string()))
}

/// How `begin_date`/`end_date` are written into the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateEncoding {
    /// `YYYY-MM`
    Short,
    /// `YYYY-MM-DD`
    Long,
}

impl DateEncoding {
    #[must_use]
    pub fn encode(&self, date: NaiveDate) -> String {
        match self {
            Self::Short => date.format("%Y-%m").to_string(),
            Self::Long => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Order in which date encodings are tried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateOrder {
    #[default]
    ShortFirst,
    LongFirst,
}

impl DateOrder {
    #[must_use]
    pub fn encodings(&self) -> [DateEncoding; 2] {
        match self {
            Self::ShortFirst => [DateEncoding::Short, DateEncoding::Long],
            Self::LongFirst => [DateEncoding::Long, DateEncoding::Short],
        }
    }
}

/// HTTP proxy used for one SUSHI host.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySetting {
    /// Host of the SUSHI server (`host` or `host:port`).
    pub host: String,
    pub proxy: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ProxySetting {
    /// Proxy URL without credentials.
    #[must_use]
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.proxy, self.port)
    }
}

impl fmt::Debug for ProxySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySetting")
            .field("host", &self.host)
            .field("proxy", &self.proxy)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Parse a proxy list in the [`PROXIES_ENV`] format.
///
/// Malformed entries are logged and skipped.
///
/// # Examples
/// ```
/// use counter_harvester::config::parse_proxies;
///
/// let proxies = parse_proxies("sushi.example.com,proxy.local,3128,user,secret");
/// assert_eq!(proxies[0].proxy_url(), "http://proxy.local:3128");
/// assert!(parse_proxies("sushi.example.com,proxy.local").is_empty());
/// ```
pub fn parse_proxies(text: &str) -> Vec<ProxySetting> {
    let mut proxies = Vec::new();
    for entry in text.split(';').map(str::trim).filter(|entry| !entry.is_empty()) {
        let fields: Vec<&str> = entry.split(',').map(str::trim).collect();
        let [host, proxy, port, username, password] = fields.as_slice() else {
            warn!("Incorrect proxy definition: [{entry}]");
            continue;
        };
        let Ok(port) = port.parse::<u16>() else {
            warn!("Incorrect proxy port: [{port}]");
            continue;
        };
        proxies.push(ProxySetting {
            host: (*host).to_string(),
            proxy: (*proxy).to_string(),
            port,
            username: (*username).to_string(),
            password: (*password).to_string(),
        });
    }
    proxies
}

/// `host[:port]` of a URL, as written in proxy entries.
fn host_key(url: &str) -> Option<String> {
    let url = Url::parse(url.trim()).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Settings for one SUSHI endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the SUSHI API (without `/reports`).
    pub url: String,
    pub customer_id: String,
    pub requestor_id: Option<String>,
    /// Query parameters sent with every request (e.g. `platform`).
    pub extra_params: Vec<(String, String)>,
    pub date_order: DateOrder,
    pub timeout: Duration,
    /// Candidate proxies; the one matching the URL's host is used.
    pub proxies: Vec<ProxySetting>,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, customer_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            customer_id: customer_id.into(),
            requestor_id: None,
            extra_params: Vec::new(),
            date_order: DateOrder::default(),
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            proxies: Vec::new(),
        }
    }

    pub fn with_requestor_id(mut self, requestor_id: impl Into<String>) -> Self {
        self.requestor_id = Some(requestor_id.into());
        self
    }

    pub fn with_extra_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((name.into(), value.into()));
        self
    }

    pub fn with_date_order(mut self, date_order: DateOrder) -> Self {
        self.date_order = date_order;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxySetting) -> Self {
        self.proxies.push(proxy);
        self
    }

    /// Apply settings taken from the process environment.
    ///
    /// Only called at the process boundary; library users set
    /// [`DateOrder`] explicitly.
    pub fn apply_env(self) -> Self {
        let flag = std::env::var(LONG_DATE_FORMAT_ENV).ok();
        let proxies = std::env::var(PROXIES_ENV).ok();
        self.apply_long_date_flag(flag.as_deref())
            .apply_proxies(proxies.as_deref())
    }

    fn apply_proxies(mut self, proxies: Option<&str>) -> Self {
        if let Some(text) = proxies {
            self.proxies.extend(parse_proxies(text));
        }
        self
    }

    /// Proxy configured for the host of [`Self::url`], if any.
    #[must_use]
    pub fn proxy(&self) -> Option<&ProxySetting> {
        let host = host_key(&self.url)?;
        self.proxies.iter().find(|proxy| proxy.host == host)
    }

    fn apply_long_date_flag(self, flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some("1") => self.with_date_order(DateOrder::LongFirst),
            _ => self,
        }
    }

    /// Identity sent as `customer_id`.
    ///
    /// Some platforms only issue a requestor id; it doubles as customer id then.
    #[must_use]
    pub fn customer_identity(&self) -> &str {
        match &self.requestor_id {
            Some(requestor_id) if self.customer_id.is_empty() => requestor_id,
            _ => &self.customer_id,
        }
    }
}

/// Credentials file accepted by the CLI (`--config`).
///
/// ```yaml
/// url: https://sushi.example.com/counter/r5
/// customer_id: cust-123
/// requestor_id: req-456
/// api_key: secret
/// extra_params:
///   platform: ExamplePlatform
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Credentials {
    pub url: Option<String>,
    pub customer_id: Option<String>,
    pub requestor_id: Option<String>,
    pub api_key: Option<String>,
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
}

impl Credentials {
    /// Load credentials from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }
}
