//! HTTP client wrapper for talking to SUSHI servers.

use std::io::{Seek, SeekFrom};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Proxy;
use tempfile::NamedTempFile;
use url::Url;

use crate::config::ProxySetting;
use crate::error::Result;

/// User agent string identifying this harvester.
pub const USER_AGENT: &str = concat!("counter-harvester/", env!("CARGO_PKG_VERSION"));

/// Create a configured HTTP client.
///
/// All traffic goes through `proxy` when one is given.
///
/// # Returns
/// A `reqwest::blocking::Client` configured with the given timeout and our user agent.
pub fn create_client(timeout: Duration, proxy: Option<&ProxySetting>) -> Result<Client> {
    let mut builder = Client::builder().timeout(timeout).user_agent(USER_AGENT);
    if let Some(setting) = proxy {
        let mut proxy = Proxy::all(setting.proxy_url())?;
        if !setting.username.is_empty() {
            proxy = proxy.basic_auth(&setting.username, &setting.password);
        }
        builder = builder.proxy(proxy);
    }
    Ok(builder.build()?)
}

/// A response whose body has been spooled to disk.
#[derive(Debug)]
pub struct SpooledResponse {
    pub status: u16,
    /// Final URL after redirects.
    pub url: Url,
    pub body: NamedTempFile,
}

/// GET `url` and write the body to a temporary file.
///
/// Any status is accepted; interpreting it is up to the caller.
pub fn download_to_tempfile(client: &Client, url: Url) -> Result<SpooledResponse> {
    let mut response = client.get(url).send()?;
    let status = response.status().as_u16();
    let final_url = response.url().clone();

    let mut body = NamedTempFile::new()?;
    let size = response.copy_to(body.as_file_mut())?;
    body.as_file_mut().seek(SeekFrom::Start(0))?;
    tracing::debug!(status, size, "Response spooled");

    Ok(SpooledResponse {
        status,
        url: final_url,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client() {
        let client = create_client(Duration::from_secs(1), None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_client_with_proxy() {
        let proxy = ProxySetting {
            host: "sushi.example.com".to_string(),
            proxy: "proxy.local".to_string(),
            port: 3128,
            username: "user".to_string(),
            password: "secret".to_string(),
        };
        assert!(create_client(Duration::from_secs(1), Some(&proxy)).is_ok());
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("counter-harvester/"));
    }
}
