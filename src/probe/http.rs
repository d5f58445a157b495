use std::{collections::HashMap, time::Duration};

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, Url,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{DefaultProber, ProbeBehavior};

pub type HttpProber = DefaultProber<HttpProbeBehavior>;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HttpProbeBehavior {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default = "default_success_codes")]
    pub success_codes: Vec<(u16, u16)>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(skip)]
    client: Option<Client>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_success_codes() -> Vec<(u16, u16)> {
    vec![(0, 499)]
}

impl HttpProbeBehavior {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: default_method(),
            headers: HashMap::new(),
            body: None,
            success_codes: default_success_codes(),
            proxy: None,
            client: None,
        }
    }
}

#[async_trait]
impl ProbeBehavior for HttpProbeBehavior {
    fn kind(&self) -> &'static str {
        "http"
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }

    fn config(&mut self, name: &str, timeout: Duration) -> Result<()> {
        if let Err(err) = Url::parse(&self.url) {
            log::error!(
                "[{} / {}] URL is not valid - {} url={}",
                self.kind(),
                name,
                err,
                self.url,
            );
            bail!("URL is not valid - {}", err)
        }

        if let Err(err) = self.method.to_uppercase().parse::<Method>() {
            bail!("HTTP method {} is not valid - {}", self.method, err)
        }

        let mut headers = HeaderMap::new();
        for (k, v) in &self.headers {
            headers.insert(HeaderName::try_from(k.as_str())?, HeaderValue::try_from(v.as_str())?);
        }

        let mut client_builder = Client::builder().timeout(timeout).default_headers(headers);

        if let Some(proxy_url) = &self.proxy {
            if let Err(err) = Url::parse(proxy_url.trim()) {
                log::error!(
                    "[{} / {}] proxy URL is not valid - {} url={}",
                    self.kind(),
                    name,
                    err,
                    proxy_url,
                );
                bail!("proxy URL is not valid - {}", err)
            }

            client_builder = client_builder.proxy(reqwest::Proxy::all(proxy_url.trim())?);
            log::debug!("[{} / {}] proxy server is {}", self.kind(), name, proxy_url);
        }

        self.client = Some(client_builder.build()?);
        Ok(())
    }

    async fn do_probe(&self) -> Result<(bool, String)> {
        let Some(client) = &self.client else {
            bail!("HTTP client is not configured")
        };

        let method = self.method.to_uppercase().parse::<Method>()?;
        let mut request = client.request(method, &self.url);
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let status = response.status();

        let valid = self
            .success_codes
            .iter()
            .any(|&(start, end)| start <= status.as_u16() && status.as_u16() <= end);

        let message = if valid {
            format!("HTTP Status Code is {}", status.as_u16())
        } else {
            format!(
                "HTTP Status Code is {}. It missed in {:?}",
                status.as_u16(),
                self.success_codes
            )
        };

        Ok((valid, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProbeSettings, Prober};

    #[test]
    fn test_http_yaml() {
        let yaml = r#"
name: example
url: https://example.com/health
method: post
timeout: 5s
failure: 3
success_codes: [[200, 299]]
headers:
  x-token: abc
"#;
        let p: HttpProber = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(p.name, "example");
        assert_eq!(p.timeout, Duration::from_secs(5));
        assert_eq!(p.threshold.failure, 3);
        assert_eq!(p.behavior.success_codes, vec![(200, 299)]);
        assert_eq!(p.behavior.headers["x-token"], "abc");
    }

    #[test]
    fn test_http_config() {
        let mut p = HttpProber::new("good", HttpProbeBehavior::new("http://127.0.0.1:8080/"));
        assert!(p.config(&ProbeSettings::default()).is_ok());
        assert_eq!(p.kind(), "http");
        assert_eq!(p.result().snapshot().endpoint, "http://127.0.0.1:8080/");

        let mut p = HttpProber::new("bad", HttpProbeBehavior::new("not a url"));
        assert!(p.config(&ProbeSettings::default()).is_err());

        let mut b = HttpProbeBehavior::new("http://127.0.0.1:8080/");
        b.proxy = Some("::bad proxy".to_string());
        let mut p = HttpProber::new("bad-proxy", b);
        assert!(p.config(&ProbeSettings::default()).is_err());
    }

    #[tokio::test]
    async fn test_http_probe_against_local_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route(
            "/ok",
            axum::routing::get(|| async { "ok" }),
        );
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let mut b = HttpProbeBehavior::new(&format!("http://{}/ok", addr));
        b.success_codes = vec![(200, 299)];
        let mut p = HttpProber::new("local", b);
        p.config(&ProbeSettings::default()).unwrap();
        let r = p.probe().await;
        assert_eq!(r.status, crate::Status::Up);

        let mut b = HttpProbeBehavior::new(&format!("http://{}/missing", addr));
        b.success_codes = vec![(200, 299)];
        let mut p = HttpProber::new("missing", b);
        p.config(&ProbeSettings::default()).unwrap();
        let r = p.probe().await;
        assert_eq!(r.status, crate::Status::Down);
        assert!(r.message.contains("404"));
    }
}
