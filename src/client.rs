use reqwest::{
    blocking::Client,
    header::{
        HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT,
    },
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{RequestParams, Settings};

pub const MODE: &str = "5";
pub const SEASON1: &str = "11";
pub const SEASON2: &str = "0";

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
const SITE: &str = "https://klbq.idreamsky.com";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(reqwest::StatusCode),
    #[error("response body is not JSON: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Anything that can answer a (map, ranks) stats query.
pub trait StatsSource {
    /// `None` means the query failed; the cause has already been logged.
    fn fetch(&self, map_code: &str, rank_codes: &[String]) -> Option<Value>;
}

#[derive(Serialize, Debug, PartialEq)]
#[allow(non_snake_case)]
pub struct RequestBody<'a> {
    pub iChartId: &'a str,
    pub iSubChartId: &'a str,
    pub sIdeToken: &'a str,
    pub mode: &'a str,
    pub map: &'a str,
    pub rank: &'a [String],
    pub season1: &'a str,
    pub season2: &'a str,
}

impl<'a> RequestBody<'a> {
    pub fn new(params: &'a RequestParams, map_code: &'a str, rank_codes: &'a [String]) -> Self {
        Self {
            iChartId: &params.chart_id,
            iSubChartId: &params.chart_id,
            sIdeToken: &params.ide_token,
            mode: MODE,
            map: map_code,
            rank: rank_codes,
            season1: SEASON1,
            season2: SEASON2,
        }
    }
}

/// Holds the one HTTP session used for the whole run.
pub struct StatsClient {
    http: Client,
    api_url: String,
    params: RequestParams,
}

impl StatsClient {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let http = Client::builder()
            .default_headers(default_headers())
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: settings.api_url.clone(),
            params: settings.params.clone(),
        })
    }

    pub fn try_fetch(&self, map_code: &str, rank_codes: &[String]) -> Result<Value, FetchError> {
        let body = RequestBody::new(&self.params, map_code, rank_codes);
        debug!(url = %self.api_url, ?body, "posting stats query");

        let response = self.http.post(&self.api_url).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        response.json::<Value>().map_err(FetchError::Decode)
    }
}

impl StatsSource for StatsClient {
    fn fetch(&self, map_code: &str, rank_codes: &[String]) -> Option<Value> {
        info!(map = %map_code, rank = ?rank_codes, "sending API request");
        match self.try_fetch(map_code, rank_codes) {
            Ok(value) => {
                info!(map = %map_code, "data fetched");
                Some(value)
            }
            Err(e) => {
                warn!(map = %map_code, rank = ?rank_codes, "API request failed: {e}");
                None
            }
        }
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(MOBILE_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9"));
    headers.insert(ORIGIN, HeaderValue::from_static(SITE));
    headers.insert(REFERER, HeaderValue::from_static("https://klbq.idreamsky.com/"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::TcpListener,
        thread,
        time::Duration,
    };

    use serde_json::json;

    use super::*;

    /// Serves exactly one connection with `status` and `body`, after an
    /// optional delay, and hands back the raw request text.
    fn one_shot_server(
        status: &'static str,
        body: &'static str,
        delay: Duration,
    ) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api/common/ide", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut head = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
                head.push_str(&line);
            }
            let mut payload = vec![0; content_length];
            reader.read_exact(&mut payload).unwrap();

            thread::sleep(delay);
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = reader.get_mut().write_all(response.as_bytes());

            format!("{head}\r\n{}", String::from_utf8_lossy(&payload))
        });

        (url, handle)
    }

    fn client_for(url: String, timeout: Duration) -> StatsClient {
        let settings = Settings {
            api_url: url,
            timeout,
            ..Settings::default()
        };
        StatsClient::new(&settings).unwrap()
    }

    #[test]
    fn request_body_shape() {
        let params = RequestParams::default();
        let ranks = vec!["2".to_string()];
        let body = serde_json::to_value(RequestBody::new(&params, "-255", &ranks)).unwrap();

        assert_eq!(
            body,
            json!({
                "iChartId": "338985",
                "iSubChartId": "338985",
                "sIdeToken": "b7FM3m",
                "mode": "5",
                "map": "-255",
                "rank": ["2"],
                "season1": "11",
                "season2": "0",
            })
        );
    }

    #[test]
    fn success_returns_body_and_sends_headers() {
        let (url, server) =
            one_shot_server("200 OK", r#"{"jData":{"data1":{"side1":[]}}}"#, Duration::ZERO);
        let client = client_for(url, Duration::from_secs(5));

        let value = client.fetch("-255", &["2".to_string()]).unwrap();
        let request = server.join().unwrap().to_ascii_lowercase();

        assert_eq!(value, json!({"jData": {"data1": {"side1": []}}}));
        assert!(request.starts_with("post /api/common/ide"));
        assert!(request.contains("origin: https://klbq.idreamsky.com"));
        assert!(request.contains("referer: https://klbq.idreamsky.com/"));
        assert!(request.contains("content-type: application/json"));
        assert!(request.contains("accept-language: zh-cn,zh;q=0.9"));
        assert!(request.contains("iphone"));
        assert!(request.contains(r#""map":"-255""#));
    }

    #[test]
    fn error_status_is_a_failure() {
        let (url, server) = one_shot_server("500 Internal Server Error", "{}", Duration::ZERO);
        let client = client_for(url, Duration::from_secs(5));

        let err = client.try_fetch("-255", &["2".to_string()]).unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 500));
    }

    #[test]
    fn non_json_body_is_a_failure() {
        let (url, server) = one_shot_server("200 OK", "<html>", Duration::ZERO);
        let client = client_for(url, Duration::from_secs(5));

        assert!(client.fetch("-255", &["2".to_string()]).is_none());
        server.join().unwrap();
    }

    #[test]
    fn timeout_is_a_failure() {
        let (url, server) = one_shot_server("200 OK", "{}", Duration::from_millis(1500));
        let client = client_for(url, Duration::from_millis(200));

        assert!(client.fetch("-255", &["2".to_string()]).is_none());
        server.join().unwrap();
    }
}
