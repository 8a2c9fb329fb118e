//! 크롤 엔진 경계.
//!
//! 수집 코어는 "작업 항목 묶음을 제출하고 응답 스트림을 받는다"는 계약만 사용합니다.
//! 재시도, 백오프, 요청 간격 같은 예의(politeness)는 엔진 책임입니다.
//!
//! `HttpCrawler`는 reqwest 기반 기본 구현입니다:
//! - 호스트별 고정 요청 간격 (기본 1초)
//! - 호스트별 동시 요청 수 제한 (기본 8)
//! - 네트워크 오류, 429, 5xx 응답에 대한 지수 백오프 재시도
//! - 응답은 제출 순서대로 반환

use crate::error::Result;
use archive_core::{DataKind, Security};
use chrono::NaiveDate;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

/// 응답과 함께 되돌아오는 작업 메타데이터.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMeta {
    pub security: Security,
    /// 틱 요청의 대상 거래일 (일봉 구간 요청이면 `None`)
    pub date: Option<NaiveDate>,
    pub kind: DataKind,
}

/// 크롤 작업 항목.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub meta: JobMeta,
}

/// 최종 응답.
#[derive(Debug, Clone)]
pub struct CrawlResponse {
    pub url: String,
    /// `Content-Type` 헤더 원문
    pub content_kind: Option<String>,
    pub body: Vec<u8>,
    pub meta: JobMeta,
}

impl CrawlResponse {
    /// 파라미터를 제거한 소문자 미디어 타입 (`text/html; charset=gbk` → `text/html`).
    pub fn media_type(&self) -> Option<String> {
        self.content_kind
            .as_deref()
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }
}

/// 재시도를 모두 소진한 요청.
#[derive(Debug, Clone)]
pub struct CrawlFailure {
    pub url: String,
    pub meta: JobMeta,
    pub reason: String,
}

pub type CrawlResult = std::result::Result<CrawlResponse, CrawlFailure>;

/// 크롤 엔진.
pub trait CrawlEngine: Send + Sync {
    /// 작업 묶음을 제출하고 응답 스트림을 반환합니다.
    ///
    /// 스트림을 drop 하면 진행 중인 요청도 함께 취소됩니다.
    fn submit(&self, items: Vec<WorkItem>) -> BoxStream<'static, CrawlResult>;
}

/// 크롤러 설정.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// 같은 호스트에 대한 요청 시작 간격
    pub request_delay: Duration,
    /// 같은 호스트에 대한 동시 요청 수
    pub max_in_flight_per_target: usize,
    /// 요청당 타임아웃
    pub request_timeout: Duration,
    /// 최대 재시도 횟수
    pub max_retries: u32,
    /// 첫 재시도 대기 시간 (시도마다 두 배)
    pub retry_backoff: Duration,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(1000),
            max_in_flight_per_target: 8,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

/// 호스트별 요청 제어.
struct HostGate {
    permits: Semaphore,
    next_slot: AsyncMutex<Instant>,
}

impl HostGate {
    fn new(max_in_flight: usize) -> Self {
        Self {
            permits: Semaphore::new(max_in_flight.max(1)),
            next_slot: AsyncMutex::new(Instant::now()),
        }
    }

    /// 다음 요청 시작 시각까지 대기합니다.
    async fn wait_turn(&self, delay: Duration) {
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        let start = (*next).max(now);
        *next = start + delay;
        drop(next);
        tokio::time::sleep_until(start).await;
    }
}

/// 단일 시도 실패.
struct AttemptError {
    retryable: bool,
    reason: String,
}

/// reqwest 기반 크롤 엔진.
#[derive(Clone)]
pub struct HttpCrawler {
    client: reqwest::Client,
    config: CrawlConfig,
    hosts: Arc<Mutex<HashMap<String, Arc<HostGate>>>>,
}

impl HttpCrawler {
    /// 새 크롤러를 생성합니다.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            hosts: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn gate(&self, host: &str) -> Arc<HostGate> {
        let mut hosts = match self.hosts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(HostGate::new(self.config.max_in_flight_per_target))),
        )
    }

    async fn fetch_with_retry(&self, item: WorkItem) -> CrawlResult {
        let host = match reqwest::Url::parse(&item.url) {
            Ok(url) => url.host_str().unwrap_or_default().to_string(),
            Err(e) => {
                return Err(CrawlFailure {
                    reason: format!("invalid url: {}", e),
                    url: item.url,
                    meta: item.meta,
                })
            }
        };
        let gate = self.gate(&host);

        let mut attempt = 0u32;
        loop {
            let result = {
                let _permit = gate.permits.acquire().await;
                gate.wait_turn(self.config.request_delay).await;
                self.fetch_once(&item).await
            };

            match result {
                Ok(body) => return Ok(body),
                Err(e) if e.retryable && attempt < self.config.max_retries => {
                    let backoff = self.config.retry_backoff * 2u32.saturating_pow(attempt);
                    warn!(
                        url = %item.url,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        reason = %e.reason,
                        "요청 실패, 재시도 예정"
                    );
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    return Err(CrawlFailure {
                        url: item.url,
                        meta: item.meta,
                        reason: e.reason,
                    })
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        item: &WorkItem,
    ) -> std::result::Result<CrawlResponse, AttemptError> {
        let mut request = self.client.get(&item.url);
        for (name, value) in &item.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| AttemptError {
            retryable: true,
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError {
                retryable: status.as_u16() == 429 || status.is_server_error(),
                reason: format!("HTTP {}", status),
            });
        }

        let content_kind = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| AttemptError {
            retryable: true,
            reason: e.to_string(),
        })?;

        debug!(url = %item.url, bytes = body.len(), content_kind = ?content_kind, "응답 수신");

        Ok(CrawlResponse {
            url: item.url.clone(),
            content_kind,
            body: body.to_vec(),
            meta: item.meta.clone(),
        })
    }
}

impl CrawlEngine for HttpCrawler {
    fn submit(&self, items: Vec<WorkItem>) -> BoxStream<'static, CrawlResult> {
        let in_flight = self.config.max_in_flight_per_target.max(1);
        let this = self.clone();

        stream::iter(items)
            .map(move |item| {
                let this = this.clone();
                async move { this.fetch_with_retry(item).await }
            })
            .buffered(in_flight)
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> JobMeta {
        JobMeta {
            security: Security::sh("600000"),
            date: NaiveDate::from_ymd_opt(2020, 1, 3),
            kind: DataKind::Tick,
        }
    }

    #[test]
    fn test_media_type_strips_parameters() {
        let response = CrawlResponse {
            url: "http://example.com".to_string(),
            content_kind: Some("Application/vnd.ms-excel; charset=GBK".to_string()),
            body: Vec::new(),
            meta: meta(),
        };
        assert_eq!(response.media_type().as_deref(), Some("application/vnd.ms-excel"));

        let missing = CrawlResponse { content_kind: None, ..response };
        assert_eq!(missing.media_type(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_gate_spaces_requests() {
        let gate = HostGate::new(2);
        let start = Instant::now();
        gate.wait_turn(Duration::from_secs(1)).await;
        gate.wait_turn(Duration::from_secs(1)).await;
        gate.wait_turn(Duration::from_secs(1)).await;
        assert!(Instant::now() - start >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_invalid_url_is_terminal_failure() {
        let crawler = HttpCrawler::new(CrawlConfig::default()).unwrap();
        let items = vec![WorkItem {
            url: "not a url".to_string(),
            headers: Vec::new(),
            meta: meta(),
        }];
        let results: Vec<CrawlResult> = crawler.submit(items).collect().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().is_err());
    }
}
