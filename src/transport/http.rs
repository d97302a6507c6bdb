use crate::http_stage::{HttpRequest, HttpResponse, HttpTransport, HttpTransportError};
use reqwest::blocking::Client;
use std::collections::VecDeque;
use std::time::Duration;

/// Blocking HTTP adapter behind the core's transport seam. Redirects are
/// disabled at the client so the sequencer owns the redirect budget, and the
/// raw header section is reassembled for the core's directive scan.
pub struct ReqwestHttpTransport {
    client: Client,
    completions: VecDeque<HttpResponse>,
}

impl ReqwestHttpTransport {
    /// Creates an adapter with a 10 s request timeout.
    pub fn new() -> Result<Self, HttpTransportError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| HttpTransportError::new(format!("http client build failed: {err}")))?;
        Ok(Self {
            client,
            completions: VecDeque::new(),
        })
    }

    /// Drains the next completed exchange, to be fed back as an event.
    pub fn take_completion(&mut self) -> Option<HttpResponse> {
        self.completions.pop_front()
    }
}

impl HttpTransport for ReqwestHttpTransport {
    fn submit(&mut self, request: HttpRequest) -> Result<(), HttpTransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|err| HttpTransportError::new(format!("invalid url: {err}")))?;
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(_) => {
                // Accepted but failed in flight: surfaced as a completion so
                // the sequencer arms its standard backoff.
                self.completions.push_back(HttpResponse::transport_failure());
                return Ok(());
            }
        };
        let status = response.status().as_u16();
        let mut header_block = String::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            header_block.push_str(name.as_str());
            header_block.push_str(": ");
            header_block.push_str(value);
            header_block.push_str("\r\n");
        }
        let body = response.text().unwrap_or_default();
        self.completions.push_back(HttpResponse {
            status,
            body,
            header_block,
        });
        Ok(())
    }
}
