use crate::config::{HttpConfig, HttpEndpoint};
use crate::sensors::SensorSnapshot;
use std::fmt;

/// Header carrying the remote duty-cycle override on a 200 response.
pub const INTERVAL_OVERRIDE_HEADER: &str = "X-Interval-Override";
/// Header carrying the redirect target on a 301/302 response.
pub const LOCATION_HEADER: &str = "Location";

/// Synthetic status used when the transport failed before producing one.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

const THINGSPEAK_URL: &str = "https://api.thingspeak.com/update";
const ADAFRUIT_IO_URL: &str = "https://io.adafruit.com/api/groups";

/// Outbound request handed to the external transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub body: String,
}

impl HttpRequest {
    /// GET request with an empty body, the only shape the push cycle emits.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: String::new(),
        }
    }
}

/// Completed exchange delivered back to the sequencer as an event.
/// `header_block` is the raw header section of the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub header_block: String,
}

impl HttpResponse {
    /// Response standing in for a transport-level failure.
    pub fn transport_failure() -> Self {
        Self {
            status: TRANSPORT_FAILURE_STATUS,
            body: String::new(),
            header_block: String::new(),
        }
    }
}

/// Error returned when the transport rejects a request synchronously.
#[derive(Debug, Clone)]
pub struct HttpTransportError {
    message: String,
}

impl HttpTransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for HttpTransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HttpTransportError {}

/// Seam for the external one-shot asynchronous HTTP transport. A submitted
/// request completes later as an `HttpResponse` event; a synchronous `Err`
/// means the request was never accepted.
pub trait HttpTransport {
    fn submit(&mut self, request: HttpRequest) -> Result<(), HttpTransportError>;
}

/// Builds the outbound request for the configured endpoint mode, or `None`
/// when HTTP delivery is disabled.
pub fn build_request(config: &HttpConfig, snapshot: &SensorSnapshot) -> Option<HttpRequest> {
    let url = match config.endpoint {
        HttpEndpoint::Disabled => return None,
        HttpEndpoint::Thingspeak => format!(
            "{THINGSPEAK_URL}?api_key={}&field1={}&field2={}&field3={}&field4={}&field5={}",
            config.api_key,
            snapshot.temperature,
            snapshot.humidity,
            snapshot.pressure,
            snapshot.battery,
            snapshot.rssi,
        ),
        HttpEndpoint::AdafruitIo => format!(
            "{ADAFRUIT_IO_URL}/{}/send.json?x-aio-key={}&temperature={}&humidity={}&pressure={}&battery={}&rssi={}",
            config.group,
            config.api_key,
            snapshot.temperature,
            snapshot.humidity,
            snapshot.pressure,
            snapshot.battery,
            snapshot.rssi,
        ),
        HttpEndpoint::Custom => substitute_placeholders(&config.url_template, snapshot),
    };
    Some(HttpRequest::get(url))
}

/// Replaces the `%t` `%h` `%p` `%v` `%r` placeholders with snapshot values.
pub fn substitute_placeholders(template: &str, snapshot: &SensorSnapshot) -> String {
    template
        .replace("%t", &snapshot.temperature)
        .replace("%h", &snapshot.humidity)
        .replace("%p", &snapshot.pressure)
        .replace("%v", &snapshot.battery)
        .replace("%r", &snapshot.rssi)
}

/// How the sequencer should react to a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpDisposition {
    /// 200: the push landed. `interval_override` carries the parsed duty-cycle
    /// directive when the server sent one; range validation happens at the
    /// configuration layer.
    Delivered { interval_override: Option<u32> },
    /// 301/302: follow `location` if the budget allows. A missing `Location`
    /// header leaves `location` empty and is treated as a failed attempt.
    Redirected { location: Option<String> },
    /// Any other status, including a transport-level failure.
    Failed { status: u16 },
}

/// Classifies a completed exchange. Single entry point, invoked exactly once
/// per request attempt.
pub fn classify_response(response: &HttpResponse) -> HttpDisposition {
    match response.status {
        200 => HttpDisposition::Delivered {
            interval_override: scan_header(&response.header_block, INTERVAL_OVERRIDE_HEADER)
                .and_then(|value| value.parse::<u32>().ok()),
        },
        301 | 302 => HttpDisposition::Redirected {
            location: scan_header(&response.header_block, LOCATION_HEADER)
                .filter(|value| !value.is_empty()),
        },
        status => HttpDisposition::Failed { status },
    }
}

/// Returns the trimmed value of the first header line matching `name`.
pub fn scan_header(header_block: &str, name: &str) -> Option<String> {
    for line in header_block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case(name) {
            return Some(value.trim().to_string());
        }
    }
    None
}
