/// Individual log format parsers and detectors

pub mod json;
pub mod cef;
pub mod syslog_kv;

pub use json::{parse_json, JsonDetector, JsonParser};
pub use cef::{parse_cef, CefDetector, CefParser};
pub use syslog_kv::{parse_syslog_kv, SyslogKvDetector, SyslogKvParser};
