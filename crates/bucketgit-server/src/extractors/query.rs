use serde::Deserialize;

/// Query of `GET .../info/refs`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ServiceQuery {
    pub service: Option<String>,
}
