use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

pub const MPV_SOCKET_TIMEOUT_MS: u64 = 800;
pub const MPV_DETECTION_INTERVAL_MS: u64 = 1000;
pub const MPV_BUFFER_SIZE: usize = 4096;
/// Lines read while waiting for a reply before giving up.
pub const MPV_MAX_RESPONSE_LINES: usize = 64;

pub const fn default_mpv_endpoint() -> &'static str {
    #[cfg(windows)]
    return r"\\.\pipe\tmp\mpv-socket";
    #[cfg(not(windows))]
    return "/tmp/mpv-socket";
}

#[derive(Debug, Serialize)]
pub struct MpvCommand {
    pub command: Vec<Value>,
    pub request_id: u32,
}

impl MpvCommand {
    pub fn new(request_id: u32, name: &str, args: impl IntoIterator<Item = Value>) -> Self {
        let mut command = vec![Value::from(name)];
        command.extend(args);
        Self { command, request_id }
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{}\n", serde_json::to_string(self)?))
    }
}

/// Reply or event line from the IPC socket. Events carry `event` and no `request_id`.
#[derive(Debug, Deserialize)]
pub struct MpvResponse {
    #[serde(default)]
    pub error: Option<String>,
    pub data: Option<Value>,
    #[serde(default)]
    pub request_id: Option<u32>,
    #[serde(default)]
    pub event: Option<String>,
}

impl MpvResponse {
    pub fn is_success(&self) -> bool {
        self.error.as_deref() == Some("success")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}
