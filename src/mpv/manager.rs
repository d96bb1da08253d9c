#[cfg(windows)]
use std::fs::File;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::{
    io::{
        BufRead,
        BufReader,
        Read,
        Write,
    },
    process::{
        Child,
        Command,
        Stdio,
    },
    time::{
        Duration,
        Instant,
    },
};

use serde_json::Value;
use tracing::{
    debug,
    info,
    warn,
};

use super::types::{
    default_mpv_endpoint,
    ConnectionState,
    MpvCommand,
    MpvResponse,
    MPV_BUFFER_SIZE,
    MPV_DETECTION_INTERVAL_MS,
    MPV_MAX_RESPONSE_LINES,
    MPV_SOCKET_TIMEOUT_MS,
};
use crate::{
    core::ComboError,
    memo::watch_url,
    player::{
        PlayerStatus,
        VideoPlayer,
    },
};

/// Drives an mpv instance over its JSON IPC socket. mpv resolves YouTube
/// links through yt-dlp, so a watch URL is enough to load a video.
pub struct MpvPlayer {
    endpoint: String,
    state: ConnectionState,
    last_check: Option<Instant>,
    request_counter: u32,
}

impl Default for MpvPlayer {
    fn default() -> Self {
        Self::new(default_mpv_endpoint())
    }
}

impl MpvPlayer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            state: ConnectionState::Disconnected,
            last_check: None,
            request_counter: 1,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Starts an idle mpv listening on our endpoint.
    pub fn spawn(&mut self) -> Result<Child, ComboError> {
        let child = Command::new("mpv")
            .arg("--idle=yes")
            .arg("--force-window=yes")
            .arg(format!("--input-ipc-server={}", self.endpoint))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ComboError::Player(format!("Failed to start mpv: {}", e)))?;
        info!("[MPV] Started mpv (pid {}) on {}", child.id(), self.endpoint);
        self.last_check = None;
        Ok(child)
    }

    fn send(&mut self, name: &str, args: Vec<Value>) -> Result<Option<Value>, ComboError> {
        if self.state != ConnectionState::Connected {
            return Err(ComboError::Player("MPV is not connected".into()));
        }

        let request_id = self.request_counter;
        self.request_counter = self.request_counter.wrapping_add(1);
        let payload = MpvCommand::new(request_id, name, args).to_line()?;

        let mut connection = self.create_connection()?;
        connection
            .write_all(payload.as_bytes())
            .map_err(|e| ComboError::Player(format!("Failed to write to MPV IPC: {}", e)))?;
        debug!("[MPV] Sent {} (request_id: {})", name, request_id);

        let mut reader = BufReader::with_capacity(MPV_BUFFER_SIZE, connection);
        let mut line = String::new();
        for _ in 0..MPV_MAX_RESPONSE_LINES {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| ComboError::Player(format!("Failed to read MPV reply: {}", e)))?;
            if read == 0 {
                break;
            }
            if let Some(reply) = parse_reply(&line, request_id) {
                return reply;
            }
        }

        Err(ComboError::Player(format!("No reply from MPV for {}", name)))
    }

    fn create_connection(&self) -> Result<Box<dyn ReadWrite>, ComboError> {
        let endpoint = self.endpoint.as_str();

        #[cfg(unix)]
        {
            let stream = UnixStream::connect(endpoint).map_err(|e| {
                ComboError::Player(format!("Failed to connect to MPV IPC {}: {}", endpoint, e))
            })?;

            let timeout = Duration::from_millis(MPV_SOCKET_TIMEOUT_MS);
            let _ = stream.set_read_timeout(Some(timeout));
            let _ = stream.set_write_timeout(Some(timeout));
            Ok(Box::new(stream))
        }

        #[cfg(windows)]
        {
            let pipe =
                std::fs::OpenOptions::new().read(true).write(true).open(endpoint).map_err(|e| {
                    ComboError::Player(format!("Failed to connect to MPV pipe {}: {}", endpoint, e))
                })?;
            Ok(Box::new(pipe))
        }
    }

    fn detect_mpv(&self) -> bool {
        let endpoint = self.endpoint.as_str();

        #[cfg(unix)]
        {
            use std::path::Path;
            Path::new(endpoint).exists() && UnixStream::connect(endpoint).is_ok()
        }

        #[cfg(windows)]
        {
            std::fs::OpenOptions::new().read(true).write(true).open(endpoint).is_ok()
        }
    }
}

impl VideoPlayer for MpvPlayer {
    fn name(&self) -> &str {
        "MPV"
    }

    fn is_available(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn launch(&mut self) -> Result<Child, ComboError> {
        self.spawn()
    }

    fn update(&mut self) {
        let now = Instant::now();
        let should_check = match self.last_check {
            None => true,
            Some(prev) => {
                now.duration_since(prev) >= Duration::from_millis(MPV_DETECTION_INTERVAL_MS)
            }
        };
        if !should_check {
            return;
        }
        self.last_check = Some(now);

        self.state = if self.detect_mpv() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
    }

    fn load(&mut self, video_id: &str, start: f64) -> Result<(), ComboError> {
        let url = watch_url(video_id, 0.0);
        let mut args = vec![Value::from(url), Value::from("replace")];
        if start > 0.0 {
            args.push(Value::from(format!("start={:.3}", start)));
        }
        self.send("loadfile", args)?;
        self.set_paused(false)?;
        info!("[MPV] Loaded video {} at {:.1}s", video_id, start);
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<(), ComboError> {
        let seconds = serde_json::Number::from_f64(seconds)
            .ok_or_else(|| ComboError::Player("Invalid timestamp value for MPV".into()))?;
        self.send("set_property", vec![Value::from("time-pos"), Value::Number(seconds)])?;
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), ComboError> {
        self.send("set_property", vec![Value::from("pause"), Value::from(paused)])?;
        Ok(())
    }

    fn state(&mut self) -> Result<PlayerStatus, ComboError> {
        let paused = self
            .send("get_property", vec![Value::from("pause")])?
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        // time-pos is unavailable while idle.
        let position = match self.send("get_property", vec![Value::from("time-pos")]) {
            Ok(value) => value.and_then(|v| v.as_f64()),
            Err(e) => {
                debug!("[MPV] time-pos unavailable: {}", e);
                None
            }
        };

        Ok(PlayerStatus { loaded: position.is_some(), position, paused })
    }
}

/// Interprets one IPC line. `None` for events and replies to other requests.
fn parse_reply(line: &str, request_id: u32) -> Option<Result<Option<Value>, ComboError>> {
    let response: MpvResponse = match serde_json::from_str(line.trim()) {
        Ok(response) => response,
        Err(e) => {
            warn!("[MPV] Unparseable IPC line '{}': {}", line.trim(), e);
            return None;
        }
    };

    if response.event.is_some() || response.request_id != Some(request_id) {
        return None;
    }

    if response.is_success() {
        Some(Ok(response.data))
    } else {
        let error = response.error.unwrap_or_else(|| "unknown error".to_string());
        Some(Err(ComboError::Player(format!("MPV request {} failed: {}", request_id, error))))
    }
}

trait ReadWrite: Read + Write {}

#[cfg(unix)]
impl ReadWrite for UnixStream {}

#[cfg(windows)]
impl ReadWrite for File {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_format() {
        let line = MpvCommand::new(7, "set_property", vec![Value::from("pause"), Value::from(true)])
            .to_line()
            .unwrap();
        assert_eq!(line, "{\"command\":[\"set_property\",\"pause\",true],\"request_id\":7}\n");
    }

    #[test]
    fn test_parse_reply_skips_events_and_other_requests() {
        assert!(parse_reply(r#"{"event":"playback-restart"}"#, 3).is_none());
        assert!(parse_reply(r#"{"error":"success","data":1.0,"request_id":2}"#, 3).is_none());
        assert!(parse_reply("garbage", 3).is_none());

        let ok = parse_reply(r#"{"error":"success","data":12.5,"request_id":3}"#, 3).unwrap();
        assert_eq!(ok.unwrap(), Some(Value::from(12.5)));

        let failed = parse_reply(r#"{"error":"property unavailable","request_id":3}"#, 3).unwrap();
        assert!(matches!(failed, Err(ComboError::Player(_))));
    }

    #[test]
    fn test_disconnected_player_refuses_commands() {
        let mut player = MpvPlayer::new("/nonexistent/comboscribe-mpv-socket");
        player.update();
        assert!(!player.is_available());
        assert!(matches!(player.seek(10.0), Err(ComboError::Player(_))));
    }
}
