use std::process::Child;

use tracing::{
    info,
    warn,
};

use crate::core::ComboError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStatus {
    pub loaded: bool,
    pub position: Option<f64>,
    pub paused: bool,
}

/// An external video widget the memo tool can drive.
pub trait VideoPlayer {
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;
    /// Refreshes availability. Called once per frame.
    fn update(&mut self) {}
    /// Starts the player process when it can be started locally.
    fn launch(&mut self) -> Result<Child, ComboError> {
        Err(ComboError::Player(format!("{} cannot be started from here", self.name())))
    }
    fn load(&mut self, video_id: &str, start: f64) -> Result<(), ComboError>;
    fn seek(&mut self, seconds: f64) -> Result<(), ComboError>;
    fn set_paused(&mut self, paused: bool) -> Result<(), ComboError>;
    fn state(&mut self) -> Result<PlayerStatus, ComboError>;
}

/// Tracks which video is loaded so seeking into another video loads it first.
pub struct PlayerManager {
    player: Box<dyn VideoPlayer>,
    current_video: Option<String>,
}

impl PlayerManager {
    pub fn new(player: Box<dyn VideoPlayer>) -> Self {
        Self { player, current_video: None }
    }

    pub fn update(&mut self) {
        let was_available = self.player.is_available();
        self.player.update();

        match (was_available, self.player.is_available()) {
            (false, true) => info!("[Player] {} connected", self.player.name()),
            (true, false) => {
                info!("[Player] {} disconnected", self.player.name());
                self.current_video = None;
            }
            _ => {}
        }
    }

    pub fn launch(&mut self) -> Result<Child, ComboError> {
        let child = self.player.launch()?;
        self.current_video = None;
        Ok(child)
    }

    pub fn is_connected(&self) -> bool {
        self.player.is_available()
    }

    pub fn current_video(&self) -> Option<&str> {
        self.current_video.as_deref()
    }

    fn ensure_available(&self) -> Result<(), ComboError> {
        if self.player.is_available() {
            Ok(())
        } else {
            Err(ComboError::Player(format!("{} is not connected", self.player.name())))
        }
    }

    pub fn open_video(&mut self, video_id: &str) -> Result<(), ComboError> {
        self.seek_to(video_id, 0.0)
    }

    pub fn seek_to(&mut self, video_id: &str, seconds: f64) -> Result<(), ComboError> {
        self.ensure_available()?;

        if self.current_video.as_deref() == Some(video_id) {
            self.player.seek(seconds)
        } else {
            self.player.load(video_id, seconds)?;
            self.current_video = Some(video_id.to_string());
            Ok(())
        }
    }

    pub fn toggle_pause(&mut self) -> Result<bool, ComboError> {
        self.ensure_available()?;
        let paused = !self.player.state()?.paused;
        self.player.set_paused(paused)?;
        Ok(paused)
    }

    /// Current playback position, `None` when nothing is playing or the player is gone.
    pub fn position(&mut self) -> Option<f64> {
        if !self.player.is_available() || self.current_video.is_none() {
            return None;
        }
        match self.player.state() {
            Ok(status) => status.position,
            Err(e) => {
                warn!("[Player] Failed to query position: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        rc::Rc,
    };

    use super::*;

    #[derive(Default)]
    struct Calls {
        loads: Vec<(String, f64)>,
        seeks: Vec<f64>,
        paused: bool,
    }

    struct FakePlayer {
        available: bool,
        calls: Rc<RefCell<Calls>>,
    }

    impl VideoPlayer for FakePlayer {
        fn name(&self) -> &str {
            "fake"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn load(&mut self, video_id: &str, start: f64) -> Result<(), ComboError> {
            self.calls.borrow_mut().loads.push((video_id.to_string(), start));
            Ok(())
        }

        fn seek(&mut self, seconds: f64) -> Result<(), ComboError> {
            self.calls.borrow_mut().seeks.push(seconds);
            Ok(())
        }

        fn set_paused(&mut self, paused: bool) -> Result<(), ComboError> {
            self.calls.borrow_mut().paused = paused;
            Ok(())
        }

        fn state(&mut self) -> Result<PlayerStatus, ComboError> {
            let calls = self.calls.borrow();
            Ok(PlayerStatus {
                loaded: !calls.loads.is_empty(),
                position: calls.seeks.last().copied(),
                paused: calls.paused,
            })
        }
    }

    fn manager(available: bool) -> (PlayerManager, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let player = FakePlayer { available, calls: calls.clone() };
        (PlayerManager::new(Box::new(player)), calls)
    }

    #[test]
    fn test_seek_loads_new_video_then_seeks() {
        let (mut players, calls) = manager(true);
        players.seek_to("abc", 12.0).unwrap();
        players.seek_to("abc", 30.0).unwrap();
        players.seek_to("xyz", 5.0).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.loads, vec![("abc".to_string(), 12.0), ("xyz".to_string(), 5.0)]);
        assert_eq!(calls.seeks, vec![30.0]);
        assert_eq!(players.current_video(), Some("xyz"));
    }

    #[test]
    fn test_toggle_pause_flips_state() {
        let (mut players, calls) = manager(true);
        assert!(players.toggle_pause().unwrap());
        assert!(calls.borrow().paused);
        assert!(!players.toggle_pause().unwrap());
    }

    #[test]
    fn test_unavailable_player_errors() {
        let (mut players, calls) = manager(false);
        assert!(matches!(players.seek_to("abc", 1.0), Err(ComboError::Player(_))));
        assert!(players.position().is_none());
        assert!(calls.borrow().loads.is_empty());
    }
}
