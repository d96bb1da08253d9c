use std::sync::OnceLock;

use regex::Regex;
use serde::{
    Deserialize,
    Serialize,
};

use super::models::{
    Action,
    ActionTable,
};

pub const NEUTRAL: u8 = 5;
pub const MULTI_DIRECTION_SEPARATOR: &str = " + ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
}

impl Dir {
    pub fn is_vertical(self) -> bool {
        matches!(self, Dir::Up | Dir::Down)
    }

    pub fn label(self) -> &'static str {
        match self {
            Dir::Up => "Up",
            Dir::Down => "Down",
            Dir::Left => "Left",
            Dir::Right => "Right",
        }
    }
}

/// Notation prefix added in front of a committed command while its modifier is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrefixModifier {
    Crouch,
    Forward,
}

impl PrefixModifier {
    pub fn prefix(self) -> &'static str {
        match self {
            PrefixModifier::Crouch => "c.",
            PrefixModifier::Forward => "f.",
        }
    }
}

/// Numpad digit for the held directions, given in press order.
///
/// Opposing directions on the same axis resolve to whichever was pressed last.
pub fn compose_direction(held: &[Dir]) -> u8 {
    let vertical = held.iter().rev().find(|dir| dir.is_vertical()).copied();
    let horizontal = held.iter().rev().find(|dir| !dir.is_vertical()).copied();

    let row = match vertical {
        Some(Dir::Down) => 1,
        Some(_) => 7,
        None => 4,
    };
    let column = match horizontal {
        Some(Dir::Left) => 0,
        Some(_) => 2,
        None => 1,
    };

    row + column
}

pub fn format_command(prefix: &str, output: &str, modifier: Option<PrefixModifier>) -> String {
    let separator = if prefix.chars().count() > 1 { MULTI_DIRECTION_SEPARATOR } else { "" };
    let modifier = modifier.map(PrefixModifier::prefix).unwrap_or("");
    format!("{}{}{}{}", modifier, prefix, separator, output)
}

fn leading_motion() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9 +]*").unwrap())
}

/// Finds the action a piece of hand-written notation refers to.
///
/// The text matches when everything in front of the action output is motion
/// (digits, spaces, plus signs). Longer outputs are tried first so `2HS` is
/// attributed to `HS` rather than `S`.
pub fn match_action<'a>(text: &str, actions: &'a ActionTable) -> Option<&'a Action> {
    let text = text.trim();
    let remainder = leading_motion().replace(text, "");

    let mut candidates: Vec<&Action> = actions.iter().collect();
    candidates.sort_by(|a, b| b.output.chars().count().cmp(&a.output.chars().count()));

    candidates.into_iter().find(|action| remainder == action.output.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Rgb;

    #[test]
    fn test_compose_direction_compass() {
        assert_eq!(compose_direction(&[]), 5);
        assert_eq!(compose_direction(&[Dir::Down]), 2);
        assert_eq!(compose_direction(&[Dir::Up, Dir::Left]), 7);
        assert_eq!(compose_direction(&[Dir::Up, Dir::Right]), 9);
        assert_eq!(compose_direction(&[Dir::Down, Dir::Left]), 1);
        assert_eq!(compose_direction(&[Dir::Right, Dir::Down]), 3);
        assert_eq!(compose_direction(&[Dir::Left]), 4);
        assert_eq!(compose_direction(&[Dir::Right]), 6);
        assert_eq!(compose_direction(&[Dir::Up]), 8);
    }

    #[test]
    fn test_compose_direction_last_pressed_wins() {
        assert_eq!(compose_direction(&[Dir::Left, Dir::Right]), 6);
        assert_eq!(compose_direction(&[Dir::Right, Dir::Left]), 4);
        assert_eq!(compose_direction(&[Dir::Down, Dir::Right, Dir::Up]), 9);
    }

    #[test]
    fn test_format_command() {
        assert_eq!(format_command("2", "P", None), "2P");
        assert_eq!(format_command("236", "P", None), "236 + P");
        assert_eq!(format_command("", "jc", None), "jc");
        assert_eq!(format_command("2", "P", Some(PrefixModifier::Crouch)), "c.2P");
        assert_eq!(format_command("5", "K", Some(PrefixModifier::Forward)), "f.5K");
    }

    #[test]
    fn test_match_action_prefers_longest_output() {
        let table = ActionTable::new(vec![
            Action::new("S", 'l', Rgb::default()),
            Action::new("HS", 'u', Rgb::default()),
            Action::new("P", 'j', Rgb::default()),
        ])
        .unwrap();

        assert_eq!(match_action("2HS", &table).map(|a| a.output.as_str()), Some("HS"));
        assert_eq!(match_action("236 + S", &table).map(|a| a.output.as_str()), Some("S"));
        assert_eq!(match_action("  5P ", &table).map(|a| a.output.as_str()), Some("P"));
        assert!(match_action("c.2P", &table).is_none());
        assert!(match_action("2PS", &table).is_none());
    }
}
