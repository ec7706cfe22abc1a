//! Actions proposed by the reasoning service.
//!
//! The reasoning service speaks in string-keyed JSON objects
//! (`{"action": "click", "element_index": 3, ...}`). Those are parsed once,
//! at plan construction, into the closed [`Action`] variant; unknown kinds and
//! missing required fields are rejected there rather than during dispatch.

use crate::errors::AutomationError;
use crate::utils::string_or_number;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six action kinds the engine can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    RightClick,
    Type,
    Keyboard,
    Scroll,
    ScrollAndCapture,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::RightClick => "right_click",
            Self::Type => "type",
            Self::Keyboard => "keyboard",
            Self::Scroll => "scroll",
            Self::ScrollAndCapture => "scroll_and_capture",
        }
    }

    /// Whether the kind aims at a detection rather than the window itself.
    pub fn needs_target(&self) -> bool {
        matches!(self, Self::Click | Self::RightClick | Self::Type)
    }

    pub fn is_scroll(&self) -> bool {
        matches!(self, Self::Scroll | Self::ScrollAndCapture)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "click" => Ok(Self::Click),
            "right_click" => Ok(Self::RightClick),
            "type" => Ok(Self::Type),
            "keyboard" => Ok(Self::Keyboard),
            "scroll" => Ok(Self::Scroll),
            "scroll_and_capture" => Ok(Self::ScrollAndCapture),
            other => Err(AutomationError::InvalidAction(format!(
                "unknown action kind '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrollDirection {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(AutomationError::InvalidAction(format!(
                "unknown scroll direction '{other}'"
            ))),
        }
    }
}

/// Reference from an action to the detection it operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRef {
    /// Match on the detection's identifier (`mesh_id`).
    Identifier(String),
    /// Match on the detection's original 0-based index.
    Index(usize),
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(id) => write!(f, "{id}"),
            Self::Index(i) => write!(f, "#{i}"),
        }
    }
}

/// One executable step of a plan. Each variant carries only the fields its
/// kind needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Click {
        target: Option<TargetRef>,
        confidence: Option<f32>,
    },
    RightClick {
        target: Option<TargetRef>,
        confidence: Option<f32>,
    },
    Type {
        target: Option<TargetRef>,
        input_text: Option<String>,
        key_command: Option<String>,
        confidence: Option<f32>,
    },
    Keyboard {
        key_command: String,
        confidence: Option<f32>,
    },
    Scroll {
        direction: ScrollDirection,
        confidence: Option<f32>,
    },
    ScrollAndCapture {
        direction: ScrollDirection,
        confidence: Option<f32>,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Click { .. } => ActionKind::Click,
            Self::RightClick { .. } => ActionKind::RightClick,
            Self::Type { .. } => ActionKind::Type,
            Self::Keyboard { .. } => ActionKind::Keyboard,
            Self::Scroll { .. } => ActionKind::Scroll,
            Self::ScrollAndCapture { .. } => ActionKind::ScrollAndCapture,
        }
    }

    pub fn target(&self) -> Option<&TargetRef> {
        match self {
            Self::Click { target, .. }
            | Self::RightClick { target, .. }
            | Self::Type { target, .. } => target.as_ref(),
            _ => None,
        }
    }

    pub fn confidence(&self) -> Option<f32> {
        match self {
            Self::Click { confidence, .. }
            | Self::RightClick { confidence, .. }
            | Self::Type { confidence, .. }
            | Self::Keyboard { confidence, .. }
            | Self::Scroll { confidence, .. }
            | Self::ScrollAndCapture { confidence, .. } => *confidence,
        }
    }

    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        match self {
            Self::Scroll { direction, .. } | Self::ScrollAndCapture { direction, .. } => {
                Some(*direction)
            }
            _ => None,
        }
    }
}

/// Action exactly as the reasoning service emits it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawAction {
    pub action: String,
    /// Negative values mean the service found nothing to point at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_index: Option<i64>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub mesh_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl RawAction {
    /// Target reference: identifier wins over index, like the detection lookup.
    fn target(&self) -> Option<TargetRef> {
        match (&self.mesh_id, self.element_index) {
            (Some(id), _) if !id.trim().is_empty() => Some(TargetRef::Identifier(id.clone())),
            (_, Some(index)) => usize::try_from(index).ok().map(TargetRef::Index),
            _ => None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl TryFrom<RawAction> for Action {
    type Error = AutomationError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        let kind: ActionKind = raw.action.parse()?;

        if let Some(c) = raw.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(AutomationError::InvalidAction(format!(
                    "confidence {c} for '{kind}' is outside 0..=1"
                )));
            }
        }
        let confidence = raw.confidence;

        let direction = || -> Result<ScrollDirection, AutomationError> {
            match non_empty(&raw.scroll_direction) {
                Some(d) => d.parse(),
                None => Ok(ScrollDirection::default()),
            }
        };

        let action = match kind {
            ActionKind::Click => Action::Click {
                target: raw.target(),
                confidence,
            },
            ActionKind::RightClick => Action::RightClick {
                target: raw.target(),
                confidence,
            },
            ActionKind::Type => Action::Type {
                target: raw.target(),
                // Text is typed verbatim; only blank strings are dropped.
                input_text: raw.input_text.clone().filter(|t| !t.is_empty()),
                key_command: non_empty(&raw.key_command)
                    .map(|k| normalize_key_command(&k))
                    .transpose()?,
                confidence,
            },
            ActionKind::Keyboard => {
                let key = non_empty(&raw.key_command).ok_or_else(|| {
                    AutomationError::InvalidAction("keyboard action without key_command".into())
                })?;
                Action::Keyboard {
                    key_command: normalize_key_command(&key)?,
                    confidence,
                }
            }
            ActionKind::Scroll => Action::Scroll {
                direction: direction()?,
                confidence,
            },
            ActionKind::ScrollAndCapture => Action::ScrollAndCapture {
                direction: direction()?,
                confidence,
            },
        };
        Ok(action)
    }
}

/// Normalize a key command to the backend's lower-case form.
///
/// Accepts single keys ("Enter", "ESC") and `+`-joined combinations
/// ("Ctrl+Shift+T"); common aliases collapse to one canonical name. The plus
/// key itself is written as a doubled separator ("ctrl++") or alone ("+").
pub fn normalize_key_command(key: &str) -> Result<String, AutomationError> {
    let malformed = || AutomationError::InvalidAction(format!("malformed key command '{key}'"));

    let tokens: Vec<&str> = key.trim().split('+').map(str::trim).collect();
    let mut parts = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if !tokens[i].is_empty() {
            parts.push(canonical_key(tokens[i]));
            i += 1;
        } else if tokens.get(i + 1) == Some(&"") {
            parts.push("+".to_string());
            i += 2;
        } else {
            return Err(malformed());
        }
    }
    Ok(parts.join("+"))
}

fn canonical_key(part: &str) -> String {
    let lower = part.to_lowercase();
    let canonical = match lower.as_str() {
        "return" => "enter",
        "esc" => "escape",
        "del" => "delete",
        "back" => "backspace",
        "control" => "ctrl",
        "option" => "alt",
        "command" | "meta" => "cmd",
        "pgup" => "pageup",
        "pgdn" | "pgdown" => "pagedown",
        "arrowup" => "up",
        "arrowdown" => "down",
        "arrowleft" => "left",
        "arrowright" => "right",
        other => other,
    };
    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: &str) -> RawAction {
        RawAction {
            action: kind.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_kind_rejected_at_construction() {
        let err = Action::try_from(raw("double_click")).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidAction(_)));
    }

    #[test]
    fn test_kind_parsing_is_case_insensitive() {
        let action = Action::try_from(raw("Right_Click")).unwrap();
        assert_eq!(action.kind(), ActionKind::RightClick);
    }

    #[test]
    fn test_identifier_wins_over_index() {
        let action = Action::try_from(RawAction {
            action: "click".into(),
            element_index: Some(4),
            mesh_id: Some("m-12".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(action.target(), Some(&TargetRef::Identifier("m-12".into())));

        let action = Action::try_from(RawAction {
            action: "click".into(),
            element_index: Some(4),
            mesh_id: Some("  ".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(action.target(), Some(&TargetRef::Index(4)));
    }

    #[test]
    fn test_scroll_defaults_down_and_rejects_unknown_direction() {
        let action = Action::try_from(raw("scroll")).unwrap();
        assert_eq!(action.scroll_direction(), Some(ScrollDirection::Down));

        let mut bad = raw("scroll");
        bad.scroll_direction = Some("sideways".into());
        assert!(Action::try_from(bad).is_err());

        let mut up = raw("scroll_and_capture");
        up.scroll_direction = Some("UP".into());
        assert_eq!(
            Action::try_from(up).unwrap().scroll_direction(),
            Some(ScrollDirection::Up)
        );
    }

    #[test]
    fn test_keyboard_requires_key_command() {
        assert!(Action::try_from(raw("keyboard")).is_err());

        let mut ok = raw("keyboard");
        ok.key_command = Some("Return".into());
        assert_eq!(
            Action::try_from(ok).unwrap(),
            Action::Keyboard {
                key_command: "enter".into(),
                confidence: None
            }
        );
    }

    #[test]
    fn test_type_keeps_text_verbatim() {
        let action = Action::try_from(RawAction {
            action: "type".into(),
            element_index: Some(0),
            input_text: Some("  Hello World ".into()),
            key_command: Some("TAB".into()),
            ..Default::default()
        })
        .unwrap();
        match action {
            Action::Type {
                input_text,
                key_command,
                ..
            } => {
                assert_eq!(input_text.as_deref(), Some("  Hello World "));
                assert_eq!(key_command.as_deref(), Some("tab"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let mut bad = raw("click");
        bad.confidence = Some(1.5);
        assert!(Action::try_from(bad).is_err());
    }

    #[test]
    fn test_normalize_key_command() {
        assert_eq!(normalize_key_command("ESC").unwrap(), "escape");
        assert_eq!(normalize_key_command("Control+Shift+T").unwrap(), "ctrl+shift+t");
        assert_eq!(normalize_key_command("cmd+a").unwrap(), "cmd+a");
        assert!(normalize_key_command("ctrl+").is_err());
        assert!(normalize_key_command("  ").is_err());
    }

    #[test]
    fn test_plus_key_is_accepted() {
        assert_eq!(normalize_key_command("+").unwrap(), "+");
        assert_eq!(normalize_key_command("Ctrl++").unwrap(), "ctrl++");
        assert_eq!(normalize_key_command("cmd+shift++").unwrap(), "cmd+shift++");
        assert_eq!(normalize_key_command("cmd+=").unwrap(), "cmd+=");

        let mut zoom = raw("keyboard");
        zoom.key_command = Some("ctrl++".into());
        assert_eq!(
            Action::try_from(zoom).unwrap(),
            Action::Keyboard {
                key_command: "ctrl++".into(),
                confidence: None
            }
        );
    }

    #[test]
    fn test_lenient_target_fields() {
        let raws: Vec<RawAction> = serde_json::from_value(serde_json::json!([
            {"action": "click", "mesh_id": 17},
            {"action": "click", "element_index": -1},
            {"action": "click", "element_index": null}
        ]))
        .unwrap();

        let numeric = Action::try_from(raws[0].clone()).unwrap();
        assert_eq!(numeric.target(), Some(&TargetRef::Identifier("17".into())));

        let negative = Action::try_from(raws[1].clone()).unwrap();
        assert_eq!(raws[1].element_index, Some(-1));
        assert_eq!(negative.target(), None);

        assert_eq!(raws[2].element_index, None);
    }
}
