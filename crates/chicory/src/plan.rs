//! Plans: the unit of execution.
//!
//! A plan bundles the ordered actions with the detections and the single
//! window snapshot they were computed against. It is built per command,
//! executed once and dropped.

use crate::action::{Action, ActionKind, RawAction, TargetRef};
use crate::errors::AutomationError;
use crate::reasoning::ReasoningResponse;
use crate::types::{Detection, WindowInfo};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub detections: Vec<Detection>,
    pub window: WindowInfo,
    /// Reasoning service's explanation of the plan, if any.
    pub explanation: Option<String>,
    /// Overall confidence reported with the plan.
    pub confidence: Option<f32>,
}

impl Plan {
    pub fn new(actions: Vec<Action>, detections: Vec<Detection>, window: WindowInfo) -> Self {
        Self {
            actions,
            detections,
            window,
            explanation: None,
            confidence: None,
        }
    }

    /// Build a plan from a reasoning response and the window snapshot the
    /// response was computed against.
    ///
    /// Actions that name no element inherit the response's chosen element,
    /// and actions without a confidence inherit the response's confidence.
    /// Any action that does not parse rejects the whole plan.
    pub fn from_reasoning(
        response: &ReasoningResponse,
        window: WindowInfo,
    ) -> Result<Self, AutomationError> {
        let detections = response.detections();

        let actions = response
            .actions
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let mut raw: RawAction = raw.clone();
                if raw.mesh_id.is_none() && raw.element_index.is_none() {
                    raw.element_index = response
                        .chosen_element_index
                        .and_then(|i| i64::try_from(i).ok());
                }
                if raw.confidence.is_none() {
                    raw.confidence = response.confidence;
                }
                Action::try_from(raw).map_err(|e| match e {
                    AutomationError::InvalidAction(msg) => {
                        AutomationError::InvalidAction(format!("action #{i}: {msg}"))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            actions,
            detections,
            window,
            explanation: response.explanation.clone(),
            confidence: response.confidence,
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Look up the detection an action refers to: by identifier when the
    /// reference is one, else by original index.
    pub fn find_detection(&self, target: &TargetRef) -> Option<&Detection> {
        match target {
            TargetRef::Identifier(id) => self
                .detections
                .iter()
                .find(|d| d.identifier.as_deref() == Some(id.as_str())),
            TargetRef::Index(index) => self
                .detections
                .iter()
                .find(|d| d.original_index == *index),
        }
    }

    /// Whether the plan holds plain `scroll` actions. `scroll_and_capture`
    /// is dispatched as a regular step and does not count.
    pub fn has_scroll(&self) -> bool {
        self.actions.iter().any(|a| a.kind() == ActionKind::Scroll)
    }

    /// Split off the plain `scroll` actions, returning them together with a
    /// plan of the remaining actions in their original order.
    pub fn split_scrolls(self) -> (Vec<Action>, Plan) {
        let (scrolls, rest): (Vec<Action>, Vec<Action>) = self
            .actions
            .into_iter()
            .partition(|a| a.kind() == ActionKind::Scroll);
        (
            scrolls,
            Plan {
                actions: rest,
                detections: self.detections,
                window: self.window,
                explanation: self.explanation,
                confidence: self.confidence,
            },
        )
    }

    /// Human-readable summary of what the plan is about to do.
    pub fn describe(&self) -> String {
        let mut out = String::from("Here's what I'm going to do:\n\n");
        if let Some(explanation) = &self.explanation {
            out.push_str(explanation);
            out.push_str("\n\n");
        }
        out.push_str("Detailed action plan:\n");

        let lines: Vec<String> = self.actions.iter().map(|a| self.describe_action(a)).collect();
        out.push_str(&lines.join("\n\n"));
        out
    }

    fn describe_action(&self, action: &Action) -> String {
        let mut line = format!("• {}", action.kind().as_str().to_uppercase());
        match action {
            Action::Type {
                input_text,
                key_command,
                ..
            } => {
                if let Some(text) = input_text {
                    let _ = write!(line, " \"{text}\"");
                }
                if let Some(key) = key_command {
                    let _ = write!(line, " [{key}]");
                }
            }
            Action::Keyboard { key_command, .. } => {
                let _ = write!(line, " [{key_command}]");
            }
            Action::Scroll { direction, .. } | Action::ScrollAndCapture { direction, .. } => {
                let _ = write!(line, " {direction}");
            }
            _ => {}
        }

        if !action.kind().needs_target() {
            return line;
        }

        let Some(detection) = action.target().and_then(|t| self.find_detection(t)) else {
            line.push_str("\nNo target element");
            return line;
        };

        let _ = write!(line, "\nTarget Element {}:", detection.label());
        let fmt_xy = |r: Option<crate::types::Rect>| match r {
            Some(r) => format!("({}, {})", r.x, r.y),
            None => "(?, ?)".to_string(),
        };
        let _ = write!(
            line,
            "\n - Location: Window{}, Screen{}",
            fmt_xy(detection.bbox.window),
            fmt_xy(detection.bbox.screen)
        );
        if let Some(w) = detection.bbox.window {
            let _ = write!(line, "\n - Size: {}x{}", w.width, w.height);
        }
        let confidence = action.confidence().or(self.confidence).unwrap_or(0.0);
        let _ = write!(line, "\n - Confidence: {:.1}%", confidence * 100.0);
        line
    }
}

/// On-disk form of a plan: the window snapshot plus the reasoning response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub window: WindowInfo,
    pub response: ReasoningResponse,
}

impl PlanDocument {
    pub fn into_plan(self) -> Result<Plan, AutomationError> {
        Plan::from_reasoning(&self.response, self.window)
    }
}
