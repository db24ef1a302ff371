use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::geometry::Point;
use crate::requirements::{MappingRequirements, Requirement};

/// Safety factor applied to measured animation durations before they are
/// stored as playback sleep times.
pub const SLEEP_SAFETY_FACTOR: f64 = 1.2;

/// One semantic camera-feature category being mapped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    Cam,
    Mode,
    AspectRatio,
    Flash,
    TakePicture,
    Touch,
}

impl ItemKind {
    /// Lowercase label used as the leading word of command names
    /// (e.g. `"flash menu"`, `"cam selfie"`).
    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Cam => "cam",
            ItemKind::Mode => "mode",
            ItemKind::AspectRatio => "aspect_ratio",
            ItemKind::Flash => "flash",
            ItemKind::TakePicture => "take_picture",
            ItemKind::Touch => "touch",
        }
    }
}

/// The category of interaction a command performs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Opens a submenu.
    ClickMenu,
    /// Performs a direct effect.
    ClickAction,
}

/// Screen coordinates a playback system should tap for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickTarget {
    pub start_x: i32,
    pub start_y: i32,
}

impl From<Point> for ClickTarget {
    fn from(p: Point) -> Self {
        Self {
            start_x: p.x,
            start_y: p.y,
        }
    }
}

/// One labeled interaction. Append-only: never mutated after creation,
/// only matched by name/requirement substring queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "command_name")]
    pub name: String,
    #[serde(rename = "click_by_coordinates")]
    pub target: ClickTarget,
    pub requirements: Requirement,
}

impl Command {
    pub fn new(name: impl Into<String>, target: Point, requirements: Requirement) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            requirements,
        }
    }
}

/// Per item-kind record: the ordered action sequences to apply when
/// transitioning the feature on or off, and the inferred sleep per action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandChangeSequence {
    #[serde(rename = "COMMAND_SEQUENCE ON")]
    pub sequence_on: Vec<ActionKind>,
    #[serde(rename = "COMMAND_SEQUENCE OFF")]
    pub sequence_off: Vec<ActionKind>,
    #[serde(rename = "COMMAND_SLEEPS")]
    pub sleeps: BTreeMap<ActionKind, f64>,
}

impl CommandChangeSequence {
    /// Join a measured animation duration into the stored sleep for an
    /// action kind. Sleeps only ever grow: a shorter later measurement
    /// never shrinks a value a playback already relies on.
    pub fn join_sleep(&mut self, action: ActionKind, measured_secs: f64) {
        self.join_sleep_with(action, measured_secs, SLEEP_SAFETY_FACTOR);
    }

    /// `join_sleep` with an explicit safety factor, for contexts that
    /// inflate more aggressively (nested menu actions).
    pub fn join_sleep_with(&mut self, action: ActionKind, measured_secs: f64, factor: f64) {
        let inflated = round2(measured_secs * factor);
        let entry = self.sleeps.entry(action).or_insert(0.0);
        if inflated > *entry {
            tracing::debug!(
                "sleep[{action:?}] {} -> {inflated}",
                *entry
            );
            *entry = inflated;
        }
    }

    pub fn sleep_for(&self, action: ActionKind) -> Option<f64> {
        self.sleeps.get(&action).copied()
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// The root aggregate accumulated across all mapping steps. Serialized to
/// disk after every top-level step and once more as the final artifact;
/// the on-disk key names are fixed for compatibility with existing
/// playback tooling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandCatalogue {
    #[serde(rename = "COMMAND_CHANGE_SEQUENCE")]
    pub change_sequences: BTreeMap<ItemKind, CommandChangeSequence>,
    #[serde(rename = "COMMANDS")]
    pub commands: Vec<Command>,
}

impl CommandCatalogue {
    /// An empty catalogue with one change-sequence slot per item kind to
    /// be mapped.
    pub fn for_requirements(reqs: &MappingRequirements) -> Self {
        let change_sequences = reqs
            .items
            .iter()
            .map(|item| (*item, CommandChangeSequence::default()))
            .collect();
        Self {
            change_sequences,
            commands: Vec::new(),
        }
    }

    pub fn push_command(&mut self, command: Command) {
        tracing::info!(
            "recorded command '{}' at ({}, {}) for cam={} mode={}",
            command.name,
            command.target.start_x,
            command.target.start_y,
            command.requirements.cam,
            command.requirements.mode
        );
        self.commands.push(command);
    }

    /// Substring lookup mirroring playback resolution: first command whose
    /// name contains the fragment and whose requirements admit the state.
    pub fn find_command(&self, fragment: &str, cam: &str, mode: &str) -> Option<&Command> {
        self.commands
            .iter()
            .find(|c| c.name.contains(fragment) && c.requirements.admits(cam, mode))
    }

    pub fn sequence_mut(&mut self, item: ItemKind) -> &mut CommandChangeSequence {
        self.change_sequences.entry(item).or_default()
    }

    pub fn sequence(&self, item: ItemKind) -> Option<&CommandChangeSequence> {
        self.change_sequences.get(&item)
    }

    /// Serialize to the fixed JSON document format.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize catalogue")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write catalogue to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalogue from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse catalogue at {}", path.display()))
    }
}
