//! Build-log collaborator and diagnostics that report into it.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::location::SourceLocation;
use crate::root::{ObjectId, RootObject};

/// Severity of a build message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildMessageLevel {
    Verbose,
    Information,
    Warning,
    Error,
}

impl fmt::Display for BuildMessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Verbose => "verbose",
            Self::Information => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single diagnostic produced while building configs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMessage {
    pub sheet_name: Option<String>,
    pub config_key: Option<String>,
    pub message: String,
    pub column_hint: Option<String>,
    pub level: BuildMessageLevel,
    /// Variant the message applies to; `None` for the baseline.
    pub variant_scope: Option<String>,
    pub location: Option<SourceLocation>,
}

impl BuildMessage {
    pub fn new(level: BuildMessageLevel, message: impl Into<String>) -> Self {
        Self {
            sheet_name: None,
            config_key: None,
            message: message.into(),
            column_hint: None,
            level,
            variant_scope: None,
            location: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(BuildMessageLevel::Error, message)
    }

    pub fn with_sheet(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = Some(sheet_name.into());
        self
    }

    pub fn with_config_key(mut self, config_key: impl Into<String>) -> Self {
        self.config_key = Some(config_key.into());
        self
    }

    pub fn with_column_hint(mut self, column_hint: impl Into<String>) -> Self {
        self.column_hint = Some(column_hint.into());
        self
    }

    pub fn with_variant_scope(mut self, variant: Option<String>) -> Self {
        self.variant_scope = variant;
        self
    }

    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }
}

impl fmt::Display for BuildMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.level)?;
        if let Some(sheet) = &self.sheet_name {
            write!(f, " {sheet}")?;
        }
        if let Some(key) = &self.config_key {
            write!(f, " {key}")?;
        }
        if let Some(variant) = &self.variant_scope {
            write!(f, " (variant {variant})")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Sink for build diagnostics.
pub trait BuildLog {
    fn log(&mut self, message: BuildMessage);
}

/// In-memory build log that also forwards every message to `tracing`.
#[derive(Clone, Debug, Default)]
pub struct CollectingBuildLog {
    messages: Vec<BuildMessage>,
}

impl CollectingBuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[BuildMessage] {
        &self.messages
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.level == BuildMessageLevel::Error)
    }

    pub fn error_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.level == BuildMessageLevel::Error)
            .count()
    }

    pub fn into_messages(self) -> Vec<BuildMessage> {
        self.messages
    }
}

impl BuildLog for CollectingBuildLog {
    fn log(&mut self, message: BuildMessage) {
        match message.level {
            BuildMessageLevel::Error => tracing::error!(%message, "build error"),
            BuildMessageLevel::Warning => tracing::warn!(%message, "build warning"),
            BuildMessageLevel::Information => tracing::info!(%message),
            BuildMessageLevel::Verbose => tracing::debug!(%message),
        }
        self.messages.push(message);
    }
}

/// Report every `(id, variant)` pair that occurs more than once.
///
/// One error is logged per duplicated key, at its first repeat. The message
/// points at the repeated object and names the location of the earlier copy.
/// Scanning continues so all duplicates surface in a single pass.
pub fn detect_duplicate_objects(
    objects: &[RootObject],
    sheet_name: Option<&str>,
    log: &mut dyn BuildLog,
) {
    let mut first_seen: HashMap<(&ObjectId, Option<&str>), (&RootObject, bool)> = HashMap::new();

    for obj in objects {
        let key = (&obj.id, obj.variant_id.as_deref());
        match first_seen.get_mut(&key) {
            None => {
                first_seen.insert(key, (obj, false));
            }
            Some((_, true)) => {}
            Some((first, reported)) => {
                *reported = true;
                let variant_suffix = obj
                    .variant_id
                    .as_ref()
                    .map(|v| format!(" (variant {v})"))
                    .unwrap_or_default();
                let previous = first
                    .location
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown location".to_string());

                let mut message = BuildMessage::error(format!(
                    "Duplicate object with id {}{}, previous copy at {}",
                    obj.id, variant_suffix, previous
                ))
                .with_config_key(obj.id.parts().join("."))
                .with_variant_scope(obj.variant_id.clone())
                .with_location(obj.location.clone());
                if let Some(sheet) = sheet_name {
                    message = message.with_sheet(sheet);
                }
                log.log(message);
            }
        }
    }
}
