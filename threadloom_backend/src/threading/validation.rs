use crate::config::ThreadingConfig;
use crate::database::models::CommentRecord;
use crate::database::repositories::SettingRepository;
use crate::error::ThreadError;
use anyhow::Result;

pub const EMPTY_BODY: &str = "Comment body may not be empty.";
pub const DIFFERENT_THREAD: &str = "Parent comment is from a different thread.";
pub const THREADING_DISABLED: &str =
    "Parent comments are not allowed without custom discussion threads.";
pub const MAX_DEPTH_EXCEEDED: &str = "Comment exceeds maximum depth.";

pub const SETTING_THREADING_ENABLED: &str = "threading.enabled";
pub const SETTING_MAX_DEPTH: &str = "threading.maxDepth";

/// Structural rules applied when a comment is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadingPolicy {
    pub enabled: bool,
    /// `None` means unlimited.
    pub max_depth: Option<u32>,
}

impl ThreadingPolicy {
    pub fn from_config(config: &ThreadingConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_depth: config.max_depth,
        }
    }

    /// Settings stored at runtime win over the environment. Values that no
    /// longer parse are ignored.
    pub fn with_overrides(mut self, settings: &impl SettingRepository) -> Result<Self> {
        if let Some(raw) = settings.get(SETTING_THREADING_ENABLED)? {
            match parse_enabled(&raw) {
                Some(enabled) => self.enabled = enabled,
                None => tracing::warn!(value = %raw, "ignoring invalid threading.enabled"),
            }
        }
        if let Some(raw) = settings.get(SETTING_MAX_DEPTH)? {
            match parse_max_depth(&raw) {
                Some(max_depth) => self.max_depth = max_depth,
                None => tracing::warn!(value = %raw, "ignoring invalid threading.maxDepth"),
            }
        }
        Ok(self)
    }

    pub fn ensure_nesting_allowed(&self) -> Result<(), ThreadError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ThreadError::validation(THREADING_DISABLED))
        }
    }

    /// Depth a new comment in `discussion_id` would get under `parent`.
    pub fn depth_for_reply(
        &self,
        discussion_id: i64,
        parent: Option<&CommentRecord>,
    ) -> Result<u32, ThreadError> {
        let Some(parent) = parent else {
            return Ok(1);
        };
        self.ensure_nesting_allowed()?;
        if parent.discussion_id != discussion_id {
            return Err(ThreadError::validation(DIFFERENT_THREAD));
        }
        let depth = parent.depth + 1;
        match self.max_depth {
            Some(max_depth) if depth > max_depth => {
                Err(ThreadError::validation(MAX_DEPTH_EXCEEDED))
            }
            _ => Ok(depth),
        }
    }
}

fn parse_enabled(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `Some(None)` for unlimited (empty or `0`).
fn parse_max_depth(raw: &str) -> Option<Option<u32>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(None);
    }
    raw.parse::<u32>()
        .ok()
        .map(|depth| (depth > 0).then_some(depth))
}

/// Rejects values for the threading settings that [`ThreadingPolicy`] could
/// not apply. Other keys are stored as given.
pub fn validate_setting(key: &str, value: &str) -> Result<(), ThreadError> {
    match key {
        SETTING_THREADING_ENABLED if parse_enabled(value).is_none() => Err(
            ThreadError::validation("threading.enabled must be true or false."),
        ),
        SETTING_MAX_DEPTH if parse_max_depth(value).is_none() => Err(ThreadError::validation(
            "threading.maxDepth must be a non-negative integer.",
        )),
        _ => Ok(()),
    }
}

pub fn validate_body(body: &str) -> Result<(), ThreadError> {
    if body.trim().is_empty() {
        return Err(ThreadError::validation(EMPTY_BODY));
    }
    Ok(())
}
