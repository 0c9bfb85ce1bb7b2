//! Deprecation notices

use serde::Serialize;
use std::fmt;

/// Which shim produced a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Call forwarded to a removed tool's former action
    RemovedTool,
    /// Removed parameter stripped from the arguments
    IgnoredParam,
    /// Newly required parameter missing from the arguments
    DefaultedParam,
    /// Parameter whose declared type changed; value untouched
    TypeChanged,
}

impl NoticeKind {
    /// Stable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RemovedTool => "removed_tool",
            Self::IgnoredParam => "ignored_param",
            Self::DefaultedParam => "defaulted_param",
            Self::TypeChanged => "type_changed",
        }
    }
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Non-fatal advisory emitted when a compatibility shim is applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeprecationNotice {
    pub kind: NoticeKind,
    pub connector: String,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub message: String,
}

impl DeprecationNotice {
    pub(crate) fn new(
        kind: NoticeKind,
        connector: &str,
        tool: &str,
        param: Option<&str>,
        message: &str,
    ) -> Self {
        Self {
            kind,
            connector: connector.to_string(),
            tool: tool.to_string(),
            param: param.map(str::to_string),
            message: message.to_string(),
        }
    }

    pub(crate) fn log(&self) {
        tracing::warn!(
            kind = %self.kind,
            connector = %self.connector,
            tool = %self.tool,
            param = self.param.as_deref().unwrap_or(""),
            "{}",
            self.message
        );
    }
}

impl fmt::Display for DeprecationNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.connector, self.tool)?;
        if let Some(param) = &self.param {
            write!(f, "({param})")?;
        }
        write!(f, ": {}", self.message)
    }
}
