//! GitOps resource kinds

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Application,
    ApplicationSet,
}

impl ResourceKind {
    /// Classify a document `kind`. Anything else is not ours to manage.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "Application" => Some(ResourceKind::Application),
            "ApplicationSet" => Some(ResourceKind::ApplicationSet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Application => "Application",
            ResourceKind::ApplicationSet => "ApplicationSet",
        }
    }

    /// Path to the Application spec: the resource's own `spec`, or the
    /// template spec of an ApplicationSet.
    pub fn spec_path(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Application => &["spec"],
            ResourceKind::ApplicationSet => &["spec", "template", "spec"],
        }
    }

    /// Short name used as a log field key.
    pub fn short_name(&self) -> &'static str {
        match self {
            ResourceKind::Application => "app",
            ResourceKind::ApplicationSet => "appset",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
