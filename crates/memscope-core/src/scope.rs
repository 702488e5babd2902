//! Lifetime scopes and their resolution to storage namespaces.
//!
//! `Global` and `Project` resolve to directories under the configured
//! `base_path`; `Session` resolves to an in-process namespace keyed by the
//! provider's session id. A resolver is bound to exactly one session id.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::MemoryConfig;
use crate::error::MemoryError;

/// Lifetime class partitioning the keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Session,
    Project,
    Global,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Session, Scope::Project, Scope::Global];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Project => "project",
            Self::Global => "global",
        }
    }

    /// Whether the reference backend writes this scope to durable storage.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::Session)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = MemoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "project" => Ok(Self::Project),
            "global" => Ok(Self::Global),
            other => Err(MemoryError::InvalidArgument(format!(
                "unknown scope '{other}'"
            ))),
        }
    }
}

/// Concrete storage address a scope resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Directory holding the persisted entries of a durable scope
    Durable { scope: Scope, dir: PathBuf },
    /// Process-local map owned by one session
    Session { session_id: String },
}

impl Namespace {
    pub fn scope(&self) -> Scope {
        match self {
            Self::Durable { scope, .. } => *scope,
            Self::Session { .. } => Scope::Session,
        }
    }

    /// Stable label used in logs and as a partition column by database backends.
    pub fn label(&self) -> String {
        match self {
            Self::Durable { scope, .. } => scope.as_str().to_string(),
            Self::Session { session_id } => format!("session/{session_id}"),
        }
    }

    /// Backing directory, if the namespace is persisted.
    pub fn dir(&self) -> Option<&Path> {
        match self {
            Self::Durable { dir, .. } => Some(dir),
            Self::Session { .. } => None,
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Maps a scope to the namespace of one provider instance.
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    base_path: PathBuf,
    session_id: String,
}

impl ScopeResolver {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            base_path: config.base_path.clone(),
            session_id: config.session_id.clone(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn resolve(&self, scope: Scope) -> Namespace {
        match scope {
            Scope::Session => Namespace::Session {
                session_id: self.session_id.clone(),
            },
            Scope::Project | Scope::Global => Namespace::Durable {
                scope,
                dir: self.base_path.join(scope.as_str()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ScopeResolver {
        ScopeResolver::new(&MemoryConfig::new("/var/lib/memscope", "sess-1"))
    }

    #[test]
    fn test_durable_scopes_resolve_under_base_path() {
        let r = resolver();
        assert_eq!(
            r.resolve(Scope::Global).dir(),
            Some(Path::new("/var/lib/memscope/global"))
        );
        assert_eq!(
            r.resolve(Scope::Project).dir(),
            Some(Path::new("/var/lib/memscope/project"))
        );
    }

    #[test]
    fn test_session_scope_is_not_on_disk() {
        let ns = resolver().resolve(Scope::Session);
        assert!(ns.dir().is_none());
        assert_eq!(ns.label(), "session/sess-1");
        assert_eq!(ns.scope(), Scope::Session);
    }

    #[test]
    fn test_scope_parses_case_insensitively() {
        assert_eq!("PROJECT".parse::<Scope>().unwrap(), Scope::Project);
        assert_eq!(" global ".parse::<Scope>().unwrap(), Scope::Global);
        assert!("team".parse::<Scope>().is_err());
    }

    #[test]
    fn test_scope_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Scope::Session).unwrap(), "\"session\"");
        let back: Scope = serde_json::from_str("\"global\"").unwrap();
        assert_eq!(back, Scope::Global);
    }
}
