use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::SiftError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Annotator,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewRecords,
    FilterRecords,
    CopyRecords,
    ExportRecords,
}

impl Role {
    pub fn capabilities(self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Admin | Role::Manager => &[ViewRecords, FilterRecords, CopyRecords, ExportRecords],
            Role::Annotator => &[ViewRecords, FilterRecords, CopyRecords],
            Role::Viewer => &[ViewRecords, FilterRecords],
        }
    }
}

/// True when `role` holds every capability in `required`.
pub fn is_allowed(role: Role, required: &[Capability]) -> bool {
    let granted = role.capabilities();
    required.iter().all(|c| granted.contains(c))
}

impl FromStr for Role {
    type Err = SiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "annotator" => Ok(Role::Annotator),
            "viewer" => Ok(Role::Viewer),
            other => Err(SiftError::InvalidArgument(format!("unknown role '{other}'"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Annotator => "annotator",
            Role::Viewer => "viewer",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Capability::*;

    #[test]
    fn policy_table() {
        assert!(is_allowed(Role::Viewer, &[ViewRecords, FilterRecords]));
        assert!(!is_allowed(Role::Viewer, &[CopyRecords]));
        assert!(is_allowed(Role::Annotator, &[CopyRecords]));
        assert!(!is_allowed(Role::Annotator, &[ExportRecords]));
        assert!(is_allowed(Role::Manager, &[ExportRecords, CopyRecords]));
        assert!(is_allowed(Role::Admin, &[ExportRecords]));
        assert!(is_allowed(Role::Viewer, &[]));
    }

    #[test]
    fn parses_roles() {
        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!(" viewer ".parse::<Role>().unwrap(), Role::Viewer);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::default().to_string(), "annotator");
    }
}
