use std::fmt;

use serde::{Deserialize, Serialize};

/// Installation lifecycle states reported by client instances for a
/// repository installed from this shed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallStatus {
    #[serde(rename = "New")]
    New,
    #[serde(rename = "Cloning")]
    Cloning,
    #[serde(rename = "Setting tool versions")]
    SettingToolVersions,
    #[serde(rename = "Installing repository dependencies")]
    InstallingRepositoryDependencies,
    #[serde(rename = "Installing tool dependencies")]
    InstallingToolDependencies,
    #[serde(rename = "Loading proprietary datatypes")]
    LoadingProprietaryDatatypes,
    #[serde(rename = "Installed")]
    Installed,
    #[serde(rename = "Deactivated")]
    Deactivated,
    #[serde(rename = "Error")]
    Error,
    #[serde(rename = "Uninstalled")]
    Uninstalled,
}

impl InstallStatus {
    pub const ALL: [InstallStatus; 10] = [
        InstallStatus::New,
        InstallStatus::Cloning,
        InstallStatus::SettingToolVersions,
        InstallStatus::InstallingRepositoryDependencies,
        InstallStatus::InstallingToolDependencies,
        InstallStatus::LoadingProprietaryDatatypes,
        InstallStatus::Installed,
        InstallStatus::Deactivated,
        InstallStatus::Error,
        InstallStatus::Uninstalled,
    ];

    /// States meaning an installation is still in flight.
    pub const IN_FLIGHT: [InstallStatus; 5] = [
        InstallStatus::Cloning,
        InstallStatus::SettingToolVersions,
        InstallStatus::InstallingRepositoryDependencies,
        InstallStatus::InstallingToolDependencies,
        InstallStatus::LoadingProprietaryDatatypes,
    ];

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            InstallStatus::New => "New",
            InstallStatus::Cloning => "Cloning",
            InstallStatus::SettingToolVersions => "Setting tool versions",
            InstallStatus::InstallingRepositoryDependencies => "Installing repository dependencies",
            InstallStatus::InstallingToolDependencies => "Installing tool dependencies",
            InstallStatus::LoadingProprietaryDatatypes => "Loading proprietary datatypes",
            InstallStatus::Installed => "Installed",
            InstallStatus::Deactivated => "Deactivated",
            InstallStatus::Error => "Error",
            InstallStatus::Uninstalled => "Uninstalled",
        }
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        Self::IN_FLIGHT.contains(self)
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Installation states for a single tool dependency of an installed
/// repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolDependencyStatus {
    #[serde(rename = "Never installed")]
    NeverInstalled,
    #[serde(rename = "Installing")]
    Installing,
    #[serde(rename = "Installed")]
    Installed,
    #[serde(rename = "Error")]
    Error,
    #[serde(rename = "Uninstalled")]
    Uninstalled,
}

impl ToolDependencyStatus {
    pub const ALL: [ToolDependencyStatus; 5] = [
        ToolDependencyStatus::NeverInstalled,
        ToolDependencyStatus::Installing,
        ToolDependencyStatus::Installed,
        ToolDependencyStatus::Error,
        ToolDependencyStatus::Uninstalled,
    ];
}

/// Severity bucket a status classifies into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSeverity {
    Installing,
    Uninstalled,
    Error,
    Warning,
    Ok,
}

impl StatusSeverity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSeverity::Installing => "installing",
            StatusSeverity::Uninstalled => "uninstalled",
            StatusSeverity::Error => "error",
            StatusSeverity::Warning => "warning",
            StatusSeverity::Ok => "ok",
        }
    }
}

impl fmt::Display for StatusSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side record of one repository installed from this shed, reduced
/// to what status classification needs. Read-only at this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledRepository {
    pub name: String,
    pub owner: String,
    pub changeset_revision: String,
    pub status: InstallStatus,
    #[serde(default)]
    pub repository_dependency_statuses: Vec<InstallStatus>,
    #[serde(default)]
    pub tool_dependency_statuses: Vec<ToolDependencyStatus>,
}

impl InstalledRepository {
    #[must_use]
    pub fn repository_dependencies_being_installed(&self) -> bool {
        self.repository_dependency_statuses
            .iter()
            .any(InstallStatus::is_in_flight)
    }

    #[must_use]
    pub fn missing_repository_dependencies(&self) -> bool {
        self.repository_dependency_statuses
            .iter()
            .any(|status| *status != InstallStatus::Installed)
    }

    #[must_use]
    pub fn tool_dependencies_being_installed(&self) -> bool {
        self.tool_dependency_statuses
            .iter()
            .any(|status| *status == ToolDependencyStatus::Installing)
    }

    #[must_use]
    pub fn missing_tool_dependencies(&self) -> bool {
        self.tool_dependency_statuses
            .iter()
            .any(|status| *status != ToolDependencyStatus::Installed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLabel {
    pub severity: StatusSeverity,
    pub label: String,
}

/// Classify an installed repository's state into a severity bucket and a
/// display label.
///
/// For an `Installed` repository the first matching dependency condition
/// wins; the conditions are mutually exclusive by check order only. A
/// missing record classifies as a warning with an "unknown status" label.
#[must_use]
pub fn install_status_label(repository: Option<&InstalledRepository>) -> StatusLabel {
    let Some(repository) = repository else {
        return StatusLabel {
            severity: StatusSeverity::Warning,
            label: "unknown status".to_string(),
        };
    };
    let label = repository.status.label().to_string();
    let (severity, label) = match repository.status {
        InstallStatus::Cloning
        | InstallStatus::SettingToolVersions
        | InstallStatus::InstallingRepositoryDependencies
        | InstallStatus::InstallingToolDependencies
        | InstallStatus::LoadingProprietaryDatatypes => (StatusSeverity::Installing, label),
        InstallStatus::New | InstallStatus::Uninstalled => (StatusSeverity::Uninstalled, label),
        InstallStatus::Error => (StatusSeverity::Error, label),
        InstallStatus::Deactivated => (StatusSeverity::Warning, label),
        InstallStatus::Installed => {
            if repository.repository_dependencies_being_installed() {
                let label = format!(
                    "{label}, {}",
                    InstallStatus::InstallingRepositoryDependencies.label()
                );
                (StatusSeverity::Warning, label)
            } else if repository.missing_repository_dependencies() {
                (StatusSeverity::Warning, format!("{label}, missing repository dependencies"))
            } else if repository.tool_dependencies_being_installed() {
                let label = format!(
                    "{label}, {}",
                    InstallStatus::InstallingToolDependencies.label()
                );
                (StatusSeverity::Warning, label)
            } else if repository.missing_tool_dependencies() {
                (StatusSeverity::Warning, format!("{label}, missing tool dependencies"))
            } else {
                (StatusSeverity::Ok, label)
            }
        }
    };
    StatusLabel { severity, label }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed(
        status: InstallStatus,
        repository_dependency_statuses: Vec<InstallStatus>,
        tool_dependency_statuses: Vec<ToolDependencyStatus>,
    ) -> InstalledRepository {
        InstalledRepository {
            name: "my_tool".to_string(),
            owner: "alice".to_string(),
            changeset_revision: "abc123def456".to_string(),
            status,
            repository_dependency_statuses,
            tool_dependency_statuses,
        }
    }

    #[test]
    fn test_missing_record_is_unknown() {
        let result = install_status_label(None);
        assert_eq!(result.severity, StatusSeverity::Warning);
        assert_eq!(result.label, "unknown status");
    }

    #[test]
    fn test_in_flight_states_classify_as_installing() {
        for status in InstallStatus::IN_FLIGHT {
            let repo = installed(status, vec![], vec![]);
            let result = install_status_label(Some(&repo));
            assert_eq!(result.severity, StatusSeverity::Installing);
            assert_eq!(result.label, status.label());
        }
    }

    #[test]
    fn test_clean_install_is_ok() {
        let repo = installed(
            InstallStatus::Installed,
            vec![InstallStatus::Installed],
            vec![ToolDependencyStatus::Installed],
        );
        let result = install_status_label(Some(&repo));
        assert_eq!(result.severity, StatusSeverity::Ok);
        assert_eq!(result.label, "Installed");
    }

    #[test]
    fn test_installed_condition_precedence() {
        // A dependency still being installed outranks missing dependencies.
        let repo = installed(
            InstallStatus::Installed,
            vec![InstallStatus::Cloning, InstallStatus::Uninstalled],
            vec![ToolDependencyStatus::NeverInstalled],
        );
        let result = install_status_label(Some(&repo));
        assert_eq!(result.severity, StatusSeverity::Warning);
        assert_eq!(result.label, "Installed, Installing repository dependencies");

        // Repository-level conditions outrank tool-level ones.
        let repo = installed(
            InstallStatus::Installed,
            vec![InstallStatus::Error],
            vec![ToolDependencyStatus::Installing],
        );
        let result = install_status_label(Some(&repo));
        assert_eq!(result.label, "Installed, missing repository dependencies");

        let repo = installed(
            InstallStatus::Installed,
            vec![InstallStatus::Installed],
            vec![ToolDependencyStatus::Installing, ToolDependencyStatus::NeverInstalled],
        );
        let result = install_status_label(Some(&repo));
        assert_eq!(result.label, "Installed, Installing tool dependencies");

        let repo = installed(
            InstallStatus::Installed,
            vec![],
            vec![ToolDependencyStatus::Uninstalled],
        );
        let result = install_status_label(Some(&repo));
        assert_eq!(result.label, "Installed, missing tool dependencies");
    }

    #[test]
    fn test_every_status_and_predicate_combination_classifies() {
        let repo_dep_cases: [Vec<InstallStatus>; 4] = [
            vec![],
            vec![InstallStatus::Cloning],
            vec![InstallStatus::Uninstalled],
            vec![InstallStatus::Cloning, InstallStatus::Uninstalled],
        ];
        let tool_dep_cases: [Vec<ToolDependencyStatus>; 4] = [
            vec![],
            vec![ToolDependencyStatus::Installing],
            vec![ToolDependencyStatus::NeverInstalled],
            vec![ToolDependencyStatus::Installing, ToolDependencyStatus::NeverInstalled],
        ];
        for status in InstallStatus::ALL {
            for repo_deps in &repo_dep_cases {
                for tool_deps in &tool_dep_cases {
                    let repo = installed(status, repo_deps.clone(), tool_deps.clone());
                    let result = install_status_label(Some(&repo));
                    assert!(!result.label.is_empty());
                    assert!(matches!(
                        result.severity,
                        StatusSeverity::Installing
                            | StatusSeverity::Uninstalled
                            | StatusSeverity::Error
                            | StatusSeverity::Warning
                            | StatusSeverity::Ok
                    ));
                    if status != InstallStatus::Installed {
                        // Dependency predicates only matter once installed.
                        assert!(!result.label.contains(','));
                    }
                }
            }
        }
    }

    #[test]
    fn test_status_labels_round_trip_serde() {
        for status in InstallStatus::ALL {
            let encoded = serde_json::to_string(&status).unwrap();
            assert_eq!(encoded, format!("\"{}\"", status.label()));
            let decoded: InstallStatus = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, status);
        }
    }
}
