//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process
//! startup and then passed into core services. The intent is to avoid reading
//! process-wide environment variables during request handling, which can lead
//! to inconsistent behaviour in multi-threaded runtimes and test harnesses.

use crate::error::{QueueError, QueueResult};
use crate::journey::JourneyCatalogue;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// File name of the journey template catalogue.
pub const JOURNEY_CATALOGUE_FILE: &str = "journeys.yaml";

/// Default bound on internal conditional-write retries (sequence allocation,
/// counter release).
pub const DEFAULT_CAS_RETRY_LIMIT: u32 = 5;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    journeys: JourneyCatalogue,
    cas_retry_limit: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// The catalogue is validated here so that a malformed deployment fails at
    /// startup, not on the first admission.
    pub fn new(journeys: JourneyCatalogue, cas_retry_limit: u32) -> QueueResult<Self> {
        if cas_retry_limit == 0 {
            return Err(QueueError::InvalidInput(
                "cas_retry_limit must be at least 1".into(),
            ));
        }
        validate_catalogue(&journeys)?;

        Ok(Self {
            journeys,
            cas_retry_limit,
        })
    }

    pub fn journeys(&self) -> &JourneyCatalogue {
        &self.journeys
    }

    pub fn cas_retry_limit(&self) -> u32 {
        self.cas_retry_limit
    }
}

/// Validate a journey catalogue: template ids must be unique and non-empty,
/// and every template must name at least one department.
fn validate_catalogue(catalogue: &JourneyCatalogue) -> QueueResult<()> {
    let mut seen = HashSet::new();

    for template in &catalogue.templates {
        if template.id.trim().is_empty() {
            return Err(QueueError::InvalidInput(
                "journey template id cannot be empty".into(),
            ));
        }
        if !seen.insert(template.id.as_str()) {
            return Err(QueueError::InvalidInput(format!(
                "duplicate journey template id: {}",
                template.id
            )));
        }
        if template.steps.is_empty() {
            return Err(QueueError::InvalidInput(format!(
                "journey template {} has no steps",
                template.id
            )));
        }
    }

    Ok(())
}

/// Resolve the journey catalogue file without reading environment variables.
///
/// If `override_path` is provided, it must be an existing file. Otherwise this
/// searches for `journeys.yaml` relative to the current working directory and
/// then walks up from `CARGO_MANIFEST_DIR`.
pub fn resolve_journey_file(override_path: Option<PathBuf>) -> QueueResult<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Ok(path);
        }
        return Err(QueueError::InvalidInput(
            "UQM_JOURNEYS_FILE override does not point at a file".into(),
        ));
    }

    let cwd_relative = PathBuf::from(JOURNEY_CATALOGUE_FILE);
    if cwd_relative.is_file() {
        return Ok(cwd_relative);
    }

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    for ancestor in manifest_dir.ancestors() {
        let candidate = ancestor.join(JOURNEY_CATALOGUE_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(QueueError::InvalidInput(format!(
        "could not locate {JOURNEY_CATALOGUE_FILE}"
    )))
}

/// Load and parse a journey catalogue from a YAML file.
pub fn load_journey_catalogue(path: &Path) -> QueueResult<JourneyCatalogue> {
    let contents = std::fs::read_to_string(path).map_err(QueueError::CatalogueRead)?;
    serde_yaml::from_str(&contents).map_err(QueueError::CatalogueParse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journey::JourneyTemplate;
    use uqm_types::DepartmentName;

    fn dept(name: &str) -> DepartmentName {
        DepartmentName::new(name).unwrap()
    }

    fn catalogue() -> JourneyCatalogue {
        JourneyCatalogue {
            templates: vec![JourneyTemplate {
                id: "outpatient-standard".into(),
                name: "Standard outpatient visit".into(),
                steps: vec![dept("Registration"), dept("Consultation")],
            }],
        }
    }

    #[test]
    fn accepts_a_valid_catalogue() {
        let cfg = CoreConfig::new(catalogue(), DEFAULT_CAS_RETRY_LIMIT).expect("valid");
        assert_eq!(cfg.journeys().templates.len(), 1);
        assert_eq!(cfg.cas_retry_limit(), DEFAULT_CAS_RETRY_LIMIT);
    }

    #[test]
    fn rejects_duplicate_template_ids() {
        let mut duplicated = catalogue();
        duplicated.templates.push(duplicated.templates[0].clone());
        let err = CoreConfig::new(duplicated, DEFAULT_CAS_RETRY_LIMIT).expect_err("duplicate ids");
        assert!(matches!(err, QueueError::InvalidInput(_)));
    }

    #[test]
    fn rejects_templates_without_steps() {
        let mut empty_steps = catalogue();
        empty_steps.templates[0].steps.clear();
        let err = CoreConfig::new(empty_steps, DEFAULT_CAS_RETRY_LIMIT).expect_err("no steps");
        assert!(matches!(err, QueueError::InvalidInput(_)));
    }

    #[test]
    fn parses_a_yaml_catalogue() {
        let yaml = r#"templates:
  - id: outpatient-standard
    name: Standard outpatient visit
    steps: [Registration, Triage, Consultation, Billing, Pharmacy]
"#;
        let parsed: JourneyCatalogue = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(parsed.templates[0].steps.len(), 5);
        assert_eq!(parsed.templates[0].steps[3].as_str(), "Billing");
    }
}
