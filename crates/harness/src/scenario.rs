//! Declarative YAML scenario model

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HarnessError, HarnessResult};

/// A complete verification scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport override; absent means the runner's configured default
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Steps to execute in order
    pub steps: Vec<Step>,

    /// Baseline name for visual comparison of this scenario's screenshots
    #[serde(default)]
    pub visual_baseline: Option<String>,

    /// Threshold for visual diff (0.0 - 100.0 percent)
    #[serde(default = "default_threshold")]
    pub visual_threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a URL (relative to the target base URL)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Fill an input field. Values may contain `{{unique_email}}` or
    /// `{{unique}}` placeholders, resolved once per run.
    Fill {
        selector: String,
        value: String,
    },

    /// Check a checkbox
    Check {
        selector: String,
    },

    /// Uncheck a checkbox
    Uncheck {
        selector: String,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Wait until the page URL matches a glob pattern (e.g. `**/dashboard`)
    WaitUrl {
        pattern: String,
        #[serde(default = "default_url_timeout")]
        timeout_ms: u64,
    },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text_contains: Option<String>,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep {
        ms: u64,
    },

    /// Capture a screenshot artifact
    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
        #[serde(default)]
        selector: Option<String>,
    },
}

fn default_wait_timeout() -> u64 {
    5000
}

fn default_url_timeout() -> u64 {
    10_000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl Step {
    /// Short label used in step results and logs
    pub fn label(&self) -> String {
        match self {
            Step::Navigate { url, .. } => format!("navigate:{}", url),
            Step::Fill { selector, .. } => format!("fill:{}", selector),
            Step::Check { selector } => format!("check:{}", selector),
            Step::Uncheck { selector } => format!("uncheck:{}", selector),
            Step::Click { selector, .. } => format!("click:{}", selector),
            Step::Wait { selector, .. } => format!("wait:{}", selector),
            Step::WaitUrl { pattern, .. } => format!("wait_url:{}", pattern),
            Step::Assert { selector, .. } => format!("assert:{}", selector),
            Step::Sleep { ms } => format!("sleep:{}ms", ms),
            Step::Screenshot { name, .. } => format!("screenshot:{}", name),
        }
    }

    /// Name of the screenshot this step produces, if any
    pub fn screenshot_name(&self) -> Option<&str> {
        match self {
            Step::Screenshot { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl Scenario {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        serde_yaml::from_str(yaml).map_err(HarnessError::from)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| {
            HarnessError::ScenarioParse(format!("{}: {}", path.display(), e))
        })
    }

    /// Load all scenarios from a directory (recursive)
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        scenarios.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Resolve `{{unique_email}}` and `{{unique}}` placeholders in fill values.
    ///
    /// `unix_seconds` is taken once per run, so a re-run always signs up with a
    /// fresh address while all fills within one run agree on the same token.
    pub fn resolve_placeholders(&self, unix_seconds: i64) -> Self {
        let email = format!("test-{}@example.com", unix_seconds);
        let token = unix_seconds.to_string();

        let mut resolved = self.clone();
        for step in &mut resolved.steps {
            if let Step::Fill { value, .. } = step {
                *value = value
                    .replace("{{unique_email}}", &email)
                    .replace("{{unique}}", &token);
            }
        }
        resolved
    }

    /// Names of all screenshots this scenario will produce
    pub fn screenshot_names(&self) -> Vec<&str> {
        self.steps.iter().filter_map(Step::screenshot_name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signup_steps() {
        let yaml = r#"
name: signup
description: Create an account through the sign-up form
tags:
  - auth
steps:
  - action: navigate
    url: /signup
    wait_for_selector: 'input#email'
  - action: fill
    selector: 'input#email'
    value: '{{unique_email}}'
  - action: check
    selector: 'label:has-text("I agree to the Terms of Service") input[type="checkbox"]'
  - action: click
    selector: 'button:has-text("Create Account")'
  - action: wait_url
    pattern: '**/dashboard'
    timeout_ms: 10000
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.name, "signup");
        assert_eq!(scenario.steps.len(), 5);
        assert!(matches!(
            scenario.steps[4],
            Step::WaitUrl { ref pattern, timeout_ms: 10_000 } if pattern == "**/dashboard"
        ));
    }

    #[test]
    fn test_wait_defaults() {
        let yaml = r#"
name: defaults
steps:
  - action: wait
    selector: 'div.absolute.right-0.mt-2'
  - action: wait_url
    pattern: '**/dashboard'
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert!(matches!(scenario.steps[0], Step::Wait { timeout_ms: 5000, .. }));
        assert!(matches!(scenario.steps[1], Step::WaitUrl { timeout_ms: 10_000, .. }));
        assert!(scenario.viewport.is_none());
    }

    #[test]
    fn test_viewport_override() {
        let yaml = r#"
name: wide
viewport:
  width: 1920
  height: 1080
steps: []
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        let viewport = scenario.viewport.expect("viewport set");
        assert_eq!(viewport.width, 1920);
        assert_eq!(viewport.height, 1080);
    }

    #[test]
    fn test_resolve_placeholders() {
        let yaml = r#"
name: placeholders
steps:
  - action: fill
    selector: 'input#email'
    value: '{{unique_email}}'
  - action: fill
    selector: 'input#password'
    value: 'Password123!'
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        let resolved = scenario.resolve_placeholders(1_700_000_000);

        match &resolved.steps[0] {
            Step::Fill { value, .. } => {
                assert_eq!(value, "test-1700000000@example.com");
            }
            other => panic!("unexpected step: {:?}", other),
        }
        // Untemplated values pass through unchanged
        match &resolved.steps[1] {
            Step::Fill { value, .. } => assert_eq!(value, "Password123!"),
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_screenshot_names() {
        let yaml = r#"
name: shots
steps:
  - action: navigate
    url: /
  - action: screenshot
    name: notification-dropdown
    full_page: true
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.screenshot_names(), vec!["notification-dropdown"]);
    }

    #[test]
    fn test_filter_by_tag() {
        let a = Scenario::from_yaml("name: a\ntags: [smoke]\nsteps: []").unwrap();
        let b = Scenario::from_yaml("name: b\ntags: [auth]\nsteps: []").unwrap();
        let all = vec![a, b];

        let smoke = Scenario::filter_by_tag(&all, "smoke");
        assert_eq!(smoke.len(), 1);
        assert_eq!(smoke[0].name, "a");
    }
}
