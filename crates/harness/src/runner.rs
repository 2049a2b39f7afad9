//! Orchestrates the target application, browser, and artifact verification

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::artifact::{ArtifactConfig, ArtifactReport, ArtifactStore};
use crate::browser::{BrowserConfig, PlaywrightDriver, StepOutcome};
use crate::error::{HarnessError, HarnessResult};
use crate::scenario::Scenario;
use crate::target::{TargetConfig, TargetHandle};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub run_id: Uuid,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepOutcome>,
    pub artifacts: Vec<ArtifactReport>,
    pub visual: Vec<VisualResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualResult {
    pub name: String,
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_image_path: Option<String>,
}

/// Result of running a whole suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    /// Aggregate individual scenario results
    pub fn summarize(results: Vec<ScenarioResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }
}

/// Configuration for the runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub target: TargetConfig,
    pub browser: BrowserConfig,
    pub artifacts: ArtifactConfig,
    pub scenarios_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            browser: BrowserConfig::default(),
            artifacts: ArtifactConfig::default(),
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("verification"),
        }
    }
}

/// Main scenario runner
pub struct Runner {
    config: RunnerConfig,
    target: Option<TargetHandle>,
}

impl Runner {
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config, target: None }
    }

    /// Make sure the target application is reachable
    pub async fn ensure_target(&mut self) -> HarnessResult<()> {
        if self.target.is_some() {
            return Ok(());
        }

        let target = TargetHandle::acquire(self.config.target.clone()).await?;
        self.config.browser.base_url = target.base_url().to_string();
        self.target = Some(target);
        Ok(())
    }

    /// Browser configuration for one scenario; a scenario viewport wins over
    /// the configured default
    fn browser_config_for(&self, scenario: &Scenario) -> BrowserConfig {
        let mut config = self.config.browser.clone();
        if let Some(viewport) = &scenario.viewport {
            config.viewport = viewport.clone();
        }
        config
    }

    /// Release the target application
    pub fn release_target(&mut self) -> HarnessResult<()> {
        if let Some(mut target) = self.target.take() {
            target.stop()?;
        }
        Ok(())
    }

    /// Load a scenario by name from the scenarios directory
    pub fn load_named(&self, name: &str) -> HarnessResult<Scenario> {
        let scenarios = Scenario::load_all(&self.config.scenarios_dir)?;
        scenarios
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| HarnessError::ScenarioNotFound(name.to_string()))
    }

    /// Run all scenarios in the scenarios directory
    pub async fn run_all(&mut self) -> HarnessResult<SuiteResult> {
        let scenarios = Scenario::load_all(&self.config.scenarios_dir)?;
        self.run_scenarios(&scenarios).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> HarnessResult<SuiteResult> {
        let scenarios = Scenario::load_all(&self.config.scenarios_dir)?;
        let filtered: Vec<Scenario> = scenarios
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect();
        self.run_scenarios(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_named(&mut self, name: &str) -> HarnessResult<ScenarioResult> {
        let scenario = self.load_named(name)?;
        self.run_scenario(&scenario).await
    }

    /// Run a list of scenarios sequentially
    pub async fn run_scenarios(&mut self, scenarios: &[Scenario]) -> HarnessResult<SuiteResult> {
        let start = Instant::now();
        let mut results = Vec::new();

        self.ensure_target().await?;

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            match self.run_scenario(scenario).await {
                Ok(result) => {
                    if result.success {
                        info!("✓ {} ({} ms)", result.name, result.duration_ms);
                    } else {
                        error!(
                            "✗ {} - {}",
                            result.name,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    results.push(result);
                }
                Err(e) => {
                    error!("✗ {} - {}", scenario.name, e);
                    results.push(ScenarioResult {
                        name: scenario.name.clone(),
                        run_id: Uuid::new_v4(),
                        success: false,
                        duration_ms: 0,
                        steps: vec![],
                        artifacts: vec![],
                        visual: vec![],
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let suite = SuiteResult::summarize(results, duration_ms);

        info!(
            "Results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );

        Ok(suite)
    }

    /// Run a single scenario in one browser session
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> HarnessResult<ScenarioResult> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        debug!("Running scenario: {} ({})", scenario.name, run_id);

        self.ensure_target().await?;

        // Placeholders resolve once per run so a re-run signs up fresh
        let resolved = scenario.resolve_placeholders(chrono::Utc::now().timestamp());

        let driver = PlaywrightDriver::new(self.browser_config_for(&resolved))?;
        let steps = driver.run(&resolved.steps).await?;

        let mut scenario_error = steps
            .iter()
            .find(|s| !s.ok)
            .map(|s| step_failure(s).to_string());

        // Verify every screenshot a completed step produced
        let store = ArtifactStore::new(self.config.artifacts.clone())?;
        let mut artifacts = Vec::new();
        for outcome in steps.iter().filter(|s| s.ok) {
            if outcome.screenshot.is_some() {
                let name = resolved.steps[outcome.index]
                    .screenshot_name()
                    .unwrap_or_default()
                    .to_string();
                match store.verify(&name) {
                    Ok(report) => artifacts.push(report),
                    Err(e) => {
                        scenario_error.get_or_insert_with(|| e.to_string());
                    }
                }
            }
        }

        // Baseline comparison only for scenarios that name one
        let mut visual = Vec::new();
        if let Some(baseline) = &resolved.visual_baseline {
            if scenario_error.is_none() {
                match store.compare(baseline, Some(resolved.visual_threshold)) {
                    Ok(diff) => {
                        if !diff.matches {
                            scenario_error = Some(
                                HarnessError::VisualMismatch {
                                    name: baseline.clone(),
                                    diff_percent: diff.diff_percent,
                                    threshold: resolved.visual_threshold,
                                }
                                .to_string(),
                            );
                        }
                        visual.push(VisualResult {
                            name: baseline.clone(),
                            matches: diff.matches,
                            diff_percent: diff.diff_percent,
                            diff_image_path: diff
                                .diff_image_path
                                .map(|p| p.to_string_lossy().to_string()),
                        });
                    }
                    Err(HarnessError::BaselineMissing(_)) => {
                        info!(
                            "No baseline for '{}' - run with --update-baselines to create one",
                            baseline
                        );
                    }
                    Err(e) => {
                        scenario_error = Some(format!("visual comparison error: {}", e));
                    }
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = scenario_error.is_none();

        Ok(ScenarioResult {
            name: resolved.name,
            run_id,
            success,
            duration_ms,
            steps,
            artifacts,
            visual,
            error: scenario_error,
        })
    }

    /// Promote all current screenshots to baselines
    pub fn update_baselines(&self) -> HarnessResult<()> {
        let store = ArtifactStore::new(self.config.artifacts.clone())?;

        for entry in std::fs::read_dir(&self.config.artifacts.screenshot_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                if let Some(name) = path.file_stem() {
                    store.update_baseline(&name.to_string_lossy())?;
                }
            }
        }
        Ok(())
    }

    /// Write suite results as pretty JSON
    pub fn write_results(&self, suite: &SuiteResult) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("results.json");
        let json = serde_json::to_string_pretty(suite)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Error for the first failed step of a run
fn step_failure(outcome: &StepOutcome) -> HarnessError {
    HarnessError::StepFailed {
        step: outcome.label.clone(),
        reason: outcome
            .error
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        let _ = self.release_target();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_result(name: &str, success: bool) -> ScenarioResult {
        ScenarioResult {
            name: name.to_string(),
            run_id: Uuid::new_v4(),
            success,
            duration_ms: 42,
            steps: vec![],
            artifacts: vec![],
            visual: vec![],
            error: if success { None } else { Some("step failed".to_string()) },
        }
    }

    #[test]
    fn test_summarize() {
        let suite = SuiteResult::summarize(
            vec![fake_result("a", true), fake_result("b", false), fake_result("c", true)],
            1000,
        );
        assert_eq!(suite.total, 3);
        assert_eq!(suite.passed, 2);
        assert_eq!(suite.failed, 1);
    }

    #[test]
    fn test_write_results() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Runner::with_config(RunnerConfig {
            output_dir: tmp.path().to_path_buf(),
            ..Default::default()
        });

        let suite = SuiteResult::summarize(vec![fake_result("signup-notifications", true)], 10);
        let path = runner.write_results(&suite).unwrap();

        let written: SuiteResult =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.total, 1);
        assert_eq!(written.results[0].name, "signup-notifications");
    }

    #[test]
    fn test_scenario_viewport_overrides_configured_default() {
        use crate::scenario::Viewport;

        let mut config = RunnerConfig::default();
        config.browser.viewport = Viewport { width: 1600, height: 900 };
        let runner = Runner::with_config(config);

        let plain = Scenario::from_yaml("name: plain\nsteps: []").unwrap();
        let viewport = runner.browser_config_for(&plain).viewport;
        assert_eq!((viewport.width, viewport.height), (1600, 900));

        let wide = Scenario::from_yaml(
            "name: wide\nviewport:\n  width: 1920\n  height: 1080\nsteps: []",
        )
        .unwrap();
        let viewport = runner.browser_config_for(&wide).viewport;
        assert_eq!((viewport.width, viewport.height), (1920, 1080));
    }

    #[test]
    fn test_step_failure_message() {
        let outcome = StepOutcome {
            index: 3,
            label: "wait_url:**/dashboard".to_string(),
            ok: false,
            duration_ms: 10_003,
            error: Some("Timeout 10000ms exceeded.".to_string()),
            screenshot: None,
        };

        let message = step_failure(&outcome).to_string();
        assert_eq!(
            message,
            "Step failed: wait_url:**/dashboard - Timeout 10000ms exceeded."
        );
    }

    #[test]
    fn test_load_named_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Runner::with_config(RunnerConfig {
            scenarios_dir: tmp.path().to_path_buf(),
            ..Default::default()
        });

        let err = runner.load_named("does-not-exist").unwrap_err();
        assert!(matches!(err, HarnessError::ScenarioNotFound(_)));
    }

    #[test]
    fn test_load_named_from_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("smoke.yaml"),
            "name: home-smoke\nsteps:\n  - action: navigate\n    url: /\n",
        )
        .unwrap();

        let runner = Runner::with_config(RunnerConfig {
            scenarios_dir: tmp.path().to_path_buf(),
            ..Default::default()
        });

        let scenario = runner.load_named("home-smoke").unwrap();
        assert_eq!(scenario.steps.len(), 1);
    }
}
