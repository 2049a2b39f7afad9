//! Playwright browser automation
//!
//! Scenarios compile to a single Node script executed in one browser session,
//! so state established by early steps (a signed-in session, form state)
//! survives to later ones. The generated script prints one JSON event line per
//! step; the driver parses those lines back into step outcomes.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::scenario::{Step, Viewport, WaitState};

/// Browser engine to drive
#[derive(Debug, Clone, Copy, Default)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }

    /// Parse a browser name, defaulting to chromium
    pub fn parse(name: &str) -> Self {
        match name {
            "firefox" => Browser::Firefox,
            "webkit" => Browser::Webkit,
            _ => Browser::Chromium,
        }
    }
}

/// Configuration for the Playwright driver
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub base_url: String,
    pub screenshot_dir: PathBuf,
    pub viewport: Viewport,
    pub browser: Browser,
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5173".to_string(),
            screenshot_dir: PathBuf::from("verification/screenshots"),
            viewport: Viewport { width: 1280, height: 720 },
            browser: Browser::Chromium,
            headless: true,
        }
    }
}

/// Outcome of a single executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub label: String,
    pub ok: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot: Option<PathBuf>,
}

/// Event line emitted by the generated script
#[derive(Debug, Deserialize)]
struct StepEvent {
    step: usize,
    label: String,
    ok: bool,
    ms: u64,
    #[serde(default)]
    error: Option<String>,
}

/// Drives Playwright through generated Node scripts
pub struct PlaywrightDriver {
    config: BrowserConfig,
}

impl PlaywrightDriver {
    /// Create a new driver, verifying the Playwright installation
    pub fn new(config: BrowserConfig) -> HarnessResult<Self> {
        Self::check_playwright_installed()?;
        std::fs::create_dir_all(&config.screenshot_dir)?;
        Ok(Self { config })
    }

    /// Create a driver for script generation only, skipping the installation
    /// probe. Nothing built this way should call [`Self::run`].
    pub fn script_builder(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> HarnessResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(HarnessError::PlaywrightNotFound),
        }
    }

    /// Execute all steps of a scenario in one browser session
    pub async fn run(&self, steps: &[Step]) -> HarnessResult<Vec<StepOutcome>> {
        let script = self.build_script(steps);

        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("scenario.js");
        std::fs::write(&script_path, &script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let output = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(temp_dir.path())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let events = parse_events(&stdout);

        // A crash before the first event line means the script itself is
        // broken (node missing playwright, syntax error), not a step failure.
        if events.is_empty() && !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarnessError::Playwright(format!(
                "script produced no step events:\nstdout: {}\nstderr: {}",
                stdout, stderr
            )));
        }

        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            let screenshot = steps.get(event.step).and_then(|s| {
                s.screenshot_name()
                    .map(|name| self.config.screenshot_dir.join(format!("{}.png", name)))
            });
            if !event.ok {
                warn!("Step failed: {} - {:?}", event.label, event.error);
            }
            outcomes.push(StepOutcome {
                index: event.step,
                label: event.label,
                ok: event.ok,
                duration_ms: event.ms,
                error: event.error,
                screenshot,
            });
        }

        // All parsed events succeeded but the process still failed: the error
        // happened outside step execution (e.g. browser teardown).
        if !output.status.success() && outcomes.iter().all(|o| o.ok) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarnessError::Playwright(format!(
                "script exited non-zero after all steps passed:\nstderr: {}",
                stderr
            )));
        }

        Ok(outcomes)
    }

    /// Build the Node script for a full scenario
    pub fn build_script(&self, steps: &[Step]) -> String {
        let mut script = String::new();

        script.push_str(&format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  const baseUrl = '{base_url}';

  let stepIndex = -1;
  const step = async (label, fn) => {{
    stepIndex += 1;
    const started = Date.now();
    try {{
      await fn();
      console.log(JSON.stringify({{ step: stepIndex, label, ok: true, ms: Date.now() - started }}));
    }} catch (error) {{
      console.log(JSON.stringify({{ step: stepIndex, label, ok: false, ms: Date.now() - started, error: error.message }}));
      throw error;
    }}
  }};

  try {{
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = self.config.viewport.width,
            height = self.config.viewport.height,
            base_url = js_escape(&self.config.base_url),
        ));

        for step in steps {
            script.push_str(&format!(
                "    await step('{}', async () => {{\n",
                js_escape(&step.label())
            ));
            script.push_str(&self.step_body(step));
            script.push_str("    });\n");
        }

        script.push_str(
            r#"    process.exitCode = 0;
  } catch (error) {
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})();
"#,
        );

        script
    }

    /// Emit the body of one step
    fn step_body(&self, step: &Step) -> String {
        match step {
            Step::Navigate { url, wait_for_selector } => {
                let mut body = format!(
                    "      await page.goto(baseUrl + '{}');\n",
                    js_escape(url)
                );
                if let Some(selector) = wait_for_selector {
                    body.push_str(&format!(
                        "      await page.waitForSelector('{}');\n",
                        js_escape(selector)
                    ));
                }
                body
            }
            Step::Fill { selector, value } => format!(
                "      await page.fill('{}', '{}');\n",
                js_escape(selector),
                js_escape(value)
            ),
            Step::Check { selector } => format!(
                "      await page.check('{}');\n",
                js_escape(selector)
            ),
            Step::Uncheck { selector } => format!(
                "      await page.uncheck('{}');\n",
                js_escape(selector)
            ),
            Step::Click { selector, timeout_ms } => format!(
                "      await page.click('{}', {{ timeout: {} }});\n",
                js_escape(selector),
                timeout_ms.unwrap_or(DEFAULT_STEP_TIMEOUT.as_millis() as u64)
            ),
            Step::Wait { selector, timeout_ms, state } => {
                let state_str = match state {
                    WaitState::Visible => "visible",
                    WaitState::Hidden => "hidden",
                    WaitState::Attached => "attached",
                    WaitState::Detached => "detached",
                };
                format!(
                    "      await page.waitForSelector('{}', {{ state: '{}', timeout: {} }});\n",
                    js_escape(selector),
                    state_str,
                    timeout_ms
                )
            }
            Step::WaitUrl { pattern, timeout_ms } => format!(
                "      await page.waitForURL('{}', {{ timeout: {} }});\n",
                js_escape(pattern),
                timeout_ms
            ),
            Step::Assert { selector, visible, text_contains } => {
                let mut body = String::new();
                match visible {
                    Some(true) | None => body.push_str(&format!(
                        "      await page.locator('{}').waitFor({{ state: 'visible' }});\n",
                        js_escape(selector)
                    )),
                    Some(false) => body.push_str(&format!(
                        "      await page.locator('{}').waitFor({{ state: 'hidden' }});\n",
                        js_escape(selector)
                    )),
                }
                if let Some(expected) = text_contains {
                    body.push_str(&format!(
                        "      const text = await page.locator('{sel}').innerText();\n      if (!text.includes('{exp}')) throw new Error('expected text to contain \"{exp}\", got: ' + text);\n",
                        sel = js_escape(selector),
                        exp = js_escape(expected)
                    ));
                }
                body
            }
            Step::Sleep { ms } => format!("      await page.waitForTimeout({});\n", ms),
            Step::Screenshot { name, full_page, selector } => {
                let path = self
                    .config
                    .screenshot_dir
                    .join(format!("{}.png", name));
                let path_str = js_escape(&path.to_string_lossy());
                match selector {
                    Some(sel) => format!(
                        "      await page.locator('{}').screenshot({{ path: '{}' }});\n",
                        js_escape(sel),
                        path_str
                    ),
                    None => format!(
                        "      await page.screenshot({{ path: '{}', fullPage: {} }});\n",
                        path_str, full_page
                    ),
                }
            }
        }
    }
}

/// Escape a string for a single-quoted JS literal
fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
}

/// Parse JSON event lines from script stdout, skipping browser noise
fn parse_events(stdout: &str) -> Vec<StepEvent> {
    // Only lines that are a single JSON object are ours; the browser and
    // Playwright occasionally write unrelated lines to stdout.
    let json_line = regex::Regex::new(r"^\{.*\}$").expect("static regex");

    stdout
        .lines()
        .map(str::trim)
        .filter(|line| json_line.is_match(line))
        .filter_map(|line| serde_json::from_str::<StepEvent>(line).ok())
        .collect()
}

/// Per-request timeout applied to every blocking browser operation without an
/// explicit override.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(5);
