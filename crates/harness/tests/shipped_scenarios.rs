//! The YAML files shipped under scenarios/ must stay parseable and keep the
//! shape the verification flow depends on.

use std::path::PathBuf;

use propcheck_harness::browser::{BrowserConfig, PlaywrightDriver};
use propcheck_harness::scenario::{Scenario, Step, WaitState};
use test_case::test_case;

fn scenarios_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scenarios")
}

fn load(name: &str) -> Scenario {
    let scenarios = Scenario::load_all(&scenarios_dir()).expect("scenarios dir parses");
    scenarios
        .into_iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("scenario '{}' missing", name))
}

#[test_case("signup-notifications")]
#[test_case("home-smoke")]
fn scenario_parses(name: &str) {
    let scenario = load(name);
    assert!(!scenario.steps.is_empty());
    assert!(!scenario.tags.is_empty());
}

#[test]
fn signup_flow_shape() {
    let scenario = load("signup-notifications");

    // Opens the sign-up page first
    assert!(matches!(
        &scenario.steps[0],
        Step::Navigate { url, .. } if url == "/signup"
    ));

    // Email uses the per-run placeholder so re-runs sign up fresh accounts
    let email_fill = scenario.steps.iter().any(|s| {
        matches!(s, Step::Fill { selector, value }
            if selector == "input#email" && value == "{{unique_email}}")
    });
    assert!(email_fill, "email fill must use {{{{unique_email}}}}");

    // Both consent checkboxes are mandatory
    let checks = scenario
        .steps
        .iter()
        .filter(|s| matches!(s, Step::Check { .. }))
        .count();
    assert_eq!(checks, 2);

    // Submit waits for the dashboard redirect with a 10s bound
    assert!(scenario.steps.iter().any(|s| {
        matches!(s, Step::WaitUrl { pattern, timeout_ms: 10_000 } if pattern == "**/dashboard")
    }));

    // Bell wait carries the explicit 10s bound; the dropdown wait keeps the default
    assert!(scenario.steps.iter().any(|s| {
        matches!(s, Step::Wait { selector, timeout_ms: 10_000, state: WaitState::Visible }
            if selector == "button:has(svg.lucide-bell)")
    }));
    assert!(scenario.steps.iter().any(|s| {
        matches!(s, Step::Wait { selector, timeout_ms: 5000, .. }
            if selector == "div.absolute.right-0.mt-2")
    }));

    // Ends with the full-page evidence screenshot
    assert!(matches!(
        scenario.steps.last(),
        Some(Step::Screenshot { name, full_page: true, .. }) if name == "notification-dropdown"
    ));
}

#[test]
fn signup_flow_compiles_to_one_session() {
    let scenario = load("signup-notifications").resolve_placeholders(1_700_000_000);
    let driver = PlaywrightDriver::script_builder(BrowserConfig::default());
    let script = driver.build_script(&scenario.steps);

    assert_eq!(script.matches(".launch(").count(), 1);
    assert!(script.contains("test-1700000000@example.com"));
    assert!(script.contains("await page.waitForURL('**/dashboard'"));
    assert!(script.contains("notification-dropdown.png"));
    // Browser release is unconditional
    assert!(script.contains("} finally {"));
    assert!(script.contains("await browser.close();"));
}
