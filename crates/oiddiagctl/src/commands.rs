//! Command implementations

use crate::client::DaemonClient;
use anyhow::{anyhow, Result};
use oiddiag_shared::render::{render_listing, render_timeline};
use owo_colors::OwoColorize;

pub async fn status(client: &DaemonClient) -> Result<()> {
    let health = client.health().await?;
    println!("{}", "oiddiagd".bold());
    println!("  Status:  {}", health.status.green());
    println!("  Version: {}", health.version);
    println!("  Uptime:  {}s", health.uptime_seconds);
    println!("  Tests:   {}", health.tests_registered);
    Ok(())
}

/// Run one diagnosis; fails when the handshake did not complete.
pub async fn diagnose(client: &DaemonClient, identifier: &str) -> Result<()> {
    let report = client.diagnose(identifier).await?;
    print!("{}", render_timeline(&report.identifier, &report.events));
    println!();
    if report.succeeded {
        println!("{} {}", "PASS".green().bold(), report.state);
        Ok(())
    } else {
        println!("{} {}", "FAIL".red().bold(), report.state);
        Err(anyhow!("Diagnosis of {} failed", identifier))
    }
}

pub async fn tests(client: &DaemonClient) -> Result<()> {
    let tests = client.tests().await?;
    print!("{}", render_listing(&tests));
    Ok(())
}

/// Invoke a test's retry action through its advertised locator.
pub async fn try_test(client: &DaemonClient, name: &str, identifier: Option<&str>) -> Result<()> {
    let tests = client.tests().await?;
    let test = tests
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| anyhow!("Unknown test '{}'", name))?;

    let (ok, text) = client.follow(&test.locator, identifier).await?;
    print!("{}", text);
    if ok {
        Ok(())
    } else {
        Err(anyhow!("{} did not run", name.yellow()))
    }
}
