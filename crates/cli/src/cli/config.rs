use std::fmt::Write as _;
use std::path::Path;

use eb_bridge::ReconnectBackoff;
use eb_domain::config::{Config, ConfigSeverity};

/// Build the `config validate` report: the bridge settings that matter when
/// the host reloads, then every validation issue.  The flag is `false`
/// when any issue is an error.
pub fn report(config: &Config, config_path: &Path) -> (String, bool) {
    let mut out = String::new();
    let path = config_path.display();
    let backoff = ReconnectBackoff::from_config(&config.reconnect);
    let give_up = match backoff.worst_case_wait() {
        Some(wait) => format!("{}s", wait.as_secs_f64()),
        None => "never".to_string(),
    };

    let _ = writeln!(out, "Config: {path}");
    let _ = writeln!(out, "  host endpoint      {}", config.host.ws_url());
    let _ = writeln!(
        out,
        "  reload recovery    {} retries, {}ms apart",
        config.retry.max_retries, config.retry.recovery_delay_ms
    );
    let _ = writeln!(out, "  reconnect gives up after {give_up} of back-off");
    let _ = writeln!(
        out,
        "  idle tools expire  after {}s (swept every {}s)",
        config.lifecycle.idle_threshold_secs, config.lifecycle.sweep_interval_secs
    );

    let issues = config.validate();
    if issues.is_empty() {
        let _ = writeln!(out, "\nConfig OK");
        return (out, true);
    }

    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    let _ = writeln!(out);
    for issue in &issues {
        let _ = writeln!(out, "{issue}");
    }
    let _ = writeln!(
        out,
        "\n{errors} error(s), {} warning(s)",
        issues.len() - errors
    );
    (out, errors == 0)
}

/// Print the report.  Returns `false` when the config has errors.
pub fn validate(config: &Config, config_path: &Path) -> bool {
    let (text, ok) = report(config, config_path);
    print!("{text}");
    ok
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)?;
    print!("{output}");
    Ok(())
}
