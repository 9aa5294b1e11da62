//! Plain-text renderings of devices and sessions for tool results.

use std::collections::BTreeMap;

use simpilot_core::error::ResolveError;
use simpilot_core::session::Session;
use simpilot_core::simctl::{runtime_display_name, Device};

const RETRY_HINT: &str =
    "Retry create_session with one of the names above, or pass a UDID as device_name.";

/// Left-aligned columns separated by two spaces, header underlined with dashes.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(header.as_slice()));
    out.push(line(rule.as_slice()));
    for row in rows {
        out.push(line(row.as_slice()));
    }
    out.join("\n")
}

/// One row per device, annotated with how many sessions point at it.
pub fn devices_table(devices: &[Device], sessions: &[Session]) -> String {
    if devices.is_empty() {
        return "No simulators.".to_string();
    }

    let rows: Vec<Vec<String>> = devices
        .iter()
        .map(|d| {
            let bound = sessions
                .iter()
                .filter(|s| s.udid.eq_ignore_ascii_case(&d.udid))
                .count();
            vec![
                d.name.clone(),
                runtime_display_name(&d.runtime),
                d.state.to_string(),
                d.udid.clone(),
                bound.to_string(),
            ]
        })
        .collect();

    render_table(&["NAME", "OS", "STATE", "UDID", "SESSIONS"], &rows)
}

pub fn sessions_table(sessions: &[Session]) -> String {
    if sessions.is_empty() {
        return "No active sessions.".to_string();
    }

    let rows: Vec<Vec<String>> = sessions
        .iter()
        .map(|s| {
            vec![
                s.id.to_string(),
                s.device_name.clone(),
                s.platform_version.clone().unwrap_or_else(|| "-".to_string()),
                s.udid.clone(),
                s.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                s.last_used_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();

    render_table(
        &["SESSION", "DEVICE", "OS", "UDID", "CREATED", "LAST USED"],
        &rows,
    )
}

/// Available devices grouped by runtime, names sorted within each group.
pub fn device_catalog(devices: &[Device]) -> String {
    let mut by_runtime: BTreeMap<String, Vec<&Device>> = BTreeMap::new();
    for device in devices.iter().filter(|d| d.is_available) {
        by_runtime
            .entry(runtime_display_name(&device.runtime))
            .or_default()
            .push(device);
    }

    if by_runtime.is_empty() {
        return "No available simulators. Install a runtime in Xcode > Settings > Platforms."
            .to_string();
    }

    let mut out = String::from("Available simulators:\n");
    for (runtime, mut group) in by_runtime {
        group.sort_by(|a, b| a.name.cmp(&b.name));
        out.push('\n');
        out.push_str(&runtime);
        out.push('\n');
        for device in group {
            out.push_str(&format!("  {}  {}  ({})\n", device.name, device.udid, device.state));
        }
    }
    out.push('\n');
    out.push_str(RETRY_HINT);
    out
}

/// Error text for a failed resolution, with a catalog when one is available.
pub fn resolve_failure(err: &ResolveError) -> String {
    match err {
        ResolveError::NotFound { devices, .. } => {
            format!("{err}.\n\n{}", device_catalog(devices))
        }
        ResolveError::Enumeration(_) => format!(
            "{err}. Make sure Xcode is installed and `xcrun simctl list` works."
        ),
    }
}
