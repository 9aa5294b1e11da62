//! Resolution of a requested device name (or UDID) to one concrete simulator.
//!
//! Device names are frequently prefixes of one another ("iPhone 14",
//! "iPhone 14 Plus", "iPhone 14 Pro"), so matching runs in tiers from strict
//! to loose and returns the first hit:
//!
//! 1. [`MatchTier::Exact`]: case-insensitive name equality
//! 2. [`MatchTier::WordBoundary`]: the requested name as a whole-word pattern
//! 3. [`MatchTier::Substring`]: case-insensitive substring
//!
//! Every tier also requires the device to be available and, when a platform
//! version is requested, the version to appear in the runtime identifier.
//! A literal UDID skips the tiers entirely.

use std::sync::Arc;

use regex::RegexBuilder;
use tracing::debug;

use crate::backend::SimulatorBackend;
use crate::error::ResolveError;
use crate::simctl::Device;

/// Which matching tier selected a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Udid,
    Exact,
    WordBoundary,
    Substring,
}

/// Picks a device for a `(name, platform version)` request.
///
/// Holds no state besides the backend; every resolution enumerates afresh.
#[derive(Clone)]
pub struct DeviceResolver {
    backend: Arc<dyn SimulatorBackend>,
}

impl DeviceResolver {
    pub fn new(backend: Arc<dyn SimulatorBackend>) -> Self {
        Self { backend }
    }

    /// Resolves `name_or_udid` to one available device.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Enumeration`] if the device listing fails
    /// - [`ResolveError::NotFound`] if nothing matches; it carries the
    ///   enumeration so callers can offer alternatives
    pub async fn resolve(
        &self,
        name_or_udid: &str,
        platform_version: Option<&str>,
    ) -> Result<Device, ResolveError> {
        let devices = self
            .backend
            .list_devices()
            .await
            .map_err(ResolveError::Enumeration)?;

        match select_device(&devices, name_or_udid, platform_version) {
            Some((device, tier)) => {
                debug!(
                    requested = %name_or_udid,
                    version = ?platform_version,
                    udid = %device.udid,
                    tier = ?tier,
                    "resolved device"
                );
                Ok(device.clone())
            }
            None => Err(ResolveError::NotFound {
                requested: name_or_udid.to_string(),
                platform_version: platform_version.map(str::to_string),
                devices,
            }),
        }
    }
}

/// Applies UDID lookup and then the name tiers to an enumeration.
pub fn select_device<'a>(
    devices: &'a [Device],
    name_or_udid: &str,
    platform_version: Option<&str>,
) -> Option<(&'a Device, MatchTier)> {
    let requested = name_or_udid.trim();

    if is_udid(requested) {
        if let Some(device) = devices
            .iter()
            .find(|d| d.is_available && d.udid.eq_ignore_ascii_case(requested))
        {
            return Some((device, MatchTier::Udid));
        }
    }

    match_by_name(devices, requested, platform_version)
}

/// Runs the three name tiers in order.
///
/// An empty name matches nothing.
pub fn match_by_name<'a>(
    devices: &'a [Device],
    name: &str,
    platform_version: Option<&str>,
) -> Option<(&'a Device, MatchTier)> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let eligible: Vec<&Device> = devices
        .iter()
        .filter(|d| d.is_available && version_matches(&d.runtime, platform_version))
        .collect();

    let wanted = name.to_lowercase();

    if let Some(device) = eligible.iter().find(|d| d.name.to_lowercase() == wanted) {
        return Some((*device, MatchTier::Exact));
    }

    // `name` is escaped, so building the pattern cannot fail in practice.
    if let Ok(word) = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(name)))
        .case_insensitive(true)
        .build()
    {
        if let Some(device) = eligible.iter().find(|d| word.is_match(&d.name)) {
            return Some((*device, MatchTier::WordBoundary));
        }
    }

    eligible
        .iter()
        .find(|d| d.name.to_lowercase().contains(&wanted))
        .map(|d| (*d, MatchTier::Substring))
}

/// Whether a runtime identifier satisfies a requested platform version.
///
/// Runtime identifiers spell versions with dashes (`iOS-16-4`), so a dotted
/// request is also tried in dashed form.
pub fn version_matches(runtime: &str, platform_version: Option<&str>) -> bool {
    let Some(version) = platform_version.map(str::trim).filter(|v| !v.is_empty()) else {
        return true;
    };
    let runtime = runtime.to_lowercase();
    let version = version.to_lowercase();
    runtime.contains(&version) || runtime.contains(&version.replace('.', "-"))
}

/// Validates a simulator UDID format (8-4-4-4-12 hex).
pub fn is_udid(candidate: &str) -> bool {
    if candidate.len() != 36 {
        return false;
    }
    let parts: Vec<&str> = candidate.split('-').collect();
    if parts.len() != 5 {
        return false;
    }
    let expected_lengths = [8, 4, 4, 4, 12];
    parts
        .iter()
        .zip(expected_lengths.iter())
        .all(|(part, &len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::simctl::DeviceState;

    const IOS_16_4: &str = "com.apple.CoreSimulator.SimRuntime.iOS-16-4";
    const IOS_17_0: &str = "com.apple.CoreSimulator.SimRuntime.iOS-17-0";

    fn iphone_14_family() -> Vec<Device> {
        vec![
            Device::new("U1", "iPhone 14", IOS_16_4),
            Device::new("U2", "iPhone 14 Pro", IOS_16_4),
        ]
    }

    fn udid_of(devices: &[Device], name: &str, version: Option<&str>) -> Option<String> {
        match_by_name(devices, name, version).map(|(d, _)| d.udid.clone())
    }

    #[test]
    fn exact_name_beats_longer_names() {
        let devices = iphone_14_family();
        assert_eq!(udid_of(&devices, "iPhone 14", Some("16.4")).as_deref(), Some("U1"));
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let devices = iphone_14_family();
        let (device, tier) = match_by_name(&devices, "IPHONE 14 pro", None).unwrap();
        assert_eq!(device.udid, "U2");
        assert_eq!(tier, MatchTier::Exact);
    }

    #[test]
    fn pro_suffix_never_wins_over_base_name() {
        // Put the Pro first so a naive substring scan would pick it.
        for base in ["iPhone 14", "iPhone 15", "iPad Air"] {
            let devices = vec![
                Device::new("PRO", format!("{base} Pro"), IOS_16_4),
                Device::new("BASE", base, IOS_16_4),
            ];
            assert_eq!(udid_of(&devices, base, None).as_deref(), Some("BASE"));
        }
    }

    #[test]
    fn word_boundary_tier_matches_inner_words() {
        let devices = iphone_14_family();
        let (device, tier) = match_by_name(&devices, "14 Pro", Some("16.4")).unwrap();
        assert_eq!(device.udid, "U2");
        assert_eq!(tier, MatchTier::WordBoundary);
    }

    #[test]
    fn word_boundary_rejects_partial_words() {
        let devices = vec![
            Device::new("MINI", "iPhone 13 mini", IOS_16_4),
            Device::new("PRO", "iPhone 13 Pro", IOS_16_4),
        ];
        // "Pr" is not a whole word anywhere, so only the substring tier can hit.
        let (device, tier) = match_by_name(&devices, "Pr", None).unwrap();
        assert_eq!(device.udid, "PRO");
        assert_eq!(tier, MatchTier::Substring);
    }

    #[test]
    fn regex_special_characters_are_escaped() {
        let devices = vec![Device::new("U", "iPad Pro (12.9-inch) (6th generation)", IOS_17_0)];
        let (device, tier) = match_by_name(&devices, "(12.9-inch)", None).unwrap();
        assert_eq!(device.udid, "U");
        // `\b` cannot anchor next to a parenthesis, so this falls to substring.
        assert_eq!(tier, MatchTier::Substring);
        assert!(match_by_name(&devices, "12.9.inch", None).is_none());
    }

    #[test]
    fn version_filter_applies_to_every_tier() {
        let devices = vec![
            Device::new("OLD", "iPhone 14", IOS_16_4),
            Device::new("NEW", "iPhone 14", IOS_17_0),
        ];
        assert_eq!(udid_of(&devices, "iPhone 14", Some("17.0")).as_deref(), Some("NEW"));
        assert_eq!(udid_of(&devices, "iPhone", Some("17")).as_deref(), Some("NEW"));
        assert_eq!(udid_of(&devices, "Phone 1", Some("16-4")).as_deref(), Some("OLD"));
        assert!(udid_of(&devices, "iPhone 14", Some("18.0")).is_none());
    }

    #[test]
    fn version_accepts_platform_prefix() {
        assert!(version_matches(IOS_16_4, Some("iOS-16")));
        assert!(version_matches(IOS_16_4, Some("ios 16.4".replace(' ', "-").as_str())));
        assert!(version_matches(IOS_16_4, None));
        assert!(version_matches(IOS_16_4, Some("  ")));
        assert!(!version_matches(IOS_16_4, Some("17")));
    }

    #[test]
    fn unavailable_devices_are_never_selected() {
        let devices = vec![
            Device::new("DEAD", "iPhone 14", IOS_16_4).unavailable(),
            Device::new("ALIVE", "iPhone 14 Plus", IOS_16_4),
        ];
        assert_eq!(udid_of(&devices, "iPhone 14", None).as_deref(), Some("ALIVE"));

        let only_dead = vec![Device::new("DEAD", "iPhone 14", IOS_16_4).unavailable()];
        assert!(udid_of(&only_dead, "iPhone 14", None).is_none());
    }

    #[test]
    fn empty_name_matches_nothing() {
        assert!(udid_of(&iphone_14_family(), "   ", None).is_none());
    }

    #[test]
    fn udid_format_validation() {
        assert!(is_udid("A1B2C3D4-E5F6-7890-ABCD-EF1234567890"));
        assert!(is_udid("a1b2c3d4-e5f6-7890-abcd-ef1234567890"));
        assert!(!is_udid("A1B2C3D4-E5F6-7890-ABCD-EF123456789"));
        assert!(!is_udid("A1B2C3D4E5F6-7890-ABCD-EF1234567890-"));
        assert!(!is_udid("G1B2C3D4-E5F6-7890-ABCD-EF1234567890"));
        assert!(!is_udid("iPhone 14"));
    }

    #[test]
    fn literal_udid_short_circuits_name_matching() {
        let udid = "A1B2C3D4-E5F6-7890-ABCD-EF1234567890";
        let devices = vec![
            Device::new(udid, "Some Unrelated Name", IOS_16_4).with_state(DeviceState::Booted),
        ];
        let (device, tier) = select_device(&devices, &udid.to_lowercase(), Some("99.9")).unwrap();
        assert_eq!(device.udid, udid);
        assert_eq!(tier, MatchTier::Udid);
    }

    #[test]
    fn unavailable_udid_is_not_returned() {
        let udid = "A1B2C3D4-E5F6-7890-ABCD-EF1234567890";
        let devices = vec![Device::new(udid, "iPhone 14", IOS_16_4).unavailable()];
        assert!(select_device(&devices, udid, None).is_none());
    }

    #[tokio::test]
    async fn resolve_returns_not_found_with_catalog() {
        let backend = MockBackend::new(iphone_14_family());
        let resolver = DeviceResolver::new(backend);

        let err = resolver.resolve("Galaxy S23", Some("16.4")).await.unwrap_err();
        match err {
            ResolveError::NotFound {
                requested,
                platform_version,
                devices,
            } => {
                assert_eq!(requested, "Galaxy S23");
                assert_eq!(platform_version.as_deref(), Some("16.4"));
                assert_eq!(devices.len(), 2);
            }
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn resolve_reports_enumeration_failure_distinctly() {
        let backend = MockBackend::new(iphone_14_family());
        backend.fail(crate::mock::MockAction::ListDevices);
        let resolver = DeviceResolver::new(backend);

        let err = resolver.resolve("iPhone 14", None).await.unwrap_err();
        assert!(matches!(err, ResolveError::Enumeration(_)));
    }

    #[tokio::test]
    async fn resolve_scenario_from_two_similar_names() {
        let backend = MockBackend::new(iphone_14_family());
        let resolver = DeviceResolver::new(backend);

        assert_eq!(resolver.resolve("iPhone 14", Some("16.4")).await.unwrap().udid, "U1");
        assert_eq!(resolver.resolve("14 Pro", Some("16.4")).await.unwrap().udid, "U2");
    }
}
