//! Device resolution against a realistic catalog.

mod common;

use common::*;

use simpilot_core::error::{RegistryError, ResolveError};
use simpilot_core::mock::MockAction;
use simpilot_core::resolver::{select_device, MatchTier};

#[test]
fn base_name_never_resolves_to_pro_variant() {
    let devices = fleet();
    let (device, tier) = select_device(&devices, "iPhone 14", None).unwrap();
    assert_eq!(device.udid, IPHONE_14_UDID);
    assert_eq!(tier, MatchTier::Exact);
}

#[test]
fn partial_name_uses_word_boundary_tier() {
    let devices = fleet();
    let (device, tier) = select_device(&devices, "14 Pro", Some("16.4")).unwrap();
    assert_eq!(device.udid, IPHONE_14_PRO_UDID);
    assert_eq!(tier, MatchTier::WordBoundary);
}

#[test]
fn fragment_falls_through_to_substring_tier() {
    let devices = fleet();
    let (device, tier) = select_device(&devices, "11-inch", None).unwrap();
    assert_eq!(device.udid, IPAD_UDID);
    assert_eq!(tier, MatchTier::WordBoundary);

    let (device, tier) = select_device(&devices, "Pa", None).unwrap();
    assert_eq!(device.udid, IPAD_UDID);
    assert_eq!(tier, MatchTier::Substring);
}

#[test]
fn udid_bypasses_name_tiers() {
    let devices = fleet();
    let (device, tier) = select_device(&devices, &IPHONE_15_UDID.to_lowercase(), Some("16.4")).unwrap();
    assert_eq!(device.udid, IPHONE_15_UDID);
    assert_eq!(tier, MatchTier::Udid);
}

#[test]
fn unavailable_devices_are_never_selected() {
    let devices = fleet();
    assert!(select_device(&devices, "iPhone 13", None).is_none());
    assert!(select_device(&devices, RETIRED_UDID, None).is_none());
}

#[test]
fn version_filter_excludes_other_runtimes() {
    let devices = fleet();
    assert!(select_device(&devices, "iPhone 15", Some("16.4")).is_none());
    assert_eq!(
        select_device(&devices, "iPhone 15", Some("17.0")).unwrap().0.udid,
        IPHONE_15_UDID
    );
}

#[tokio::test]
async fn create_binds_resolver_selected_udid() {
    let (_backend, registry) = registry();

    let session = registry.create(options("14 Pro", Some("16.4"))).await.unwrap();
    assert_eq!(session.udid, IPHONE_14_PRO_UDID);
    assert_eq!(session.device_name, "14 Pro");
    assert_eq!(session.platform_version.as_deref(), Some("16.4"));

    let fetched = registry.get(&session.id).await.unwrap();
    assert_eq!(fetched.udid, IPHONE_14_PRO_UDID);
}

#[tokio::test]
async fn create_surfaces_enumeration_failure() {
    let (backend, registry) = registry();
    backend.fail(MockAction::ListDevices);

    let err = registry.create(options("iPhone 14", None)).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Resolve(ResolveError::Enumeration(_))
    ));
}

#[tokio::test]
async fn not_found_carries_catalog() {
    let (_backend, registry) = registry();

    let err = registry.create(options("Apple Watch", None)).await.unwrap_err();
    match err {
        RegistryError::Resolve(e @ ResolveError::NotFound { .. }) => {
            assert_eq!(e.devices().len(), fleet().len());
            assert_eq!(e.to_string(), "No available simulator matches 'Apple Watch'");
        }
        other => panic!("Expected NotFound, got: {:?}", other),
    }
}
