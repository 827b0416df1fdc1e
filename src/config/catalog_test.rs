use super::CatalogConfig;
use crate::Error;

#[test]
fn test_default_config() {
    let config = CatalogConfig::default();
    assert_eq!(config.default_ttl_ms, 30_000);
    assert_eq!(config.minimum_ttl_ms, 5_000);
    assert_eq!(config.maximum_ttl_ms, 600_000);
    assert_eq!(config.namespace_capacity, 50);
    assert_eq!(config.capacity(), Some(50));
    assert!(config.validate().is_ok());
}

#[test]
fn test_unlimited_capacity() {
    let config = CatalogConfig {
        namespace_capacity: -1,
        ..Default::default()
    };
    assert!(config.validate().is_ok());
    assert_eq!(config.capacity(), None);
}

#[test]
fn test_capacity_below_minus_one_is_rejected() {
    let config = CatalogConfig {
        namespace_capacity: -2,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn test_minimum_above_maximum_is_rejected() {
    let config = CatalogConfig {
        minimum_ttl_ms: 10_000,
        default_ttl_ms: 10_000,
        maximum_ttl_ms: 5_000,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn test_default_outside_bounds_is_rejected() {
    let below = CatalogConfig {
        default_ttl_ms: 1_000,
        ..Default::default()
    };
    assert!(below.validate().is_err());

    let above = CatalogConfig {
        default_ttl_ms: 700_000,
        ..Default::default()
    };
    assert!(above.validate().is_err());
}

#[test]
fn test_equal_bounds_are_accepted() {
    let config = CatalogConfig {
        default_ttl_ms: 1_000,
        minimum_ttl_ms: 1_000,
        maximum_ttl_ms: 1_000,
        ..Default::default()
    };
    assert!(config.validate().is_ok());
}
