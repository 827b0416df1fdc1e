use super::*;

#[test]
fn test_custom_registry() {
    let registry = Registry::new_custom(Some("registry".to_string()), None).unwrap();
    let metrics = StoreMetrics::detached();
    metrics.register(&registry).unwrap();

    metrics.instances.inc();
    metrics.expirations.inc();

    let families = registry.gather();
    let names: Vec<_> = families.iter().map(|m| m.get_name()).collect();
    assert!(
        names.contains(&"registry_store_instances_count"),
        "Missing registry_store_instances_count"
    );
    assert!(names.contains(&"registry_store_instances_expiration"));
}

#[test]
fn test_detached_handles_are_independent() {
    let a = StoreMetrics::detached();
    let b = StoreMetrics::detached();

    a.instances.add(3);
    assert_eq!(a.instances.get(), 3);
    assert_eq!(b.instances.get(), 0);
}

#[test]
fn test_gather_text_renders_registered_collectors() {
    let registry = Registry::new();
    let metrics = StoreMetrics::detached();
    metrics.register(&registry).unwrap();
    metrics.tags_instances.set(2);

    let text = gather_text(&registry);
    assert!(text.contains("store_tags_instances 2"));
}

#[test]
fn test_global_handle_is_shared() {
    let a = StoreMetrics::global();
    let b = StoreMetrics::global();
    assert!(Arc::ptr_eq(&a, &b));
}
