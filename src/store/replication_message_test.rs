use super::*;

#[test]
fn test_envelope_uses_uppercase_type_and_base64_payload() {
    let encoded = CatalogMutation::Renew("abc".to_string()).encode().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

    assert_eq!(value["type"], "RENEW");
    assert_eq!(value["payload"], "YWJj");
}

#[test]
fn test_set_status_and_read_repair_type_names() {
    let set_status = CatalogMutation::SetStatus {
        instance_id: "abc".to_string(),
        status: InstanceStatus::OutOfService,
    }
    .encode()
    .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&set_status).unwrap();
    assert_eq!(value["type"], "SETSTATUS");

    let repair = CatalogMutation::ReadRepair("abc".to_string()).encode().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&repair).unwrap();
    assert_eq!(value["type"], "READREPAIR");
}

#[test]
fn test_register_keeps_registration_time() {
    let mut instance = ServiceInstance::new("orders", Endpoint::new("tcp", "h:1")).with_tags(["a"]);
    instance.id = "0123456789abcdef".to_string();
    instance.registration_time = Some(std::time::SystemTime::now());

    let decoded = CatalogMutation::decode(&CatalogMutation::Register(instance.clone()).encode().unwrap()).unwrap();
    assert_eq!(decoded, CatalogMutation::Register(instance));
}

#[test]
fn test_decode_rejects_unknown_type() {
    let raw = br#"{"type":"EXPLODE","payload":""}"#;
    assert!(CatalogMutation::decode(raw).is_err());
}
