//! Unit tests for the MyApp CRD
//!
//! Covers `MyAppSpec::validate()` and the wire format of spec and status.

mod my_app_spec_validation {
    use crate::crd::{AppPort, MyAppSpec};

    /// Helper to create a minimal valid MyAppSpec
    fn valid_spec() -> MyAppSpec {
        MyAppSpec {
            size: 2,
            image: "nginx:1.25".to_string(),
            ports: vec![AppPort {
                port: 80,
                target_port: 8080,
                node_port: Some(30080),
            }],
        }
    }

    #[test]
    fn test_valid_spec() {
        assert!(valid_spec().validate().is_ok());
    }

    #[test]
    fn test_zero_size_is_valid() {
        let mut spec = valid_spec();
        spec.size = 0;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_negative_size_rejected() {
        let mut spec = valid_spec();
        spec.size = -1;
        assert_eq!(spec.validate().unwrap_err(), "size must be >= 0");
    }

    #[test]
    fn test_empty_image_rejected() {
        let mut spec = valid_spec();
        spec.image = "  ".to_string();
        assert_eq!(spec.validate().unwrap_err(), "image must not be empty");
    }

    #[test]
    fn test_target_port_out_of_range() {
        let mut spec = valid_spec();
        spec.ports[0].target_port = 70000;
        assert_eq!(
            spec.validate().unwrap_err(),
            "ports[0].targetPort must be between 1 and 65535"
        );
    }

    #[test]
    fn test_node_port_out_of_range() {
        let mut spec = valid_spec();
        spec.ports.push(AppPort {
            port: 443,
            target_port: 8443,
            node_port: Some(8080),
        });
        assert_eq!(
            spec.validate().unwrap_err(),
            "ports[1].nodePort must be between 30000 and 32767"
        );
    }

    #[test]
    fn test_node_port_optional() {
        let mut spec = valid_spec();
        spec.ports[0].node_port = None;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_empty_ports_rejected() {
        let mut spec = valid_spec();
        spec.ports.clear();
        assert_eq!(
            spec.validate().unwrap_err(),
            "ports must declare at least one port"
        );
    }

    #[test]
    fn test_effective_port_is_last_declared() {
        let mut spec = valid_spec();
        spec.ports.push(AppPort {
            port: 443,
            target_port: 8443,
            node_port: None,
        });
        assert_eq!(spec.effective_port().map(|p| p.port), Some(443));

        spec.ports.clear();
        assert!(spec.effective_port().is_none());
    }
}

mod my_app_wire_format {
    use crate::crd::{ConditionStatus, MyAppSpec, MyAppStatus};

    #[test]
    fn test_spec_deserializes_from_camel_case_yaml() {
        let yaml = r#"
size: 3
image: "nginx:1.25"
ports:
  - port: 80
    targetPort: 8080
    nodePort: 30080
  - port: 443
    targetPort: 8443
"#;
        let spec: MyAppSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.size, 3);
        assert_eq!(spec.ports.len(), 2);
        assert_eq!(spec.ports[0].target_port, 8080);
        assert_eq!(spec.ports[0].node_port, Some(30080));
        assert_eq!(spec.ports[1].node_port, None);
    }

    #[test]
    fn test_ports_default_to_empty() {
        let spec: MyAppSpec =
            serde_json::from_value(serde_json::json!({"size": 1, "image": "busybox"})).unwrap();
        assert!(spec.ports.is_empty());
    }

    #[test]
    fn test_status_condition_wire_names() {
        let status: MyAppStatus = serde_json::from_value(serde_json::json!({
            "conditions": [{
                "type": "Available",
                "status": "Unknown",
                "reason": "Initializing",
                "message": "",
                "lastTransitionTime": "2024-01-01T00:00:00+00:00"
            }]
        }))
        .unwrap();

        let available = status.condition("Available").unwrap();
        assert_eq!(available.status, ConditionStatus::Unknown);
        assert_eq!(available.reason, "Initializing");

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["conditions"][0]["type"], "Available");
        assert_eq!(
            value["conditions"][0]["lastTransitionTime"],
            "2024-01-01T00:00:00+00:00"
        );
    }
}
