//! Registry Module Tests
//!
//! Validates the node registry against its contract.
//!
//! ## Test Scopes
//! - **Uniqueness**: duplicate addresses are rejected per role, never upserted.
//! - **Listing & Sampling**: limits are honored and sampling tolerates small registries.
//! - **Reset**: `clear_all` empties both roles.
//! - **Wire format**: node lists decode from addresses or full node records.

#[cfg(test)]
mod tests {
    use crate::error::NodeError;
    use crate::registry::protocol::{decode_node_list, NodeListEntry};
    use crate::registry::store::NodeRegistry;
    use crate::registry::types::{Node, NodeRole, UNREACHABLE_PING};
    use std::collections::HashSet;

    fn addresses(nodes: &[Node]) -> HashSet<String> {
        nodes.iter().map(|n| n.address.clone()).collect()
    }

    // ============================================================
    // INSERT & UNIQUENESS
    // ============================================================

    #[test]
    fn test_add_and_list_storage_nodes() {
        let registry = NodeRegistry::open_in_memory().unwrap();

        registry.add_storage_node(&Node::new("http://a:9123", 12)).unwrap();
        registry.add_storage_node(&Node::new("http://b:9123", 40)).unwrap();

        let nodes = registry.list_storage_nodes(None).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            addresses(&nodes),
            HashSet::from(["http://a:9123".to_string(), "http://b:9123".to_string()])
        );
    }

    #[test]
    fn test_duplicate_address_is_conflict() {
        let registry = NodeRegistry::open_in_memory().unwrap();

        registry.add_coordinator_node(&Node::new("c1", 5)).unwrap();
        let result = registry.add_coordinator_node(&Node::new("c1", 99));

        assert!(matches!(result, Err(NodeError::Conflict(_))));

        // The original row is untouched
        let nodes = registry.list_coordinator_nodes().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].ping, 5);
    }

    #[test]
    fn test_roles_are_separate_collections() {
        let registry = NodeRegistry::open_in_memory().unwrap();

        // Same address may exist once per role
        registry.add_storage_node(&Node::new("shared", 1)).unwrap();
        registry.add_coordinator_node(&Node::new("shared", 1)).unwrap();

        assert_eq!(registry.count(NodeRole::Storage).unwrap(), 1);
        assert_eq!(registry.count(NodeRole::Coordinator).unwrap(), 1);
    }

    // ============================================================
    // LISTING & SAMPLING
    // ============================================================

    #[test]
    fn test_list_storage_nodes_honors_limit() {
        let registry = NodeRegistry::open_in_memory().unwrap();
        for i in 0..5 {
            registry
                .add_storage_node(&Node::new(format!("node-{}", i), i))
                .unwrap();
        }

        assert_eq!(registry.list_storage_nodes(Some(3)).unwrap().len(), 3);
        assert_eq!(registry.list_storage_nodes(Some(10)).unwrap().len(), 5);
        assert_eq!(registry.list_storage_nodes(None).unwrap().len(), 5);
    }

    #[test]
    fn test_random_coordinators_tolerates_oversized_request() {
        let registry = NodeRegistry::open_in_memory().unwrap();
        registry.add_coordinator_node(&Node::new("c1", 1)).unwrap();
        registry.add_coordinator_node(&Node::new("c2", 1)).unwrap();

        let sample = registry.random_coordinator_nodes(3).unwrap();

        assert_eq!(sample.len(), 2);
        assert_eq!(
            addresses(&sample),
            HashSet::from(["c1".to_string(), "c2".to_string()])
        );
    }

    #[test]
    fn test_random_coordinators_never_repeats_a_node() {
        let registry = NodeRegistry::open_in_memory().unwrap();
        for i in 0..10 {
            registry
                .add_coordinator_node(&Node::new(format!("c{}", i), 1))
                .unwrap();
        }

        for _ in 0..20 {
            let sample = registry.random_coordinator_nodes(3).unwrap();
            assert_eq!(sample.len(), 3);
            assert_eq!(addresses(&sample).len(), 3, "Sample must not contain duplicates");
        }
    }

    #[test]
    fn test_random_coordinators_on_empty_registry() {
        let registry = NodeRegistry::open_in_memory().unwrap();
        assert!(registry.random_coordinator_nodes(3).unwrap().is_empty());
    }

    // ============================================================
    // UPDATE & CLEAR
    // ============================================================

    #[test]
    fn test_update_ping_refreshes_latency() {
        let registry = NodeRegistry::open_in_memory().unwrap();
        registry.add_storage_node(&Node::new("s1", UNREACHABLE_PING)).unwrap();

        registry.update_ping(NodeRole::Storage, "s1", 42).unwrap();

        let nodes = registry.list_storage_nodes(None).unwrap();
        assert_eq!(nodes[0].ping, 42);
        assert!(nodes[0].is_reachable());
    }

    #[test]
    fn test_update_ping_of_unknown_node_is_not_found() {
        let registry = NodeRegistry::open_in_memory().unwrap();
        let result = registry.update_ping(NodeRole::Coordinator, "ghost", 1);
        assert!(matches!(result, Err(NodeError::NotFound(_))));
    }

    #[test]
    fn test_clear_all_empties_both_roles() {
        let registry = NodeRegistry::open_in_memory().unwrap();
        registry.add_storage_node(&Node::new("s1", 1)).unwrap();
        registry.add_coordinator_node(&Node::new("c1", 1)).unwrap();

        registry.clear_all().unwrap();

        assert!(registry.list_storage_nodes(None).unwrap().is_empty());
        assert!(registry.list_coordinator_nodes().unwrap().is_empty());

        // Cleared addresses can be registered again
        registry.add_storage_node(&Node::new("s1", 1)).unwrap();
    }

    #[test]
    fn test_registry_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("databases").join("coordinator.db");

        {
            let registry = NodeRegistry::open(&path).unwrap();
            registry.add_coordinator_node(&Node::new("c1", 7)).unwrap();
        }

        let registry = NodeRegistry::open(&path).unwrap();
        let nodes = registry.list_coordinator_nodes().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].address, "c1");
        assert_eq!(nodes[0].ping, 7);
    }

    // ============================================================
    // WIRE FORMAT
    // ============================================================

    #[test]
    fn test_decode_node_list_of_addresses() {
        let decoded = decode_node_list(r#"["nodeA", "nodeB", " "]"#).unwrap();
        assert_eq!(decoded, vec!["nodeA".to_string(), "nodeB".to_string()]);
    }

    #[test]
    fn test_decode_node_list_of_records() {
        let nodes = vec![Node::new("nodeA", 10), Node::new("nodeB", 20)];
        let body = serde_json::to_string(&nodes).unwrap();

        let decoded = decode_node_list(&body).unwrap();
        assert_eq!(decoded, vec!["nodeA".to_string(), "nodeB".to_string()]);
    }

    #[test]
    fn test_decode_node_list_rejects_garbage() {
        assert!(decode_node_list("").is_err());
        assert!(decode_node_list("not json").is_err());
        assert!(decode_node_list(r#"{"address": "x"}"#).is_err());
    }

    #[test]
    fn test_node_json_uses_camel_case() {
        let node = Node::new("nodeA", 3);
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["address"], "nodeA");
        assert_eq!(json["ping"], 3);
        assert!(json.get("lastPing").is_some());

        let entry: NodeListEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.address(), "nodeA");
    }
}
