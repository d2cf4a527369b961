//! Structured (`.jpcb`) documents.

use crate::scene::Scene;

pub fn encode(scene: &Scene) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec_pretty(scene)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn to_string(scene: &Scene) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(scene)
}

/// Counters are not part of the document; the result has `last_ids: None`.
pub fn decode(bytes: &[u8]) -> Result<Scene, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Side;

    #[test]
    fn test_decode_minimal_document() {
        let doc = br#"{
            "components": [],
            "nodes": [{"id": 3, "position": {"x": 1.5, "y": 2}}],
            "links": [],
            "image_layers": [],
            "notes": []
        }"#;

        let scene = decode(doc).unwrap();
        assert_eq!(scene.nodes.len(), 1);
        assert_eq!(scene.nodes[0].side, Side::Point);
        assert_eq!(scene.nodes[0].position.y, 2.0);
        assert!(scene.config.is_none());
        assert!(scene.last_ids.is_none());
    }

    #[test]
    fn test_link_defaults() {
        let doc = br#"{"links": [{"id": 1, "from_node_id": 1, "to_node_id": 2, "side": "WIP"}]}"#;
        let scene = decode(doc).unwrap();
        assert_eq!(scene.links[0].graph_id, -1);
        assert_eq!(scene.links[0].width, None);
        assert_eq!(scene.links[0].side, Side::WorkInProgress);
    }

    #[test]
    fn test_rejects_unknown_side_and_garbage() {
        let doc = br#"{"links": [{"id": 1, "from_node_id": 1, "to_node_id": 2, "side": "TOP"}]}"#;
        assert!(decode(doc).is_err());
        assert!(decode(b"not json").is_err());
        assert!(decode(br#"{"nodes": [{"id": "one"}]}"#).is_err());
    }

    #[test]
    fn test_encode_ends_with_newline() {
        let bytes = encode(&Scene::default()).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        let text = to_string(&Scene::default()).unwrap();
        assert!(text.contains("\"components\": []"));
    }
}
