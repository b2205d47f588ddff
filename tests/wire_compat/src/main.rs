fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use bytes::BytesMut;
    use projection_protocol::{LineCodec, Message, MessageType, Payload};
    use serde::Deserialize;
    use tokio_util::codec::Decoder;

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_text(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_text(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Normalizes numbers so that `1` and `1.0` compare equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Decodes a fixture, re-encodes it, and compares the JSON values
    /// (key-order independent, number-normalized).
    fn roundtrip_test(name: &str, expected: MessageType) -> Message {
        let fixture = load_fixture(name);
        let parsed = Message::from_value(&fixture)
            .unwrap_or_else(|e| panic!("failed to decode {name}: {e}"));
        assert_eq!(parsed.message_type(), expected, "{name}");

        let encoded = parsed.encode();
        assert!(!encoded.contains('\n'), "{name} encoded with a raw newline");
        let reencoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reencoded),
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  encoded: {reencoded}"
        );
        parsed
    }

    #[test]
    fn fixture_hello() {
        let msg = roundtrip_test("hello.json", MessageType::Hello);
        match msg.payload {
            Payload::Hello(h) => {
                assert_eq!(h.version, "0.1");
                assert_eq!(h.role, "renderer");
                assert_eq!(h.name, "stage-left");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn fixture_ack() {
        let msg = roundtrip_test("ack.json", MessageType::Ack);
        assert_eq!(msg.replied_command_id(), Some(msg.command_id.as_str()));
    }

    #[test]
    fn fixture_error() {
        let msg = roundtrip_test("error.json", MessageType::Error);
        assert!(matches!(
            msg.payload,
            Payload::Error(ref e) if e.message == "Renderer name already in use"
        ));
    }

    #[test]
    fn fixture_load_scene() {
        roundtrip_test("load_scene.json", MessageType::LoadScene);
    }

    #[test]
    fn fixture_load_scene_definition() {
        let msg = roundtrip_test("load_scene_definition.json", MessageType::LoadSceneDefinition);
        let Payload::LoadSceneDefinition(def) = msg.payload else {
            panic!("unexpected payload");
        };
        assert_eq!(def.scene.surfaces.len(), 2);
        assert_eq!(def.scene.surfaces[1].z_order, 3);
        assert_eq!(def.scene.surfaces[1].opacity(), 0.25);
        assert!(def.scene.is_consistent(&def.feeds));

        let video = def.feeds[0].video_file_config().unwrap().unwrap();
        assert_eq!(video.file_path, "/media/logo.mp4");
        assert!(def.feeds[1].video_file_config().unwrap().is_none());
    }

    #[test]
    fn fixture_set_feed_for_surface() {
        roundtrip_test("set_feed_for_surface.json", MessageType::SetFeedForSurface);
    }

    #[test]
    fn fixture_play_cue() {
        roundtrip_test("play_cue.json", MessageType::PlayCue);
    }

    #[test]
    fn nested_config_json_is_stringified() {
        let mut fixture = load_fixture("load_scene_definition.json");
        fixture["payload"]["feeds"][0]["configJson"] =
            serde_json::json!({ "filePath": "/media/logo.mp4" });

        let msg = Message::from_value(&fixture).unwrap();
        let Payload::LoadSceneDefinition(def) = msg.payload else {
            panic!("unexpected payload");
        };
        assert_eq!(def.feeds[0].config_json, r#"{"filePath":"/media/logo.mp4"}"#);
    }

    #[test]
    fn fixtures_decode_through_the_line_codec() {
        let names = [
            "hello.json",
            "ack.json",
            "error.json",
            "load_scene.json",
            "load_scene_definition.json",
            "set_feed_for_surface.json",
            "play_cue.json",
        ];

        // Pretty-printed fixtures become one compact line each.
        let mut stream = BytesMut::new();
        for name in names {
            stream.extend_from_slice(load_fixture(name).to_string().as_bytes());
            stream.extend_from_slice(b"\r\n\n");
        }

        let mut codec = LineCodec::new();
        let mut decoded = Vec::new();
        while let Some(frame) = codec.decode(&mut stream).unwrap() {
            decoded.push(frame.unwrap());
        }
        assert_eq!(decoded.len(), names.len());
        for (msg, name) in decoded.iter().zip(names) {
            assert_eq!(*msg, Message::from_value(&load_fixture(name)).unwrap());
        }
    }

    #[derive(Debug, Deserialize)]
    struct Rejection {
        name: String,
        line: String,
        /// Expected error text; `null` when only the failure matters.
        error: Option<String>,
    }

    #[test]
    fn rejection_fixtures() {
        let cases: Vec<Rejection> = serde_json::from_str(&load_text("rejections.json")).unwrap();
        assert!(!cases.is_empty());

        for case in cases {
            let err = match Message::decode(&case.line) {
                Ok(msg) => panic!("{}: decoded unexpectedly as {msg:?}", case.name),
                Err(e) => e,
            };
            if let Some(expected) = case.error {
                assert_eq!(err.to_string(), expected, "{}", case.name);
            }
        }
    }
}
