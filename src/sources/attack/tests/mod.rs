use super::*;
use crate::config::HttpConfig;
use crate::error::ErrorKind;
use serde_json::json;
use std::io::Write;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bundle() -> Value {
    json!({
        "type": "bundle",
        "id": "bundle--1",
        "objects": [
            {
                "type": "x-mitre-tactic",
                "name": "Execution"
            },
            {
                "type": "attack-pattern",
                "name": "Command and Scripting Interpreter",
                "description": "  Adversaries may abuse interpreters.\n",
                "external_references": [
                    { "source_name": "capec", "external_id": "CAPEC-1" },
                    { "source_name": "mitre-attack", "external_id": "T1059" },
                    { "source_name": "mitre-attack", "external_id": "T9999" }
                ],
                "kill_chain_phases": [
                    { "kill_chain_name": "mitre-attack", "phase_name": "execution" },
                    { "kill_chain_name": "lockheed", "phase_name": "exploitation" },
                    { "kill_chain_name": "mitre-ics-attack", "phase_name": "execution-ics" }
                ],
                "x_mitre_platforms": ["Linux", "Windows"],
                "x_mitre_data_sources": ["Process: Process Creation"],
                "created": "2017-05-31T21:31:00.645Z",
                "modified": "2024-04-15T19:22:45.712Z"
            },
            {
                "type": "attack-pattern",
                "name": "Orphan technique",
                "external_references": [ { "source_name": "capec", "external_id": "CAPEC-2" } ]
            },
            {
                "type": "relationship",
                "relationship_type": "uses"
            }
        ]
    })
}

fn zipped(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in members {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn techniques(records: Vec<NormalizedRecord>) -> Vec<TechniqueRecord> {
    records
        .into_iter()
        .map(|r| match r {
            NormalizedRecord::Technique(t) => t,
            other => panic!("unexpected record {other:?}"),
        })
        .collect()
}

#[test]
fn only_attack_patterns_are_emitted() {
    let records = techniques(normalize_bundle(&bundle(), Framework::Enterprise));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "Command and Scripting Interpreter");
    assert_eq!(records[1].name, "Orphan technique");
}

#[test]
fn technique_fields_are_extracted() {
    let records = techniques(normalize_bundle(&bundle(), Framework::Enterprise));
    let t = &records[0];

    assert_eq!(t.source, "MITRE");
    assert_eq!(t.framework, Framework::Enterprise);
    assert_eq!(t.technique_id, "T1059", "first matching reference wins");
    assert_eq!(t.description, "Adversaries may abuse interpreters.");
    assert_eq!(t.platforms, ["Linux", "Windows"]);
    assert_eq!(t.data_sources, ["Process: Process Creation"]);
    assert_eq!(t.created_date, "2017-05-31T21:31:00.645Z");
    assert_eq!(t.modified_date, "2024-04-15T19:22:45.712Z");
}

#[test]
fn tactics_exclude_foreign_kill_chains() {
    let records = techniques(normalize_bundle(&bundle(), Framework::Enterprise));
    assert_eq!(records[0].tactics, ["execution", "execution-ics"]);
    assert!(!records[0].tactics.contains(&"exploitation".to_string()));
}

#[test]
fn missing_attack_reference_gives_empty_id() {
    let records = techniques(normalize_bundle(&bundle(), Framework::Ics));
    let orphan = &records[1];
    assert_eq!(orphan.technique_id, "");
    assert!(orphan.tactics.is_empty());
    assert!(orphan.platforms.is_empty());
    assert_eq!(orphan.description, "");
    assert_eq!(orphan.framework, Framework::Ics);
}

#[test]
fn ics_references_are_recognized() {
    let object = json!({
        "type": "attack-pattern",
        "name": "Modify Parameter",
        "external_references": [ { "source_name": "mitre-ics-attack", "external_id": "T0836" } ]
    });
    let t = normalize_technique(&object, Framework::Ics).unwrap();
    assert_eq!(t.technique_id, "T0836");
}

#[test]
fn wrongly_typed_fields_keep_the_technique() {
    let object = json!({
        "type": "attack-pattern",
        "name": 1059,
        "description": null,
        "external_references": [
            "T0000",
            { "source_name": "mitre-attack", "external_id": "T1059" }
        ],
        "kill_chain_phases": { "kill_chain_name": "mitre-attack" },
        "x_mitre_platforms": ["Linux", 7, "Windows"],
        "x_mitre_data_sources": "Process",
        "created": false
    });
    let t = normalize_technique(&object, Framework::Enterprise).unwrap();

    assert_eq!(t.technique_id, "T1059");
    assert_eq!(t.name, "");
    assert_eq!(t.description, "");
    assert!(t.tactics.is_empty());
    assert_eq!(t.platforms, ["Linux", "Windows"]);
    assert!(t.data_sources.is_empty());
    assert_eq!(t.created_date, "");
}

#[test]
fn bundle_without_objects_yields_nothing() {
    assert!(normalize_bundle(&json!({ "type": "bundle" }), Framework::Enterprise).is_empty());
}

#[test]
fn zip_payload_is_unwrapped() {
    let bytes = zipped(&[
        ("README.txt", &b"not json"[..]),
        ("enterprise-attack.json", bundle().to_string().as_bytes()),
    ]);
    let decoded = decode_payload(StixPayload::Bytes(bytes), Framework::Enterprise).unwrap();
    assert_eq!(decoded, bundle());
}

#[test]
fn zip_without_json_member_is_a_decode_failure() {
    let bytes = zipped(&[("README.txt", &b"nothing here"[..])]);
    let err = decode_payload(StixPayload::Bytes(bytes), Framework::Enterprise).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    assert!(err.to_string().contains("No JSON file found"), "{err}");
}

#[test]
fn zip_with_invalid_json_member_is_a_decode_failure() {
    let bytes = zipped(&[("bundle.json", &b"{ broken"[..])]);
    let err = decode_payload(StixPayload::Bytes(bytes), Framework::Enterprise).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
}

#[test]
fn plain_json_bytes_are_decoded() {
    let bytes = bundle().to_string().into_bytes();
    let decoded = decode_payload(StixPayload::Bytes(bytes), Framework::Ics).unwrap();
    assert_eq!(decoded["type"], "bundle");
}

#[test]
fn pk_prefixed_non_zip_bytes_are_misrouted_to_zip_reader() {
    // Detection looks at the first two bytes only
    let bytes = b"PK is not how JSON starts".to_vec();
    let err = decode_payload(StixPayload::Bytes(bytes), Framework::Enterprise).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
}

#[test]
fn non_json_bytes_are_a_decode_failure() {
    let err = decode_payload(StixPayload::Bytes(b"<html>".to_vec()), Framework::Enterprise)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
}

#[test]
fn empty_bytes_are_an_empty_result() {
    let err = decode_payload(StixPayload::Bytes(Vec::new()), Framework::Enterprise).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyResult);
}

#[test]
fn parsed_json_passes_through() {
    let decoded = decode_payload(StixPayload::Json(bundle()), Framework::Enterprise).unwrap();
    assert_eq!(decoded, bundle());
}

#[test]
fn non_object_json_is_rejected() {
    let err = decode_payload(StixPayload::Json(json!([1, 2, 3])), Framework::Enterprise)
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedPayload(_)), "{err:?}");
    assert!(err.to_string().contains("array"));

    let err = decode_payload(StixPayload::Json(json!({})), Framework::Enterprise).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
}

#[tokio::test]
async fn collect_downloads_zipped_bundle() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stix-2.1.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(zipped(&[("ics-attack.json", bundle().to_string().as_bytes())])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = AttackAdapter::new(
        Fetcher::new(&HttpConfig::default()).unwrap(),
        format!("{}/stix-2.1.zip", mock_server.uri()),
        Framework::Ics,
    );
    assert_eq!(adapter.id(), SourceId::AttackIcs);

    let records = techniques(adapter.collect().await.unwrap());
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|t| t.framework == Framework::Ics));
}
