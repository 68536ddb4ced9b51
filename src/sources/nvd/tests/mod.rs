use super::*;
use crate::config::HttpConfig;
use crate::error::ErrorKind;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;
use std::io::Write;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn v2_only_item() -> Value {
    json!({
        "cve": {
            "CVE_data_meta": { "ID": "CVE-2024-0001" },
            "description": {
                "description_data": [
                    { "lang": "fr", "value": "Une vulnérabilité" },
                    { "lang": "en", "value": "A vulnerability" }
                ]
            },
            "references": {
                "reference_data": [
                    { "url": "https://example.com/advisory", "name": "advisory" },
                    { "name": "no url here" }
                ]
            }
        },
        "impact": {
            "baseMetricV2": {
                "cvssV2": {
                    "baseScore": 5.0,
                    "vectorString": "AV:N/AC:L/Au:N/C:N/I:N/A:P"
                },
                "severity": "MEDIUM"
            }
        },
        "publishedDate": "2024-01-01T10:15Z",
        "lastModifiedDate": "2024-01-02T08:00Z"
    })
}

fn both_versions_item() -> Value {
    json!({
        "cve": { "CVE_data_meta": { "ID": "CVE-2024-0002" } },
        "impact": {
            "baseMetricV3": {
                "cvssV3": {
                    "baseScore": 7.5,
                    "baseSeverity": "HIGH",
                    "vectorString": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:N/I:N/A:H"
                }
            },
            "baseMetricV2": {
                "cvssV2": { "baseScore": 9.3, "vectorString": "AV:N/AC:M/Au:N/C:C/I:C/A:C" }
            }
        }
    })
}

#[test]
fn v2_only_item_with_mixed_languages_and_null_reference() {
    let record = normalize_item(&v2_only_item()).unwrap();

    assert_eq!(record.source, "NVD");
    assert_eq!(record.cve_id, "CVE-2024-0001");
    assert_eq!(record.description, "A vulnerability");
    assert_eq!(
        record.references,
        vec![Some("https://example.com/advisory".to_string()), None]
    );
    assert_eq!(record.published_date, "2024-01-01T10:15Z");
    assert_eq!(record.last_modified_date, "2024-01-02T08:00Z");

    let cvss = record.cvss.unwrap();
    assert_eq!(cvss.version, "2.0");
    assert_eq!(cvss.base_score, 5.0);
    assert_eq!(cvss.severity, "MEDIUM", "falls back to the metric-level severity");
}

#[test]
fn v3_wins_over_higher_v2() {
    let record = normalize_item(&both_versions_item()).unwrap();
    let cvss = record.cvss.unwrap();
    assert_eq!(cvss.version, "3.x");
    assert_eq!(cvss.base_score, 7.5);
    assert_eq!(cvss.severity, "HIGH");
    assert!(cvss.vector_string.starts_with("CVSS:3.1/"));
}

#[test]
fn v3_block_without_score_falls_back_to_v2() {
    let item = json!({
        "impact": {
            "baseMetricV3": { "cvssV3": { "baseScore": null, "baseSeverity": "HIGH" } },
            "baseMetricV2": { "cvssV2": { "baseScore": 4.3 } }
        }
    });
    let cvss = normalize_item(&item).unwrap().cvss.unwrap();
    assert_eq!(cvss.version, "2.0");
    assert_eq!(cvss.base_score, 4.3);
}

#[test]
fn item_without_scores_has_no_cvss() {
    let record = normalize_item(&json!({ "cve": {} })).unwrap();
    assert_eq!(record.cvss, None);

    let line = serde_json::to_value(NormalizedRecord::Vulnerability(record)).unwrap();
    assert_eq!(line["cvss"], json!({}));
}

#[test]
fn description_is_empty_without_english_entry() {
    let item = json!({
        "cve": {
            "description": {
                "description_data": [ { "lang": "es", "value": "Una vulnerabilidad" } ]
            }
        }
    });
    let record = normalize_item(&item).unwrap();
    assert_eq!(record.description, "");
}

#[test]
fn first_english_description_wins() {
    let item = json!({
        "cve": {
            "description": {
                "description_data": [
                    { "lang": "en", "value": "first" },
                    { "lang": "en", "value": "second" }
                ]
            }
        }
    });
    assert_eq!(normalize_item(&item).unwrap().description, "first");
}

#[test]
fn missing_fields_degrade_to_empty_values() {
    let record = normalize_item(&json!({})).unwrap();
    assert_eq!(record.cve_id, "");
    assert_eq!(record.published_date, "");
    assert_eq!(record.last_modified_date, "");
    assert_eq!(record.description, "");
    assert!(record.references.is_empty());
}

#[test]
fn null_nested_objects_are_tolerated() {
    let item = json!({
        "cve": { "CVE_data_meta": null, "description": null, "references": null },
        "impact": null
    });
    let record = normalize_item(&item).unwrap();
    assert_eq!(record.cve_id, "");
    assert_eq!(record.cvss, None);
}

#[test]
fn wrongly_typed_fields_keep_the_record() {
    let item = json!({
        "cve": {
            "CVE_data_meta": { "ID": "CVE-2024-0009" },
            "description": { "description_data": [ { "lang": "en", "value": 5 } ] },
            "references": { "reference_data": [ { "url": 1 }, { "url": "https://a.example" } ] }
        },
        "impact": {
            "baseMetricV3": "unavailable",
            "baseMetricV2": { "cvssV2": { "baseScore": 4.3, "vectorString": false }, "severity": "MEDIUM" }
        },
        "publishedDate": { "when": "today" }
    });
    let record = normalize_item(&item).unwrap();

    assert_eq!(record.cve_id, "CVE-2024-0009");
    assert_eq!(record.description, "");
    assert_eq!(record.published_date, "");
    assert_eq!(
        record.references,
        [None, Some("https://a.example".to_string())]
    );
    let cvss = record.cvss.unwrap();
    assert_eq!(cvss.base_score, 4.3);
    assert_eq!(cvss.severity, "MEDIUM");
    assert_eq!(cvss.vector_string, "");

    let document = json!({ "CVE_Items": [ item, v2_only_item() ] });
    assert_eq!(normalize_feed(&document).len(), 2);
}

#[test]
fn non_object_item_is_skipped() {
    assert!(normalize_item(&json!("not an item")).is_none());

    let document = json!({ "CVE_Items": [ 42, v2_only_item() ] });
    assert_eq!(normalize_feed(&document).len(), 1);
}

#[test]
fn feed_order_is_preserved() {
    let document = json!({ "CVE_Items": [ v2_only_item(), both_versions_item() ] });
    let ids: Vec<_> = normalize_feed(&document)
        .into_iter()
        .map(|r| match r {
            NormalizedRecord::Vulnerability(v) => v.cve_id,
            other => panic!("unexpected record {other:?}"),
        })
        .collect();
    assert_eq!(ids, ["CVE-2024-0001", "CVE-2024-0002"]);
}

#[test]
fn absent_or_empty_document_yields_nothing() {
    assert!(normalize_feed(&json!({})).is_empty());
    assert!(normalize_feed(&json!({ "CVE_Items": [] })).is_empty());
    assert!(normalize_feed(&Value::Null).is_empty());
}

#[tokio::test]
async fn collect_fetches_gzip_feed() {
    let mock_server = MockServer::start().await;
    let body = json!({ "CVE_Items": [ v2_only_item() ] }).to_string();
    Mock::given(method("GET"))
        .and(path("/nvdcve-1.1-recent.json.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(body.as_bytes())))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = NvdAdapter::new(
        Fetcher::new(&HttpConfig::default()).unwrap(),
        format!("{}/nvdcve-1.1-recent.json.gz", mock_server.uri()),
    );
    assert_eq!(adapter.id(), SourceId::Nvd);

    let records = adapter.collect().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].type_tag(), "CVE");
}

#[tokio::test]
async fn collect_reports_empty_feed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(b"{\"CVE_Items\": []}")))
        .mount(&mock_server)
        .await;

    let adapter = NvdAdapter::new(Fetcher::new(&HttpConfig::default()).unwrap(), mock_server.uri());
    let err = adapter.collect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyResult);
}

#[tokio::test]
async fn collect_reports_uncompressed_body_as_decode_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"CVE_Items\": []}"))
        .mount(&mock_server)
        .await;

    let adapter = NvdAdapter::new(Fetcher::new(&HttpConfig::default()).unwrap(), mock_server.uri());
    let err = adapter.collect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    assert_eq!(err.error_code(), "decompress_error");
}
