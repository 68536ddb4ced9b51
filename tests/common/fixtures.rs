//! Upstream payload fixtures

use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};
use std::io::{Cursor, Write};

/// Gzip-compress `bytes`
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// ZIP archive holding a single member
pub fn zip_single(name: &str, content: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(name, zip::write::FileOptions::default())
        .unwrap();
    writer.write_all(content).unwrap();
    writer.finish().unwrap().into_inner()
}

/// NVD item with only a v2 score, English and French descriptions, and one
/// reference without a URL
pub fn nvd_v2_only_feed() -> Value {
    json!({
        "CVE_data_type": "CVE",
        "CVE_Items": [{
            "cve": {
                "CVE_data_meta": { "ID": "CVE-2024-1111" },
                "description": {
                    "description_data": [
                        { "lang": "fr", "value": "Débordement de tampon" },
                        { "lang": "en", "value": "Buffer overflow in parser" }
                    ]
                },
                "references": {
                    "reference_data": [
                        { "url": "https://vendor.example/advisory/1" },
                        { "name": "mailing list post" }
                    ]
                }
            },
            "impact": {
                "baseMetricV2": {
                    "cvssV2": {
                        "version": "2.0",
                        "vectorString": "AV:N/AC:L/Au:N/C:P/I:P/A:P",
                        "baseScore": 7.5
                    },
                    "severity": "HIGH"
                }
            },
            "publishedDate": "2024-05-01T15:15Z",
            "lastModifiedDate": "2024-05-02T09:00Z"
        }]
    })
}

/// STIX bundle with one technique for `namespace`
pub fn stix_bundle(namespace: &str, technique_id: &str) -> Value {
    json!({
        "type": "bundle",
        "id": "bundle--0001",
        "objects": [
            {
                "type": "attack-pattern",
                "name": "Example technique",
                "description": "Example description",
                "external_references": [
                    { "source_name": namespace, "external_id": technique_id }
                ],
                "kill_chain_phases": [
                    { "kill_chain_name": namespace, "phase_name": "initial-access" }
                ],
                "x_mitre_platforms": ["Windows"],
                "created": "2020-01-01T00:00:00.000Z",
                "modified": "2024-01-01T00:00:00.000Z"
            },
            { "type": "course-of-action", "name": "Mitigation" }
        ]
    })
}

/// RSS 2.0 document with `count` dated items
pub fn rss_feed(count: usize) -> String {
    let items: String = (1..=count)
        .map(|i| {
            format!(
                "<item><title>Advisory {i}</title><link>https://cisa.example/{i}</link>\
                 <pubDate>Wed, 01 May 2024 1{i}:00:00 GMT</pubDate>\
                 <description>  Summary {i}  </description></item>"
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>CISA</title><link>https://cisa.example</link>
<description>Advisories</description>{items}</channel></rss>"#
    )
}

/// MSRC vulnerability item
pub fn msrc_item(cve: &str) -> Value {
    json!({
        "cveNumber": cve,
        "releaseDate": "2024-05-14T07:00:00Z",
        "vulnerabilityName": format!("Windows flaw {cve}"),
        "description": { "value": "Remote code execution." },
        "cvssScoreSets": [
            { "baseScore": 8.8, "severity": "Important", "vector": "CVSS:3.1/AV:N/AC:L/PR:L/UI:N/S:U/C:H/I:H/A:H" }
        ],
        "affectedProducts": [ { "productFamily": "Windows", "productName": "Windows Server 2022" } ],
        "exploited": "No",
        "publiclyDisclosed": "No"
    })
}
