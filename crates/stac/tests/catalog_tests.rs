//! Item generation against COGs in an in-memory store, and publishing
//! against a local stub of the ingestion API.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use stac::{
    write_items, CatalogBuilder, DatasetDefinition, PublisherConfig, StacError, StacPublisher,
};
use storage::ObjectStorage;
use test_utils::{create_test_raster, fixtures::geotiff};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const DEFINITION: &str = r#"
collection: micasa-carbonflux-monthgrid-v1
prefix: MiCASA/
filename_regex: ".*MiCASA_v1.*.tif$"
datetime_group: ".*_(.*).tif$"
datetime_range: month
assets:
  npp:
    title: Net Primary Production
    regex: ".*MiCASA_v1_NPP_.*.tif$"
  rh:
    title: Heterotrophic Respiration
    description: Soil carbon flux
    regex: ".*MiCASA_v1_Rh_.*.tif$"
properties:
  license: CC-BY-4.0
"#;

async fn seeded_storage(keys: &[&str]) -> ObjectStorage {
    let storage = ObjectStorage::in_memory("ghgc-data-store-dev");
    let cog = Bytes::from(geotiff::to_bytes(&create_test_raster(36, 18)));
    for key in keys {
        storage.put(key, cog.clone()).await.unwrap();
    }
    storage
}

#[tokio::test]
async fn test_build_items_from_store() {
    let storage = seeded_storage(&[
        "MiCASA/MiCASA_v1_NPP_monthly_202001.tif",
        "MiCASA/MiCASA_v1_Rh_monthly_202001.tif",
        "MiCASA/MiCASA_v1_NPP_monthly_202002.tif",
        "other/MiCASA_v1_NPP_monthly_202003.tif",
    ])
    .await;

    let definition = DatasetDefinition::from_yaml(DEFINITION).unwrap();
    let builder = CatalogBuilder::new(definition, storage).unwrap();
    let items = builder.build_all().await.unwrap();

    assert_eq!(items.len(), 2);
    let first = &items[0];
    assert_eq!(first.id, "micasa-carbonflux-monthgrid-v1-202001");
    assert_eq!(first.collection, "micasa-carbonflux-monthgrid-v1");
    assert_eq!(first.bbox, [-180.0, -90.0, 180.0, 90.0]);
    assert_eq!(first.properties["start_datetime"], "2020-01-01T00:00:00Z");
    assert_eq!(first.properties["end_datetime"], "2020-01-31T23:59:59Z");
    assert_eq!(first.properties["license"], "CC-BY-4.0");
    assert_eq!(first.assets.len(), 2);

    let rh = &first.assets["rh"];
    assert_eq!(
        rh.href,
        "memory://ghgc-data-store-dev/MiCASA/MiCASA_v1_Rh_monthly_202001.tif"
    );
    assert_eq!(rh.title.as_deref(), Some("Heterotrophic Respiration"));
    assert_eq!(rh.description.as_deref(), Some("Soil carbon flux"));
    assert_eq!(rh.extra["proj:shape"], serde_json::json!([18, 36]));

    assert_eq!(items[1].assets.keys().collect::<Vec<_>>(), vec!["npp"]);
}

#[tokio::test]
async fn test_write_items() {
    let storage = seeded_storage(&["MiCASA/MiCASA_v1_NPP_monthly_202001.tif"]).await;
    let builder =
        CatalogBuilder::new(DatasetDefinition::from_yaml(DEFINITION).unwrap(), storage).unwrap();
    let items = builder.build_all().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = write_items(dir.path().join("items"), &items).await.unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0].ends_with("micasa-carbonflux-monthgrid-v1-202001.json"));

    let text = std::fs::read_to_string(&written[0]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "Feature");
    assert_eq!(value["stac_version"], "1.0.0");
}

// ============================================================================
// Ingestion API stub
// ============================================================================

#[derive(Debug, Clone)]
struct Recorded {
    request_line: String,
    head: String,
    body: String,
}

/// Serve `/token` and `/ingestions` until the test ends. Ingestion of the
/// item whose id contains `reject` answers 422.
async fn spawn_stub(token_status: u16) -> (String, Arc<Mutex<Vec<Recorded>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let log = Arc::new(Mutex::new(Vec::new()));
    let seen = log.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break None;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break Some(pos + 4);
                }
            };
            let Some(header_end) = header_end else {
                continue;
            };

            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let length = head
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            while buf.len() < header_end + length {
                let n = socket.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
            let request_line = head.lines().next().unwrap_or_default().to_string();

            let (status, payload) = if request_line.contains("/token") {
                (token_status, r#"{"AccessToken":"stub-token"}"#.to_string())
            } else if body.contains("reject") {
                (422, r#"{"detail":"invalid item"}"#.to_string())
            } else {
                (201, "{}".to_string())
            };
            seen.lock().unwrap().push(Recorded {
                request_line,
                head,
                body,
            });

            let response = format!(
                "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                payload.len(),
                payload
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (base, log)
}

fn config(base: &str) -> PublisherConfig {
    PublisherConfig {
        token_url: format!("{}/token", base),
        ingest_url: format!("{}/ingestions", base),
        username: "ingest-user".to_string(),
        password: "ingest-pass".to_string(),
    }
}

async fn sample_items(ids: &[&str]) -> Vec<stac::Item> {
    let storage = seeded_storage(&["MiCASA/MiCASA_v1_NPP_monthly_202001.tif"]).await;
    let builder =
        CatalogBuilder::new(DatasetDefinition::from_yaml(DEFINITION).unwrap(), storage).unwrap();
    let template = builder.build_all().await.unwrap().remove(0);
    ids.iter()
        .map(|id| {
            let mut item = template.clone();
            item.id = id.to_string();
            item
        })
        .collect()
}

#[tokio::test]
async fn test_publish_all() {
    let (base, log) = spawn_stub(200).await;
    let publisher = StacPublisher::new(config(&base));
    let items = sample_items(&["a-202001", "b-202001"]).await;

    let outcomes = publisher.publish_all(&items).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].status, 201);
    assert_eq!(outcomes[1].id, "b-202001");

    let log = log.lock().unwrap().clone();
    assert_eq!(log.len(), 3);
    assert!(log[0].request_line.starts_with("POST /token"));
    assert!(log[0].body.contains("username=ingest-user"));
    assert!(log[0].body.contains("password=ingest-pass"));
    assert!(log[1].request_line.starts_with("POST /ingestions"));
    assert!(log[1]
        .head
        .to_ascii_lowercase()
        .contains("authorization: bearer stub-token"));
    assert!(log[1].body.contains("\"a-202001\""));
}

#[tokio::test]
async fn test_publish_rejected_item() {
    let (base, _log) = spawn_stub(200).await;
    let publisher = StacPublisher::new(config(&base));
    let items = sample_items(&["reject-202001"]).await;

    let err = publisher.publish_all(&items).await.unwrap_err();
    match err {
        StacError::Ingest { id, status, body } => {
            assert_eq!(id, "reject-202001");
            assert_eq!(status, 422);
            assert!(body.contains("invalid item"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_token_rejected() {
    let (base, _log) = spawn_stub(401).await;
    let publisher = StacPublisher::new(config(&base));
    assert!(matches!(publisher.token().await, Err(StacError::Auth(_))));
}
