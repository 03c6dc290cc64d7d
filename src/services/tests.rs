use super::ingest::{AlertIngestService, IngestError, IngestOutcome};
use crate::config::{IngestConfig, PolicyKind};
use crate::db::models::{AlertType, Severity};
use crate::db::store::{AlertStore, MemoryAlertStore};
use crate::detection::{AlertPayload, Snapshot};
use crate::messaging::{AlertBroadcaster, AlertNotification, ChannelLayer, ALERTS_GROUP};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

struct BrokenBroadcaster;

#[async_trait]
impl AlertBroadcaster for BrokenBroadcaster {
    async fn broadcast_alert(&self, _notification: &AlertNotification) -> Result<usize> {
        Err(anyhow::anyhow!("channel layer unavailable"))
    }
}

fn service_with(
    policy: PolicyKind,
) -> (AlertIngestService, Arc<MemoryAlertStore>, Arc<ChannelLayer>) {
    let store = Arc::new(MemoryAlertStore::new());
    let layer = Arc::new(ChannelLayer::new());
    let config = IngestConfig {
        policy,
        ..IngestConfig::default()
    };
    let service = AlertIngestService::new(store.clone(), layer.clone(), &config);
    (service, store, layer)
}

fn service_with_media(
    media_dir: &std::path::Path,
) -> (AlertIngestService, Arc<MemoryAlertStore>, Arc<ChannelLayer>) {
    let store = Arc::new(MemoryAlertStore::new());
    let layer = Arc::new(ChannelLayer::new());
    let config = IngestConfig {
        media_dir: media_dir.to_path_buf(),
        ..IngestConfig::default()
    };
    let service = AlertIngestService::new(store.clone(), layer.clone(), &config);
    (service, store, layer)
}

fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_caller_payload_is_stored_and_broadcast() -> Result<()> {
    let (service, store, layer) = service_with(PolicyKind::Caller);
    let mut sub = layer.group_add(ALERTS_GROUP).await;

    let body = br#"{"alert_type":"fighting","message":"m","severity":"high","metrics":{"fighting":0.9}}"#;
    let outcome = service.ingest(body).await?;

    let IngestOutcome::Raised { alert, log, delivered } = outcome else {
        panic!("expected an alert to be raised");
    };
    assert_eq!(alert.alert_type, AlertType::Fighting);
    assert_eq!(alert.severity, Severity::High);
    assert_eq!(alert.message, "m");
    assert_eq!(alert.metrics, json!({"fighting": 0.9}));
    assert_eq!(log.violence_data["fighting"], json!(0.9));
    assert_eq!(log.alert_id, Some(alert.id));
    assert_eq!(log.camera_id, "Camera_1");
    assert!(log.alert_triggered);
    assert_eq!(delivered, 1);

    assert_eq!(store.alert_count().await, 1);
    assert_eq!(store.log_count().await, 1);

    let received: AlertNotification = serde_json::from_str(&sub.receiver.try_recv()?)?;
    assert_eq!(received.alert_type, "fighting");
    assert_eq!(received.severity, "high");
    assert_eq!(received.image_url, None);
    Ok(())
}

#[tokio::test]
async fn test_empty_object_uses_defaults() -> Result<()> {
    let (service, _store, _layer) = service_with(PolicyKind::Caller);

    let IngestOutcome::Raised { alert, .. } = service.ingest(b"{}").await? else {
        panic!("expected an alert to be raised");
    };
    assert_eq!(alert.alert_type, AlertType::SuspiciousBehavior);
    assert_eq!(alert.message, "Unknown alert");
    assert_eq!(alert.severity, Severity::Medium);
    assert_eq!(alert.metrics, json!({}));
    Ok(())
}

#[tokio::test]
async fn test_non_json_body_has_no_side_effects() -> Result<()> {
    let (service, store, layer) = service_with(PolicyKind::Caller);
    let mut sub = layer.group_add(ALERTS_GROUP).await;

    let bodies: [&[u8]; 4] = [b"not json", b"", b"[1,2]", b"\"text\""];
    for body in bodies {
        let err = service.ingest(body).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidPayload(_)), "{:?}", err);
    }

    assert_eq!(store.alert_count().await, 0);
    assert_eq!(store.log_count().await, 0);
    assert!(sub.receiver.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_string_metrics_are_coerced() -> Result<()> {
    let (service, store, _layer) = service_with(PolicyKind::Caller);

    let IngestOutcome::Raised { alert, log, .. } = service
        .ingest(br#"{"metrics":"fighting=0.9","camera_id":"lobby"}"#)
        .await?
    else {
        panic!("expected an alert to be raised");
    };
    assert_eq!(alert.metrics, json!({}));
    assert_eq!(log.violence_data, json!({}));
    assert_eq!(log.camera_id, "lobby");
    assert_eq!(store.alert_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_storage_failure_is_reported_and_not_broadcast() -> Result<()> {
    let (service, store, layer) = service_with(PolicyKind::Caller);
    let mut sub = layer.group_add(ALERTS_GROUP).await;
    store.fail_next_write("connection reset").await;

    let err = service.ingest(b"{}").await.unwrap_err();
    match err {
        IngestError::Storage(detail) => assert!(detail.contains("connection reset")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(store.alert_count().await, 0);
    assert!(sub.receiver.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_broadcast_failure_does_not_fail_ingestion() -> Result<()> {
    let store = Arc::new(MemoryAlertStore::new());
    let service = AlertIngestService::new(
        store.clone(),
        Arc::new(BrokenBroadcaster),
        &IngestConfig::default(),
    );

    let IngestOutcome::Raised { delivered, .. } = service.ingest(b"{}").await? else {
        panic!("expected an alert to be raised");
    };
    assert_eq!(delivered, 0);
    assert_eq!(store.list_alerts(10).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_threshold_policy_skips_quiet_metrics() -> Result<()> {
    let (service, store, _layer) = service_with(PolicyKind::Threshold);

    let outcome = service.ingest(br#"{"metrics":{"fighting":0.2}}"#).await?;
    assert!(matches!(outcome, IngestOutcome::Skipped));
    assert_eq!(store.alert_count().await, 0);

    let IngestOutcome::Raised { alert, .. } =
        service.ingest(br#"{"metrics":{"assault":0.75}}"#).await?
    else {
        panic!("expected an alert to be raised");
    };
    assert_eq!(alert.alert_type, AlertType::Assault);
    Ok(())
}

#[tokio::test]
async fn test_fuzzy_policy_uses_hour_and_rejects_bad_metrics() -> Result<()> {
    let (service, store, _layer) = service_with(PolicyKind::Fuzzy);

    let body = br#"{"metrics":{"anger":1.0}}"#;
    assert!(matches!(service.ingest_at(body, 8.0).await?, IngestOutcome::Skipped));
    assert!(matches!(
        service.ingest_at(body, 23.0).await?,
        IngestOutcome::Raised { .. }
    ));

    let err = service
        .ingest_at(br#"{"metrics":{"anger":"furious"}}"#, 23.0)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::InvalidMetrics(_)));
    assert_eq!(store.alert_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_uploaded_snapshot_is_saved_and_broadcast() -> Result<()> {
    let media = tempfile::tempdir()?;
    let (service, _store, layer) = service_with_media(media.path());
    let mut sub = layer.group_add(ALERTS_GROUP).await;

    let snapshot = Snapshot {
        data: vec![0xff, 0xd8, 0xff, 0xe0],
        content_type: Some("image/jpeg".to_string()),
    };
    let payload = AlertPayload::from_form(
        form(&[("alert_type", "crime"), ("anger_score", "0.9")]),
        Some(snapshot.clone()),
    );

    let IngestOutcome::Raised { alert, .. } = service.ingest_payload(payload).await? else {
        panic!("expected an alert to be raised");
    };
    let url = alert.image.clone().expect("alert should reference the snapshot");
    assert!(url.starts_with("/media/crime_snapshots/snapshot_"));
    assert!(url.ends_with(".jpg"));

    let file_name = url.rsplit('/').next().unwrap_or_default();
    let on_disk = media.path().join("crime_snapshots").join(file_name);
    assert_eq!(std::fs::read(on_disk)?, snapshot.data);

    let received: AlertNotification = serde_json::from_str(&sub.receiver.try_recv()?)?;
    assert_eq!(received.image_url.as_deref(), Some(url.as_str()));
    Ok(())
}

#[tokio::test]
async fn test_snapshot_is_removed_when_storage_fails() -> Result<()> {
    let media = tempfile::tempdir()?;
    let (service, store, _layer) = service_with_media(media.path());
    store.fail_next_write("disk full").await;

    let payload = AlertPayload::from_form(
        form(&[("alert_type", "crime")]),
        Some(Snapshot {
            data: b"jpeg".to_vec(),
            content_type: None,
        }),
    );
    let err = service.ingest_payload(payload).await.unwrap_err();
    assert!(matches!(err, IngestError::Storage(_)));

    let dir = media.path().join("crime_snapshots");
    assert_eq!(std::fs::read_dir(dir)?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_json_image_reference_reaches_subscribers() -> Result<()> {
    let (service, _store, layer) = service_with(PolicyKind::Caller);
    let mut sub = layer.group_add(ALERTS_GROUP).await;

    let body = br#"{"alert_type":"crime","image":"/media/crime_snapshots/earlier.jpg"}"#;
    let IngestOutcome::Raised { alert, .. } = service.ingest(body).await? else {
        panic!("expected an alert to be raised");
    };
    assert_eq!(alert.image.as_deref(), Some("/media/crime_snapshots/earlier.jpg"));

    let received: AlertNotification = serde_json::from_str(&sub.receiver.try_recv()?)?;
    assert_eq!(received.image_url, alert.image);
    Ok(())
}
