use std::time::Duration;

use melodia_blob::{
    byte_stream, BlobConfig, BlobError, BlobGateway, BlobStore, ContentDisposition, MemoryBlobStore, SignParams,
    SignPolicy,
};
use tokio_test::{assert_err, assert_ok};

/// Test factory functions
fn create_gateway() -> (BlobGateway, MemoryBlobStore) {
    let store = MemoryBlobStore::new("melodia");
    (BlobGateway::new(store.clone(), BlobConfig::default()), store)
}

fn audio_params() -> SignParams {
    SignParams::new("audio/mp3", ContentDisposition::Inline, Duration::from_secs(3600))
}

#[tokio::test]
async fn put_then_exists_and_get_round_trip() {
    let (gateway, _) = create_gateway();

    gateway.put("music_audio_1.mp4", byte_stream(b"abc".to_vec()), false).await.unwrap();

    assert!(gateway.exists("music_audio_1.mp4").await.unwrap());
    let bytes = gateway.get_bytes("music_audio_1.mp4").await.unwrap();
    assert_eq!(&bytes[..], b"abc");

    gateway.delete("music_audio_1.mp4").await.unwrap();
    assert!(!gateway.exists("music_audio_1.mp4").await.unwrap());
}

#[tokio::test]
async fn get_missing_key_is_not_found() {
    let (gateway, _) = create_gateway();
    let result = gateway.get("music_audio_404.mp4").await;
    assert!(matches!(result, Err(BlobError::NotFound { ref key }) if key == "music_audio_404.mp4"));
}

#[tokio::test]
async fn unforced_put_keeps_first_content() {
    let (gateway, store) = create_gateway();

    gateway.put("k", byte_stream("A"), false).await.unwrap();
    let second = gateway.put("k", byte_stream("B"), false).await;

    assert!(matches!(second, Err(BlobError::AlreadyExists { .. })));
    assert_eq!(&store.contents("k").unwrap()[..], b"A");
}

#[tokio::test]
async fn forced_put_overwrites() {
    let (gateway, store) = create_gateway();

    gateway.put("k", byte_stream("A"), false).await.unwrap();
    gateway.put("k", byte_stream("B"), true).await.unwrap();

    assert_eq!(&store.contents("k").unwrap()[..], b"B");
}

#[tokio::test]
async fn conditional_writes_still_refuse_existing_key() {
    let store = MemoryBlobStore::new("melodia");
    let gateway = BlobGateway::new(store.clone(), BlobConfig::default().with_conditional_writes());

    gateway.put("k", byte_stream("A"), false).await.unwrap();
    let second = gateway.put("k", byte_stream("B"), false).await;

    assert!(second.unwrap_err().is_already_exists());
    assert_eq!(&store.contents("k").unwrap()[..], b"A");
}

#[tokio::test]
async fn update_requires_existing_key() {
    let (gateway, store) = create_gateway();

    let result = gateway.update("k", byte_stream("A")).await;
    assert!(result.unwrap_err().is_not_found());
    assert!(store.is_empty());

    gateway.put("k", byte_stream("A"), false).await.unwrap();
    gateway.update("k", byte_stream("B")).await.unwrap();
    assert_eq!(&store.contents("k").unwrap()[..], b"B");
}

#[tokio::test]
async fn delete_missing_key_is_not_found() {
    let (gateway, _) = create_gateway();
    assert!(gateway.delete("nope").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_write() {
    let store = MemoryBlobStore::new("melodia");
    let gateway = BlobGateway::new(store.clone(), BlobConfig::default().with_max_blob_bytes(4));

    let result = gateway.put("k", byte_stream("12345"), false).await;
    assert!(matches!(result, Err(BlobError::Invalid { .. })));
    assert!(store.is_empty());
}

#[tokio::test]
async fn safe_and_fast_signing_diverge_on_missing_key() {
    let (gateway, _) = create_gateway();
    let params = audio_params();

    let safe = gateway.sign_url("music_audio_9.mp4", &params, SignPolicy::Safe).await;
    assert!(safe.unwrap_err().is_not_found());

    let fast = gateway.sign_url("music_audio_9.mp4", &params, SignPolicy::Fast).await.unwrap();
    assert!(fast.url.starts_with("memory://melodia/music_audio_9.mp4?"));
    assert!(fast.url.contains("response-content-type=audio/mp3"));
}

#[tokio::test]
async fn safe_signing_falls_back_to_default() {
    let (gateway, _) = create_gateway();
    let params = audio_params();

    let url = gateway.sign_url_or("music_audio_9.mp4", &params, "about:blank").await.unwrap();
    assert_eq!(url, "about:blank");

    gateway.put("music_audio_9.mp4", byte_stream("x"), false).await.unwrap();
    let url = gateway.sign_url_or("music_audio_9.mp4", &params, "about:blank").await.unwrap();
    assert!(url.contains("music_audio_9.mp4"));
}

#[tokio::test]
async fn signed_url_expires_after_ttl() {
    let (gateway, _) = create_gateway();
    let params = SignParams::new("image/jpeg", ContentDisposition::Attachment, Duration::from_secs(120));

    let before = chrono::Utc::now();
    let signed = gateway.sign_url("k", &params, SignPolicy::Fast).await.unwrap();
    let after = chrono::Utc::now();

    assert!(signed.expires_at >= before + chrono::Duration::seconds(120));
    assert!(signed.expires_at <= after + chrono::Duration::seconds(120));
    assert!(signed.url.contains("response-content-disposition=attachment"));
    assert!(!signed.is_expired());
}

#[tokio::test]
async fn bulk_signing_preserves_order_without_store_calls() {
    // Earlier keys sign slower, so workers finish in reverse
    let store = MemoryBlobStore::new("melodia").with_sign_delay(|key| {
        let n: u64 = key.trim_start_matches("key_").parse().unwrap_or(0);
        Duration::from_millis(40u64.saturating_sub(n * 2))
    });
    let gateway = BlobGateway::new(store.clone(), BlobConfig::default().with_signing_workers(8));
    let keys: Vec<String> = (0..20).map(|n| format!("key_{}", n)).collect();

    let results = gateway.sign_urls_bulk(keys.clone(), &audio_params()).await;

    let signed_keys: Vec<String> = results.into_iter().map(|r| r.unwrap().key).collect();
    assert_eq!(signed_keys, keys);
    assert_eq!(store.stats().remote_calls, 0);
}

#[tokio::test]
async fn bulk_signing_respects_worker_width() {
    let store = MemoryBlobStore::new("melodia").with_sign_delay(|_| Duration::from_millis(5));
    let gateway = BlobGateway::new(store.clone(), BlobConfig::default().with_signing_workers(4));
    let keys: Vec<String> = (0..40).map(|n| format!("key_{}", n)).collect();

    let results = gateway.sign_urls_bulk(keys, &audio_params()).await;

    assert_eq!(results.len(), 40);
    assert!(store.stats().peak_signing <= 4);
    assert!(store.stats().peak_signing >= 1);
}

#[tokio::test]
async fn group_signing_pairs_keys_with_content_types() {
    let (gateway, _) = create_gateway();
    let groups = vec![
        vec!["music_audio_1.mp4".to_string(), "music_image_1.jpg".to_string()],
        vec!["music_audio_2.mp4".to_string(), "music_image_2.jpg".to_string()],
    ];

    let results = gateway
        .sign_url_groups_bulk(
            groups,
            &["audio/mp3", "image/jpeg"],
            ContentDisposition::Inline,
            Duration::from_secs(3600),
        )
        .await;

    assert_eq!(results.len(), 2);
    let second = results[1].as_ref().unwrap();
    assert_eq!(second[0].key, "music_audio_2.mp4");
    assert!(second[0].url.contains("response-content-type=audio/mp3"));
    assert_eq!(second[1].key, "music_image_2.jpg");
    assert!(second[1].url.contains("response-content-type=image/jpeg"));
}

#[tokio::test]
async fn misshapen_group_fails_only_its_slot() {
    let (gateway, _) = create_gateway();
    let groups = vec![
        vec!["a".to_string(), "b".to_string()],
        vec!["c".to_string()],
        vec!["d".to_string(), "e".to_string()],
    ];

    let results = gateway
        .sign_url_groups_bulk(groups, &["audio/mp3", "image/jpeg"], ContentDisposition::Inline, Duration::from_secs(60))
        .await;

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(BlobError::Invalid { .. })));
    assert!(results[2].is_ok());
}

#[tokio::test]
async fn invalid_ttl_fails_every_slot() {
    let (gateway, _) = create_gateway();
    let params = SignParams::new("audio/mp3", ContentDisposition::Inline, Duration::ZERO);

    let results = gateway.sign_urls_bulk(vec!["a".to_string(), "b".to_string()], &params).await;
    assert!(results.iter().all(|r| matches!(r, Err(BlobError::Invalid { .. }))));
}

#[tokio::test]
async fn slow_store_times_out() {
    let store = MemoryBlobStore::new("melodia").with_remote_delay(Duration::from_millis(200));
    let config = BlobConfig::default().with_operation_timeout(Duration::from_millis(20));
    let gateway = BlobGateway::new(store, config);

    let result = gateway.exists("k").await;
    assert!(matches!(result, Err(BlobError::Timeout { operation: "head", .. })));
}

#[tokio::test]
async fn list_returns_keys_under_prefix() {
    let (gateway, _) = create_gateway();
    for key in ["user_avatar_1.jpg", "music_audio_1.mp4", "user_avatar_2.jpg"] {
        gateway.put(key, byte_stream("x"), false).await.unwrap();
    }

    let avatars: Vec<String> = gateway
        .list(Some("user_avatar_"))
        .await
        .unwrap()
        .into_iter()
        .map(|info| info.key)
        .collect();
    assert_eq!(avatars, vec!["user_avatar_1.jpg", "user_avatar_2.jpg"]);
}

#[tokio::test]
async fn closing_gateway_releases_store_handle() {
    let (gateway, store) = create_gateway();
    gateway.put("k", byte_stream("x"), false).await.unwrap();
    gateway.sign_urls_bulk(vec!["k".to_string()], &audio_params()).await;
    assert_eq!(store.live_handles(), 2);

    gateway.close();

    assert_eq!(store.live_handles(), 1);
    // The objects themselves belong to the bucket, not the handle
    assert_eq!(store.len(), 1);
}

#[test]
fn dropping_gateway_after_failed_put_releases_store_handle() {
    let (gateway, store) = create_gateway();

    tokio_test::block_on(async {
        assert_ok!(gateway.put("k", byte_stream("A"), false).await);
        assert_err!(gateway.put("k", byte_stream("B"), false).await);
    });
    assert_eq!(store.live_handles(), 2);

    drop(gateway);
    assert_eq!(store.live_handles(), 1);
}

#[tokio::test]
async fn update_keeps_stored_content_type() {
    let (gateway, store) = create_gateway();

    gateway
        .put_as("music_image_1.jpg", Some("image/jpeg"), byte_stream("old"), false)
        .await
        .unwrap();
    gateway.update("music_image_1.jpg", byte_stream("new")).await.unwrap();

    let head = store.head("music_image_1.jpg").await.unwrap();
    assert_eq!(head.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(&store.contents("music_image_1.jpg").unwrap()[..], b"new");
}
