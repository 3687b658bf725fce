//! Batch semantics: eligibility, deduplication, and the aggregated
//! notification.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{full_source, harness, harness_with_options, metablock, script};
use tamarin::update::status::{MSG_ERROR_FETCHING_INFO, TITLE_UPDATE_ERRORS};
use tamarin::{CheckTarget, Options};

#[tokio::test]
async fn mixed_batch_counts_updates_and_aggregates_one_notification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/alpha-meta"))
        .respond_with(ResponseTemplate::new(200).set_body_string(metablock("Alpha", "1.0")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/beta-meta"))
        .respond_with(ResponseTemplate::new(200).set_body_string(metablock("Beta", "2.0")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/beta-code"))
        .respond_with(ResponseTemplate::new(200).set_body_string(full_source("Beta", "2.0")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gamma-meta"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let gamma_url = format!("{}/gamma-meta", server.uri());
    let h = harness(vec![
        script(
            1,
            "Alpha",
            "1.0",
            Some(&format!("{}/alpha-meta", server.uri())),
            None,
        ),
        script(
            2,
            "Beta",
            "1.0",
            Some(&format!("{}/beta-meta", server.uri())),
            Some(&format!("{}/beta-code", server.uri())),
        ),
        script(3, "Gamma", "1.0", Some(&gamma_url), None),
    ]);

    assert_eq!(h.updater.check_update(CheckTarget::All).await, 1);

    let calls = h.notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, TITLE_UPDATE_ERRORS);
    let lines: Vec<&str> = calls[0].1.lines().collect();
    assert_eq!(
        lines,
        [
            "Beta updated".to_owned(),
            format!("{MSG_ERROR_FETCHING_INFO}: request error 500, {gamma_url}"),
        ]
    );
    assert_eq!(calls[0].2, vec![2, 3]);

    assert_eq!(h.store.resource_calls.load(Ordering::SeqCst), 1);
    assert!(h.options.snapshot().await.last_update > 0);
}

#[tokio::test]
async fn overlapping_sweep_and_manual_check_share_one_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meta"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(metablock("Slow", "1.0"))
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(vec![script(
        1,
        "Slow",
        "1.0",
        Some(&format!("{}/meta", server.uri())),
        None,
    )]);

    let (sweep, manual) = tokio::join!(
        h.updater.check_update(CheckTarget::All),
        h.updater.check_update(CheckTarget::Ids(vec![1])),
    );
    assert_eq!((sweep, manual), (0, 0));
    assert!(h.options.snapshot().await.last_update > 0);
}

#[tokio::test]
async fn auto_sweep_skips_ineligible_scripts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(metablock("One", "1.0")))
        .expect(1)
        .mount(&server)
        .await;

    let mut no_updates = script(2, "Two", "1.0", Some(&format!("{}/s2", server.uri())), None);
    no_updates.config.should_update = false;
    let mut disabled = script(3, "Three", "1.0", Some(&format!("{}/s3", server.uri())), None);
    disabled.config.enabled = false;

    let h = harness(vec![
        script(1, "One", "1.0", Some(&format!("{}/s1", server.uri())), None),
        no_updates,
        disabled,
    ]);

    assert_eq!(h.updater.check_update(CheckTarget::Auto).await, 0);
    assert!(h.notifier.calls().is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn full_sweep_ignores_eligibility_gates() {
    let server = MockServer::start().await;
    for (route, name) in [("/s1", "One"), ("/s2", "Two"), ("/s3", "Three")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(metablock(name, "1.0")))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut no_updates = script(2, "Two", "1.0", Some(&format!("{}/s2", server.uri())), None);
    no_updates.config.should_update = false;
    let mut disabled = script(3, "Three", "1.0", Some(&format!("{}/s3", server.uri())), None);
    disabled.config.enabled = false;

    let h = harness(vec![
        script(1, "One", "1.0", Some(&format!("{}/s1", server.uri())), None),
        no_updates,
        disabled,
    ]);

    assert_eq!(h.updater.check_update(CheckTarget::All).await, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn disabled_auto_update_makes_sweeps_a_noop() {
    let options = Options {
        auto_update: 0,
        ..Options::default()
    };
    let h = harness_with_options(
        vec![script(1, "Idle", "1.0", Some("https://host/meta"), None)],
        options,
    );

    assert_eq!(h.updater.check_update(CheckTarget::Auto).await, 0);
    assert_eq!(h.store.scripts_calls.load(Ordering::SeqCst), 0);
}
