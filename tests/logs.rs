// tests/logs.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::fake_logs::FakeLogFetcher;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::sync::Arc;

use dataflow_verify::logs::{
    ErrorMarkers, LogBook, LogMonitor, LogRequest, LogTarget, LogWindow, PlatformLogAdapter,
};
use dataflow_verify::types::PlatformKind;

fn markers() -> ErrorMarkers {
    ErrorMarkers::from_patterns(&["APPLICATION FAILED TO START", r"Exception in thread \S+"])
        .expect("valid markers")
}

#[test]
fn a_window_only_grows_and_scans_new_text_once() {
    init_tracing();
    let mut window = LogWindow::new("log/0");

    assert_eq!(window.absorb("started\n"), 8);
    assert_eq!(window.scan(&markers()), None);
    assert_eq!(window.read_offset(), window.len());

    assert_eq!(window.absorb("started\nException in thread main\n"), 25);
    let hit = window.scan(&markers()).expect("marker in new text");
    assert_eq!(hit.source_id, "log/0");
    assert_eq!(hit.line, "Exception in thread main");
    assert_eq!(hit.offset, 8);

    // Already reported; the same fetch again adds nothing and finds nothing.
    assert_eq!(window.absorb("started\nException in thread main\n"), 0);
    assert_eq!(window.scan(&markers()), None);
    assert!(window.read_offset() <= window.len());
}

#[test]
fn a_marker_split_across_fetches_is_found() {
    let mut window = LogWindow::new("log/0");
    window.absorb("ok\nAPPLICATION FAILED");
    assert_eq!(window.scan(&markers()), None);

    window.absorb("ok\nAPPLICATION FAILED TO START\n");
    let hit = window.scan(&markers()).expect("marker completed by second fetch");
    assert_eq!(hit.marker, "APPLICATION FAILED TO START");
    assert_eq!(hit.offset, 3);
}

#[test]
fn a_restarted_source_is_appended_not_replaced() {
    let mut window = LogWindow::new("log/0");
    window.absorb("first life\n");
    let before = window.len();

    let added = window.absorb("second life\n");

    assert!(added > "second life\n".len());
    assert!(window.content().starts_with("first life\n"));
    assert!(window.content().ends_with("second life\n"));
    assert!(window.len() > before);
    assert!(window.contains("first life") && window.contains("second life"));
}

#[test]
fn fetches_after_a_restart_extend_the_new_incarnation() {
    let mut window = LogWindow::new("log/0");
    window.absorb("a\n");
    window.absorb("b\n");
    let restarted = window.content().to_string();
    window.scan(&markers());

    assert_eq!(window.absorb("b\nc\n"), 2);
    assert_eq!(window.content(), format!("{restarted}c\n"));
    assert_eq!(window.absorb("b\nc\n"), 0);
    assert_eq!(window.content().matches("log source restarted").count(), 1);

    // Only the text after the scan is new; nothing seen before is reported again.
    window.absorb("b\nc\nAPPLICATION FAILED TO START\n");
    let hit = window.scan(&markers()).expect("marker in the extended incarnation");
    assert_eq!(hit.line, "APPLICATION FAILED TO START");
    assert_eq!(window.scan(&markers()), None);

    // A second restart starts yet another incarnation.
    assert!(window.absorb("d\n") > 2);
    assert_eq!(window.absorb("d\ne\n"), 2);
    assert_eq!(window.content().matches("log source restarted").count(), 2);
    assert!(window.content().ends_with("d\ne\n"));
}

#[test]
fn a_book_keeps_one_window_per_source() {
    let mut book = LogBook::new();
    book.window_mut("a").append("one");
    book.window_mut("b").append("two");
    book.window_mut("a").append(" more");

    assert_eq!(book.len(), 2);
    assert_eq!(book.window("a").map(|w| w.content()), Some("one more"));
    assert_eq!(book.sources().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(book.dump(), 2);

    book.clear();
    assert!(book.is_empty());
}

#[test]
fn each_platform_builds_its_own_request() -> TestResult {
    let target = LogTarget::app("ticktock-log-v1")
        .with_instance("ticktock-log-v1-7d9f")
        .with_address("http://ticktock-log-v1.cfapps.io/");

    let local = PlatformLogAdapter::from_config(&ConfigFileBuilder::new().build());
    assert_eq!(
        local.request(&target)?,
        LogRequest::Http {
            url: "http://ticktock-log-v1.cfapps.io/actuator/logfile".to_string()
        }
    );
    assert!(local.request(&LogTarget::app("nowhere")).is_err());

    let k8s = PlatformLogAdapter::from_config(&ConfigFileBuilder::new().kubernetes("scdf").build());
    assert_eq!(
        k8s.request(&target)?,
        LogRequest::Command {
            program: "kubectl".to_string(),
            args: ["logs", "ticktock-log-v1-7d9f", "-n", "scdf"]
                .map(String::from)
                .to_vec(),
        }
    );

    let cf = PlatformLogAdapter::from_config(
        &ConfigFileBuilder::new()
            .with_platform(PlatformKind::CloudFoundry)
            .build(),
    );
    assert_eq!(
        cf.request(&target)?,
        LogRequest::Command {
            program: "cf".to_string(),
            args: ["logs", "ticktock-log-v1", "--recent"].map(String::from).to_vec(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn the_monitor_reports_markers_once_and_skips_failed_fetches() -> TestResult {
    init_tracing();
    let fetcher = FakeLogFetcher::new();
    fetcher.push_error("sink/0", "connection refused");
    fetcher.push("sink/0", "boot\nAPPLICATION FAILED TO START\n");
    let monitor = LogMonitor::new(Arc::new(fetcher.clone()), markers());
    let targets = [
        LogTarget::app("sink").with_instance("0"),
        LogTarget::app("missing"),
    ];

    assert_eq!(with_timeout(monitor.check(&targets)).await, None);

    let hit = with_timeout(monitor.check(&targets)).await.ok_or("expected a hit")?;
    assert_eq!(hit.source_id, "sink/0");
    assert_eq!(hit.line, "APPLICATION FAILED TO START");

    assert_eq!(with_timeout(monitor.check(&targets)).await, None);
    assert_eq!(monitor.sources(), vec!["sink/0".to_string()]);
    assert!(monitor.contains("sink/0", "boot"));
    assert_eq!(monitor.dump(), 1);

    monitor.clear();
    assert_eq!(monitor.content("sink/0"), None);
    Ok(())
}
