//! Response worker rounds against a mock model server and search engine.

use crate::helpers::{self, Ending, RecordingSink, RecordingStatus, StatusEvent};
use hark::clock::{Clock, ManualClock};
use hark::console::ConsoleInput;
use hark::pipeline::Shared;
use hark::pipeline::capture::CaptureWorker;
use hark::pipeline::messages::WorkItem;
use hark::pipeline::response::{ResponseWorker, RoundOutcome, SkipReason};
use hark::search::WebSearch;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Rig {
    worker: ResponseWorker,
    shared: Shared,
    clock: ManualClock,
    sink: RecordingSink,
}

fn rig(config: &hark::HarkConfig) -> Rig {
    let clock = ManualClock::new();
    let shared = Shared::new(
        Arc::new(hark::status::NoopStatus),
        Arc::new(clock.clone()),
    );
    let sink = RecordingSink::new();
    let input = ConsoleInput::new();
    let worker = ResponseWorker::new(
        config,
        helpers::console_response(config, &input, sink.clone()),
        shared.clone(),
    )
    .unwrap();
    Rig {
        worker,
        shared,
        clock,
        sink,
    }
}

impl Rig {
    fn push(&self, text: &str) {
        let (start, finish) = WorkItem::pair(text, false, false, self.clock.now());
        self.shared.queue.push_pair(start, finish);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_command_inside_debounce_window_is_dropped() {
    let server = MockServer::start().await;
    helpers::mount_llm(&server, &["Lights ", "on."]).await;
    let config = helpers::config(&server);

    tokio::task::spawn_blocking(move || {
        let mut rig = rig(&config);
        let cancel = CancellationToken::new();

        rig.push("turn on the lights");
        assert_eq!(rig.worker.process_next(&cancel), Some(RoundOutcome::Spoken));

        rig.clock.advance(Duration::from_millis(500));
        rig.push("turn on the lights");
        assert_eq!(
            rig.worker.process_next(&cancel),
            Some(RoundOutcome::Skipped(SkipReason::Duplicate))
        );

        rig.clock.advance(Duration::from_secs(3));
        rig.push("turn on the lights");
        assert_eq!(rig.worker.process_next(&cancel), Some(RoundOutcome::Spoken));
        assert_eq!(rig.sink.playbacks().len(), 2);
        assert!(rig.shared.queue.is_empty());
    })
    .await
    .unwrap();

    assert_eq!(helpers::user_turns(&server).await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn filler_is_not_sent_to_the_model() {
    let server = MockServer::start().await;
    helpers::mount_llm(&server, &["Hello."]).await;
    let config = helpers::config(&server);

    tokio::task::spawn_blocking(move || {
        let mut rig = rig(&config);
        let cancel = CancellationToken::new();
        rig.push("um");
        assert_eq!(
            rig.worker.process_next(&cancel),
            Some(RoundOutcome::Skipped(SkipReason::NotMeaningful))
        );
        assert!(rig.shared.queue.is_empty());
    })
    .await
    .unwrap();

    assert!(helpers::user_turns(&server).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn late_finish_is_reconciled_before_next_round() {
    let server = MockServer::start().await;
    helpers::mount_llm(&server, &["Done."]).await;
    let config = helpers::config(&server);

    tokio::task::spawn_blocking(move || {
        let mut rig = rig(&config);
        let cancel = CancellationToken::new();

        let (start, finish) = WorkItem::pair("set a timer", false, false, rig.clock.now());
        rig.shared.queue.push_back(start);
        // FINISH never arrives within the bounded wait.
        assert_eq!(rig.worker.process_next(&cancel), Some(RoundOutcome::Spoken));
        assert!(rig.shared.queue.is_empty());

        rig.shared.queue.push_back(finish);
        rig.clock.advance(Duration::from_secs(5));
        rig.push("what time is it");
        assert_eq!(rig.worker.process_next(&cancel), Some(RoundOutcome::Spoken));

        assert!(rig.shared.queue.is_empty());
        assert_eq!(rig.shared.interrupt.get(), 0);
        assert_eq!(rig.sink.playbacks().len(), 2);
    })
    .await
    .unwrap();

    assert_eq!(
        helpers::user_turns(&server).await,
        vec!["set a timer".to_owned(), "what time is it".to_owned()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_order_item_is_put_back() {
    let server = MockServer::start().await;
    helpers::mount_llm(&server, &["Okay."]).await;
    let config = helpers::config(&server);

    tokio::task::spawn_blocking(move || {
        let mut rig = rig(&config);
        let cancel = CancellationToken::new();

        let (first, first_finish) =
            WorkItem::pair("open the garage", false, false, rig.clock.now());
        rig.shared.queue.push_back(first);
        rig.push("close the blinds");

        // The next item after the first START is the second START.
        assert_eq!(rig.worker.process_next(&cancel), Some(RoundOutcome::Spoken));
        assert_eq!(rig.shared.queue.len(), 2);

        assert_eq!(rig.worker.process_next(&cancel), Some(RoundOutcome::Spoken));
        assert!(rig.shared.queue.is_empty());

        // The stray FINISH turns up last and is settled on the way out.
        rig.shared.queue.push_back(first_finish);
        cancel.cancel();
        assert_eq!(rig.worker.process_next(&cancel), None);
        assert!(rig.shared.queue.is_empty());
        assert_eq!(rig.shared.interrupt.get(), 0);
    })
    .await
    .unwrap();

    assert_eq!(helpers::user_turns(&server).await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn searches_the_web_when_nothing_is_stored() {
    let llm = MockServer::start().await;
    helpers::mount_classifier(&llm, "yes+-+Tokyo weather").await;
    helpers::mount_llm(&llm, &["It is sunny ", "and 21 degrees."]).await;

    let web = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/html/"))
        .and(body_string_contains("weather+in+Tokyo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body><div class="result results_links results_links_deep web-result">
                <a class="result__a" href="{}/tokyo">Tokyo forecast</a>
                <div class="result__snippet">Sunny.</div>
            </div></body></html>"#,
            web.uri()
        )))
        .expect(1)
        .mount(&web)
        .await;
    Mock::given(method("GET"))
        .and(path("/tokyo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><article>Tokyo weather today: sunny, 21C.</article></body></html>",
        ))
        .expect(1)
        .mount(&web)
        .await;

    let mut config = helpers::config(&llm);
    config.response.enable_websearch = true;
    config.search.endpoint = format!("{}/html/", web.uri());
    config.search.timeout_s = 2;

    let (events, playbacks) = tokio::task::spawn_blocking(move || {
        let clock = ManualClock::new();
        let status = RecordingStatus::new();
        let shared = Shared::new(Arc::new(status.clone()), Arc::new(clock.clone()));
        let input = ConsoleInput::new();
        let sink = RecordingSink::new();
        let cancel = CancellationToken::new();

        let mut capture = CaptureWorker::new(
            config.capture.clone(),
            &config.conversation,
            helpers::console_capture(&input),
            shared.clone(),
        );
        let mut parts = helpers::console_response(&config, &input, sink.clone());
        parts.search = Some(Box::new(WebSearch::new(&config.search).unwrap()));
        let mut response = ResponseWorker::new(&config, parts, shared.clone()).unwrap();

        input.send_line("what's the weather in Tokyo").unwrap();
        capture.run_iteration(&cancel).unwrap();
        assert_eq!(response.process_next(&cancel), Some(RoundOutcome::Spoken));
        assert!(shared.queue.is_empty());
        assert_eq!(shared.interrupt.get(), 0);
        (status.events(), sink.playbacks())
    })
    .await
    .unwrap();

    assert_eq!(
        events,
        vec![
            StatusEvent::Clear,
            StatusEvent::Show("(listening)".into()),
            StatusEvent::Show("(thinking)".into()),
            StatusEvent::Show("It is sunny and 21 degrees.".into()),
            StatusEvent::Clear,
        ]
    );
    // Notification, then the answer.
    assert_eq!(playbacks.len(), 2);
    assert!(playbacks.iter().all(|(_, ending)| *ending == Ending::Finished));

    let turns = helpers::user_turns(&llm).await;
    assert_eq!(turns.len(), 1);
    assert!(turns[0].starts_with("<context>\n"), "{}", turns[0]);
    assert!(turns[0].contains("sunny, 21C"), "{}", turns[0]);
    assert!(turns[0].ends_with("what's the weather in Tokyo"), "{}", turns[0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn search_failure_abandons_round() {
    let llm = MockServer::start().await;
    helpers::mount_classifier(&llm, "yes+-+Bitcoin price").await;
    helpers::mount_llm(&llm, &["Unused."]).await;
    let web = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&web)
        .await;

    let mut config = helpers::config(&llm);
    config.response.enable_websearch = true;
    config.search.endpoint = format!("{}/html/", web.uri());
    config.search.timeout_s = 2;

    tokio::task::spawn_blocking(move || {
        let mut rig = rig(&config);
        let search = WebSearch::new(&config.search).unwrap();
        // Rebuild with search enabled.
        let input = ConsoleInput::new();
        let mut parts = helpers::console_response(&config, &input, rig.sink.clone());
        parts.search = Some(Box::new(search));
        rig.worker = ResponseWorker::new(&config, parts, rig.shared.clone()).unwrap();

        rig.push("what is the price of bitcoin");
        let cancel = CancellationToken::new();
        assert_eq!(rig.worker.process_next(&cancel), Some(RoundOutcome::Failed));
        assert!(rig.shared.queue.is_empty());
        assert_eq!(rig.shared.interrupt.get(), 0);
    })
    .await
    .unwrap();

    assert!(helpers::user_turns(&llm).await.is_empty());
}
