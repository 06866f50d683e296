//! Full pipeline: both workers under the orchestrator, barged in on by a
//! typed line while the first answer is still playing.

use crate::helpers::{self, Ending, RecordingSink, RecordingStatus};
use hark::Orchestrator;
use hark::console::ConsoleInput;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Ten words, four seconds of speech.
const LONG_ANSWER: &str = "Once upon a time there lived a very patient dragon.";

#[tokio::test(flavor = "multi_thread")]
async fn wake_phrase_during_playback_stops_the_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(helpers::sse(&[LONG_ANSWER]))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    helpers::mount_llm(&server, &["Okay."]).await;

    let mut config = helpers::config(&server);
    config.capture.continuation_threshold_s = 0.0;
    let rate = config.audio.output_sample_rate;

    let playbacks = tokio::task::spawn_blocking(move || {
        let input = ConsoleInput::new();
        let sink = RecordingSink::paced(rate);
        let status = RecordingStatus::new();
        let capture = helpers::console_capture(&input);
        let response = helpers::console_response(&config, &input, sink.clone());

        let mut orchestrator = Orchestrator::new(config, Arc::new(status));
        let shared = orchestrator.shared().clone();
        orchestrator.start(capture, response).unwrap();

        input.send_line("tell me a long story").unwrap();
        assert!(
            helpers::wait_for(Duration::from_secs(5), || shared.playback.is_active()),
            "first answer never started playing"
        );
        std::thread::sleep(Duration::from_millis(1200));
        input.send_line("actually just the weather").unwrap();

        let settled = helpers::wait_for(Duration::from_secs(10), || {
            sink.playbacks().len() >= 2 && shared.queue.is_empty()
        });
        orchestrator.shutdown();
        orchestrator.wait().unwrap();
        assert!(settled, "second answer never finished: {:?}", sink.playbacks());
        assert_eq!(shared.interrupt.get(), 0);
        sink.playbacks()
    })
    .await
    .unwrap();

    let (played, ending) = playbacks[0];
    assert_eq!(ending, Ending::Stopped);
    let played_s = played as f64 / f64::from(rate);
    assert!(
        (1.1..1.8).contains(&played_s),
        "first answer played for {played_s:.2}s"
    );
    assert_eq!(playbacks[1].1, Ending::Finished);

    let turns = helpers::user_turns(&server).await;
    assert_eq!(turns.len(), 2, "{turns:?}");
    assert_eq!(turns[0], "tell me a long story");
    assert!(
        turns[1].starts_with("<interrupt>tell me a long story</interrupt>"),
        "{}",
        turns[1]
    );
    assert!(turns[1].ends_with("actually just the weather"), "{}", turns[1]);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_model_server_fails_startup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let config = helpers::config(&server);

    tokio::task::spawn_blocking(move || {
        let input = ConsoleInput::new();
        let capture = helpers::console_capture(&input);
        let response = helpers::console_response(&config, &input, RecordingSink::new());

        let mut orchestrator = Orchestrator::new(config, Arc::new(RecordingStatus::new()));
        let err = orchestrator.start(capture, response).unwrap_err();
        assert!(err.to_string().contains("model server"), "{err}");
        assert!(orchestrator.cancel_token().is_cancelled());
        orchestrator.wait().unwrap();
    })
    .await
    .unwrap();
}
