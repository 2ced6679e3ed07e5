use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use themeclock::config::Config;
use themeclock::weather::{Observation, Poller};

/// Serve fixed bodies for the temperature and weather endpoints on an
/// ephemeral port, returning the base URL.
fn endpoint(temp_body: &'static str, weather_body: &'static str) -> String {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let base = format!("http://{}", server.server_addr().to_ip().unwrap());

    thread::spawn(move || {
        for request in server.incoming_requests() {
            let body = if request.url().starts_with("/temperature") {
                temp_body
            } else {
                weather_body
            };
            let _ = request.respond(tiny_http::Response::from_string(body));
        }
    });

    base
}

fn config_for(base: &str) -> Config {
    Config {
        theme: "succulent".to_owned(),
        brightness_day: 1.0,
        brightness_night: 0.5,
        temp_endpoint: format!("{}/temperature", base),
        weather_endpoint: format!("{}/weather", base),
        poll_interval: Duration::from_secs(60),
        http_timeout: Duration::from_millis(500),
        day_start_hour: 7,
        day_end_hour: 19,
    }
}

fn good_endpoint() -> String {
    endpoint(r#"{"Temperature": 72.0}"#, r#"{"condition": "clear_day"}"#)
}

#[test]
fn first_successful_poll_fills_observation() {
    let poller = Poller::new(&config_for(&good_endpoint())).unwrap();

    let observation = poller.poll(&Observation::unknown());

    assert_eq!(observation.temperature, Some(72.0));
    assert_eq!(observation.condition.as_deref(), Some("clear_day"));
    assert!(observation.last_updated.is_some());
}

#[test]
fn polling_twice_is_idempotent() {
    let poller = Poller::new(&config_for(&good_endpoint())).unwrap();

    let first = poller.poll(&Observation::unknown());
    let second = poller.poll(&first);

    assert_eq!(second.temperature, first.temperature);
    assert_eq!(second.condition, first.condition);
}

#[test]
fn malformed_response_retains_previous_observation() {
    let poller = Poller::new(&config_for(&good_endpoint())).unwrap();
    let before = poller.poll(&Observation::unknown());

    let broken = Poller::new(&config_for(&endpoint("<!doctype html>", "{}"))).unwrap();
    let after = broken.poll(&before);

    assert_eq!(after, before);
}

#[test]
fn missing_field_retains_previous_observation() {
    let poller = Poller::new(&config_for(&good_endpoint())).unwrap();
    let before = poller.poll(&Observation::unknown());

    // Well-formed JSON, wrong key.
    let broken = Poller::new(&config_for(&endpoint(
        r#"{"temp_f": 72.0}"#,
        r#"{"condition": "clear_day"}"#,
    )))
    .unwrap();
    let after = broken.poll(&before);

    assert_eq!(after, before);
}

#[test]
fn connection_failure_retains_previous_observation() {
    let unbound = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let poller = Poller::new(&config_for(&unbound)).unwrap();
    let before = Observation {
        temperature: Some(72.0),
        condition: Some("clear_day".to_owned()),
        last_updated: Some(time::OffsetDateTime::now_utc()),
    };

    assert_eq!(poller.poll(&before), before);
}

#[test]
fn slow_endpoint_is_bounded_by_timeout() {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let base = format!("http://{}", server.server_addr().to_ip().unwrap());

    thread::spawn(move || {
        for request in server.incoming_requests() {
            thread::sleep(Duration::from_secs(2));
            let _ = request.respond(tiny_http::Response::from_string(
                r#"{"Temperature": 72.0}"#,
            ));
        }
    });

    let poller = Poller::new(&config_for(&base)).unwrap();
    let before = Observation {
        temperature: Some(68.0),
        condition: Some("night".to_owned()),
        last_updated: Some(time::OffsetDateTime::now_utc()),
    };

    let started = Instant::now();
    let after = poller.poll(&before);

    assert_eq!(after, before);
    assert!(started.elapsed() < Duration::from_millis(1500));
}
