//! Common test utilities for comic-fetch integration tests

#![allow(dead_code)]

use comic_fetch::Config;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Distinct bytes per image so files can be matched to their source
pub fn image_bytes(tag: &str) -> Vec<u8> {
    format!("\u{89}IMG:{tag}").into_bytes()
}

/// Config with millisecond backoff so retry tests stay fast
pub fn fast_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.retry.base_delay = Duration::from_millis(5);
    config.fetch.request_timeout = Duration::from_secs(5);
    config.collect.output_dir = output_dir.to_path_buf();
    config
}

/// Serve `body` at `route` with status 200
pub async fn mount_image(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Answer `route` with `status` for the first `times` requests
pub async fn mount_failures(server: &MockServer, route: &str, status: u16, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(times)
        .with_priority(1)
        .mount(server)
        .await;
}

/// Read a downloaded file, panicking with the path on failure
pub fn read(dir: &Path, name: &str) -> Vec<u8> {
    std::fs::read(dir.join(name)).unwrap_or_else(|e| panic!("reading {name}: {e}"))
}
