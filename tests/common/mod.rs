//! Common test utilities and helpers for hubmirror tests
#![allow(dead_code)]

use assert_fs::prelude::*;
use assert_fs::TempDir;
use serde_json::{json, Value};
use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Scratch directory holding a config file and a backup target
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        let config = self.temp_dir.child("main.cfg");
        config.write_str(content).expect("Failed to write test config");
        config.path().to_path_buf()
    }

    pub fn target_dir(&self) -> PathBuf {
        self.temp_dir.path().join("backup")
    }
}

pub fn repository_json(full_name: &str) -> Value {
    json!({
        "id": 1,
        "name": full_name.split('/').nth(1).unwrap_or(full_name),
        "full_name": full_name,
        "private": false,
        "fork": false,
        "clone_url": format!("https://github.com/{}.git", full_name),
    })
}

pub fn gist_json(server: &MockServer, id: &str, owner: Option<&str>, filenames: &[&str]) -> Value {
    let files: serde_json::Map<String, Value> = filenames
        .iter()
        .map(|name| {
            (
                name.to_string(),
                json!({
                    "filename": name,
                    "type": "text/plain",
                    "language": "Text",
                    "raw_url": format!("{}/raw/{}/{}", server.uri(), id, name),
                    "size": 12,
                }),
            )
        })
        .collect();

    json!({
        "id": id,
        "public": true,
        "owner": owner.map(|login| json!({ "login": login, "id": 7 })),
        "files": files,
    })
}

/// Serve `pages` of repository search results for `user`, then an empty page
pub async fn mount_repository_search(server: &MockServer, user: &str, total_count: u64, pages: Vec<Vec<Value>>) {
    let query = format!("user:{}", user);

    for (index, items) in pages.into_iter().chain(std::iter::once(Vec::new())).enumerate() {
        let page = index + 1;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("q", query.as_str()))
            .and(query_param("page", page.to_string().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": total_count,
                "incomplete_results": false,
                "items": items,
            })))
            .expect(1)
            .mount(server)
            .await;
    }
}

/// Serve `pages` of gists for `user`, then an empty page
pub async fn mount_gist_listing(server: &MockServer, user: &str, pages: Vec<Vec<Value>>) {
    let route = format!("/users/{}/gists", user);

    for (index, items) in pages.into_iter().chain(std::iter::once(Vec::new())).enumerate() {
        Mock::given(method("GET"))
            .and(path(route.as_str()))
            .and(query_param("page", (index + 1).to_string().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(items)))
            .expect(1)
            .mount(server)
            .await;
    }
}

/// Serve raw gist content at the URL produced by [`gist_json`]
pub async fn mount_raw_content(server: &MockServer, id: &str, filename: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/raw/{}/{}", id, filename).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Whether a git executable is on PATH
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Log output of the current thread, collected in memory
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Route this thread's log events here until the guard is dropped
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
