// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub use predicates::prelude::*;
pub use tempfile::TempDir;

pub fn catalog_sync() -> Command {
    cargo_bin_cmd!("catalog-sync")
}

/// Address of a local port nothing is listening on.
pub fn closed_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

/// Write a config file pointing the probe and uploads at the given addresses.
pub fn write_config(dir: &Path, probe_addr: &str, endpoint: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let content = format!(
        "endpoint = \"{endpoint}\"\n\
         data_dir = \"{}\"\n\
         probe_addr = \"{probe_addr}\"\n\
         probe_timeout_ms = 500\n\
         request_timeout_secs = 5\n",
        dir.join("data").display()
    );
    std::fs::write(&path, content).unwrap();
    path
}

/// In-process stand-in for the catalog service.
///
/// Answers every request with the current status and records the
/// `product_name` of each request together with that status.
pub struct TestCatalog {
    addr: SocketAddr,
    status: Arc<AtomicU16>,
    received: Arc<Mutex<Vec<(String, u16)>>>,
}

impl TestCatalog {
    pub async fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status = Arc::new(AtomicU16::new(status));
        let received = Arc::new(Mutex::new(Vec::new()));

        let (status_ref, received_ref) = (Arc::clone(&status), Arc::clone(&received));
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle(
                    stream,
                    Arc::clone(&status_ref),
                    Arc::clone(&received_ref),
                ));
            }
        });

        TestCatalog {
            addr,
            status,
            received,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/api/public/add", self.addr)
    }

    /// `host:port` for the reachability probe.
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<(String, u16)> {
        self.received.lock().unwrap().clone()
    }

    /// Names of submissions answered with a 2xx status, sorted.
    pub fn accepted(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .received()
            .into_iter()
            .filter(|(_, status)| (200..300).contains(status))
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names
    }
}

async fn handle(
    mut stream: TcpStream,
    status: Arc<AtomicU16>,
    received: Arc<Mutex<Vec<(String, u16)>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let Ok(n) = stream.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            // Probe connections close without sending anything.
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .map(|v| v.trim().parse::<usize>().unwrap())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let code = status.load(Ordering::SeqCst);
    received
        .lock()
        .unwrap()
        .push((product_name(&buf[header_end..]), code));

    let response = format!("HTTP/1.1 {code} Test\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn product_name(body: &[u8]) -> String {
    let marker = b"name=\"product_name\"\r\n\r\n";
    let Some(start) = find(body, marker).map(|p| p + marker.len()) else {
        return String::new();
    };
    let len = find(&body[start..], b"\r\n").unwrap_or(0);
    String::from_utf8_lossy(&body[start..start + len]).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
