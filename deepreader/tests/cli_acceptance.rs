use futures_util::SinkExt;
use std::ffi::OsString;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

struct CliTestEnv {
    temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn document(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, content).expect("failed to write document");
        path
    }

    fn reports_dir(&self) -> PathBuf {
        self.temp_dir.path().join("reports")
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("deepreader-run"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute deepreader-run: {e}"))
}

async fn run_bin_async(env: &CliTestEnv, args: &[String]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("deepreader-run"));
    let mut command = Command::new(bin_path);
    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state);

    tokio::task::spawn_blocking(move || command.output())
        .await
        .expect("runner thread panicked")
        .unwrap_or_else(|e| panic!("failed to execute deepreader-run: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "deepreader-run {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

// ============================================
// Fake backend: HTTP API and progress socket on one port
// ============================================

#[derive(Clone, Copy)]
enum Backend {
    /// Upload and start succeed, the task streams to completion
    Completes,
    /// Upload is rejected with a detail message
    RejectsUpload,
    /// The task reports an error over the progress channel
    TaskFails,
}

async fn spawn_backend(behavior: Backend) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(serve(stream, behavior));
        }
    });

    addr
}

async fn serve(stream: TcpStream, behavior: Backend) {
    let mut head = [0u8; 8];
    loop {
        match stream.peek(&mut head).await {
            Ok(n) if n >= head.len() => break,
            Ok(0) | Err(_) => return,
            Ok(_) => tokio::task::yield_now().await,
        }
    }

    if head.starts_with(b"GET /ws/") {
        serve_progress(stream, behavior).await;
    } else {
        serve_http(stream, behavior).await;
    }
}

async fn serve_progress(stream: TcpStream, behavior: Backend) {
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    let mut frames = vec![
        r#"{"type":"progress","stage":"rag_preparation","message":"Preparing RAG database...","progress":20}"#,
        r#"{"type":"node_update","event":{"reading_loop":{}}}"#,
        "garbage",
    ];
    match behavior {
        Backend::TaskFails => {
            frames.push(r#"{"type":"error","message":"Task failed: document is empty"}"#)
        }
        _ => frames.push(
            r#"{"type":"completion","progress":100,"final_state":{"draft_report":[{"title":"Findings","written_content":["It works."]}],"thematic_analysis":{"core_argument":"Testing"}}}"#,
        ),
    }

    for frame in frames {
        if ws.send(Message::Text(frame.to_string().into())).await.is_err() {
            return;
        }
    }
    let _ = ws.close(None).await;
}

async fn serve_http(mut stream: TcpStream, behavior: Backend) {
    let request_line = read_request(&mut stream).await;

    let (status, body) = if request_line.starts_with("POST /api/upload ") {
        match behavior {
            Backend::RejectsUpload => (
                "400 Bad Request",
                r#"{"detail":"Unsupported file type. Supported: .pdf, .epub, .md"}"#,
            ),
            _ => ("200 OK", r#"{"status":"success","filename":"20250101_a.md"}"#),
        }
    } else if request_line.starts_with("POST /api/start_research ") {
        ("200 OK", r#"{"status":"success","task_id":"T42"}"#)
    } else {
        ("404 Not Found", r#"{"detail":"Not Found"}"#)
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Read one request and return its request line.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::new();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() - header_end < content_length {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    head.lines().next().unwrap_or_default().to_string()
}

fn bundle_dirs(reports: &Path) -> Vec<PathBuf> {
    match fs::read_dir(reports) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(_) => Vec::new(),
    }
}

// ============================================
// Tests
// ============================================

#[test]
fn help_lists_flags() {
    let env = CliTestEnv::new();
    let output = run_bin(&env, &["--help"]);
    assert_success(&["--help"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--question"), "{stdout}");
    assert!(stdout.contains("--custom-role"), "{stdout}");
}

#[test]
fn unsupported_extension_fails_before_any_request() {
    let env = CliTestEnv::new();
    let path = env.document("notes.txt", "hello");
    let path = path.to_string_lossy().into_owned();

    // Port 9 (discard) is never contacted: validation fails first.
    let args = [
        "--file",
        path.as_str(),
        "--question",
        "What is argued?",
        "--server",
        "http://127.0.0.1:9",
    ];
    let output = run_bin(&env, &args);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported file type"), "{stderr}");
    assert!(!stderr.contains("network error"), "{stderr}");
}

#[test]
fn empty_question_is_rejected() {
    let env = CliTestEnv::new();
    let path = env.document("a.md", "# A");
    let path = path.to_string_lossy().into_owned();

    let args = [
        "--file",
        path.as_str(),
        "--question",
        "   ",
        "--server",
        "http://127.0.0.1:9",
    ];
    let output = run_bin(&env, &args);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Please enter a core research question."),
        "{stderr}"
    );
}

#[test]
fn empty_custom_role_is_rejected() {
    let env = CliTestEnv::new();
    let path = env.document("a.pdf", "%PDF-1.4");
    let path = path.to_string_lossy().into_owned();

    let args = [
        "--file",
        path.as_str(),
        "--question",
        "Why?",
        "--custom-role",
        "  ",
        "--server",
        "http://127.0.0.1:9",
    ];
    let output = run_bin(&env, &args);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Please enter a research role."), "{stderr}");
}

#[tokio::test(flavor = "multi_thread")]
async fn analysis_runs_to_completion_and_saves_bundle() {
    let env = CliTestEnv::new();
    let addr = spawn_backend(Backend::Completes).await;
    let path = env.document("a.md", "# A\n\nSome text.");

    let args: Vec<String> = vec![
        "--file".into(),
        path.to_string_lossy().into_owned(),
        "--question".into(),
        "What is argued?".into(),
        "--role".into(),
        "Academic Researcher".into(),
        "--server".into(),
        format!("http://{}", addr),
        "--out".into(),
        env.reports_dir().to_string_lossy().into_owned(),
    ];
    let output = run_bin_async(&env, &args).await;
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    assert_success(&arg_refs, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Analysis complete in"), "{stdout}");
    assert!(stdout.contains("Report saved to"), "{stdout}");

    let bundles = bundle_dirs(&env.reports_dir());
    assert_eq!(bundles.len(), 1, "expected one bundle, got {bundles:?}");
    let bundle = &bundles[0];
    assert!(bundle.to_string_lossy().ends_with("_a"));
    assert!(bundle.join("final_state.json").exists());
    assert_eq!(
        fs::read_to_string(bundle.join("draft_report.md")).unwrap(),
        "# Findings\n\nIt works.\n\n"
    );
    assert!(bundle.join("thematic_analysis.html").exists());
    assert!(!bundle.join("chapter_summary.md").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn no_save_skips_bundle() {
    let env = CliTestEnv::new();
    let addr = spawn_backend(Backend::Completes).await;
    let path = env.document("a.md", "# A");

    let args: Vec<String> = vec![
        "--file".into(),
        path.to_string_lossy().into_owned(),
        "--question".into(),
        "Q".into(),
        "--server".into(),
        format!("http://{}", addr),
        "--out".into(),
        env.reports_dir().to_string_lossy().into_owned(),
        "--no-save".into(),
    ];
    let output = run_bin_async(&env, &args).await;
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    assert_success(&arg_refs, &output);

    assert!(bundle_dirs(&env.reports_dir()).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_upload_surfaces_backend_detail() {
    let env = CliTestEnv::new();
    let addr = spawn_backend(Backend::RejectsUpload).await;
    let path = env.document("a.md", "# A");

    let args: Vec<String> = vec![
        "--file".into(),
        path.to_string_lossy().into_owned(),
        "--question".into(),
        "Q".into(),
        "--server".into(),
        format!("http://{}", addr),
    ];
    let output = run_bin_async(&env, &args).await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Unsupported file type. Supported: .pdf, .epub, .md"),
        "{stderr}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn task_error_fails_the_run() {
    let env = CliTestEnv::new();
    let addr = spawn_backend(Backend::TaskFails).await;
    let path = env.document("a.epub", "PK");

    let args: Vec<String> = vec![
        "--file".into(),
        path.to_string_lossy().into_owned(),
        "--question".into(),
        "Q".into(),
        "--server".into(),
        format!("http://{}", addr),
        "--out".into(),
        env.reports_dir().to_string_lossy().into_owned(),
    ];
    let output = run_bin_async(&env, &args).await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Task failed: document is empty"), "{stderr}");
    assert!(bundle_dirs(&env.reports_dir()).is_empty());
}
