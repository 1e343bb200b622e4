use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn write_config(&self, content: &str) {
        let dir = self.xdg_config.join("callflow");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), content).expect("failed to write config");
    }

    fn log_dir(&self) -> PathBuf {
        self.xdg_state.join("callflow")
    }
}

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../callflow-core/tests/fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("callflow"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute callflow: {e}"))
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
        "callflow {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn journey_from_files_renders_timeline() {
    let env = CliTestEnv::new();
    let details = fixture("call-details.json");
    let messages = fixture("messages.json");
    let args = ["journey", "--details", &details, "--messages", &messages];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Call 3f2a9c1e-7b44-4d0e-9a61-2c5d8e0f1b77 (ended)"));
    assert!(stdout.contains("Duration: 6m 30s"));
    assert!(
        stdout.contains("AI  Hi, thanks for calling."),
        "expected agent line in stdout, got:\n{stdout}"
    );
    assert!(stdout.contains("You My bill doubled this month."));
    assert!(stdout.contains("[high] Refund for expired promotion"));
    assert!(stdout.contains("Webhooks"));

    // Stage order follows time
    let created = stdout.find("Created").expect("created stage");
    let escalation = stdout.find("escalate_to_human").expect("tool stage");
    let ended = stdout.find("user_hangup").expect("ended stage");
    assert!(created < escalation && escalation < ended);

    assert!(
        env.log_dir().exists(),
        "log directory should exist at {}",
        env.log_dir().display()
    );
}

#[test]
fn journey_from_files_as_json() {
    let env = CliTestEnv::new();
    let details = fixture("call-details.json");
    let messages = fixture("messages.json");
    let args = [
        "journey",
        "--details",
        &details,
        "--messages",
        &messages,
        "--format",
        "json",
    ];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let ids: Vec<_> = value["stages"]
        .as_array()
        .expect("stages array")
        .iter()
        .map(|s| s["id"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        ids,
        vec!["created", "joined", "greeting", "billing", "tool-0", "tool-1", "ended"]
    );
    assert_eq!(value["duration"], "6m 30s");
    assert_eq!(value["message_count"], 5);
}

#[test]
fn journey_honors_configured_first_speaker() {
    let env = CliTestEnv::new();
    env.write_config("[timeline]\nfirst_speaker = \"user\"\n");
    let details = fixture("call-details.json");
    let messages = fixture("messages.json");
    let args = ["journey", "--details", &details, "--messages", &messages];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("You Let me look into that for you."));
    assert!(stdout.contains("AI  Thanks."));
}

#[test]
fn journey_with_malformed_data_still_renders() {
    let env = CliTestEnv::new();
    let details = fixture("malformed-params.json");
    let args = ["journey", "--details", &details];

    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Duration: N/A"));
    assert!(!stdout.contains("Escalations"));
}

#[test]
fn journey_requires_call_id_or_details() {
    let env = CliTestEnv::new();
    let output = run_bin(&env, &["journey"]);
    assert!(!output.status.success());
}

#[test]
fn invalid_config_is_rejected() {
    let env = CliTestEnv::new();
    env.write_config("[api]\nbase_url = \"localhost\"\n");
    let details = fixture("call-details.json");

    let output = run_bin(&env, &["journey", "--details", &details]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to load configuration"),
        "expected config error in stderr, got:\n{stderr}"
    );
}

#[test]
fn status_reports_paths_and_unreachable_backend() {
    let env = CliTestEnv::new();
    env.write_config("[api]\nbase_url = \"http://127.0.0.1:9\"\ntimeout_secs = 2\n");

    let output = run_bin(&env, &["status"]);
    assert_success(&["status"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("API:         http://127.0.0.1:9"));
    assert!(stdout.contains("Backend:     unreachable"));
    assert!(stdout.contains("callflow.log"));
}

#[test]
fn recording_from_unreachable_backend_fails_without_writing() {
    let env = CliTestEnv::new();
    env.write_config(
        "[api]\nbase_url = \"http://127.0.0.1:9\"\ntimeout_secs = 2\nmax_retries = 0\n",
    );
    let target = env.home.join("call.wav");
    let target_arg = target.to_string_lossy().into_owned();

    let output = run_bin(&env, &["recording", "call-1", "--output", &target_arg]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to download recording for call call-1"),
        "expected download error in stderr, got:\n{stderr}"
    );
    assert!(!target.exists());
}

#[test]
fn recording_requires_call_id() {
    let env = CliTestEnv::new();
    let output = run_bin(&env, &["recording"]);
    assert!(!output.status.success());
}
