use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[model]\n"
        + "base_angle = 60\n"
        + "step_distance = 1.0\n"
        + "n_fragments = 10\n"
        + "prob_explore = 0.1\n"
        + "high_reward = 10\n"
        + "low_reward = 1\n"
        + "\n"
        + "[arena]\n"
        + "width = 15.0\n"
        + "height = 15.0\n"
        + "collision_radius = 3.0\n"
        + "\n"
        + "[init]\n"
        + "n_agents = 3\n"
        + "max_placement_attempts = 100000\n"
        + "seed = 7\n"
        + "\n"
        + "[output]\n"
        + "rounds_per_save = 20\n"
        + "saves_per_file = 10\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_skatesim"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);
    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]);

    let run_dir = test_dir.join("run-0000");
    for file_idx in 0..3 {
        let payoffs = fs::read_to_string(run_dir.join(format!("payoffs-{file_idx:04}.csv")))
            .expect("failed to read payoff file");
        let mut lines = payoffs.lines();
        assert_eq!(lines.next(), Some("ROUND,SKATER,0,60,120,180,240,300"));
        // 200 rounds of 3 skaters per invocation.
        assert_eq!(lines.count(), 600);
    }

    let series = fs::read_to_string(run_dir.join("series.csv")).expect("failed to read series");
    let mut lines = series.lines();
    assert_eq!(lines.next(), Some("ROUND,0,60,120,180,240,300"));
    let last = lines.last().expect("series has no rows");
    assert!(last.starts_with("600,"));

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);
    assert!(test_dir.join("analysis.msgpack").is_file());

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!run_dir.exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn impossible_placement_fails_cleanly() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("impossible_placement");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    // No two points of a 4x4 rink are 6 apart.
    let config_contents = r#"
[model]
base_angle = 45
step_distance = 1.0
n_fragments = 4
prob_explore = 0.1
high_reward = 10
low_reward = 1

[arena]
width = 4.0
height = 4.0
collision_radius = 6.0

[init]
n_agents = 2
max_placement_attempts = 1000

[output]
rounds_per_save = 1
saves_per_file = 1
"#;
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let output = Command::new(env!("CARGO_BIN_EXE_skatesim"))
        .args(["--sim-dir", test_dir.to_str().expect("invalid test dir"), "create"])
        .output()
        .expect("failed to execute command");

    assert!(!output.status.success());
    let stderr_str = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr_str.contains("Placement") && stderr_str.contains("attempts: 1000"),
        "stderr:\n{stderr_str}"
    );
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
