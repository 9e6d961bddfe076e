use std::{env, fs, path::PathBuf, process::Command};

fn run_bin(args: &[&str]) -> String {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_schelling"));

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

    stdout_str.to_string()
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[model]\n"
        + "width = 20\n"
        + "height = 15\n"
        + "population_density = 0.8\n"
        + "happiness_threshold = 0.5\n"
        + "number_types = 2\n"
        + "\n"
        + "[init]\n"
        + "seed = 1234\n"
        + "\n"
        + "[output]\n"
        + "steps_per_frame = 50\n"
        + "frames_per_run = 16\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    for run in ["run-0000", "run-0001"] {
        assert!(test_dir.join(run).join("trajectory.msgpack").is_file());
        let final_map = fs::read_to_string(test_dir.join(run).join("final.txt"))
            .expect("failed to read final map");
        let lines: Vec<_> = final_map.lines().collect();
        assert_eq!(lines.len(), 15);
        assert!(lines.iter().all(|line| line.chars().count() == 20));
        let n_agents = final_map.chars().filter(|c| matches!(c, '0' | '1')).count();
        assert_eq!(n_agents, 240);
    }

    let shown = run_bin(&["--sim-dir", test_dir_str, "show", "--run-idx", "0"]);
    let final_map = fs::read_to_string(test_dir.join("run-0000").join("final.txt"))
        .expect("failed to read final map");
    assert_eq!(shown, final_map);

    let initial = run_bin(&[
        "--sim-dir",
        test_dir_str,
        "show",
        "--run-idx",
        "1",
        "--frame-idx",
        "0",
    ]);
    assert_eq!(initial.lines().count(), 15);

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    let results = fs::read_to_string(test_dir.join("run-0000").join("results.json"))
        .expect("failed to read results");
    assert!(results.contains("similarity"));
    assert!(results.contains("unhappy_fraction"));

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("run-0001").exists());

    fs::remove_dir_all(&test_dir).ok();
}
