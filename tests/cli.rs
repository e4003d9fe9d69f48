use std::fs;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

fn unit(i: usize) -> Vec<f64> {
    let mut v = vec![0.0; 160];
    v[i] = 1.0;
    v
}

fn csv(v: &[f64]) -> String {
    v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",")
}

fn write_features(dir: &TempDir, name: &str, v: &[f64]) -> Result<()> {
    dir.child(format!("{name}.features")).write_str(&csv(v))?;
    Ok(())
}

fn write_faces(dir: &TempDir, name: &str, faces: &[&[f64]]) -> Result<()> {
    let mut text = format!("FACES_DETECTED:{}\n", faces.len());
    for (i, f) in faces.iter().enumerate() {
        text.push_str(&format!("FACE_{i}:10,20,64,64|{}\n", csv(f)));
    }
    dir.child(format!("{name}.faces")).write_str(&text)?;
    Ok(())
}

fn image(dir: &TempDir, name: &str) -> String {
    dir.child(name).path().to_string_lossy().to_string()
}

fn features(dir: &TempDir, name: &str) -> String {
    dir.child(format!("{name}.features")).path().to_string_lossy().to_string()
}

/// rose、cat、ring 三张图片，整体特征两两正交
fn dataset() -> Result<TempDir> {
    let data = TempDir::new()?;
    write_features(&data, "rose", &unit(0))?;
    write_features(&data, "cat", &unit(1))?;
    write_features(&data, "ring", &unit(2))?;
    Ok(data)
}

#[test]
fn add_then_search() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", data.path()).success();
    conf_dir.child("collection.jsonl").assert(predicate::path::exists());

    cargo_run!("imsim", "-c", conf_dir.path(), "search", features(&data, "rose"))
        .success()
        .stdout(predicate::str::contains(format!("1.00\t{}\n", image(&data, "rose"))))
        .stdout(predicate::str::contains(image(&data, "cat")).not());

    cargo_run!("imsim", "-c", conf_dir.path(), "search", features(&data, "rose"), "--all")
        .success()
        .stdout(predicate::str::contains(format!("0.25\t{}\n", image(&data, "cat"))))
        .stdout(predicate::str::contains(format!("0.25\t{}\n", image(&data, "ring"))));

    Ok(())
}

#[test]
fn add_twice_skips_existing() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", data.path()).success();
    cargo_run!("imsim", "-c", conf_dir.path(), "add", data.path()).success();

    let collection = fs::read_to_string(conf_dir.child("collection.jsonl").path())?;
    assert_eq!(collection.lines().count(), 3);

    Ok(())
}

#[test]
fn add_skips_malformed_files() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;
    data.child("broken.features").write_str("0.1,not-a-number")?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", data.path()).success();

    let collection = fs::read_to_string(conf_dir.child("collection.jsonl").path())?;
    assert_eq!(collection.lines().count(), 3);
    assert!(!collection.contains("broken"));

    Ok(())
}

#[test]
fn add_rejects_invalid_suffix() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", data.path(), "-s", "(")
        .failure()
        .stderr(predicate::str::contains("无效的后缀"));
    conf_dir.child("collection.jsonl").assert(predicate::path::missing());

    Ok(())
}

#[test]
fn search_face_match() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;
    let face: &[f64] = &[0.1, 0.9, 0.3, -0.2];
    write_features(&data, "selfie", &unit(4))?;
    write_faces(&data, "selfie", &[&[1.0, 0.0, 0.0, 0.0], face])?;

    let query = TempDir::new()?;
    write_features(&query, "me", &unit(3))?;
    write_faces(&query, "me", &[face])?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", data.path()).success();

    cargo_run!("imsim", "-c", conf_dir.path(), "search", features(&query, "me"))
        .success()
        .stdout(predicate::str::contains(format!("1.00\t{}\n", image(&data, "selfie"))));

    // 只按整体特征比较时没有结果
    cargo_run!("imsim", "-c", conf_dir.path(), "search", features(&query, "me"), "-m", "visual-only")
        .success()
        .stdout(predicate::str::is_empty());

    Ok(())
}

#[test]
fn search_json_output() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", data.path()).success();

    let output = Command::cargo_bin("imsim")?
        .arg("-c")
        .arg(conf_dir.path())
        .arg("search")
        .arg(features(&data, "ring"))
        .args(["--output-format", "json", "--all"])
        .output()?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let result = value["result"].as_array().unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result[0]["record"]["path"], image(&data, "ring"));
    assert_eq!(result[0]["score"], 1.0);
    assert_eq!(value["skipped"], 0);

    Ok(())
}

#[test]
fn search_counts_unreadable_collection_lines() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", data.path()).success();
    let collection = conf_dir.child("collection.jsonl");
    let mut text = fs::read_to_string(collection.path())?;
    text.push_str("{not json\n");
    collection.write_str(&text)?;

    let output = Command::cargo_bin("imsim")?
        .arg("-c")
        .arg(conf_dir.path())
        .arg("search")
        .arg(features(&data, "rose"))
        .args(["--output-format", "json", "--all"])
        .output()?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["skipped"], 1);
    assert_eq!(value["result"].as_array().unwrap().len(), 3);

    Ok(())
}

#[rstest]
#[case::from_policy_file(&[], "inconclusive")]
#[case::disabled_by_flag(&["--no-category-gating"], "disabled")]
fn compare_gating_override(#[case] args: &[&str], #[case] gate: &str) -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;
    conf_dir.child("policy.json").write_str(r#"{"category_gating": true}"#)?;

    let output = Command::cargo_bin("imsim")?
        .arg("-c")
        .arg(conf_dir.path())
        .arg("compare")
        .arg(features(&data, "rose"))
        .arg(features(&data, "cat"))
        .args(["--output-format", "json"])
        .args(args)
        .output()?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["gate"], gate);

    Ok(())
}

#[test]
fn search_face_only_without_query_faces() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", data.path()).success();
    cargo_run!("imsim", "-c", conf_dir.path(), "search", features(&data, "rose"), "-m", "face-only")
        .failure()
        .stderr(predicate::str::contains("no faces in query"));

    Ok(())
}

#[rstest]
#[case::zero_exponent(&["-e", "0"])]
#[case::inverted_thresholds(&["--low-threshold", "0.9", "--high-threshold", "0.5"])]
#[case::face_threshold_out_of_range(&["--face-threshold", "1.5"])]
fn search_rejects_invalid_policy(#[case] args: &[&str]) -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;

    let mut cmd = Command::cargo_bin("imsim")?;
    cmd.arg("-c").arg(conf_dir.path()).arg("search").arg(features(&data, "rose")).args(args);
    cmd.assert().failure();

    Ok(())
}

#[test]
fn search_with_policy_file() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;
    conf_dir.child("policy.json").write_str(r#"{"admission": {"single": 0.2}}"#)?;

    cargo_run!("imsim", "-c", conf_dir.path(), "add", data.path()).success();
    cargo_run!("imsim", "-c", conf_dir.path(), "search", features(&data, "rose"))
        .success()
        .stdout(predicate::str::contains(image(&data, "cat")));

    let strict = TempDir::new()?;
    strict.child("strict.json").write_str(r#"{"admission": {"single": 0.9}}"#)?;
    cargo_run!(
        "imsim",
        "-c",
        conf_dir.path(),
        "search",
        features(&data, "rose"),
        "--policy",
        strict.child("strict.json").path()
    )
    .success()
    .stdout(predicate::str::contains(image(&data, "cat")).not());

    Ok(())
}

fn flower() -> Vec<f64> {
    let mut v = vec![0.0; 160];
    for i in (0..30).step_by(2) {
        v[i] = 1.0;
    }
    v[30..50].iter_mut().for_each(|x| *x = 0.5);
    v[75..90].iter_mut().for_each(|x| *x = 0.6);
    v
}

#[rstest]
#[case::bands(flower(), "bands", false, "FLOWER\t1.00\n")]
#[case::unknown(unit(0), "bands", false, "UNKNOWN\t0.00\n")]
#[case::faces(unit(0), "bands", true, "HUMAN\t1.00\n")]
#[case::embedded(vec![0.0, 0.1, 0.9, 0.0, 0.0, 0.8, 0.1], "embedded", false, "ANIMAL\t0.90\tRABBIT\n")]
fn classify(
    #[case] vector: Vec<f64>,
    #[case] scheme: &str,
    #[case] faces: bool,
    #[case] expected: &'static str,
) -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = TempDir::new()?;
    write_features(&data, "image", &vector)?;
    if faces {
        write_faces(&data, "image", &[&[0.5, 0.5]])?;
    }

    cargo_run!("imsim", "-c", conf_dir.path(), "classify", features(&data, "image"), "--scheme", scheme)
        .success()
        .stdout(predicate::str::diff(expected));

    Ok(())
}

#[test]
fn compare() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let data = dataset()?;

    cargo_run!("imsim", "-c", conf_dir.path(), "compare", features(&data, "rose"), features(&data, "rose"))
        .success()
        .stdout(predicate::str::contains("score\t1.0000\n"))
        .stdout(predicate::str::contains("admitted\ttrue\n"));

    cargo_run!("imsim", "-c", conf_dir.path(), "compare", features(&data, "rose"), features(&data, "cat"))
        .success()
        .stdout(predicate::str::contains("score\t0.2500\n"))
        .stdout(predicate::str::contains("admitted\tfalse\n"));

    Ok(())
}
