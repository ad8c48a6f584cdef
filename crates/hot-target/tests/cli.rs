use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use tempfile::TempDir;

fn write_config(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("tracker.json");
    std::fs::write(&path, json).expect("write config");
    path
}

fn fill(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
    for yy in y..y + h {
        for xx in x..x + w {
            img.put_pixel(xx, yy, Rgb([120, 120, 120]));
        }
    }
}

/// Static tape with the hot tape lit to its left.
fn write_hot_image(dir: &Path) -> PathBuf {
    let mut img = RgbImage::new(480, 320);
    fill(&mut img, 300, 100, 16, 128);
    fill(&mut img, 140, 100, 94, 16);
    let path = dir.join("hot.png");
    img.save(&path).expect("save png");
    path
}

fn hot_target() -> Command {
    Command::cargo_bin("hot-target").expect("binary built")
}

#[test]
fn help_lists_subcommands() {
    hot_target()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("track"));
}

#[test]
fn classify_votes_across_images() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), r#"{"extractor": {"blur_radius": 1}}"#);
    let image = write_hot_image(dir.path());

    let output = hot_target()
        .args(["--log-level", "warn", "classify"])
        .arg(&config)
        .args([&image, &image, &image, &image])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<serde_json::Value> = String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 4);
    for line in &lines {
        assert_eq!(line["is_hot"], true);
        assert_eq!(line["counted"], true);
        assert!(line["image"].as_str().expect("path").ends_with("hot.png"));
    }
    assert!(lines[..3].iter().all(|l| l["decision"].is_null()));
    assert_eq!(lines[3]["decision"], "hot");
}

#[test]
fn classify_rejects_inverted_vote_band() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(
        dir.path(),
        r#"{"thresholds": {"min_hot_frame_ratio": 0.3, "max_hot_frame_ratio": 0.5}}"#,
    );
    let image = write_hot_image(dir.path());
    hot_target()
        .arg("classify")
        .arg(&config)
        .arg(&image)
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvertedVoteBand"));
}

#[test]
fn track_needs_a_camera_address() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), "{}");
    hot_target()
        .args(["track", "--timeout-secs", "1"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("MissingCameraAddress"));
}

#[test]
fn unknown_log_level_is_rejected() {
    hot_target()
        .args(["--log-level", "loud", "classify", "a.json", "b.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log level"));
}
