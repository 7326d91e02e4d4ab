//! Static checks of the container recipe
//! Run with: cargo test --test container_contract_test

use std::fs;
use std::path::PathBuf;

fn dockerfile() -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Dockerfile");
    fs::read_to_string(&path).expect("read Dockerfile")
}

/// Instructions of the last stage, continuation lines joined
fn runtime_stage(content: &str) -> Vec<String> {
    let joined = content.replace("\\\n", " ");
    let lines: Vec<String> = joined
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(ToString::to_string)
        .collect();
    let start = lines
        .iter()
        .rposition(|l| l.starts_with("FROM "))
        .expect("a FROM instruction");
    lines[start..].to_vec()
}

fn position(lines: &[String], pred: impl Fn(&str) -> bool) -> Option<usize> {
    lines.iter().position(|l| pred(l))
}

#[test]
fn test_manifest_is_copied_before_source() {
    let content = dockerfile();
    let lines: Vec<&str> = content.lines().map(str::trim).collect();

    let manifest = lines
        .iter()
        .position(|l| l.starts_with("COPY Cargo.toml"))
        .expect("manifest COPY");
    let source = lines
        .iter()
        .position(|l| l.starts_with("COPY src"))
        .expect("source COPY");
    assert!(manifest < source, "dependency layer must precede the source layer");
}

/// `major.minor` of a version string such as `1.88` or `1.88.0`
fn minor_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

#[test]
fn test_build_is_locked_to_the_lockfile() {
    let content = dockerfile();
    let lines: Vec<&str> = content.lines().map(str::trim).collect();

    let manifest = lines
        .iter()
        .find(|l| l.starts_with("COPY Cargo.toml"))
        .expect("manifest COPY");
    assert_eq!(*manifest, "COPY Cargo.toml Cargo.lock ./");

    let joined = content.replace("\\\n", " ");
    let builds: Vec<&str> = joined.lines().filter(|l| l.contains("cargo build")).collect();
    assert!(!builds.is_empty());
    for line in builds {
        assert!(line.contains("--locked"), "{}", line);
    }
}

#[test]
fn test_builder_satisfies_rust_version() {
    let manifest_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
    let manifest = fs::read_to_string(&manifest_path).expect("read Cargo.toml");
    let declared = manifest
        .lines()
        .find_map(|l| l.trim().strip_prefix("rust-version"))
        .and_then(|rest| rest.split('"').nth(1))
        .and_then(minor_version)
        .expect("rust-version in Cargo.toml");

    let content = dockerfile();
    let image = content
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("FROM rust:"))
        .expect("rust builder stage");
    let tag = image
        .trim_start_matches("FROM rust:")
        .split(|c: char| c == '-' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    let builder = minor_version(tag).expect("builder tag pins major.minor");
    assert!(builder >= declared, "builder {:?} older than rust-version {:?}", builder, declared);
}

#[test]
fn test_runtime_runs_as_unprivileged_user() {
    let stage = runtime_stage(&dockerfile());

    let user = stage
        .iter()
        .filter(|l| l.starts_with("USER "))
        .last()
        .expect("USER instruction");
    assert_eq!(user, "USER botuser");

    let useradd = stage
        .iter()
        .find(|l| l.contains("useradd"))
        .expect("account creation");
    assert!(useradd.contains("--uid 1000"));
    assert!(useradd.contains("botuser"));
    assert!(useradd.contains("mkdir -p /app/data"));
    assert!(useradd.contains("chown -R botuser:botuser /app"));

    let user_at = position(&stage, |l| l.starts_with("USER ")).unwrap();
    let cmd_at = position(&stage, |l| l.starts_with("CMD ")).expect("CMD");
    assert!(user_at < cmd_at);
}

#[test]
fn test_runtime_environment_and_entrypoint() {
    let stage = runtime_stage(&dockerfile());

    let env = stage
        .iter()
        .filter(|l| l.starts_with("ENV "))
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    assert!(env.contains("DATA_DIR=/app/data"));
    assert!(env.contains("TIMEZONE=Asia/Taipei"));

    assert!(stage.iter().any(|l| l == "WORKDIR /app"));
    assert_eq!(
        stage.iter().filter(|l| l.starts_with("CMD ")).last().map(String::as_str),
        Some(r#"CMD ["lucky-draw-bot"]"#)
    );
}

#[test]
fn test_runtime_image_is_slim() {
    let stage = runtime_stage(&dockerfile());

    for line in stage.iter().filter(|l| l.contains("apt-get install")) {
        assert!(line.contains("--no-install-recommends"), "{}", line);
        assert!(line.contains("rm -rf /var/lib/apt/lists/*"), "{}", line);
    }
    assert!(
        !stage.iter().any(|l| l.contains("cargo")),
        "toolchain must stay in the build stage"
    );
}
