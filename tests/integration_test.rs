use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Install a package the way the installer lays it out:
/// `<root>/specifications/<name>-<version>.json` and `<root>/gems/<name>-<version>/...`
fn install(root: &Path, name: &str, version: &str, spec_extra: &str, files: &[(&str, &str)]) {
    let full_name = format!("{}-{}", name, version);
    let spec_dir = root.join("specifications");
    fs::create_dir_all(&spec_dir).unwrap();
    fs::write(
        spec_dir.join(format!("{}.json", full_name)),
        format!(
            r#"{{"name": "{}", "version": "{}"{}}}"#,
            name, version, spec_extra
        ),
    )
    .unwrap();

    let full_path = root.join("gems").join(&full_name);
    fs::create_dir_all(&full_path).unwrap();
    for (file, content) in files {
        let path = full_path.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn make_packages(root: &Path) {
    install(root, "a", "0.0.1", "", &[("lib/code.rb", "")]);
    install(root, "a", "0.0.2", "", &[("lib/code.rb", "")]);
    install(root, "b", "0.0.2", "", &[("lib/b.rb", "")]);
    install(root, "c", "1.2", "", &[("lib/code.rb", "")]);
}

fn gemenv() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("gemenv"));
    cmd.env_remove("PACKAGE_HOME")
        .env_remove("ADDITIONAL_PACKAGE_PATH")
        .env_remove("PACKAGE_SSL")
        .env_remove("GEMENV_CONFIG");
    cmd
}

fn line(path: &Path) -> String {
    format!("{}\n", path.display())
}

#[test]
fn test_which_resolves_requirement() {
    let dir = tempdir().unwrap();
    let home = dir.path().join("gemhome");
    make_packages(&home);

    gemenv()
        .arg("--root")
        .arg(&home)
        .args(["which", "c", "code.rb"])
        .assert()
        .success()
        .stdout(line(&home.join("gems/c-1.2/lib/code.rb")));

    gemenv()
        .arg("--root")
        .arg(&home)
        .args(["which", "a", "code.rb", "-v", "<0.0.2"])
        .assert()
        .success()
        .stdout(line(&home.join("gems/a-0.0.1/lib/code.rb")));
}

#[test]
fn test_which_reports_errors() {
    let dir = tempdir().unwrap();
    let home = dir.path().join("gemhome");
    make_packages(&home);

    gemenv()
        .arg("--root")
        .arg(&home)
        .args(["which", "xyzzy", "code.rb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find package 'xyzzy'"));

    gemenv()
        .arg("--root")
        .arg(&home)
        .args(["which", "b", "code.rb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not contain"));

    gemenv()
        .arg("--root")
        .arg(&home)
        .args(["which", "a", "code.rb", "-v", "<<1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse error"));
}

#[test]
fn test_load_paths_from_environment_variables() {
    let dir = tempdir().unwrap();
    let home = dir.path().join("gemhome");
    let extra = dir.path().join("extra");
    make_packages(&home);
    install(&extra, "d", "3.0", r#", "require_paths": ["lib", "ext"]"#, &[]);

    let output = gemenv()
        .env("PACKAGE_HOME", &home)
        .env("ADDITIONAL_PACKAGE_PATH", &extra)
        .args(["load-paths", "--latest"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();

    let mut expected = vec![
        home.join("gems/a-0.0.2/lib"),
        home.join("gems/b-0.0.2/lib"),
        home.join("gems/c-1.2/lib"),
        extra.join("gems/d-3.0/lib"),
        extra.join("gems/d-3.0/ext"),
    ];
    expected.sort();
    let expected: String = expected.iter().map(|p| line(p)).collect();
    assert_eq!(stdout, expected);
}

#[test]
fn test_list_skips_corrupt_specifications() {
    let dir = tempdir().unwrap();
    let home = dir.path().join("gemhome");
    make_packages(&home);
    fs::write(home.join("specifications/broken-1.0.json"), "{ nope").unwrap();

    gemenv()
        .arg("--root")
        .arg(&home)
        .arg("list")
        .assert()
        .success()
        .stdout("a (0.0.2, 0.0.1)\nb (0.0.2)\nc (1.2)\n");
}

#[test]
fn test_env_provisions_primary_root() {
    let dir = tempdir().unwrap();
    let home = dir.path().join("deep/nested/gemhome");

    gemenv()
        .arg("--root")
        .arg(&home)
        .arg("env")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "primary root: {}",
            home.display()
        )))
        .stdout(predicate::str::contains("ssl available: true"));

    for sub in ["cache", "doc", "gems", "specifications"] {
        assert!(home.join(sub).is_dir(), "expected {} to exist", sub);
    }
}

#[test]
fn test_env_uses_config_file() {
    let dir = tempdir().unwrap();
    let home = dir.path().join("configured");
    let config = dir.path().join("config.json");
    fs::write(
        &config,
        format!(
            r#"{{"primary_root": {:?}, "ssl_available": false, "sources": ["https://mirror.internal"]}}"#,
            home.to_str().unwrap()
        ),
    )
    .unwrap();

    gemenv()
        .env("GEMENV_CONFIG", &config)
        .arg("env")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "primary root: {}",
            home.display()
        )))
        .stdout(predicate::str::contains("ssl available: false"))
        .stdout(predicate::str::contains("https://mirror.internal"));
}

#[test]
fn test_datadir() {
    let dir = tempdir().unwrap();
    let home = dir.path().join("gemhome");
    install(&home, "foo", "0.0.2", "", &[("data/foo/foo.txt", "blah")]);

    gemenv()
        .arg("--root")
        .arg(&home)
        .args(["datadir", "foo"])
        .assert()
        .success()
        .stdout(line(&home.join("gems/foo-0.0.2/data/foo")));

    gemenv()
        .arg("--root")
        .arg(&home)
        .args(["datadir", "xyzzy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No data directory"));
}

#[test]
fn test_activate_prints_load_path() {
    let dir = tempdir().unwrap();
    let home = dir.path().join("gemhome");
    install(
        &home,
        "auto",
        "1.0",
        r#", "autorequire": "auto.rb""#,
        &[("lib/auto.rb", "puts 'hi'")],
    );

    gemenv()
        .arg("--root")
        .arg(&home)
        .args(["activate", "auto"])
        .assert()
        .success()
        .stdout(line(&home.join("gems/auto-1.0/lib")));
}
