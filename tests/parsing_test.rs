//! Parsing behavior: versions, changelog sections, repository configuration.

use shipwright::changelog;
use shipwright::config::{RepoConfig, TargetSpec};
use shipwright::version;

#[test]
fn test_version_round_trip_with_v_prefix() {
    for raw in [
        "1.0.0",
        "0.1.2",
        "2.0.0-rc.1",
        "1.2.3-alpha",
        "3.4.5+build.7",
        "1.0.0-beta.2+exp.sha.5114f85",
    ] {
        let with_prefix = format!("v{raw}");
        assert_eq!(
            version::parse(&with_prefix),
            version::parse(raw),
            "prefix round trip failed for {raw}"
        );
    }
}

#[test]
fn test_changelog_extraction() {
    let markdown = "# Changelog\n## 1.0.0\nNotes\n## 0.9.0\nolder";
    let changeset = changelog::find_changeset(markdown, "v1.0.0").unwrap();
    assert_eq!(changeset.name, "1.0.0");
    assert_eq!(changeset.body, "Notes");
}

#[test]
fn test_changelog_multi_line_bodies() {
    let markdown = "\
## 2.1.0

- one
- two

## 2.0.0

initial
";
    let changeset = changelog::find_changeset(markdown, "2.1.0").unwrap();
    assert_eq!(changeset.body, "- one\n- two");

    let changeset = changelog::find_changeset(markdown, "2.0.0").unwrap();
    assert_eq!(changeset.body, "initial");
}

#[test]
fn test_config_target_shorthand_and_options() {
    let yaml = "\
store: zeus
targets:
  - github
  - name: npm
    access: public
ignoredChecks: [codecov]
";
    let config: RepoConfig = serde_yaml::from_str(yaml).unwrap();

    let (name, options) = config.targets[0].resolved().unwrap();
    assert_eq!(name, "github");
    assert!(options.is_empty());

    let (name, options) = config.targets[1].resolved().unwrap();
    assert_eq!(name, "npm");
    assert_eq!(
        options
            .get(serde_yaml::Value::from("access"))
            .and_then(|value| value.as_str()),
        Some("public")
    );
}

#[test]
fn test_config_rejects_nameless_target_lazily() {
    // Parsing succeeds; resolution reports the broken entry.
    let yaml = "store: zeus\ntargets:\n  - access: public\n";
    let config: RepoConfig = serde_yaml::from_str(yaml).unwrap();
    assert!(config.targets[0].resolved().is_err());
}

#[test]
fn test_target_spec_plain_string() {
    let spec: TargetSpec = serde_yaml::from_str("docker").unwrap();
    let (name, _) = spec.resolved().unwrap();
    assert_eq!(name, "docker");
}
