// matcher_scenarios.rs — End-to-end policy scenarios.
//
// Each test loads a policy document, compiles it against the standard
// field registry, and runs the matcher over hand-built entities:
//
//   1. SYS_ADMIN added → exactly one ADD CAPABILITIES message
//   2. Required label missing → required-label message
//   3. CVSS threshold → fires when any one image is vulnerable
//   4. Unset sub-records do not change the outcome
//   5. Scope gates the whole policy
//   6. Process policy → alert plus process violation
//   7. Policies load from files
//   8. Field families that read the same attributes report independently
//   9. Per-container and per-volume checks do not mix containers or volumes

use std::collections::BTreeMap;
use std::io::Write;

use kd_model::{
    Component, Container, ContainerImage, Deployment, Image, ImageName, ImageScan,
    ProcessIndicator, ProcessSignal, SecurityContext, Volume, Vulnerability,
};
use kd_policy::{CompilerOptions, FieldRegistry, Matcher, Policy, PolicyCompiler, PolicyError};

fn compile(yaml: &str) -> Result<Matcher, PolicyError> {
    let registry = FieldRegistry::standard();
    let policy = Policy::from_yaml(yaml)?;
    PolicyCompiler::new(&registry, CompilerOptions::default()).compile(&policy)
}

fn deployment(namespace: &str, add_caps: &[&str], labels: &[(&str, &str)]) -> Deployment {
    Deployment {
        id: "dep-1".to_string(),
        name: "web".to_string(),
        namespace: namespace.to_string(),
        cluster_id: "prod".to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        containers: vec![Container {
            name: "app".to_string(),
            image: ContainerImage {
                id: "sha256:abc".to_string(),
                name: ImageName {
                    registry: "docker.io".to_string(),
                    remote: "library/nginx".to_string(),
                    tag: "1.25".to_string(),
                    full_name: "docker.io/library/nginx:1.25".to_string(),
                },
            },
            security_context: SecurityContext {
                add_capabilities: add_caps.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            },
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn image(id: &str, vulns: &[(&str, f32)]) -> Image {
    Image {
        id: id.to_string(),
        name: ImageName {
            registry: "docker.io".to_string(),
            remote: format!("library/{}", id),
            tag: "latest".to_string(),
            full_name: format!("docker.io/library/{}:latest", id),
        },
        scan: Some(ImageScan {
            scan_time: None,
            components: vec![Component {
                name: "openssl".to_string(),
                version: "1.1.1".to_string(),
                vulns: vulns
                    .iter()
                    .map(|(cve, cvss)| Vulnerability {
                        cve: cve.to_string(),
                        cvss: *cvss,
                        link: format!("https://nvd.nist.gov/vuln/detail/{}", cve),
                        fixed_by: None,
                    })
                    .collect(),
            }],
        }),
        ..Default::default()
    }
}

fn messages(matcher: &Matcher, dep: Option<&Deployment>, images: &[Image]) -> Vec<String> {
    matcher
        .match_one(dep, images, None)
        .unwrap()
        .alert_violations
        .into_iter()
        .map(|v| v.message)
        .collect()
}

#[test]
fn sys_admin_capability_is_reported_once() {
    let matcher = compile(
        r#"
name: "No SYS_ADMIN"
fields:
  add_capabilities: ["SYS_ADMIN"]
"#,
    )
    .unwrap();

    let found = messages(&matcher, Some(&deployment("web", &["SYS_ADMIN", "NET_ADMIN"], &[])), &[]);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("SYS_ADMIN"));
    assert!(found[0].contains("ADD CAPABILITIES"));

    let clean = messages(&matcher, Some(&deployment("web", &["NET_ADMIN"], &[])), &[]);
    assert!(clean.is_empty());
}

#[test]
fn missing_required_label_matches() {
    let matcher = compile(
        r#"
name: "Team label required"
fields:
  required_label:
    key: team
"#,
    )
    .unwrap();

    let found = messages(&matcher, Some(&deployment("web", &[], &[("app", "web")])), &[]);
    assert_eq!(found, vec!["Required label not found (key = 'team', value = '.*')"]);

    let labelled = messages(&matcher, Some(&deployment("web", &[], &[("team", "payments")])), &[]);
    assert!(labelled.is_empty());
}

#[test]
fn one_vulnerable_image_is_enough() {
    let matcher = compile(
        r#"
name: "Critical CVEs"
severity: critical
fields:
  cvss:
    op: GREATER_THAN_OR_EQUALS
    value: 7
"#,
    )
    .unwrap();

    let clean = image("redis", &[("CVE-2020-0001", 3.1)]);
    let vulnerable = image("nginx", &[("CVE-2021-3449", 5.9), ("CVE-2022-0778", 7.5)]);

    assert!(messages(&matcher, None, &[clean.clone()]).is_empty());
    let found = messages(&matcher, None, &[clean, vulnerable]);
    assert_eq!(
        found,
        vec!["Found a CVSS score of 7.5 (greater than or equal to 7.0) (cve: CVE-2022-0778)"]
    );
}

#[test]
fn unset_sub_records_do_not_change_the_outcome() {
    let base = compile(
        r#"
name: "Privileged"
fields:
  privileged: true
"#,
    )
    .unwrap();
    let padded = compile(
        r#"
name: "Privileged"
fields:
  privileged: true
  add_capabilities: []
  port_exposure: []
  required_label: {}
  process_policy: {}
"#,
    )
    .unwrap();

    let mut privileged = deployment("web", &[], &[]);
    privileged.containers[0].security_context.privileged = true;
    let plain = deployment("web", &[], &[]);

    for dep in [&privileged, &plain] {
        assert_eq!(
            base.match_one(Some(dep), &[], None).unwrap(),
            padded.match_one(Some(dep), &[], None).unwrap()
        );
    }
    assert_eq!(
        messages(&base, Some(&privileged), &[]),
        vec!["Privileged container found"]
    );
}

#[test]
fn scope_gates_the_policy() {
    let matcher = compile(
        r#"
name: "Payments only"
scope:
  - cluster: prod
    namespace: payments
fields:
  add_capabilities: ["SYS_ADMIN"]
"#,
    )
    .unwrap();

    assert!(messages(&matcher, Some(&deployment("web", &["SYS_ADMIN"], &[])), &[]).is_empty());
    assert_eq!(
        messages(&matcher, Some(&deployment("payments", &["SYS_ADMIN"], &[])), &[]).len(),
        1
    );
}

#[test]
fn process_policy_reports_the_event() {
    let matcher = compile(
        r#"
name: "Netcat"
fields:
  process_policy:
    name: "^nc$"
"#,
    )
    .unwrap();

    let event = ProcessIndicator {
        id: "proc-1".to_string(),
        deployment_id: "dep-1".to_string(),
        container_name: "app".to_string(),
        pod_id: "web-7d9f".to_string(),
        signal: ProcessSignal {
            name: "nc".to_string(),
            args: "-lvp 4444".to_string(),
            exec_file_path: "/bin/nc".to_string(),
            uid: 1000,
            time: None,
        },
    };

    let dep = deployment("web", &[], &[]);
    let none = matcher.match_one(Some(&dep), &[], None).unwrap();
    assert!(none.is_empty());

    let violations = matcher.match_one(Some(&dep), &[], Some(&event)).unwrap();
    assert_eq!(
        violations.alert_violations[0].message,
        "Found process with name matching '^nc$'"
    );
    let process = violations.process_violation.unwrap();
    assert_eq!(
        process.message,
        "Binary '/bin/nc' executed with arguments '-lvp 4444' under user ID 1000"
    );
    assert_eq!(process.processes.len(), 1);
}

#[test]
fn policy_loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "name: from-disk\nfields:\n  image_name:\n    tag: latest"
    )
    .unwrap();

    let policy = Policy::from_file(file.path()).unwrap();
    let registry = FieldRegistry::standard();
    let matcher = PolicyCompiler::new(&registry, CompilerOptions::default())
        .compile(&policy)
        .unwrap();
    assert_eq!(matcher.policy_name(), "from-disk");

    let found = messages(&matcher, None, &[image("nginx", &[])]);
    assert_eq!(found, vec!["Image tag 'latest' matched latest"]);
}

#[test]
fn invalid_regex_fails_compilation() {
    let err = compile(
        r#"
name: "Broken"
fields:
  cve: "CVE-(2021"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, PolicyError::InvalidRegex { builder: "cve", .. }));
}

#[test]
fn cve_and_cvss_report_independently() {
    let matcher = compile(
        r#"
name: "Struts"
fields:
  cve: "CVE-2017-.*"
  cvss:
    op: GREATER_THAN_OR_EQUALS
    value: 7.0
"#,
    )
    .unwrap();

    let struts = image("struts", &[("CVE-2017-5638", 10.0), ("CVE-2019-0001", 4.0)]);
    let violations = matcher.match_one(None, &[struts], None).unwrap();
    let found: Vec<&str> = violations
        .alert_violations
        .iter()
        .map(|v| v.message.as_str())
        .collect();
    assert_eq!(
        found,
        vec![
            "CVE CVE-2017-5638 matched regex 'CVE-2017-.*'",
            "Found a CVSS score of 10 (greater than or equal to 7.0) (cve: CVE-2017-5638)",
        ]
    );
    assert_eq!(
        violations.alert_violations[0].link.as_deref(),
        Some("https://nvd.nist.gov/vuln/detail/CVE-2017-5638")
    );
}

#[test]
fn cve_and_fixed_by_report_independently() {
    let matcher = compile(
        r#"
name: "Fixable OpenSSL"
fields:
  cve: "CVE-2021-.*"
  fixed_by: "1.1.1.*"
"#,
    )
    .unwrap();

    let mut openssl = image("openssl", &[("CVE-2021-3449", 5.9), ("CVE-2020-1967", 7.5)]);
    if let Some(scan) = openssl.scan.as_mut() {
        scan.components[0].vulns[1].fixed_by = Some("1.1.1g".to_string());
    }
    assert_eq!(
        messages(&matcher, None, &[openssl]),
        vec![
            "CVE CVE-2021-3449 matched regex 'CVE-2021-.*'",
            "Vulnerability CVE-2020-1967 is fixable in '1.1.1g' matching '1.1.1.*'",
        ]
    );
}

fn with_volumes(volumes: Vec<Volume>) -> Deployment {
    let mut dep = deployment("web", &[], &[]);
    dep.containers[0].volumes = volumes;
    dep
}

fn host_path(name: &str, source: &str, read_only: bool) -> Volume {
    Volume {
        name: name.to_string(),
        source: source.to_string(),
        destination: format!("/mnt/{}", name),
        read_only,
        volume_type: "HostPath".to_string(),
    }
}

#[test]
fn volume_and_host_mount_report_independently() {
    let matcher = compile(
        r#"
name: "Docker socket"
fields:
  volume_policy:
    source: "/var/run/docker.sock"
  host_mount_policy:
    read_only: false
"#,
    )
    .unwrap();

    let dep = with_volumes(vec![host_path("sock", "/var/run/docker.sock", false)]);
    assert_eq!(
        messages(&matcher, Some(&dep), &[]),
        vec![
            "Volume source '/var/run/docker.sock' matched /var/run/docker.sock",
            "Writable host mount '/var/run/docker.sock' found",
        ]
    );
}

#[test]
fn required_and_disallowed_annotations_report_independently() {
    let matcher = compile(
        r#"
name: "Annotations"
fields:
  required_annotation:
    key: owner
    value: alice
  disallowed_annotation:
    key: team
"#,
    )
    .unwrap();

    let mut dep = deployment("web", &[], &[]);
    dep.annotations = [
        ("owner".to_string(), "bob".to_string()),
        ("team".to_string(), "x".to_string()),
    ]
    .into_iter()
    .collect();
    assert_eq!(
        messages(&matcher, Some(&dep), &[]),
        vec![
            "Required annotation not found (key = 'owner', value = 'alice')",
            "Disallowed annotation (key='team', value='x') matched disallowed annotation policy \
             (key = 'team', value = '.*')",
        ]
    );
}

#[test]
fn drop_capabilities_checked_per_container() {
    let matcher = compile(
        r#"
name: "Drop NET_RAW"
fields:
  drop_capabilities: ["NET_RAW"]
"#,
    )
    .unwrap();

    let mut dep = deployment("web", &[], &[]);
    dep.containers[0].security_context.drop_capabilities = vec!["NET_RAW".to_string()];
    let mut second = dep.containers[0].clone();
    second.name = "sidecar".to_string();
    second.security_context.drop_capabilities.clear();
    dep.containers.push(second);

    assert_eq!(
        messages(&matcher, Some(&dep), &[]),
        vec!["NET_RAW was not in the DROP CAPABILITIES list"]
    );

    dep.containers[1].security_context.drop_capabilities =
        vec!["ALL".to_string(), "NET_RAW".to_string()];
    assert!(messages(&matcher, Some(&dep), &[]).is_empty());
}

#[test]
fn volume_parts_must_match_the_same_volume() {
    let matcher = compile(
        r#"
name: "Writable /etc"
fields:
  volume_policy:
    name: "config"
    source: "/etc"
"#,
    )
    .unwrap();

    let split = with_volumes(vec![
        host_path("config", "/srv/config", false),
        host_path("scratch", "/etc", false),
    ]);
    assert!(messages(&matcher, Some(&split), &[]).is_empty());

    let together = with_volumes(vec![host_path("config", "/etc", false)]);
    assert_eq!(
        messages(&matcher, Some(&together), &[]),
        vec![
            "Volume name 'config' matched config",
            "Volume source '/etc' matched /etc",
        ]
    );
}
