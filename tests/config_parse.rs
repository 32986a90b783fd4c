use office_convert::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../office-convert.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert!(cfg.engine.convert_timeout_seconds > 0);
    assert!(!cfg.paths.out_dir.is_empty());
    assert!(cfg.security.reject_url_inputs);
}

#[test]
fn empty_config_gets_defaults() {
    let cfg: Config = toml::from_str("").expect("parse empty TOML");
    assert_eq!(cfg.engine.install_path, "auto");
    assert_eq!(cfg.paths.out_dir, "out");
    assert!(cfg.limits.max_input_file_bytes > 0);
}
