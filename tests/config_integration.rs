use notesync::autosave::{AutosaveConfig, DEFAULT_COOLDOWN_MS};
use notesync::config::{ConfigFlags, load_config_flags, parse_flag_tokens};

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".notesyncrc");
    let content = r"
# comment
--read-only

--debounce-ms 750

--cooldown-ms=1500
";
    std::fs::write(&path, content).unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert!(flags.read_only);
    assert_eq!(flags.debounce_ms, Some(750));
    assert_eq!(flags.cooldown_ms, Some(1500));
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".notesyncrc");
    std::fs::write(&path, "--read-only\n--debounce-ms 750\n").unwrap();

    let file_flags = load_config_flags(&path).unwrap();
    let cli_args = vec![
        "notesync".to_string(),
        "--debounce-ms".to_string(),
        "200".to_string(),
        "--markdown".to_string(),
    ];
    let cli_flags = parse_flag_tokens(&cli_args);

    let effective = file_flags.union(&cli_flags);
    assert!(effective.read_only, "file flags should remain enabled");
    assert!(effective.markdown_only, "cli flags should be applied");
    assert_eq!(effective.debounce_ms, Some(200), "cli should override debounce");

    let config = AutosaveConfig::from(&effective);
    assert_eq!(config.debounce_ms, 200);
    assert_eq!(config.cooldown_ms, DEFAULT_COOLDOWN_MS);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let flags = load_config_flags(&dir.path().join("absent")).unwrap();
    assert_eq!(flags, ConfigFlags::default());
}
