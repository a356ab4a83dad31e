use filetime::FileTime;
use snoopy_log_collator::config::Config;
use snoopy_log_collator::consolidate::{ConsolidationEngine, MergedSource, PendingFinalize};
use snoopy_log_collator::utils::time::key_file_time;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn test_config(root: &Path) -> Config {
    let contents = format!(
        r#"
        log-dir = "{root}/logs"
        collation-dir = "{root}/collation"
        hostname = "alpha"
        "#,
        root = root.display()
    );
    Config::from_toml_str(&contents, &root.join("collator.toml")).unwrap()
}

fn write_host_file(config: &Config, host: &str, relative: &str, lines: &[&str]) -> PathBuf {
    let path = config.collation_host_dir("all", host).join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(&path, contents).unwrap();
    path
}

fn mtime(path: &Path) -> FileTime {
    FileTime::from_last_modification_time(&fs::metadata(path).unwrap())
}

fn three_hosts(config: &Config) {
    write_host_file(config, "alpha", "usr/bin/foo", &["20230101-00:00:01 alpha root foo"]);
    write_host_file(config, "beta", "usr/bin/foo", &["20230101-00:00:05 beta root foo"]);
    write_host_file(config, "gamma", "usr/bin/foo", &["20230101-00:00:03 gamma root foo"]);
}

#[test]
fn test_three_hosts_merge_in_order() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    three_hosts(&config);

    let engine = ConsolidationEngine::new(&config);
    let stats = engine.consolidate_class("all").unwrap();
    assert_eq!(stats.paths_merged, 1);
    assert_eq!(stats.lines_written, 3);
    assert_eq!(stats.sources_archived, 3);

    let consolidated = engine.consolidated_path("all", Path::new("usr/bin/foo"));
    assert_eq!(
        fs::read_to_string(&consolidated).unwrap(),
        "20230101-00:00:01 alpha root foo\n\
         20230101-00:00:03 gamma root foo\n\
         20230101-00:00:05 beta root foo\n"
    );
    assert_eq!(mtime(&consolidated), key_file_time("20230101-00:00:05").unwrap());

    // sources moved to the per-host archives, host trees pruned
    for host in ["alpha", "beta", "gamma"] {
        assert!(config.archive_dir("all", host).join("usr/bin/foo").exists());
        assert!(!config.collation_host_dir("all", host).exists());
    }
    assert!(!engine.journal_path("all").exists());
}

#[test]
fn test_second_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    three_hosts(&config);

    let engine = ConsolidationEngine::new(&config);
    engine.consolidate_class("all").unwrap();
    let consolidated = engine.consolidated_path("all", Path::new("usr/bin/foo"));
    let contents = fs::read(&consolidated).unwrap();
    let modified = mtime(&consolidated);

    let stats = engine.consolidate_class("all").unwrap();
    assert_eq!(stats.paths_merged, 0);
    assert_eq!(fs::read(&consolidated).unwrap(), contents);
    assert_eq!(mtime(&consolidated), modified);
}

#[test]
fn test_new_lines_merge_into_prior_history() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    three_hosts(&config);

    let engine = ConsolidationEngine::new(&config);
    engine.consolidate_class("all").unwrap();

    write_host_file(
        &config,
        "alpha",
        "usr/bin/foo",
        &["20230101-00:00:02 alpha root foo", "20230101-00:00:09 alpha root foo -v"],
    );
    let stats = engine.consolidate_class("all").unwrap();
    assert_eq!(stats.lines_written, 5);

    let consolidated = engine.consolidated_path("all", Path::new("usr/bin/foo"));
    let keys: Vec<String> = fs::read_to_string(&consolidated)
        .unwrap()
        .lines()
        .map(|l| l[..17].to_string())
        .collect();
    assert_eq!(
        keys,
        [
            "20230101-00:00:01",
            "20230101-00:00:02",
            "20230101-00:00:03",
            "20230101-00:00:05",
            "20230101-00:00:09"
        ]
    );
    assert_eq!(mtime(&consolidated), key_file_time("20230101-00:00:09").unwrap());

    // the second batch was appended to alpha's existing archive entry
    let archived = fs::read_to_string(config.archive_dir("all", "alpha").join("usr/bin/foo")).unwrap();
    assert_eq!(archived.lines().count(), 3);
}

#[test]
fn test_interrupted_before_archive_resumes_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    three_hosts(&config);

    let engine = ConsolidationEngine::new(&config);
    let relative = Path::new("usr/bin/foo");
    let hosts = engine.pending_paths("all").unwrap().remove(relative).unwrap();

    // publish the merge but stop before archiving, as a crash would
    let merged = engine.merge_and_replace("all", relative, hosts).unwrap();
    assert_eq!(merged.lines, 3);
    assert!(engine.journal_path("all").exists());
    assert!(config.collation_host_dir("all", "beta").join(relative).exists());

    let stats = engine.consolidate_class("all").unwrap();
    assert_eq!(stats.resumed, 1);
    assert_eq!(stats.paths_merged, 0);

    let lines: Vec<String> = fs::read_to_string(engine.consolidated_path("all", relative))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines.iter().collect::<BTreeSet<_>>().len(), lines.len());
    assert!(!engine.journal_path("all").exists());
    assert!(!config.collation_host_dir("all", "beta").exists());
}

#[test]
fn test_lines_appended_after_interrupted_merge_are_kept() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let source = write_host_file(&config, "alpha", "usr/bin/foo", &["20230101-00:00:01 alpha root foo"]);

    let engine = ConsolidationEngine::new(&config);
    let relative = Path::new("usr/bin/foo");
    engine
        .merge_and_replace("all", relative, vec!["alpha".to_string()])
        .unwrap();

    // the host collates again before consolidation is rerun
    let mut live = fs::OpenOptions::new().append(true).open(&source).unwrap();
    writeln!(live, "20230102-00:00:01 alpha root foo -x").unwrap();
    drop(live);

    let stats = engine.consolidate_class("all").unwrap();
    assert_eq!(stats.resumed, 1);
    assert_eq!(stats.paths_merged, 1);

    assert_eq!(
        fs::read_to_string(engine.consolidated_path("all", relative)).unwrap(),
        "20230101-00:00:01 alpha root foo\n20230102-00:00:01 alpha root foo -x\n"
    );
    assert_eq!(
        fs::read_to_string(config.archive_dir("all", "alpha").join(relative)).unwrap(),
        "20230101-00:00:01 alpha root foo\n20230102-00:00:01 alpha root foo -x\n"
    );
    assert!(!source.exists());
    assert!(!engine.journal_path("all").exists());
}

#[test]
fn test_journal_with_unrenamed_output_is_discarded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    three_hosts(&config);

    let engine = ConsolidationEngine::new(&config);
    let temp_dir = config.consolidation_temp_dir("all");
    fs::create_dir_all(&temp_dir).unwrap();
    let temp_file = temp_dir.join("merge-abc123");
    fs::write(&temp_file, "20230101-00:00:01 alpha root foo\n").unwrap();
    PendingFinalize {
        relative_path: PathBuf::from("usr/bin/foo"),
        temp_file: temp_file.clone(),
        sources: vec![MergedSource {
            host: "alpha".to_string(),
            bytes: 33,
        }],
    }
    .write(&engine.journal_path("all"), &temp_dir)
    .unwrap();

    let stats = engine.consolidate_class("all").unwrap();
    assert_eq!(stats.resumed, 0);
    assert_eq!(stats.paths_merged, 1);
    assert!(!temp_file.exists());
    assert_eq!(
        fs::read_to_string(engine.consolidated_path("all", Path::new("usr/bin/foo")))
            .unwrap()
            .lines()
            .count(),
        3
    );
}

#[test]
fn test_abandoned_staging_files_are_removed() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let stale = [
        config.consolidation_temp_dir("all").join("merge-xyz"),
        config.consolidation_temp_dir("all").join("journal-xyz"),
        config.collation_temp_dir("all").join("tail-xyz"),
    ];
    for path in &stale {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "partial").unwrap();
    }

    ConsolidationEngine::new(&config).consolidate_class("all").unwrap();
    for path in &stale {
        assert!(!path.exists(), "{} left behind", path.display());
    }
}

#[test]
fn test_dot_prefixed_command_survives_later_runs() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_host_file(
        &config,
        "alpha",
        "home/u/.consolidating-job",
        &["20230101-00:00:01 alpha u job"],
    );

    let engine = ConsolidationEngine::new(&config);
    engine.consolidate_class("all").unwrap();
    let consolidated = engine.consolidated_path("all", Path::new("home/u/.consolidating-job"));
    assert!(consolidated.exists());

    engine.consolidate_class("all").unwrap();
    assert_eq!(
        fs::read_to_string(&consolidated).unwrap(),
        "20230101-00:00:01 alpha u job\n"
    );
}

#[test]
fn test_classes_are_independent() {
    let dir = TempDir::new().unwrap();
    let contents = format!(
        r#"
        log-dir = "{root}/logs"
        collation-dir = "{root}/collation"
        hostname = "alpha"
        [classes.ops]
        exclude-files = ["/tmp/.*"]
        "#,
        root = dir.path().display()
    );
    let config = Config::from_toml_str(&contents, Path::new("collator.toml")).unwrap();
    three_hosts(&config);

    let engine = ConsolidationEngine::new(&config);
    let stats = engine.consolidate_class("ops").unwrap();
    assert_eq!(stats.paths_merged, 0);
    assert!(config.collation_host_dir("all", "alpha").join("usr/bin/foo").exists());
}
