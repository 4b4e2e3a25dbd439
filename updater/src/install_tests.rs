//! Unit tests for flattening installation.

use super::*;
use rstest::rstest;
use std::io::Write;
use zip::write::SimpleFileOptions;

enum Entry<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
}

fn write_zip(path: &Path, entries: &[Entry<'_>]) {
    let file = File::create(path).expect("create archive");
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for entry in entries {
        match entry {
            Entry::File(name, body) => {
                writer.start_file(*name, options).expect("start file");
                writer.write_all(body).expect("write entry");
            }
            Entry::Dir(name) => writer.add_directory(*name, options).expect("add dir"),
        }
    }
    writer.finish().expect("finish archive");
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[rstest]
#[case("build/libs/app-all.jar", Some("app-all.jar"))]
#[case("res\\icons\\logo.png", Some("logo.png"))]
#[case("top.txt", Some("top.txt"))]
#[case("nested/dir/", None)]
#[case("nested/..", None)]
#[case(".", None)]
#[case("   ", None)]
fn flattened_name_keeps_last_segment(#[case] entry: &str, #[case] expected: Option<&str>) {
    assert_eq!(flattened_name(entry), expected);
}

#[test]
fn flattens_nested_entries_into_target() {
    let work = tempfile::tempdir().expect("temp dir");
    let archive = work.path().join("client-latest.zip");
    write_zip(
        &archive,
        &[
            Entry::Dir("build/"),
            Entry::Dir("build/libs/"),
            Entry::File("build/libs/app-all.jar", b"jar"),
            Entry::File("config/settings.ini", b"ini"),
        ],
    );
    let target = work.path().join("app");

    let installed = ZipInstaller::default()
        .install(&archive, &target)
        .expect("install");

    assert_eq!(installed.files(), ["app-all.jar", "settings.ini"]);
    assert_eq!(listing(&target), vec!["app-all.jar", "settings.ini"]);
    assert_eq!(fs::read(target.join("app-all.jar")).expect("read"), b"jar");
}

#[test]
fn first_duplicate_wins() {
    let work = tempfile::tempdir().expect("temp dir");
    let archive = work.path().join("client-latest.zip");
    write_zip(
        &archive,
        &[
            Entry::File("a/readme.txt", b"first"),
            Entry::File("b/readme.txt", b"second"),
        ],
    );
    let target = work.path().join("app");

    let installed = ZipInstaller::default()
        .install(&archive, &target)
        .expect("install");

    assert_eq!(installed.files(), ["readme.txt"]);
    assert_eq!(installed.skipped_duplicates(), ["b/readme.txt"]);
    assert_eq!(fs::read(target.join("readme.txt")).expect("read"), b"first");
}

#[test]
fn overwrites_existing_files_and_keeps_unrelated_ones() {
    let work = tempfile::tempdir().expect("temp dir");
    let target = work.path().join("app");
    fs::create_dir_all(&target).expect("target");
    fs::write(target.join("client.bin"), b"old").expect("old client");
    fs::write(target.join("user.prefs"), b"keep").expect("prefs");
    let archive = work.path().join("client-latest.zip");
    write_zip(&archive, &[Entry::File("dist/client.bin", b"new")]);

    ZipInstaller::default()
        .install(&archive, &target)
        .expect("install");

    assert_eq!(fs::read(target.join("client.bin")).expect("read"), b"new");
    assert_eq!(fs::read(target.join("user.prefs")).expect("read"), b"keep");
}

#[test]
fn empty_package_leaves_target_untouched() {
    let work = tempfile::tempdir().expect("temp dir");
    let archive = work.path().join("client-latest.zip");
    write_zip(&archive, &[Entry::Dir("only/"), Entry::Dir("only/dirs/")]);
    let target = work.path().join("app");
    fs::create_dir_all(&target).expect("target");
    fs::write(target.join("client.bin"), b"current").expect("client");

    let result = ZipInstaller::default().install(&archive, &target);

    assert!(matches!(result, Err(InstallError::EmptyPackage)));
    assert_eq!(listing(&target), vec!["client.bin"]);
    assert_eq!(fs::read(target.join("client.bin")).expect("read"), b"current");
    assert_eq!(
        listing(work.path()),
        vec!["app", "client-latest.zip"],
        "staging directory should be cleaned up"
    );
}

#[test]
fn corrupt_archive_is_an_archive_error() {
    let work = tempfile::tempdir().expect("temp dir");
    let archive = work.path().join("client-latest.zip");
    fs::write(&archive, b"definitely not a zip").expect("write");

    let result = ZipInstaller::default().install(&archive, &work.path().join("app"));

    assert!(matches!(result, Err(InstallError::Archive(_))));
    assert!(!work.path().join("app").exists());
}

#[test]
fn installed_package_rejects_empty_file_list() {
    let result = InstalledPackage::new(PathBuf::from("app"), Vec::new(), Vec::new());
    assert!(matches!(result, Err(InstallError::EmptyPackage)));
}

#[cfg(unix)]
#[test]
fn launchable_files_become_executable() {
    use std::os::unix::fs::PermissionsExt;

    let work = tempfile::tempdir().expect("temp dir");
    let archive = work.path().join("client-latest.zip");
    write_zip(
        &archive,
        &[
            Entry::File("client.bin", b"#!/bin/sh\n"),
            Entry::File("notes.txt", b"text"),
        ],
    );
    let target = work.path().join("app");

    ZipInstaller::with_executable_extensions(&["bin".to_owned()])
        .install(&archive, &target)
        .expect("install");

    let mode = |name: &str| {
        fs::metadata(target.join(name))
            .expect("metadata")
            .permissions()
            .mode()
    };
    assert_ne!(mode("client.bin") & 0o111, 0);
    assert_eq!(mode("notes.txt") & 0o111, 0);
}

#[test]
fn blocked_destination_leaves_existing_files_untouched() {
    let work = tempfile::tempdir().expect("temp dir");
    let archive = work.path().join("client-latest.zip");
    write_zip(
        &archive,
        &[Entry::File("a.bin", b"new-a"), Entry::File("b.bin", b"new-b")],
    );
    let target = work.path().join("app");
    fs::create_dir_all(target.join("b.bin")).expect("blocking dir");
    fs::write(target.join("a.bin"), b"old-a").expect("old file");

    let result = ZipInstaller::default().install(&archive, &target);

    assert!(matches!(result, Err(InstallError::Blocked { .. })));
    assert_eq!(fs::read(target.join("a.bin")).expect("read"), b"old-a");
    assert!(target.join("b.bin").is_dir());
}

#[test]
fn roll_back_restores_replaced_files_and_removes_new_ones() {
    let work = tempfile::tempdir().expect("temp dir");
    let target = work.path().join("app");
    let staging = work.path().join("staging");
    let backup = work.path().join("backup");
    for dir in [&target, &staging, &backup] {
        fs::create_dir_all(dir).expect("create dir");
    }
    fs::write(target.join("a.bin"), b"old-a").expect("old file");
    fs::write(target.join("keep.txt"), b"keep").expect("unrelated file");
    fs::write(staging.join("a.bin"), b"new-a").expect("staged a");
    fs::write(staging.join("c.bin"), b"new-c").expect("staged c");

    let mut swap = Swap::new(&target, &backup);
    swap.replace(&staging.join("a.bin"), "a.bin").expect("replace a");
    swap.replace(&staging.join("c.bin"), "c.bin").expect("place c");
    assert_eq!(fs::read(target.join("a.bin")).expect("read"), b"new-a");

    swap.roll_back();

    assert_eq!(listing(&target), vec!["a.bin", "keep.txt"]);
    assert_eq!(fs::read(target.join("a.bin")).expect("read"), b"old-a");
}

#[test]
fn failed_move_is_rolled_back() {
    let work = tempfile::tempdir().expect("temp dir");
    let target = work.path().join("app");
    let staging = work.path().join("staging");
    let backup = work.path().join("backup");
    for dir in [&target, &staging, &backup] {
        fs::create_dir_all(dir).expect("create dir");
    }
    fs::write(target.join("a.bin"), b"old-a").expect("old a");
    fs::write(target.join("b.bin"), b"old-b").expect("old b");
    fs::write(staging.join("a.bin"), b"new-a").expect("staged a");

    let mut swap = Swap::new(&target, &backup);
    swap.replace(&staging.join("a.bin"), "a.bin").expect("replace a");
    let missing = swap.replace(&staging.join("b.bin"), "b.bin");
    assert!(missing.is_err());
    swap.roll_back();

    assert_eq!(fs::read(target.join("a.bin")).expect("read"), b"old-a");
    assert_eq!(fs::read(target.join("b.bin")).expect("read"), b"old-b");
}

#[rstest]
#[case("App.bin", true, "app.bin")]
#[case("App.bin", false, "App.bin")]
fn duplicate_key_folds_case_when_filesystem_ignores_it(
    #[case] base: &str,
    #[case] case_insensitive: bool,
    #[case] expected: &str,
) {
    assert_eq!(duplicate_key(base, case_insensitive), expected);
}

#[cfg(any(windows, target_os = "macos"))]
#[test]
fn case_variants_count_as_duplicates() {
    let work = tempfile::tempdir().expect("temp dir");
    let archive = work.path().join("client-latest.zip");
    write_zip(
        &archive,
        &[Entry::File("App.bin", b"first"), Entry::File("lib/app.bin", b"second")],
    );
    let target = work.path().join("app");

    let installed = ZipInstaller::default()
        .install(&archive, &target)
        .expect("install");

    assert_eq!(installed.files(), ["App.bin"]);
    assert_eq!(installed.skipped_duplicates(), ["lib/app.bin"]);
    assert_eq!(fs::read(target.join("App.bin")).expect("read"), b"first");
}
