use super::*;
use crate::cli_test_support::{temp_path, write_file};

use std::fs;
use std::path::{Path, PathBuf};

struct Workspace {
    scripts: PathBuf,
    files: PathBuf,
}

impl Workspace {
    fn new(name: &str) -> Self {
        let root = temp_path(name);
        Self {
            scripts: root.join("scripts"),
            files: root.join("files"),
        }
    }

    fn document(&self, path: &str) -> PathBuf {
        self.files.join("[media]").join(format!("{}.xml", path))
    }

    fn run(&self, args: &[&str]) -> i32 {
        let mut argv = vec![
            "mml".to_string(),
            "--scripts-dir".to_string(),
            self.scripts.to_string_lossy().to_string(),
            "--files-dir".to_string(),
            self.files.to_string_lossy().to_string(),
        ];
        argv.extend(args.iter().map(|arg| arg.to_string()));
        run_cli_from_args(argv)
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("file should exist")
}

#[test]
fn run_patches_documents_in_the_media_dir() {
    let workspace = Workspace::new("run-patch");
    write_file(
        &workspace.scripts.join("buff").join("index.mml"),
        "include nerf\nfile 'units' { change 'unit[@id=\"a\"]' { set 'hp' = 20 } }",
    );
    write_file(
        &workspace.scripts.join("buff").join("nerf.mml"),
        "file 'units' { change 'unit[@id=\"b\"]' { set 'hp' = 5 } }",
    );
    write_file(
        &workspace.document("units"),
        "<unit id=\"a\" hp=\"10\" />\n<unit id=\"b\" hp=\"10\" />",
    );

    assert_eq!(workspace.run(&["run", "buff"]), 0);
    assert_eq!(
        read(&workspace.document("units")),
        "<unit id=\"a\" hp=\"20\" />\n<unit id=\"b\" hp=\"5\" />"
    );
}

#[test]
fn run_uses_constants_from_the_same_script() {
    let workspace = Workspace::new("run-const");
    write_file(
        &workspace.scripts.join("buff").join("index.mml"),
        "const hp = 20\nfile 'units' { all 'unit' { set 'hp' = hp } }",
    );
    write_file(&workspace.document("units"), "<unit hp=\"1\" /><unit hp=\"2\" />");

    assert_eq!(workspace.run(&["run", "buff"]), 0);
    assert_eq!(
        read(&workspace.document("units")),
        "<unit hp=\"20\" />\n<unit hp=\"20\" />"
    );
}

#[test]
fn run_reports_unknown_scripts_and_missing_dirs() {
    let workspace = Workspace::new("run-missing");
    assert_eq!(workspace.run(&["run", "nothing"]), 1);

    fs::create_dir_all(&workspace.scripts).expect("scripts dir");
    assert_eq!(workspace.run(&["run", "nothing"]), 1);
}

#[test]
fn runtime_errors_exit_non_zero_and_leave_documents_untouched() {
    let workspace = Workspace::new("run-error");
    write_file(
        &workspace.scripts.join("bad").join("index.mml"),
        "file 'units' { set 'hp' = '{missing}' }",
    );
    write_file(&workspace.document("units"), "<unit hp=\"1\" />");

    assert_eq!(workspace.run(&["run", "bad"]), 1);
    assert_eq!(read(&workspace.document("units")), "<unit hp=\"1\" />");
}

#[test]
fn exec_resolves_includes_next_to_the_file() {
    let workspace = Workspace::new("exec");
    let dir = workspace.scripts.join("loose");
    write_file(
        &dir.join("patch.mml"),
        "include shared\nconst v = 3\nfile 'doc' { change 'list' { add 'item' { set 'v' = v } } }",
    );
    write_file(
        &dir.join("shared.mml"),
        "file 'doc' { change 'list' { set 'size' = 1 } }",
    );
    write_file(&workspace.document("doc"), "<list />");

    let file = dir.join("patch.mml");
    assert_eq!(workspace.run(&["exec", file.to_string_lossy().as_ref()]), 0);
    assert_eq!(
        read(&workspace.document("doc")),
        "<list size=\"1\">\n  <item v=\"3\" />\n</list>"
    );
}

#[test]
fn check_and_tokens_do_not_touch_documents() {
    let workspace = Workspace::new("check");
    let file = workspace.scripts.join("check.mml");
    write_file(&file, "file 'doc' { set 'a' = 1 }");
    let file = file.to_string_lossy().to_string();

    assert_eq!(workspace.run(&["check", &file]), 0);
    assert_eq!(workspace.run(&["tokens", &file]), 0);
    assert!(!workspace.document("doc").exists());

    write_file(Path::new(&file), "file 'doc' {");
    assert_eq!(workspace.run(&["check", &file]), 1);
    write_file(Path::new(&file), "'open");
    assert_eq!(workspace.run(&["tokens", &file]), 1);
}

#[test]
fn new_then_list_round_trips_through_the_repository() {
    let workspace = Workspace::new("new-list");
    assert_eq!(
        workspace.run(&["new", "fresh", "--description", "A fresh script"]),
        0
    );
    assert!(workspace.scripts.join("fresh").join("index.mml").is_file());
    assert_eq!(workspace.run(&["new", "fresh"]), 1);

    let scripts = list_scripts(&workspace.scripts).expect("list should pass");
    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts[0].description.as_deref(), Some("A fresh script"));
    assert_eq!(workspace.run(&["list"]), 0);
    assert_eq!(workspace.run(&["run", "fresh"]), 0);
}

#[test]
fn invalid_arguments_use_clap_exit_code() {
    assert_eq!(run_cli_from_args(["mml", "unknown-command"]), 2);
    assert_eq!(run_cli_from_args(["mml", "run"]), 2);
}
