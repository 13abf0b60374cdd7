mod common;

use common::TestLibrary;
use predicates::prelude::*;

fn hrefs(lib: &TestLibrary, book: &str) -> Vec<(usize, String)> {
    lib.outline(book)
        .into_iter()
        .map(|(depth, _, href)| (depth, href))
        .collect()
}

fn shape(pairs: &[(usize, &str)]) -> Vec<(usize, String)> {
    pairs.iter().map(|(d, h)| (*d, h.to_string())).collect()
}

#[test]
fn test_toc_show() {
    let lib = TestLibrary::new();
    let id = lib.import_manuscript();
    lib.cmd()
        .args(["toc", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("- Prologue [1]"))
        .stdout(predicate::str::contains("- Chapter 3 The End [4]"));
}

#[test]
fn test_toc_show_json() {
    let lib = TestLibrary::new();
    let id = lib.import_manuscript();
    let v = lib.json(&["toc", "show", &id]);
    assert_eq!(v.as_array().unwrap().len(), 4);
    assert_eq!(v[1]["label"], "Chapter 1 The Start");
    assert_eq!(v[1]["href"], "2");
    assert!(v[1].get("subitems").is_none());
}

#[test]
fn test_toc_show_depth_limit() {
    let lib = TestLibrary::new();
    let id = lib.import_manuscript();
    lib.cmd().args(["toc", "demote", &id, "3"]).assert().success();
    lib.cmd()
        .args(["toc", "show", &id, "--depth", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Chapter 1 The Start"))
        .stdout(predicate::str::contains("Chapter 2 The Middle").not());
}

#[test]
fn test_toc_demote_and_promote() {
    let lib = TestLibrary::new();
    let id = lib.import_manuscript();

    lib.cmd()
        .args(["toc", "demote", &id, "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Demoted 3"));
    assert_eq!(
        hrefs(&lib, &id),
        shape(&[(0, "1"), (0, "2"), (1, "3"), (0, "4")])
    );

    lib.cmd().args(["toc", "demote", &id, "4"]).assert().success();
    assert_eq!(
        hrefs(&lib, &id),
        shape(&[(0, "1"), (0, "2"), (1, "3"), (1, "4")])
    );

    lib.cmd().args(["toc", "promote", &id, "3"]).assert().success();
    assert_eq!(
        hrefs(&lib, &id),
        shape(&[(0, "1"), (0, "2"), (1, "4"), (0, "3")])
    );
}

#[test]
fn test_toc_noop_reports_unchanged() {
    let lib = TestLibrary::new();
    let id = lib.import_manuscript();
    let before = hrefs(&lib, &id);

    lib.cmd()
        .args(["toc", "demote", &id, "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));
    lib.cmd()
        .args(["toc", "promote", &id, "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));
    lib.cmd()
        .args(["toc", "down", &id, "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));

    let v = lib.json(&["toc", "up", &id, "1"]);
    assert_eq!(v["changed"], false);
    assert_eq!(hrefs(&lib, &id), before);
}

#[test]
fn test_toc_up_and_down() {
    let lib = TestLibrary::new();
    let id = lib.import_manuscript();

    lib.cmd().args(["toc", "up", &id, "2"]).assert().success();
    assert_eq!(
        hrefs(&lib, &id),
        shape(&[(0, "2"), (0, "1"), (0, "3"), (0, "4")])
    );

    lib.cmd().args(["toc", "down", &id, "2"]).assert().success();
    lib.cmd().args(["toc", "down", &id, "2"]).assert().success();
    assert_eq!(
        hrefs(&lib, &id),
        shape(&[(0, "1"), (0, "3"), (0, "2"), (0, "4")])
    );
}

#[test]
fn test_toc_move() {
    let lib = TestLibrary::new();
    let id = lib.import_manuscript();
    lib.cmd().args(["toc", "demote", &id, "3"]).assert().success();

    // 2 carries its child 3 along
    let v = lib.json(&["toc", "move", &id, "2", "4"]);
    assert_eq!(v["changed"], true);
    assert_eq!(
        hrefs(&lib, &id),
        shape(&[(0, "1"), (0, "4"), (0, "2"), (1, "3")])
    );

    // into its own subtree: refused, nothing changes
    lib.cmd()
        .args(["toc", "move", &id, "2", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));
    assert_eq!(
        hrefs(&lib, &id),
        shape(&[(0, "1"), (0, "4"), (0, "2"), (1, "3")])
    );

    lib.cmd().args(["toc", "move", &id, "1", "3"]).assert().success();
    assert_eq!(
        hrefs(&lib, &id),
        shape(&[(0, "4"), (0, "2"), (1, "3"), (1, "1")])
    );
}

#[test]
fn test_toc_rename() {
    let lib = TestLibrary::new();
    let id = lib.import_manuscript();
    lib.cmd()
        .args(["toc", "rename", &id, "2", "Opening"])
        .assert()
        .success();
    let outline = lib.outline(&id);
    assert_eq!(outline[1].1, "Opening");
}

#[test]
fn test_toc_remove_takes_subtree() {
    let lib = TestLibrary::new();
    let id = lib.import_manuscript();
    lib.cmd().args(["toc", "demote", &id, "3"]).assert().success();
    lib.cmd()
        .args(["toc", "remove", &id, "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2"));
    assert_eq!(hrefs(&lib, &id), shape(&[(0, "1"), (0, "4")]));
}

#[test]
fn test_toc_unknown_href() {
    let lib = TestLibrary::new();
    let id = lib.import_manuscript();
    let before = hrefs(&lib, &id);
    lib.cmd()
        .args(["toc", "promote", &id, "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("chapter 99"));
    lib.cmd()
        .args(["toc", "move", &id, "1", "99"])
        .assert()
        .failure();
    assert_eq!(hrefs(&lib, &id), before);
}

#[test]
fn test_toc_unknown_book() {
    let lib = TestLibrary::new();
    lib.cmd().args(["toc", "show", "7"]).assert().failure();
}
