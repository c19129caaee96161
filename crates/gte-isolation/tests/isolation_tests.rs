use git2::{Repository, RepositoryInitOptions, Signature};
use gte_isolation::{IsolationManager, IsolationSettings};
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

fn init_repo(files: &[(&str, &str)]) -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(dir.path(), &opts).unwrap();
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).unwrap();
    }
    {
        let mut index = repo.index().unwrap();
        for (name, _) in files {
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Dev", "dev@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }
    (dir, repo)
}

fn manager(dir: &TempDir) -> IsolationManager {
    IsolationManager::open(dir.path(), IsolationSettings::default()).unwrap()
}

fn read(dir: &TempDir, name: &str) -> String {
    std::fs::read_to_string(dir.path().join(name)).unwrap()
}

#[test]
fn branch_is_created_from_head_and_checked_out() {
    let (dir, _repo) = init_repo(&[("app.py", "x = 1\n")]);
    let mgr = manager(&dir);

    let branch = mgr.create_isolation_branch("src/app.py:E501:3").unwrap();

    assert!(branch.starts_with("gte/patch-src-app.py-E501-3-"), "{branch}");
    assert_eq!(mgr.current_branch().unwrap(), branch);
}

#[test]
fn same_second_branches_get_unique_names() {
    let (dir, _repo) = init_repo(&[("app.py", "x = 1\n")]);
    let mgr = manager(&dir);

    let first = mgr.create_isolation_branch("t1").unwrap();
    mgr.checkout("main").unwrap();
    let second = mgr.create_isolation_branch("t1").unwrap();

    assert_ne!(first, second);
}

#[test]
fn commit_stages_only_listed_files() {
    let (dir, repo) = init_repo(&[("a.py", "a = 1\n"), ("b.py", "b = 1\n")]);
    let mgr = manager(&dir);
    std::fs::write(dir.path().join("a.py"), "a = 2\n").unwrap();
    std::fs::write(dir.path().join("b.py"), "b = 2\n").unwrap();

    let sha = mgr
        .commit(&[dir.path().join("a.py")], "task-7", "fix lint in a.py")
        .unwrap();

    let commit = repo.find_commit(git2::Oid::from_str(&sha).unwrap()).unwrap();
    assert_eq!(commit.author().name(), Some("GTE Bot"));
    assert_eq!(commit.author().email(), Some("bot@gte.local"));
    assert_eq!(
        commit.message(),
        Some("[gte] fix lint in a.py\n\nTask-Id: task-7")
    );

    let tree = commit.tree().unwrap();
    let blob = |name: &str| {
        let entry = tree.get_name(name).unwrap();
        let blob = repo.find_blob(entry.id()).unwrap();
        String::from_utf8(blob.content().to_vec()).unwrap()
    };
    assert_eq!(blob("a.py"), "a = 2\n");
    assert_eq!(blob("b.py"), "b = 1\n");
}

#[test]
fn previously_staged_changes_stay_out_of_the_commit() {
    let (dir, repo) = init_repo(&[("a.py", "a = 1\n"), ("b.py", "b = 1\n")]);
    let mgr = manager(&dir);
    std::fs::write(dir.path().join("b.py"), "b = 2\n").unwrap();
    {
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("b.py")).unwrap();
        index.write().unwrap();
    }
    std::fs::write(dir.path().join("a.py"), "a = 2\n").unwrap();

    let sha = mgr
        .commit(&[dir.path().join("a.py")], "task-8", "fix a.py")
        .unwrap();

    let commit = repo.find_commit(git2::Oid::from_str(&sha).unwrap()).unwrap();
    let tree = commit.tree().unwrap();
    let blob = |name: &str| {
        let entry = tree.get_name(name).unwrap();
        let blob = repo.find_blob(entry.id()).unwrap();
        String::from_utf8(blob.content().to_vec()).unwrap()
    };
    assert_eq!(blob("a.py"), "a = 2\n");
    assert_eq!(blob("b.py"), "b = 1\n");
    // the unrelated edit survives in the working tree
    assert_eq!(read(&dir, "b.py"), "b = 2\n");
}

#[test]
fn revert_preserves_history() {
    let (dir, repo) = init_repo(&[("app.py", "x = 1\n")]);
    let mgr = manager(&dir);
    std::fs::write(dir.path().join("app.py"), "x = 2\n").unwrap();
    let sha = mgr.commit(&[dir.path().join("app.py")], "t", "bump").unwrap();

    assert!(mgr.revert(&sha, "validation failed"));

    assert_eq!(read(&dir, "app.py"), "x = 1\n");
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.parent_id(0).unwrap().to_string(), sha);
    assert!(head.message().unwrap().contains("Reason: validation failed"));
}

#[test]
fn conflicting_revert_returns_false_and_changes_nothing() {
    let (dir, _repo) = init_repo(&[("app.py", "x = 1\n")]);
    let mgr = manager(&dir);
    std::fs::write(dir.path().join("app.py"), "x = 2\n").unwrap();
    let first = mgr.commit(&[dir.path().join("app.py")], "t1", "two").unwrap();
    std::fs::write(dir.path().join("app.py"), "x = 3\n").unwrap();
    let second = mgr.commit(&[dir.path().join("app.py")], "t2", "three").unwrap();

    assert!(!mgr.revert(&first, "undo"));

    assert_eq!(mgr.head_id().unwrap(), second);
    assert_eq!(read(&dir, "app.py"), "x = 3\n");
}

#[test]
fn revert_of_unknown_commit_returns_false() {
    let (dir, _repo) = init_repo(&[("app.py", "x = 1\n")]);
    assert!(!manager(&dir).revert("deadbeef", "nope"));
}

#[test]
fn merge_creates_merge_commit_and_deletes_branch() {
    let (dir, repo) = init_repo(&[("app.py", "x = 1\n"), ("other.py", "y = 1\n")]);
    let mgr = manager(&dir);

    let branch = mgr.create_isolation_branch("t1").unwrap();
    std::fs::write(dir.path().join("app.py"), "x = 2\n").unwrap();
    let patch = mgr.commit(&[dir.path().join("app.py")], "t1", "fix").unwrap();

    mgr.checkout("main").unwrap();
    std::fs::write(dir.path().join("other.py"), "y = 2\n").unwrap();
    mgr.commit(&[dir.path().join("other.py")], "t0", "main work").unwrap();

    assert!(mgr.merge_to(&branch, "main"));

    assert_eq!(mgr.current_branch().unwrap(), "main");
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.parent_count(), 2);
    assert_eq!(head.parent_id(1).unwrap().to_string(), patch);
    assert_eq!(read(&dir, "app.py"), "x = 2\n");
    assert_eq!(read(&dir, "other.py"), "y = 2\n");
    assert!(repo.find_branch(&branch, git2::BranchType::Local).is_err());
}

#[test]
fn conflicting_merge_returns_false_and_keeps_branch() {
    let (dir, repo) = init_repo(&[("app.py", "x = 1\n")]);
    let mgr = manager(&dir);

    let branch = mgr.create_isolation_branch("t1").unwrap();
    std::fs::write(dir.path().join("app.py"), "x = 2\n").unwrap();
    mgr.commit(&[dir.path().join("app.py")], "t1", "branch edit").unwrap();

    mgr.checkout("main").unwrap();
    std::fs::write(dir.path().join("app.py"), "x = 3\n").unwrap();
    let main_head = mgr.commit(&[dir.path().join("app.py")], "t0", "main edit").unwrap();

    assert!(!mgr.merge_to(&branch, "main"));

    assert_eq!(mgr.head_id().unwrap(), main_head);
    assert_eq!(read(&dir, "app.py"), "x = 3\n");
    assert!(repo.find_branch(&branch, git2::BranchType::Local).is_ok());
}

#[test]
fn merge_into_missing_target_returns_false() {
    let (dir, _repo) = init_repo(&[("app.py", "x = 1\n")]);
    let mgr = manager(&dir);
    let branch = mgr.create_isolation_branch("t1").unwrap();
    assert!(!mgr.merge_to(&branch, "release"));
}

#[test]
fn restore_file_discards_working_changes() {
    let (dir, _repo) = init_repo(&[("app.py", "x = 1\n")]);
    let mgr = manager(&dir);
    std::fs::write(dir.path().join("app.py"), "garbage(\n").unwrap();

    mgr.restore_file(&dir.path().join("app.py")).unwrap();

    assert_eq!(read(&dir, "app.py"), "x = 1\n");
}

#[test]
fn paths_outside_the_tree_are_rejected() {
    let (dir, _repo) = init_repo(&[("app.py", "x = 1\n")]);
    let other = TempDir::new().unwrap();
    let mgr = manager(&dir);
    assert!(mgr.relative_path(&other.path().join("x.py")).is_err());
}

#[test]
fn open_outside_a_repository_fails() {
    let dir = TempDir::new().unwrap();
    assert!(IsolationManager::open(dir.path(), IsolationSettings::default()).is_err());
}
