use super::*;
use git2::{Oid, Repository};
use std::fs::{self, File};
use std::io::Write as _;
use std::path::Path;

struct TestRepo {
    tempdir: tempfile::TempDir,
    repo: Repository,
}

impl TestRepo {
    fn new() -> Self {
        let tempdir = tempfile::TempDir::new().expect("tempdir");
        let repo = Repository::init(tempdir.path()).expect("init repo");
        let _ = repo.config().and_then(|mut c| {
            c.set_str("user.name", "Tester")?;
            c.set_str("user.email", "tester@example.com")
        });
        Self { tempdir, repo }
    }

    fn repo(&self) -> &Repository {
        &self.repo
    }

    fn write(&self, rel: &str, contents: &[u8]) {
        let path = self.tempdir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(path).unwrap();
        f.write_all(contents).unwrap();
        f.sync_all().unwrap();
    }

    fn stage(&self, rel: &str) {
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(rel)).unwrap();
        index.write().unwrap();
    }

    fn commit(&self, message: &str) -> Oid {
        let mut index = self.repo.index().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = self.repo.signature().unwrap();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.as_ref().into_iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }
}

#[test]
fn staged_files_reports_new_and_modified_with_parent_blobs() {
    let t = TestRepo::new();
    t.write("keep.txt", b"base\n");
    t.stage("keep.txt");
    t.commit("base");

    t.write("keep.txt", b"base\nmore\n");
    t.write("fresh.txt", b"new file\n");
    t.stage("keep.txt");
    t.stage("fresh.txt");

    let mut staged = staged_files(t.repo()).unwrap();
    staged.sort_by(|a, b| a.path.cmp(&b.path));

    assert_eq!(staged.len(), 2);
    assert_eq!(staged[0].path, "fresh.txt");
    assert_eq!(staged[0].staged.as_deref(), Some("new file\n"));
    assert!(staged[0].parent.is_none());

    assert_eq!(staged[1].path, "keep.txt");
    assert_eq!(staged[1].staged.as_deref(), Some("base\nmore\n"));
    assert_eq!(staged[1].parent.as_deref(), Some("base\n"));
}

#[test]
fn staged_files_marks_binary_blobs_unreadable() {
    let t = TestRepo::new();
    t.write("blob.bin", &[0u8, 159, 146, 150, 0, 1]);
    t.stage("blob.bin");

    let staged = staged_files(t.repo()).unwrap();
    assert_eq!(staged.len(), 1);
    assert!(staged[0].staged.is_none());
}

#[test]
fn staged_files_ignores_unstaged_worktree_changes() {
    let t = TestRepo::new();
    t.write("a.txt", b"1\n");
    t.stage("a.txt");
    t.commit("base");

    t.write("a.txt", b"1\n2\n");
    assert!(staged_files(t.repo()).unwrap().is_empty());
}

#[test]
fn read_blob_at_walks_the_commit_tree() {
    let t = TestRepo::new();
    t.write("dir/inner.txt", b"one\ntwo\n");
    t.stage("dir/inner.txt");
    let commit = t.commit("base");

    assert_eq!(
        read_blob_at(t.repo(), commit, "dir/inner.txt").unwrap(),
        Some("one\ntwo\n".to_string())
    );
    assert_eq!(read_blob_at(t.repo(), commit, "missing.txt").unwrap(), None);
}

#[test]
fn commits_between_is_first_parent_oldest_first() {
    let t = TestRepo::new();
    t.write("f.txt", b"0\n");
    t.stage("f.txt");
    let base = t.commit("c0");

    t.write("f.txt", b"1\n");
    t.stage("f.txt");
    let c1 = t.commit("c1");

    t.write("f.txt", b"2\n");
    t.stage("f.txt");
    let c2 = t.commit("c2");

    assert_eq!(commits_between(t.repo(), base, c2).unwrap(), vec![c1, c2]);
    assert!(commits_between(t.repo(), base, base).unwrap().is_empty());
    assert!(commits_between(t.repo(), c2, base).is_err());
}

#[test]
fn tree_diff_hunks_are_zero_context() {
    let t = TestRepo::new();
    t.write("f.txt", b"1\n2\n3\n4\n5\n");
    t.stage("f.txt");
    let before = t.commit("before");

    t.write("f.txt", b"1\n2\nX\n4\n5\n6\n");
    t.stage("f.txt");
    let after = t.commit("after");

    let old_tree = t.repo().find_commit(before).unwrap().tree().unwrap();
    let new_tree = t.repo().find_commit(after).unwrap().tree().unwrap();
    let diffs = tree_diff_hunks(t.repo(), Some(&old_tree), Some(&new_tree)).unwrap();

    let hunks = &diffs["f.txt"];
    assert_eq!(hunks.len(), 2);
    assert_eq!((hunks[0].old_start, hunks[0].old_len), (3, 1));
    assert_eq!((hunks[0].new_start, hunks[0].new_len), (3, 1));
    assert_eq!(hunks[1].old_len, 0);
    assert_eq!(hunks[1].new_len, 1);
}

#[test]
fn tree_diff_marks_deleted_files_as_fully_replaced() {
    let t = TestRepo::new();
    t.write("gone.txt", b"a\nb\n");
    t.stage("gone.txt");
    let before = t.commit("before");

    let mut index = t.repo().index().unwrap();
    index.remove_path(Path::new("gone.txt")).unwrap();
    index.write().unwrap();
    let after = t.commit("after");

    let old_tree = t.repo().find_commit(before).unwrap().tree().unwrap();
    let new_tree = t.repo().find_commit(after).unwrap().tree().unwrap();
    let diffs = tree_diff_hunks(t.repo(), Some(&old_tree), Some(&new_tree)).unwrap();

    let hunks = &diffs["gone.txt"];
    assert!(
        hunks
            .iter()
            .any(|h| h.old_start == 1 && h.new_len == 0 && h.old_len >= 2)
    );
}

#[test]
fn notes_round_trip_and_force_overwrite() {
    let t = TestRepo::new();
    t.write("f.txt", b"x\n");
    t.stage("f.txt");
    let commit = t.commit("base");

    let notes_ref = "refs/notes/claude-was-here";
    assert_eq!(notes::read(t.repo(), notes_ref, commit).unwrap(), None);

    notes::write(t.repo(), notes_ref, commit, "{\"v\":1}").unwrap();
    assert_eq!(
        notes::read(t.repo(), notes_ref, commit).unwrap().as_deref(),
        Some("{\"v\":1}")
    );

    notes::write(t.repo(), notes_ref, commit, "{\"v\":2}").unwrap();
    assert_eq!(
        notes::read(t.repo(), notes_ref, commit).unwrap().as_deref(),
        Some("{\"v\":2}")
    );

    let listed = notes::list(t.repo(), notes_ref).unwrap();
    assert_eq!(listed, vec![(commit, "{\"v\":2}".to_string())]);
    assert!(notes::list(t.repo(), "refs/notes/never-written").unwrap().is_empty());
}

#[test]
fn resolve_commit_accepts_head_and_ids() {
    let t = TestRepo::new();
    t.write("f.txt", b"x\n");
    t.stage("f.txt");
    let commit = t.commit("base");

    assert_eq!(resolve_commit(t.repo(), "HEAD").unwrap(), commit);
    assert_eq!(
        resolve_commit(t.repo(), &commit.to_string()).unwrap(),
        commit
    );
    assert!(resolve_commit(t.repo(), "does-not-exist").is_err());
}
