//! Integration tests for publishing memory branches.
//!
//! Each test gets a working repository whose `origin` is a bare repository
//! in another temporary directory.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use membranch::core::config::{Config, Settings};
use membranch::core::types::BranchName;
use membranch::git::{CommandRunner, RepoContext};
use membranch::memory::{
    FixedClock, MemoryError, MemoryFacade, PublishStatus, PushError, PushGuard, PushOptions,
    PushOutcome,
};

/// A working repository plus its bare `origin`.
struct TestRemote {
    work: TempDir,
    bare: TempDir,
}

impl TestRemote {
    fn new() -> Self {
        let bare = TempDir::new().expect("failed to create temp dir");
        run_git(bare.path(), &["init", "--bare", "-b", "main"]);

        let work = TempDir::new().expect("failed to create temp dir");
        init_work(work.path());
        run_git(
            work.path(),
            &["remote", "add", "origin", bare.path().to_str().unwrap()],
        );

        Self { work, bare }
    }

    /// A second working repository sharing the same origin.
    fn second_clone(&self) -> TempDir {
        let other = TempDir::new().expect("failed to create temp dir");
        init_work(other.path());
        run_git(
            other.path(),
            &["remote", "add", "origin", self.bare.path().to_str().unwrap()],
        );
        other
    }

    fn settings() -> Settings {
        let mut settings = Config::default().settings().unwrap();
        settings.list_remote = false;
        settings
    }

    fn memory(&self) -> MemoryFacade {
        memory_at(self.work.path(), Self::settings())
    }

    fn remote_tip(&self, branch: &str) -> Option<String> {
        let repo = git2::Repository::open_bare(self.bare.path()).unwrap();
        repo.refname_to_id(&format!("refs/heads/{}", branch))
            .ok()
            .map(|oid| oid.to_string())
    }
}

fn init_work(dir: &Path) {
    run_git(dir, &["init", "-b", "main"]);
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test User"]);
    std::fs::write(dir.join("README.md"), "# Project\n").unwrap();
    run_git(dir, &["add", "README.md"]);
    run_git(dir, &["commit", "-m", "Initial commit"]);
}

fn memory_at(dir: &Path, settings: Settings) -> MemoryFacade {
    let clock = FixedClock::from_unix(1_700_000_000).unwrap();
    MemoryFacade::with_settings(dir, settings, Box::new(clock)).unwrap()
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

// =============================================================================
// Safety rules
// =============================================================================

#[test]
fn protected_branch_force_is_always_refused() {
    let remote = TestRemote::new();
    let runner = CommandRunner::new(RepoContext::new(remote.work.path())).unwrap();
    let guard = PushGuard::new(&runner, "origin", vec!["main".into(), "master".into()]);
    let main = BranchName::new("main").unwrap();

    let err = guard.safe_push(&main, PushOptions::forced()).unwrap_err();
    assert!(matches!(err, PushError::ProtectedBranch { .. }));
    assert!(remote.remote_tip("main").is_none(), "nothing may be sent");
}

#[test]
fn configured_protected_memory_branch() {
    let remote = TestRemote::new();
    let mut settings = TestRemote::settings();
    settings.protected_branches = vec!["memory/main".into()];
    let memory = memory_at(remote.work.path(), settings);
    memory.try_persist("x", "a/b.md", None, None).unwrap();

    let err = memory.try_push(None, PushOptions::forced()).unwrap_err();
    assert!(matches!(
        err,
        MemoryError::Push(PushError::ProtectedBranch { .. })
    ));
    assert!(!memory.push(None, PushOptions::forced()));

    // A normal push of the same branch is fine.
    assert!(memory.push(None, PushOptions::default()));
}

#[test]
fn facade_refuses_force_push_of_protected_name() {
    let remote = TestRemote::new();
    let memory = remote.memory();
    memory.try_persist("x", "a/b.md", None, None).unwrap();

    // "main" would otherwise be rewritten to memory/main and force-pushed.
    let err = memory
        .try_push(Some("main"), PushOptions::forced())
        .unwrap_err();
    assert!(matches!(
        err,
        MemoryError::Push(PushError::ProtectedBranch { .. })
    ));
    assert!(!memory.push(Some("master"), PushOptions::forced()));
    assert!(remote.remote_tip("memory/main").is_none());
    assert!(remote.remote_tip("main").is_none());

    // Without force the same request publishes the memory branch.
    assert!(memory.push(Some("main"), PushOptions::default()));
    assert!(remote.remote_tip("memory/main").is_some());
}

#[test]
fn force_without_confirmation_is_refused() {
    let remote = TestRemote::new();
    let memory = remote.memory();
    memory.try_persist("x", "a/b.md", None, None).unwrap();

    let options = PushOptions {
        force: true,
        explicit_force: false,
    };
    let err = memory.try_push(None, options).unwrap_err();
    assert!(matches!(
        err,
        MemoryError::Push(PushError::ForceNotConfirmed { .. })
    ));
    assert!(remote.remote_tip("memory/main").is_none());
}

#[test]
fn missing_local_branch() {
    let remote = TestRemote::new();
    let err = remote
        .memory()
        .try_push(Some("never-written"), PushOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        MemoryError::Push(PushError::BranchNotFound { .. })
    ));
}

#[test]
fn missing_remote() {
    let remote = TestRemote::new();
    run_git(remote.work.path(), &["remote", "remove", "origin"]);
    let memory = remote.memory();
    memory.try_persist("x", "a/b.md", None, None).unwrap();

    let err = memory.try_push(None, PushOptions::default()).unwrap_err();
    assert!(matches!(err, MemoryError::Push(PushError::NoRemote { .. })));
}

// =============================================================================
// Publishing
// =============================================================================

#[test]
fn first_push_sets_upstream() {
    let remote = TestRemote::new();
    let memory = remote.memory();
    let receipt = memory.try_persist("hello", "a/b.md", None, None).unwrap();

    let outcome = memory.try_push(None, PushOptions::default()).unwrap();
    match outcome {
        PushOutcome::Pushed {
            set_upstream,
            forced,
            commit,
            ..
        } => {
            assert!(set_upstream);
            assert!(!forced);
            assert_eq!(commit, receipt.commit);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert_eq!(
        remote.remote_tip("memory/main").as_deref(),
        Some(receipt.commit.as_str())
    );
    assert_eq!(
        git_output(remote.work.path(), &["config", "branch.memory/main.remote"]),
        "origin"
    );
}

#[test]
fn fast_forward_push_and_up_to_date() {
    let remote = TestRemote::new();
    let memory = remote.memory();
    memory.try_persist("one", "a/one.md", None, None).unwrap();
    memory.try_push(None, PushOptions::default()).unwrap();

    let second = memory.try_persist("two", "a/two.md", None, None).unwrap();
    match memory.try_push(None, PushOptions::default()).unwrap() {
        PushOutcome::Pushed { set_upstream, .. } => assert!(!set_upstream),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        remote.remote_tip("memory/main").as_deref(),
        Some(second.commit.as_str())
    );

    assert!(matches!(
        memory.try_push(None, PushOptions::default()).unwrap(),
        PushOutcome::UpToDate { .. }
    ));
}

#[test]
fn diverged_upstream_is_refused_without_pushing() {
    let remote = TestRemote::new();
    let memory = remote.memory();
    memory.try_persist("base", "a/base.md", None, None).unwrap();
    memory.try_push(None, PushOptions::default()).unwrap();

    // Someone else publishes an unrelated history for the same branch.
    let other_dir = remote.second_clone();
    let other = memory_at(other_dir.path(), TestRemote::settings());
    other.try_persist("theirs", "b/theirs.md", None, None).unwrap();
    other.try_push(None, PushOptions::forced()).unwrap();
    let theirs = remote.remote_tip("memory/main").unwrap();

    memory.try_persist("ours", "a/ours.md", None, None).unwrap();
    let err = memory.try_push(None, PushOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        MemoryError::Push(PushError::UpstreamDiverged { .. })
    ));
    assert!(err.to_string().contains("pull first"));
    assert_eq!(remote.remote_tip("memory/main"), Some(theirs));
}

#[test]
fn confirmed_force_overrides_divergence() {
    let remote = TestRemote::new();
    let memory = remote.memory();
    memory.try_persist("base", "a/base.md", None, None).unwrap();
    memory.try_push(None, PushOptions::default()).unwrap();

    let other_dir = remote.second_clone();
    let other = memory_at(other_dir.path(), TestRemote::settings());
    other.try_persist("theirs", "b/theirs.md", None, None).unwrap();
    other.try_push(None, PushOptions::forced()).unwrap();

    let ours = memory.try_persist("ours", "a/ours.md", None, None).unwrap();
    match memory.try_push(None, PushOptions::forced()).unwrap() {
        PushOutcome::Pushed { forced, .. } => assert!(forced),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        remote.remote_tip("memory/main").as_deref(),
        Some(ours.commit.as_str())
    );
}

#[test]
fn auto_push_publishes_on_persist() {
    let remote = TestRemote::new();
    let memory = remote.memory().with_auto_push(true);

    let receipt = memory.try_persist("hello", "a/b.md", None, None).unwrap();
    assert_eq!(receipt.publish, PublishStatus::Published);
    assert_eq!(
        remote.remote_tip("memory/main").as_deref(),
        Some(receipt.commit.as_str())
    );
}

#[test]
fn publish_failure_keeps_local_commit() {
    let remote = TestRemote::new();
    run_git(remote.work.path(), &["remote", "remove", "origin"]);
    let memory = remote.memory().with_auto_push(true);

    let receipt = memory.try_persist("hello", "a/b.md", None, None).unwrap();
    assert!(matches!(receipt.publish, PublishStatus::Failed(_)));
    assert_eq!(memory.read("a/b.md", None).as_deref(), Some("hello"));
    assert!(memory.persist("again", "a/c.md", None, None));
}

// =============================================================================
// Listing across remotes
// =============================================================================

#[test]
fn list_branches_merges_remote_branches_without_duplicates() {
    let remote = TestRemote::new();
    let memory = remote.memory();
    memory.try_persist("x", "a/b.md", Some("shared"), None).unwrap();
    memory.try_push(Some("shared"), PushOptions::default()).unwrap();

    let other_dir = remote.second_clone();
    let other = memory_at(other_dir.path(), TestRemote::settings());
    other.try_persist("y", "a/b.md", Some("theirs"), None).unwrap();
    other.try_push(Some("theirs"), PushOptions::default()).unwrap();

    // Without live listing only local and tracking refs count.
    assert_eq!(memory.list_branches(), vec!["memory/shared"]);

    let mut settings = TestRemote::settings();
    settings.list_remote = true;
    let live = memory_at(remote.work.path(), settings);
    assert_eq!(live.list_branches(), vec!["memory/shared", "memory/theirs"]);

    run_git(remote.work.path(), &["fetch", "origin"]);
    assert_eq!(memory.list_branches(), vec!["memory/shared", "memory/theirs"]);
}

#[test]
fn unreachable_remote_does_not_break_listing() {
    let remote = TestRemote::new();
    run_git(
        remote.work.path(),
        &["remote", "set-url", "origin", "/nonexistent/membranch/remote.git"],
    );
    let mut settings = TestRemote::settings();
    settings.list_remote = true;
    let memory = memory_at(remote.work.path(), settings);
    memory.try_persist("x", "a/b.md", None, None).unwrap();

    assert_eq!(memory.try_list_branches().unwrap(), vec!["memory/main"]);
}
