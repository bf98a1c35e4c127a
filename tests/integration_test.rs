use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use parfind::{
    search, CancelToken, DispatchMode, Entry, EntrySource, FoundBatch, FsEntrySource, Listing,
    ParfindError, SearchOutcome, SearchTarget, SessionState,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn write_file(path: &Path) {
    fs::write(path, "").unwrap();
}

/// Batches as delivered, one inner vec per emission.
type Batches = Arc<Mutex<Vec<Vec<Entry>>>>;

fn new_batches() -> Batches {
    Arc::new(Mutex::new(Vec::new()))
}

/// A found handler that records every batch.
fn collecting(
    batches: &Batches,
) -> impl Fn(FoundBatch) -> Result<(), ParfindError> + Send + Sync + 'static {
    let sink = Arc::clone(batches);
    move |batch| {
        sink.lock().unwrap().push(batch.entries);
        Ok(())
    }
}

fn collected_paths(batches: &Batches) -> BTreeSet<PathBuf> {
    batches
        .lock()
        .unwrap()
        .iter()
        .flatten()
        .map(|entry| entry.path.clone())
        .collect()
}

fn assert_batches_well_formed(batches: &Batches) {
    for batch in batches.lock().unwrap().iter() {
        assert!(!batch.is_empty(), "empty batch was delivered");
        let parent = batch[0].path.parent().map(Path::to_path_buf);
        assert!(
            batch.iter().all(|e| e.path.parent().map(Path::to_path_buf) == parent),
            "batch mixes entries from different directory levels"
        );
    }
}

/// A deep fixture: `depth` levels of 3 subdirectories, 2 `.txt` files and one
/// `.log` file per directory.
fn grow_tree(dir: &Path, depth: usize) {
    write_file(&dir.join("one.txt"));
    write_file(&dir.join("two.txt"));
    write_file(&dir.join("noise.log"));
    if depth == 0 {
        return;
    }
    for i in 0..3 {
        let sub = dir.join(format!("d{i}"));
        fs::create_dir(&sub).unwrap();
        grow_tree(&sub, depth - 1);
    }
}

// ---------------------------------------------------------------------------
// Scenario A: flat directory, one batch
// ---------------------------------------------------------------------------

#[test]
fn flat_root_produces_exactly_one_batch() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.txt", "b.txt", "c.txt", "d.log", "e.md"] {
        write_file(&dir.path().join(name));
    }

    let batches = new_batches();
    let session = search()
        .root(dir.path())
        .pattern("*.txt")
        .on_found(collecting(&batches))
        .build()
        .unwrap();

    assert_eq!(session.start().unwrap(), SearchOutcome::Completed);

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 1, "a leaf root emits exactly one batch");
    assert_eq!(batches[0].len(), 3);
}

// ---------------------------------------------------------------------------
// Scenario B: root-level matches plus mixed children
// ---------------------------------------------------------------------------

#[test]
fn mixed_children_emit_per_level_batches() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("root.txt"));
    write_file(&dir.path().join("other.md"));

    let a = dir.path().join("a");
    fs::create_dir(&a).unwrap();
    write_file(&a.join("x.txt"));
    write_file(&a.join("y.txt"));
    write_file(&a.join("z.log"));

    let b = dir.path().join("b");
    fs::create_dir(&b).unwrap();
    write_file(&b.join("nothing.md"));

    let batches = new_batches();
    let session = search()
        .root(dir.path())
        .pattern("*.txt")
        .on_found(collecting(&batches))
        .build()
        .unwrap();

    assert_eq!(session.start().unwrap(), SearchOutcome::Completed);

    assert_batches_well_formed(&batches);
    assert_eq!(
        batches.lock().unwrap().len(),
        2,
        "one batch for the root level, one for `a`, none for `b`"
    );

    let expected: BTreeSet<PathBuf> = [
        dir.path().join("root.txt"),
        a.join("x.txt"),
        a.join("y.txt"),
    ]
    .into_iter()
    .collect();
    assert_eq!(collected_paths(&batches), expected);
}

// ---------------------------------------------------------------------------
// Scenario C: cancellation requested before any work
// ---------------------------------------------------------------------------

#[test]
fn cancel_before_start_is_suppressed_into_outcome() {
    let dir = tempfile::tempdir().unwrap();
    grow_tree(dir.path(), 3);

    let token = CancelToken::new();
    let batches = new_batches();
    let session = search()
        .root(dir.path())
        .pattern("*.txt")
        .cancel_token(token.clone())
        .on_found(collecting(&batches))
        .build()
        .unwrap();

    token.cancel();

    assert_eq!(session.start().unwrap(), SearchOutcome::Canceled);
    assert_eq!(session.state(), SessionState::Canceled);
    assert!(batches.lock().unwrap().is_empty());
}

#[test]
fn cancel_mid_search_surfaces_when_not_suppressed() {
    let dir = tempfile::tempdir().unwrap();
    grow_tree(dir.path(), 3);

    let token = CancelToken::new();
    let seen = Arc::new(AtomicUsize::new(0));

    let trip = Arc::clone(&seen);
    let trip_token = token.clone();
    let session = search()
        .root(dir.path())
        .predicate(move |entry: &Entry| {
            if trip.fetch_add(1, Ordering::SeqCst) >= 5 {
                trip_token.cancel();
            }
            entry.name.ends_with(".txt")
        })
        .cancel_token(token)
        .suppress_cancellation(false)
        .build()
        .unwrap();

    assert!(matches!(session.start(), Err(ParfindError::Canceled)));
    assert_eq!(session.state(), SessionState::Canceled);
}

// ---------------------------------------------------------------------------
// Scenario D: one denied branch among accessible siblings
// ---------------------------------------------------------------------------

struct DenyingSource {
    denied: PathBuf,
}

impl EntrySource for DenyingSource {
    fn list_children(&self, dir: &Path) -> Result<Listing, ParfindError> {
        if dir == self.denied {
            return Err(ParfindError::AccessDenied(dir.to_path_buf()));
        }
        FsEntrySource.list_children(dir)
    }
}

#[test]
fn denied_branch_does_not_disturb_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let mut expected = BTreeSet::new();
    for i in 0..5 {
        let sub = dir.path().join(format!("s{i}"));
        fs::create_dir(&sub).unwrap();
        let file = sub.join(format!("doc{i}.txt"));
        write_file(&file);
        if i != 2 {
            expected.insert(file);
        }
    }

    let batches = new_batches();
    let session = search()
        .root(dir.path())
        .source(DenyingSource {
            denied: dir.path().join("s2"),
        })
        .pattern("*.txt")
        .on_found(collecting(&batches))
        .build()
        .unwrap();

    assert_eq!(session.start().unwrap(), SearchOutcome::Completed);
    assert_eq!(collected_paths(&batches), expected);
    assert_batches_well_formed(&batches);
}

// ---------------------------------------------------------------------------
// Scenario E: multi-root aggregate with one root canceled
// ---------------------------------------------------------------------------

#[test]
fn multi_root_cancel_marks_aggregate_canceled() {
    let first = tempfile::tempdir().unwrap();
    write_file(&first.path().join("keep_a.txt"));
    write_file(&first.path().join("keep_b.txt"));

    let second = tempfile::tempdir().unwrap();
    write_file(&second.path().join("never.txt"));

    let token = CancelToken::new();
    let batches = new_batches();
    let completions = Arc::new(Mutex::new(Vec::new()));

    let cut = second.path().to_path_buf();
    let cut_token = token.clone();
    let completed = Arc::clone(&completions);
    let multi = search()
        .roots([first.path(), second.path()])
        .predicate(move |entry: &Entry| {
            // Trip the shared token as soon as the second root is reached.
            if entry.path.starts_with(&cut) {
                cut_token.cancel();
            }
            entry.name.ends_with(".txt")
        })
        .cancel_token(token)
        .on_found(collecting(&batches))
        .on_completed(move |outcome| completed.lock().unwrap().push(outcome))
        .build_multi()
        .unwrap();

    assert_eq!(multi.start().unwrap(), SearchOutcome::Canceled);

    // The first root finished before the cancel; its batches stay delivered.
    let expected: BTreeSet<PathBuf> = [
        first.path().join("keep_a.txt"),
        first.path().join("keep_b.txt"),
    ]
    .into_iter()
    .collect();
    assert_eq!(collected_paths(&batches), expected);
    assert_eq!(*completions.lock().unwrap(), vec![SearchOutcome::Canceled]);
}

#[test]
fn multi_root_stopped_before_start_delivers_nothing() {
    let first = tempfile::tempdir().unwrap();
    write_file(&first.path().join("a.txt"));
    let second = tempfile::tempdir().unwrap();
    write_file(&second.path().join("b.txt"));

    let batches = new_batches();
    let multi = search()
        .roots([first.path(), second.path()])
        .pattern("*.txt")
        .on_found(collecting(&batches))
        .build_multi()
        .unwrap();

    multi.stop();

    assert_eq!(multi.start().unwrap(), SearchOutcome::Canceled);
    assert!(batches.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Parallel walk matches a sequential reference
// ---------------------------------------------------------------------------

#[test]
fn matches_equal_sequential_post_order_walk() {
    let dir = tempfile::tempdir().unwrap();
    grow_tree(dir.path(), 3);
    // A single-child chain hanging off the grown tree.
    let chain = dir.path().join("d0").join("only");
    fs::create_dir(&chain).unwrap();
    write_file(&chain.join("deep.txt"));

    let reference: BTreeSet<PathBuf> = walkdir::WalkDir::new(dir.path())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".txt"))
        .map(|e| e.into_path())
        .collect();
    assert!(!reference.is_empty());

    let batches = new_batches();
    let session = search()
        .root(dir.path())
        .pattern("*.txt")
        .dispatch(DispatchMode::Deferred)
        .on_found(collecting(&batches))
        .build()
        .unwrap();

    assert_eq!(session.start().unwrap(), SearchOutcome::Completed);
    assert_eq!(collected_paths(&batches), reference);
    assert_batches_well_formed(&batches);
}

// ---------------------------------------------------------------------------
// Dispatcher behavior
// ---------------------------------------------------------------------------

#[test]
fn no_batch_is_delivered_after_completion() {
    let dir = tempfile::tempdir().unwrap();
    grow_tree(dir.path(), 2);

    let done = Arc::new(AtomicBool::new(false));

    let guard = Arc::clone(&done);
    let flag = Arc::clone(&done);
    let session = search()
        .root(dir.path())
        .pattern("*.txt")
        .dispatch(DispatchMode::Deferred)
        .on_found(move |_batch| {
            if guard.load(Ordering::SeqCst) {
                return Err(ParfindError::Handler("batch after completion".into()));
            }
            Ok(())
        })
        .on_completed(move |_outcome| flag.store(true, Ordering::SeqCst))
        .build()
        .unwrap();

    // Any late delivery would surface as a Handler error here.
    assert_eq!(session.start().unwrap(), SearchOutcome::Completed);
    assert!(done.load(Ordering::SeqCst));
}

#[test]
fn deferred_handler_fault_is_fatal_after_drain() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("hit.txt"));

    let completed = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&completed);
    let session = search()
        .root(dir.path())
        .pattern("*.txt")
        .dispatch(DispatchMode::Deferred)
        .on_found(|_batch| Err(ParfindError::Handler("subscriber failure".into())))
        .on_completed(move |_outcome| flag.store(true, Ordering::SeqCst))
        .build()
        .unwrap();

    assert!(matches!(session.start(), Err(ParfindError::Handler(_))));
    assert!(
        !completed.load(Ordering::SeqCst),
        "completion must not fire when the barrier re-raises a fault"
    );
}

#[test]
fn deferred_cancellation_class_fault_folds_into_outcome() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("hit.txt"));

    let completions = Arc::new(Mutex::new(Vec::new()));

    let completed = Arc::clone(&completions);
    let session = search()
        .root(dir.path())
        .pattern("*.txt")
        .dispatch(DispatchMode::Deferred)
        // The suppress flag applies to walk cancellation only; the folded
        // variant always comes back as a plain Canceled outcome.
        .suppress_cancellation(false)
        .on_found(|_batch| Err(ParfindError::Canceled))
        .on_completed(move |outcome| completed.lock().unwrap().push(outcome))
        .build()
        .unwrap();

    assert_eq!(session.start().unwrap(), SearchOutcome::Canceled);
    assert_eq!(*completions.lock().unwrap(), vec![SearchOutcome::Canceled]);
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

#[test]
fn stop_is_idempotent_and_harmless_after_completion() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.txt"));

    let session = search()
        .root(dir.path())
        .pattern("*.txt")
        .cancel_token(CancelToken::new())
        .build()
        .unwrap();

    assert_eq!(session.start().unwrap(), SearchOutcome::Completed);

    session.stop();
    session.stop();
    assert_eq!(session.state(), SessionState::Completed);

    // A session without a token treats stop() as a no-op too.
    let plain = search().root(dir.path()).build().unwrap();
    plain.stop();
    assert_eq!(plain.state(), SessionState::Idle);
}

#[test]
fn session_cannot_be_started_twice() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.txt"));

    let session = search().root(dir.path()).build().unwrap();
    assert_eq!(session.start().unwrap(), SearchOutcome::Completed);
    assert!(matches!(session.start(), Err(ParfindError::AlreadyStarted)));
}

// ---------------------------------------------------------------------------
// Builder validation
// ---------------------------------------------------------------------------

#[test]
fn builder_rejects_bad_configuration() {
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(search().build(), Err(ParfindError::MissingRoot)));
    assert!(matches!(
        search().root(dir.path()).root(dir.path()).build(),
        Err(ParfindError::SingleRootRequired)
    ));
    assert!(matches!(
        search().root(dir.path().join("missing")).build(),
        Err(ParfindError::InvalidRoot(_))
    ));
    assert!(matches!(
        search().root(dir.path()).pattern("[").build(),
        Err(ParfindError::InvalidPattern(_))
    ));
    assert!(matches!(
        search().root(dir.path()).pattern("").build(),
        Err(ParfindError::InvalidPattern(_))
    ));
    assert!(matches!(
        search().roots(Vec::<PathBuf>::new()).build_multi(),
        Err(ParfindError::MissingRoot)
    ));
}

// ---------------------------------------------------------------------------
// Start-level partitioner
// ---------------------------------------------------------------------------

#[test]
fn single_child_chain_emits_each_level_once() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("root.txt"));

    let a = dir.path().join("a");
    fs::create_dir(&a).unwrap();
    write_file(&a.join("a.txt"));

    let b = a.join("b");
    fs::create_dir(&b).unwrap();
    write_file(&b.join("b.txt"));

    // The chain ends at a branching point with two leaf children.
    for name in ["c", "d"] {
        let leaf = b.join(name);
        fs::create_dir(&leaf).unwrap();
        write_file(&leaf.join(format!("{name}.txt")));
    }

    let batches = new_batches();
    let session = search()
        .root(dir.path())
        .pattern("*.txt")
        .on_found(collecting(&batches))
        .build()
        .unwrap();

    assert_eq!(session.start().unwrap(), SearchOutcome::Completed);

    let expected: BTreeSet<PathBuf> = [
        dir.path().join("root.txt"),
        a.join("a.txt"),
        b.join("b.txt"),
        b.join("c").join("c.txt"),
        b.join("d").join("d.txt"),
    ]
    .into_iter()
    .collect();
    assert_eq!(collected_paths(&batches), expected);
    assert_eq!(
        batches.lock().unwrap().len(),
        5,
        "each chain level emits exactly once while descending"
    );
    assert_batches_well_formed(&batches);
}

// ---------------------------------------------------------------------------
// Directory search and one-shot conveniences
// ---------------------------------------------------------------------------

#[test]
fn directory_search_matches_directory_names() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("build")).unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();
    fs::create_dir(dir.path().join("src").join("build")).unwrap();
    write_file(&dir.path().join("build.txt"));

    let batches = new_batches();
    let session = search()
        .root(dir.path())
        .pattern("build")
        .target(SearchTarget::Directories)
        .on_found(collecting(&batches))
        .build()
        .unwrap();

    assert_eq!(session.start().unwrap(), SearchOutcome::Completed);

    let expected: BTreeSet<PathBuf> = [
        dir.path().join("build"),
        dir.path().join("src").join("build"),
    ]
    .into_iter()
    .collect();
    assert_eq!(collected_paths(&batches), expected);
}

#[test]
fn one_shot_conveniences_collect_everything() {
    let dir = tempfile::tempdir().unwrap();
    grow_tree(dir.path(), 2);
    fs::create_dir(dir.path().join("d0").join("vendor")).unwrap();

    let files = parfind::find_files(dir.path(), "*.txt").unwrap();
    let reference = walkdir::WalkDir::new(dir.path())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".txt"))
        .count();
    assert_eq!(files.len(), reference);

    let dirs = parfind::find_directories(dir.path(), "vendor").unwrap();
    assert_eq!(dirs.len(), 1);
    assert_eq!(dirs[0].name, "vendor");
}
