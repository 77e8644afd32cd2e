//! Batch renaming with numeric sequencing.
//!
//! [`plan`] computes the mapping and rejects collisions before anything is
//! touched. [`RenameExecutor::execute`] applies it in two passes (every source
//! is first parked under a temporary sibling name, then moved to its target)
//! so that targets may reuse names of other files in the same batch. Any
//! failure or cancellation undoes the completed moves in reverse order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};

use crate::collection::{Collection, CollectionStore, EntryId};
use crate::error::{AppError, Result};
use crate::fs::operations::{file_name_string, temp_path_for, FsRenamer, Renamer};

/// Numbering parameters supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameParams {
    pub prefix: String,
    pub start_index: i64,
    pub step: i64,
    /// Zero-pad the number to at least this many digits (0 = no padding).
    pub pad_width: usize,
}

impl RenameParams {
    pub fn new(prefix: impl Into<String>, start_index: i64, step: i64) -> Self {
        Self {
            prefix: prefix.into(),
            start_index,
            step,
            pad_width: 0,
        }
    }

    pub fn with_pad_width(mut self, pad_width: usize) -> Self {
        self.pad_width = pad_width;
        self
    }
}

/// One source → target pair of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameStep {
    pub id: EntryId,
    pub source: PathBuf,
    pub target_name: String,
}

impl RenameStep {
    pub fn target_path(&self) -> PathBuf {
        self.source.with_file_name(&self.target_name)
    }
}

/// A computed, not yet applied batch rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    params: RenameParams,
    generation: u64,
    mapping: Vec<RenameStep>,
}

impl RenamePlan {
    pub fn params(&self) -> &RenameParams {
        &self.params
    }

    pub fn mapping(&self) -> &[RenameStep] {
        &self.mapping
    }

    /// Generation of the collection the plan was computed from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check the plan against the filesystem as seen by `renamer`.
    ///
    /// Sources must be distinct, targets must be pairwise distinct (ignoring
    /// case), and no target may name an existing file outside the batch.
    /// A target counts as inside the batch only if it is one of the source
    /// files itself, by path or by file identity.
    pub fn validate(&self, renamer: &impl Renamer) -> Result<()> {
        let mut sources: HashSet<&Path> = HashSet::new();
        for step in &self.mapping {
            if !sources.insert(step.source.as_path()) {
                return Err(AppError::Collision(format!(
                    "{} is listed more than once",
                    step.source.display()
                )));
            }
        }

        let mut targets = HashSet::new();
        for step in &self.mapping {
            let folded = step.target_name.to_lowercase();
            if !targets.insert(folded.clone()) {
                return Err(AppError::Collision(format!(
                    "two files would be named {}",
                    step.target_name
                )));
            }
            let target = step.target_path();
            let in_batch = sources.contains(target.as_path())
                || self
                    .mapping
                    .iter()
                    .any(|s| renamer.same_file(&s.source, &target));
            if renamer.exists(&target) && !in_batch {
                return Err(AppError::Collision(format!(
                    "{} already exists",
                    target.display()
                )));
            }
        }
        Ok(())
    }
}

/// Format the sequence number for position `index` of a batch.
fn sequence_number(params: &RenameParams, index: usize) -> Result<String> {
    let n = i64::try_from(index)
        .ok()
        .and_then(|i| i.checked_mul(params.step))
        .and_then(|offset| params.start_index.checked_add(offset))
        .ok_or_else(|| AppError::InvalidParameter("sequence number overflows".into()))?;
    Ok(format!("{:0width$}", n, width = params.pad_width))
}

/// Compute target names for `ids`, in order: `prefix + number + original extension`.
pub fn plan(collection: &Collection, ids: &[EntryId], params: &RenameParams) -> Result<RenamePlan> {
    if params.step == 0 {
        return Err(AppError::InvalidParameter("step must not be 0".into()));
    }
    if params.prefix.contains(['/', '\\', '\0']) {
        return Err(AppError::InvalidParameter(format!(
            "prefix {:?} must not contain path separators",
            params.prefix
        )));
    }
    if ids.is_empty() {
        return Err(AppError::InvalidParameter("nothing to rename".into()));
    }

    let mut mapping = Vec::with_capacity(ids.len());
    for (index, id) in ids.iter().enumerate() {
        let entry = collection
            .get(*id)
            .ok_or_else(|| AppError::NotFoundInCollection(PathBuf::from(id.to_string())))?;
        let extension = entry
            .path()
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let target_name = format!(
            "{}{}{}",
            params.prefix,
            sequence_number(params, index)?,
            extension
        );
        mapping.push(RenameStep {
            id: *id,
            source: entry.path().to_path_buf(),
            target_name,
        });
    }

    let plan = RenamePlan {
        params: params.clone(),
        generation: collection.generation(),
        mapping,
    };
    plan.validate(&FsRenamer)?;
    Ok(plan)
}

/// Outcome of [`RenameExecutor::execute`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameReport {
    /// Renames that are in effect after the call: (old path, new name).
    pub succeeded: Vec<(PathBuf, String)>,
    /// The rename that failed and why.
    pub failed: Vec<(PathBuf, String)>,
    /// Completed renames were undone.
    pub rolled_back: bool,
    /// The batch stopped because the cancellation flag was set.
    pub cancelled: bool,
}

impl RenameReport {
    pub fn is_success(&self) -> bool {
        !self.rolled_back && self.failed.is_empty()
    }

    /// Turn a rolled back or cancelled batch into an error.
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        let reason = match self.failed.first() {
            _ if self.cancelled => "cancelled".to_string(),
            Some((path, reason)) => format!("{}: {}", path.display(), reason),
            None => "batch did not complete".to_string(),
        };
        Err(AppError::RenameRolledBack(reason))
    }
}

/// A completed move of file `index` of the plan.
#[derive(Debug)]
struct Move {
    index: usize,
    from: PathBuf,
    to: PathBuf,
}

enum Halt {
    Failed(PathBuf, String),
    Cancelled,
}

/// Applies rename plans to disk and to the collection store.
pub struct RenameExecutor<F = FsRenamer> {
    renamer: F,
}

impl RenameExecutor<FsRenamer> {
    pub fn new() -> Self {
        Self::with_renamer(FsRenamer)
    }
}

impl Default for RenameExecutor<FsRenamer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Renamer> RenameExecutor<F> {
    pub fn with_renamer(renamer: F) -> Self {
        Self { renamer }
    }

    /// Apply `plan`, checking `cancel` between individual renames.
    ///
    /// Returns a report for a completed or cleanly rolled back batch. Fails
    /// before touching anything if the plan is stale or collides, and with
    /// [`AppError::UnrecoverableState`] if rolling back failed.
    pub fn execute(
        &self,
        plan: &RenamePlan,
        store: &mut CollectionStore,
        cancel: &AtomicBool,
    ) -> Result<RenameReport> {
        if plan.generation != store.generation() {
            return Err(AppError::StaleGeneration {
                expected: plan.generation,
                actual: store.generation(),
            });
        }
        plan.validate(&self.renamer)?;

        let token: u64 = rand::random();
        let temps: Vec<PathBuf> = plan
            .mapping
            .iter()
            .enumerate()
            .map(|(i, step)| temp_path_for(&step.source, token, i))
            .collect();
        let mut journal: Vec<Move> = Vec::with_capacity(plan.mapping.len() * 2);

        let halt = self
            .park_all(plan, &temps, &mut journal, cancel)
            .and_then(|()| self.place_all(plan, &temps, &mut journal, cancel));

        let halt = match halt {
            Ok(()) => {
                self.commit(plan, &temps, store)?;
                info!("renamed {} files", plan.mapping.len());
                return Ok(RenameReport {
                    succeeded: plan
                        .mapping
                        .iter()
                        .map(|s| (s.source.clone(), s.target_name.clone()))
                        .collect(),
                    ..Default::default()
                });
            }
            Err(halt) => halt,
        };

        let mut report = RenameReport {
            rolled_back: true,
            ..Default::default()
        };
        match halt {
            Halt::Failed(path, reason) => {
                warn!("rename of {} failed: {}; rolling back", path.display(), reason);
                report.failed.push((path, reason));
            }
            Halt::Cancelled => {
                info!("rename cancelled; rolling back");
                report.cancelled = true;
            }
        }

        let stuck = self.rollback(plan, journal);
        if !stuck.is_empty() {
            return Err(AppError::UnrecoverableState { paths: stuck });
        }
        Ok(report)
    }

    fn park_all(
        &self,
        plan: &RenamePlan,
        temps: &[PathBuf],
        journal: &mut Vec<Move>,
        cancel: &AtomicBool,
    ) -> std::result::Result<(), Halt> {
        for (index, step) in plan.mapping.iter().enumerate() {
            self.move_file(index, &step.source, &temps[index], &step.source, journal, cancel)?;
        }
        Ok(())
    }

    fn place_all(
        &self,
        plan: &RenamePlan,
        temps: &[PathBuf],
        journal: &mut Vec<Move>,
        cancel: &AtomicBool,
    ) -> std::result::Result<(), Halt> {
        for (index, step) in plan.mapping.iter().enumerate() {
            self.move_file(index, &temps[index], &step.target_path(), &step.source, journal, cancel)?;
        }
        Ok(())
    }

    /// One rename; never overwrites an existing file.
    fn move_file(
        &self,
        index: usize,
        from: &Path,
        to: &Path,
        reported_as: &Path,
        journal: &mut Vec<Move>,
        cancel: &AtomicBool,
    ) -> std::result::Result<(), Halt> {
        if cancel.load(Ordering::Relaxed) {
            return Err(Halt::Cancelled);
        }
        if self.renamer.exists(to) {
            return Err(Halt::Failed(
                reported_as.to_path_buf(),
                format!("{} already exists", to.display()),
            ));
        }
        self.renamer
            .rename(from, to)
            .map_err(|e| Halt::Failed(reported_as.to_path_buf(), e.to_string()))?;
        journal.push(Move {
            index,
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    /// Undo `journal` newest first. Returns the original paths of files
    /// that could not be put back.
    fn rollback(&self, plan: &RenamePlan, journal: Vec<Move>) -> Vec<PathBuf> {
        let mut stuck_at: Vec<Option<PathBuf>> = vec![None; plan.mapping.len()];

        for mv in journal.into_iter().rev() {
            if stuck_at[mv.index].is_some() {
                continue;
            }
            let result = if self.renamer.exists(&mv.from) {
                Err(format!("{} is occupied", mv.from.display()))
            } else {
                self.renamer.rename(&mv.to, &mv.from).map_err(|e| e.to_string())
            };
            if let Err(reason) = result {
                error!(
                    "could not restore {}: left at {} ({})",
                    plan.mapping[mv.index].source.display(),
                    mv.to.display(),
                    reason
                );
                stuck_at[mv.index] = Some(mv.to);
            }
        }

        stuck_at
            .iter()
            .zip(&plan.mapping)
            .filter(|(stuck, _)| stuck.is_some())
            .map(|(_, step)| step.source.clone())
            .collect()
    }

    /// Mirror a completed batch in the store. Goes through the temporary
    /// names so that paths stay unique at every step.
    fn commit(&self, plan: &RenamePlan, temps: &[PathBuf], store: &mut CollectionStore) -> Result<()> {
        for (step, temp) in plan.mapping.iter().zip(temps) {
            store.apply_rename(&step.source, &file_name_string(temp))?;
        }
        for (step, temp) in plan.mapping.iter().zip(temps) {
            store.apply_rename(temp, &step.target_name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::{build_view, SortKey, ViewSpec};
    use std::cell::Cell;
    use std::fs;
    use std::io;
    use tempfile::TempDir;

    /// Fails the listed (1-based) rename calls.
    struct FailingRenamer {
        fail_on: Vec<usize>,
        calls: Cell<usize>,
    }

    impl FailingRenamer {
        fn new(fail_on: &[usize]) -> Self {
            Self {
                fail_on: fail_on.to_vec(),
                calls: Cell::new(0),
            }
        }
    }

    impl Renamer for FailingRenamer {
        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.fail_on.contains(&call) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected"));
            }
            fs::rename(from, to)
        }
    }

    /// Raises the cancellation flag after a number of renames.
    struct CancellingRenamer<'a> {
        flag: &'a AtomicBool,
        after: usize,
        calls: Cell<usize>,
    }

    impl Renamer for CancellingRenamer<'_> {
        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            fs::rename(from, to)?;
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() >= self.after {
                self.flag.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn setup(names: &[&str]) -> (TempDir, CollectionStore) {
        let tmp = TempDir::new().unwrap();
        for name in names {
            fs::write(tmp.path().join(name), format!("content of {}", name)).unwrap();
        }
        let mut store = CollectionStore::new(vec!["jpg".into(), "png".into()]);
        store.load(tmp.path()).unwrap();
        (tmp, store)
    }

    fn name_order(store: &CollectionStore) -> Vec<EntryId> {
        build_view(store.collection(), &ViewSpec::new(SortKey::NameAsc, None))
            .ids()
            .to_vec()
    }

    fn listing(dir: &Path) -> Vec<(String, String)> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| {
                let path = e.unwrap().path();
                (file_name_string(&path), fs::read_to_string(&path).unwrap())
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn plan_numbers_in_order_and_keeps_extension() {
        let (_tmp, store) = setup(&["a.jpg", "b.jpg"]);
        let plan = plan(store.collection(), &name_order(&store), &RenameParams::new("vac_", 1, 1)).unwrap();
        let names: Vec<_> = plan
            .mapping()
            .iter()
            .map(|s| (file_name_string(&s.source), s.target_name.clone()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a.jpg".to_string(), "vac_1.jpg".to_string()),
                ("b.jpg".to_string(), "vac_2.jpg".to_string()),
            ]
        );
    }

    #[test]
    fn plan_honours_step_padding_and_extension_case() {
        let (_tmp, store) = setup(&["a.JPG", "b.png", "c.jpg"]);
        let params = RenameParams::new("img", 10, -5).with_pad_width(3);
        let plan = plan(store.collection(), &name_order(&store), &params).unwrap();
        let targets: Vec<_> = plan.mapping().iter().map(|s| s.target_name.as_str()).collect();
        assert_eq!(targets, vec!["img010.JPG", "img005.png", "img000.jpg"]);
    }

    #[test]
    fn plan_rejects_zero_step() {
        let (_tmp, store) = setup(&["a.jpg"]);
        let err = plan(store.collection(), &name_order(&store), &RenameParams::new("x", 1, 0)).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[test]
    fn plan_rejects_separator_in_prefix() {
        let (_tmp, store) = setup(&["a.jpg"]);
        let err = plan(store.collection(), &name_order(&store), &RenameParams::new("../x", 1, 1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[test]
    fn plan_rejects_unknown_entry() {
        let (_tmp, store) = setup(&["a.jpg"]);
        let err = plan(store.collection(), &[EntryId(1234)], &RenameParams::new("x", 1, 1)).unwrap_err();
        assert!(matches!(err, AppError::NotFoundInCollection(_)));
    }

    #[test]
    fn plan_rejects_overflow() {
        let (_tmp, store) = setup(&["a.jpg", "b.jpg"]);
        let err = plan(store.collection(), &name_order(&store), &RenameParams::new("x", i64::MAX, 1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[test]
    fn plan_collides_with_file_outside_batch() {
        let (tmp, store) = setup(&["a.jpg", "b.jpg", "vac_2.jpg"]);
        let before = listing(tmp.path());
        let ids: Vec<EntryId> = name_order(&store).into_iter().take(2).collect();
        let err = plan(store.collection(), &ids, &RenameParams::new("vac_", 1, 1)).unwrap_err();
        assert!(matches!(err, AppError::Collision(_)));
        assert_eq!(listing(tmp.path()), before);
    }

    #[test]
    fn plan_collides_with_outsider_differing_only_in_case() {
        let (tmp, store) = setup(&["p1.jpg", "x.jpg"]);
        fs::write(tmp.path().join("P1.jpg"), "outsider").unwrap();
        if fs::read_dir(tmp.path()).unwrap().count() < 3 {
            // Case-insensitive filesystem: P1.jpg overwrote p1.jpg.
            return;
        }
        let before = listing(tmp.path());

        // Targets are P1.jpg and P2.jpg; P1.jpg is not part of the batch.
        let err = plan(store.collection(), &name_order(&store), &RenameParams::new("P", 1, 1)).unwrap_err();
        assert!(matches!(err, AppError::Collision(_)));
        assert_eq!(listing(tmp.path()), before);
    }

    #[test]
    fn plan_allows_target_that_is_a_batch_source() {
        let (_tmp, store) = setup(&["p1.jpg", "p2.jpg"]);
        let mut ids = name_order(&store);
        ids.reverse(); // p2.jpg -> p1.jpg, p1.jpg -> p2.jpg
        let plan = plan(store.collection(), &ids, &RenameParams::new("p", 1, 1)).unwrap();
        assert_eq!(plan.mapping()[0].target_name, "p1.jpg");
    }

    #[test]
    fn plan_collides_on_duplicate_entry() {
        let (tmp, store) = setup(&["a.jpg"]);
        let before = listing(tmp.path());
        let id = name_order(&store)[0];
        let err = plan(store.collection(), &[id, id], &RenameParams::new("p", 1, 1)).unwrap_err();
        assert!(matches!(err, AppError::Collision(_)));
        assert_eq!(listing(tmp.path()), before);
    }

    #[test]
    fn validate_rejects_duplicate_targets() {
        let (_tmp, store) = setup(&["a.jpg", "b.jpg"]);
        let mut plan = plan(store.collection(), &name_order(&store), &RenameParams::new("p", 1, 1)).unwrap();
        plan.mapping[1].target_name = "P1.jpg".into();
        assert!(matches!(plan.validate(&FsRenamer), Err(AppError::Collision(_))));
    }

    #[test]
    fn execute_renames_files_and_store() {
        let (tmp, mut store) = setup(&["a.jpg", "b.jpg"]);
        let plan = plan(store.collection(), &name_order(&store), &RenameParams::new("vac_", 1, 1)).unwrap();
        let cancel = AtomicBool::new(false);

        let report = RenameExecutor::new().execute(&plan, &mut store, &cancel).unwrap();
        assert!(report.is_success());
        assert!(report.ensure_success().is_ok());
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(
            listing(tmp.path()),
            vec![
                ("vac_1.jpg".to_string(), "content of a.jpg".to_string()),
                ("vac_2.jpg".to_string(), "content of b.jpg".to_string()),
            ]
        );

        let entry = store.collection().get(plan.mapping()[0].id).unwrap();
        assert_eq!(entry.display_name(), "vac_1.jpg");
        assert_eq!(entry.path(), tmp.path().canonicalize().unwrap().join("vac_1.jpg"));
    }

    #[test]
    fn execute_handles_targets_that_swap_names() {
        let (tmp, mut store) = setup(&["1.jpg", "2.jpg"]);
        let mut ids = name_order(&store);
        ids.reverse(); // 2.jpg -> 1.jpg, 1.jpg -> 2.jpg
        let plan = plan(store.collection(), &ids, &RenameParams::new("", 1, 1)).unwrap();
        let cancel = AtomicBool::new(false);

        let report = RenameExecutor::new().execute(&plan, &mut store, &cancel).unwrap();
        assert!(report.is_success());
        assert_eq!(
            listing(tmp.path()),
            vec![
                ("1.jpg".to_string(), "content of 2.jpg".to_string()),
                ("2.jpg".to_string(), "content of 1.jpg".to_string()),
            ]
        );
        let names: Vec<_> = ids
            .iter()
            .map(|id| store.collection().get(*id).unwrap().display_name().to_string())
            .collect();
        assert_eq!(names, vec!["1.jpg", "2.jpg"]);
    }

    #[test]
    fn failure_midway_restores_everything() {
        let (tmp, mut store) = setup(&["a.jpg", "b.jpg", "c.jpg"]);
        let before = listing(tmp.path());
        let generation = store.generation();
        let plan = plan(store.collection(), &name_order(&store), &RenameParams::new("x_", 1, 1)).unwrap();
        let cancel = AtomicBool::new(false);

        // Calls 1-3 park the files, 4-6 place them; fail placing the second.
        for fail_on in [2, 3, 5, 6] {
            let executor = RenameExecutor::with_renamer(FailingRenamer::new(&[fail_on]));
            let report = executor.execute(&plan, &mut store, &cancel).unwrap();
            assert!(report.rolled_back);
            assert!(!report.is_success());
            assert!(report.succeeded.is_empty());
            assert_eq!(report.failed.len(), 1);
            assert_eq!(listing(tmp.path()), before, "fail_on {}", fail_on);
            assert_eq!(store.generation(), generation);
        }
    }

    #[test]
    fn vanished_source_is_reported_and_rolled_back() {
        let (tmp, mut store) = setup(&["a.jpg", "b.jpg"]);
        let plan = plan(store.collection(), &name_order(&store), &RenameParams::new("x_", 1, 1)).unwrap();
        fs::remove_file(tmp.path().join("b.jpg")).unwrap();
        let cancel = AtomicBool::new(false);

        let report = RenameExecutor::new().execute(&plan, &mut store, &cancel).unwrap();
        assert!(report.rolled_back);
        assert_eq!(report.failed[0].0, plan.mapping()[1].source);
        match report.ensure_success() {
            Err(AppError::RenameRolledBack(reason)) => assert!(reason.contains("b.jpg")),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(
            listing(tmp.path()),
            vec![("a.jpg".to_string(), "content of a.jpg".to_string())]
        );
    }

    #[test]
    fn failed_revert_is_unrecoverable_and_names_the_file() {
        let (tmp, mut store) = setup(&["a.jpg", "b.jpg", "c.jpg"]);
        let plan = plan(store.collection(), &name_order(&store), &RenameParams::new("x_", 1, 1)).unwrap();
        let cancel = AtomicBool::new(false);

        // Call 3 (parking c) fails; call 4 is the revert of b.
        let executor = RenameExecutor::with_renamer(FailingRenamer::new(&[3, 4]));
        let err = executor.execute(&plan, &mut store, &cancel).unwrap_err();
        match err {
            AppError::UnrecoverableState { paths } => {
                assert_eq!(paths, vec![plan.mapping()[1].source.clone()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(tmp.path().join("a.jpg").exists());
        assert!(tmp.path().join("c.jpg").exists());
        assert!(!tmp.path().join("b.jpg").exists());
    }

    #[test]
    fn cancelled_before_start_touches_nothing() {
        let (tmp, mut store) = setup(&["a.jpg", "b.jpg"]);
        let before = listing(tmp.path());
        let plan = plan(store.collection(), &name_order(&store), &RenameParams::new("x_", 1, 1)).unwrap();
        let cancel = AtomicBool::new(true);

        let report = RenameExecutor::new().execute(&plan, &mut store, &cancel).unwrap();
        assert!(report.cancelled);
        assert!(report.rolled_back);
        assert!(matches!(
            report.ensure_success(),
            Err(AppError::RenameRolledBack(reason)) if reason == "cancelled"
        ));
        assert_eq!(listing(tmp.path()), before);
    }

    #[test]
    fn cancelled_midway_rolls_back() {
        let (tmp, mut store) = setup(&["a.jpg", "b.jpg", "c.jpg"]);
        let before = listing(tmp.path());
        let plan = plan(store.collection(), &name_order(&store), &RenameParams::new("x_", 1, 1)).unwrap();
        let cancel = AtomicBool::new(false);
        let executor = RenameExecutor::with_renamer(CancellingRenamer {
            flag: &cancel,
            after: 4,
            calls: Cell::new(0),
        });

        let report = executor.execute(&plan, &mut store, &cancel).unwrap();
        assert!(report.cancelled);
        assert_eq!(listing(tmp.path()), before);
    }

    #[test]
    fn stale_plan_is_rejected() {
        let (tmp, mut store) = setup(&["a.jpg"]);
        let plan = plan(store.collection(), &name_order(&store), &RenameParams::new("x_", 1, 1)).unwrap();
        fs::write(tmp.path().join("new.jpg"), "").unwrap();
        store.refresh().unwrap();
        let cancel = AtomicBool::new(false);

        let err = RenameExecutor::new().execute(&plan, &mut store, &cancel).unwrap_err();
        assert!(matches!(err, AppError::StaleGeneration { .. }));
        assert!(tmp.path().join("a.jpg").exists());
    }
}
