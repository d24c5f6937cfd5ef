//! End-to-end runs of the batch scheduler: recording layout, determinism,
//! checkpoint resume, and offline merging.

use approx::assert_abs_diff_eq;
use ndarray::{array, s};

use silda::{
    lot_file, merge_checkpoints, BatchScheduler, Checkpoint, Corpus, CountState, Resume, RunConfig,
};

fn scenario_corpus() -> Corpus {
    let dw = array![
        [2u64, 0, 1],
        [0, 3, 0],
        [1, 1, 1],
        [0, 0, 2],
        [3, 0, 0],
    ];
    let users: Vec<String> = ["ann", "bob", "ann", "bob", "ann"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    // Ratings chosen so every (user, sentiment) cell holds at least one doc.
    Corpus::from_parts(dw, &[1.0, 5.0, 5.0, 1.0, 1.0], &users).unwrap()
}

fn scenario_config() -> RunConfig {
    RunConfig {
        n_topics: 2,
        alpha: 0.01,
        eta: 0.01,
        n_iter: 100,
        n_burn: 20,
        n_thin: 5,
        n_lot: 50,
        seed: 42,
        n_update: 1000,
        max_retries: 3,
    }
}

#[test]
fn thinned_snapshots_are_recorded_and_normalized() {
    let corpus = scenario_corpus();
    let dir = tempfile::tempdir().unwrap();
    let scheduler = BatchScheduler::new(&corpus, scenario_config(), dir.path());
    let checkpoint = scheduler.run(None).unwrap();

    // floor(100 / 5) - 1 recorded samples.
    assert_eq!(checkpoint.n_saved(), 19);
    assert_eq!(checkpoint.last_complete_lot, Some(2));

    for i in 0..19 {
        for u in 0..corpus.n_users() {
            for s in 0..corpus.n_sentiments() {
                let total: f64 = checkpoint.ust.slice(s![u, s, .., i]).sum();
                assert_abs_diff_eq!(total, 1.0, epsilon = 1e-6);
            }
        }
        for s in 0..corpus.n_sentiments() {
            for t in 0..2 {
                let total: f64 = checkpoint.stw.slice(s![s, t, .., i]).sum();
                // A (sentiment, topic) cell with no documents at snapshot
                // time stays a zero row.
                assert!(
                    (total - 1.0).abs() < 1e-6 || total == 0.0,
                    "stw[{s},{t},:,{i}] sums to {total}"
                );
            }
        }
        for d in 0..corpus.n_docs() {
            let t = checkpoint.ta[[d, i]];
            assert!(t == 0.0 || t == 1.0);
        }
    }
}

#[test]
fn identical_configuration_reproduces_identical_samples() {
    let corpus = scenario_corpus();
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let a = BatchScheduler::new(&corpus, scenario_config(), dir_a.path())
        .run(None)
        .unwrap();
    let b = BatchScheduler::new(&corpus, scenario_config(), dir_b.path())
        .run(None)
        .unwrap();
    assert_eq!(a.ta, b.ta);
    assert_eq!(a.ust, b.ust);
    assert_eq!(a.stw, b.stw);
}

#[test]
fn every_completed_lot_leaves_a_loadable_checkpoint() {
    let corpus = scenario_corpus();
    let dir = tempfile::tempdir().unwrap();
    BatchScheduler::new(&corpus, scenario_config(), dir.path())
        .run(None)
        .unwrap();
    for lot in 0..3 {
        let ckpt = Checkpoint::load(&lot_file(dir.path(), lot)).unwrap();
        assert_eq!(ckpt.last_complete_lot, Some(lot));
        assert_eq!(ckpt.n_saved(), 19);
    }
}

fn resume_config() -> RunConfig {
    RunConfig {
        n_topics: 2,
        alpha: 1.0,
        eta: 1.0,
        n_iter: 150,
        n_burn: 10,
        n_thin: 1,
        n_lot: 50,
        seed: 123,
        n_update: 1000,
        max_retries: 3,
    }
}

#[test]
fn resumed_run_reproduces_the_uninterrupted_run() {
    let corpus = scenario_corpus();

    let full_dir = tempfile::tempdir().unwrap();
    let full = BatchScheduler::new(&corpus, resume_config(), full_dir.path())
        .run(None)
        .unwrap();

    // Resume after lot 2, reconstructing ta from column 50/1*2 - 1 = 99.
    let prior = Checkpoint::load(&lot_file(full_dir.path(), 2)).unwrap();
    let restored = prior.assignment_at(99).unwrap();
    let rebuilt = CountState::build(&corpus, 2, &restored);
    assert_abs_diff_eq!(rebuilt.ust.sum(), corpus.n_docs() as f64, epsilon = 1e-12);
    for u in 0..corpus.n_users() {
        for s in 0..corpus.n_sentiments() {
            let expected = (0..corpus.n_docs())
                .filter(|&d| corpus.user[d] == u && corpus.sentiment[d] == s)
                .count() as f64;
            assert_abs_diff_eq!(rebuilt.ust.slice(s![u, s, ..]).sum(), expected);
        }
    }

    let resumed_dir = tempfile::tempdir().unwrap();
    let resumed = BatchScheduler::new(&corpus, resume_config(), resumed_dir.path())
        .run(Some(Resume {
            checkpoint: prior.clone(),
            target_lot: 2,
        }))
        .unwrap();

    // Lot 3 reseeds identically, so its samples match the full run's.
    assert_eq!(
        resumed.ta.slice(s![.., 100..]),
        full.ta.slice(s![.., 100..])
    );
    assert_eq!(
        resumed.ust.slice(s![.., .., .., 100..]),
        full.ust.slice(s![.., .., .., 100..])
    );
    assert_eq!(
        resumed.stw.slice(s![.., .., .., 100..]),
        full.stw.slice(s![.., .., .., 100..])
    );
    // Slots the resumed run never touched stay exactly zero.
    assert_eq!(resumed.ust.slice(s![.., .., .., ..100]).sum(), 0.0);

    // Merging the prior lots with the resumed continuation reconstructs the
    // uninterrupted run.
    let merged = merge_checkpoints(&prior, &resumed).unwrap();
    assert_eq!(merged.ust.unwrap(), full.ust);
    assert_eq!(merged.stw.unwrap(), full.stw);
}

#[test]
fn persistent_checkpoint_failure_exhausts_retries() {
    let corpus = scenario_corpus();
    let dir = tempfile::tempdir().unwrap();
    // A file where the output directory should be: every checkpoint write
    // fails, so the lot can never complete.
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"").unwrap();
    let err = BatchScheduler::new(&corpus, scenario_config(), &blocker)
        .run(None)
        .unwrap_err();
    assert!(matches!(err, silda::Error::LotFailed { lot: 0, .. }));
}

#[test]
fn resume_past_the_final_lot_is_rejected() {
    let corpus = scenario_corpus();
    let dir = tempfile::tempdir().unwrap();
    let full = BatchScheduler::new(&corpus, resume_config(), dir.path())
        .run(None)
        .unwrap();
    // Lot 3 is the final lot; its resume column (50 * 3 - 1 = 149) lies past
    // the buffer's 149 slots.
    let err = BatchScheduler::new(&corpus, resume_config(), dir.path())
        .run(Some(Resume {
            checkpoint: full,
            target_lot: 3,
        }))
        .unwrap_err();
    assert!(matches!(
        err,
        silda::Error::ResumeColumn {
            column: 149,
            available: 149
        }
    ));
}
