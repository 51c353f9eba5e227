//! Level-parallel folding on a bounded worker pool.
//!
//! Nodes in one topological level never depend on each other. Each level
//! is submitted to the pool, results are collected, and the next level
//! starts only after the whole level has landed in the cache. Workers are
//! scoped threads borrowing the graph; the job queue is bounded, the reply
//! queue is not, so the submitter never blocks on a full reply queue.

use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, trace};

use super::GraphFolder;
use crate::error::{BeliefError, BeliefResult, EvaluationError};
use crate::evaluator::Evaluation;
use crate::probability::Probability;

struct Job {
    idx: usize,
    parents: Vec<Option<Probability>>,
}

type Reply = (usize, BeliefResult<Evaluation>);

pub(super) fn fold_levels(
    folder: &mut GraphFolder<'_>,
    workers: usize,
    queue_capacity: usize,
) -> BeliefResult<()> {
    let graph = folder.graph;
    let evaluator = folder.evaluator;

    thread::scope(|scope| {
        let (job_tx, job_rx) = bounded::<Job>(queue_capacity);
        let (reply_tx, reply_rx) = unbounded::<Reply>();

        for idx in 0..workers {
            let rx: Receiver<Job> = job_rx.clone();
            let tx: Sender<Reply> = reply_tx.clone();
            thread::Builder::new()
                .name(format!("beliefgraph-fold-{idx}"))
                .spawn_scoped(scope, move || {
                    for job in rx {
                        let node = graph.node_at(job.idx);
                        let incoming = graph.incoming_edges(job.idx);
                        let result = evaluator.evaluate(node, &incoming, &job.parents);
                        if tx.send((job.idx, result)).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|err| BeliefError::internal(format!("failed to spawn fold worker: {err}")))?;
        }
        drop(job_rx);
        drop(reply_tx);

        // Dropping job_tx on return closes the queue and lets the workers exit
        // before the scope joins them.
        submit_levels(folder, &job_tx, &reply_rx)
    })
}

fn submit_levels(folder: &mut GraphFolder<'_>, jobs: &Sender<Job>, replies: &Receiver<Reply>) -> BeliefResult<()> {
    let graph = folder.graph;
    let mut rank = vec![0usize; graph.len()];
    for (r, &idx) in graph.order().iter().enumerate() {
        rank[idx] = r;
    }

    for (depth, level) in graph.levels().iter().enumerate() {
        let mut dispatched = 0usize;
        for &idx in level {
            if folder.cache.contains(idx) {
                continue;
            }
            if let Some(evaluation) = folder.pinned(idx) {
                folder.cache.insert(idx, evaluation);
                continue;
            }
            let job = Job {
                idx,
                parents: folder.parent_values(idx),
            };
            jobs.send(job).map_err(|_| EvaluationError::WorkerDisconnected)?;
            dispatched += 1;
        }
        trace!(depth, dispatched, "level submitted");

        let mut landed = Vec::with_capacity(dispatched);
        for _ in 0..dispatched {
            landed.push(replies.recv().map_err(|_| EvaluationError::WorkerDisconnected)?);
        }
        landed.sort_unstable_by_key(|(idx, _)| rank[*idx]);

        let mut first_failure = None;
        for (idx, result) in landed {
            match result {
                Ok(evaluation) => folder.cache.insert(idx, evaluation),
                Err(err) => {
                    debug!(node = %graph.node_at(idx).id, error = %err, "evaluation failed");
                    first_failure.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_failure {
            return Err(err);
        }
    }
    Ok(())
}
