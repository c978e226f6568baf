//! 随机交错执行入队、分配、取消、终态回报与节点失效，每一步后检查两表互斥

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use jobmesh_domain::{JobRepository, NodeTransport};
use rand::{rngs::StdRng, Rng, SeedableRng};
use uuid::Uuid;

use crate::job_manager::JobManager;
use crate::node_registry::NodeRegistry;
use crate::test_utils::{memory_repository, new_job, FakeNodeTransport, NODE1, NODE2};

async fn assert_split_table_invariant(repo: &Arc<dyn JobRepository>, created: &[Uuid]) {
    let queued: HashSet<Uuid> = repo
        .queued_items()
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.job_id)
        .collect();
    let jobs: HashSet<Uuid> = repo
        .all_jobs()
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.job_id)
        .collect();

    assert!(
        queued.is_disjoint(&jobs),
        "job present in both tables: {:?}",
        queued.intersection(&jobs).collect::<Vec<_>>()
    );

    for id in created {
        if queued.contains(id) || jobs.contains(id) {
            continue;
        }
        let details = repo.details(*id).await.unwrap();
        assert!(
            details.iter().any(|d| d.detail == "Deleted"),
            "job {id} vanished without a Deleted detail"
        );
    }
}

#[tokio::test]
async fn test_random_interleavings_keep_tables_disjoint() {
    for seed in [7_u64, 42, 2024] {
        let mut rng = StdRng::seed_from_u64(seed);
        let repo = memory_repository().await;
        let transport = Arc::new(FakeNodeTransport::new());
        let registry = Arc::new(NodeRegistry::new());
        let manager = Arc::new(JobManager::new(
            Arc::clone(&repo),
            Arc::clone(&transport) as Arc<dyn NodeTransport>,
            Arc::clone(&registry),
            true,
        ));
        let nodes = [NODE1, NODE2];
        let mut created: Vec<Uuid> = Vec::new();

        for _ in 0..120 {
            match rng.random_range(0..7) {
                0 | 1 => {
                    created.push(manager.enqueue(new_job("FastJob")).await.unwrap());
                }
                2 => {
                    let node = nodes[rng.random_range(0..nodes.len())];
                    registry.heartbeat(node).await;
                    manager.assign_next_job().await.unwrap();
                }
                3 if !created.is_empty() => {
                    let id = created[rng.random_range(0..created.len())];
                    // 取消与分配并发执行
                    let (cancel, assign) =
                        tokio::join!(manager.cancel_job(id), manager.assign_next_job());
                    cancel.unwrap();
                    assign.unwrap();
                }
                4 if !created.is_empty() => {
                    let id = created[rng.random_range(0..created.len())];
                    // 回报可能来自已不再持有该作业的节点
                    let node = nodes[rng.random_range(0..nodes.len())];
                    if rng.random_bool(0.5) {
                        manager.report_done(id, node).await.unwrap();
                    } else {
                        manager.report_canceled(id, node).await.unwrap();
                    }
                }
                5 => {
                    let node = nodes[rng.random_range(0..nodes.len())];
                    repo.requeue_unended_job_for_node(node).await.unwrap();
                }
                _ => {
                    let node = nodes[rng.random_range(0..nodes.len())];
                    let (pass, _) = tokio::join!(
                        manager.assign_next_job(),
                        repo.add_detail(Uuid::new_v4(), "noise", Utc::now())
                    );
                    pass.unwrap();
                    registry.mark_suspect(node).await;
                }
            }

            assert_split_table_invariant(&repo, &created).await;
        }

        // 无重复派发：同一作业在未被回收前不会发给第二个节点
        let executing = repo.executing_jobs().await.unwrap();
        let mut seen = HashSet::new();
        for job in &executing {
            assert!(seen.insert(job.job_id));
        }
        let busy = repo.busy_node_urls().await.unwrap();
        assert!(busy.len() <= nodes.len());
        assert_eq!(busy.len(), executing.len());
    }
}
