use gte_kernel::{GraphError, Scheduler, TaskId};
use proptest::prelude::*;
use std::collections::HashSet;

fn id(n: usize) -> TaskId {
    TaskId::new(format!("task-{n:02}"))
}

proptest! {
    #[test]
    fn prop_plan_respects_dependencies(
        task_count in 1..25usize,
        edges in proptest::collection::vec((0..25usize, 0..25usize), 0..60),
        priorities in proptest::collection::vec(-10.0..10.0f64, 25),
    ) {
        let mut scheduler = Scheduler::new();
        let mut accepted: Vec<(usize, Vec<usize>)> = Vec::new();

        for task in 0..task_count {
            let deps: Vec<usize> = edges
                .iter()
                .filter(|(to, from)| *to == task && *from < task_count)
                .map(|(_, from)| *from)
                .collect();
            let dep_ids: Vec<TaskId> = deps.iter().map(|d| id(*d)).collect();
            match scheduler.add_task(id(task), priorities[task], &dep_ids) {
                Ok(()) => accepted.push((task, deps)),
                Err(GraphError::CycleDetected { .. }) => {}
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
        }

        let plan = scheduler.build_plan().unwrap();
        let accepted_ids: HashSet<usize> = accepted.iter().map(|(t, _)| *t).collect();

        // Every added task appears exactly once
        prop_assert_eq!(plan.task_count(), accepted.len());
        let planned: HashSet<TaskId> = plan.iter().flatten().cloned().collect();
        prop_assert_eq!(planned.len(), accepted.len());

        // Every planned dependency sits in an earlier batch
        for (task, deps) in &accepted {
            let batch = plan.batch_of(&id(*task)).unwrap();
            for dep in deps.iter().filter(|d| accepted_ids.contains(d)) {
                let dep_batch = plan.batch_of(&id(*dep)).unwrap();
                prop_assert!(dep_batch < batch);
            }
        }

        // Batches are sorted by descending priority
        for batch in plan.batches() {
            for pair in batch.windows(2) {
                let a = scheduler.graph().priority(&pair[0]).unwrap();
                let b = scheduler.graph().priority(&pair[1]).unwrap();
                prop_assert!(a >= b);
            }
        }
    }
}

#[test]
fn rejects_simple_cycle() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task("a", 1.0, &[]).unwrap();
    scheduler.add_task("b", 1.0, &[TaskId::new("a")]).unwrap();
    scheduler.add_task("c", 1.0, &[TaskId::new("b")]).unwrap();

    // a is taken, so the cycle has to come through a placeholder
    scheduler.add_task("d", 1.0, &[TaskId::new("c"), TaskId::new("e")]).unwrap();
    let err = scheduler.add_task("e", 1.0, &[TaskId::new("d")]).unwrap_err();
    assert_eq!(err, GraphError::CycleDetected { task: TaskId::new("e") });

    let plan = scheduler.build_plan().unwrap();
    assert_eq!(plan.task_count(), 4);
}

#[test]
fn rejects_self_dependency() {
    let mut scheduler = Scheduler::new();
    let err = scheduler.add_task("a", 1.0, &[TaskId::new("a")]).unwrap_err();
    assert_eq!(err, GraphError::CycleDetected { task: TaskId::new("a") });
    assert!(scheduler.graph().is_empty());
    assert!(scheduler.build_plan().unwrap().is_empty());
}

#[test]
fn rejects_duplicate_task() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task("a", 1.0, &[]).unwrap();
    let err = scheduler.add_task("a", 2.0, &[]).unwrap_err();
    assert_eq!(err, GraphError::DuplicateTask(TaskId::new("a")));
    assert_eq!(scheduler.graph().priority(&TaskId::new("a")), Some(1.0));
}

#[test]
fn plan_layers_diamond() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task("root", 1.0, &[]).unwrap();
    scheduler.add_task("left", 2.0, &[TaskId::new("root")]).unwrap();
    scheduler.add_task("right", 3.0, &[TaskId::new("root")]).unwrap();
    scheduler
        .add_task("join", 1.0, &[TaskId::new("left"), TaskId::new("right")])
        .unwrap();

    let plan = scheduler.build_plan().unwrap();
    let names: Vec<Vec<&str>> = plan
        .iter()
        .map(|b| b.iter().map(TaskId::as_str).collect())
        .collect();
    assert_eq!(names, vec![vec!["root"], vec!["right", "left"], vec!["join"]]);
}
